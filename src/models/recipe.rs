use serde::{Deserialize, Serialize};

/// Precomputed raw surprise of a recipe at fixed percentiles of its
/// ingredient-pair surprises
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SurprisePercentiles {
    #[serde(rename = "100%", default)]
    pub p100: Option<f64>,
    #[serde(rename = "95%", default)]
    pub p95: Option<f64>,
    #[serde(rename = "90%", default)]
    pub p90: Option<f64>,
    #[serde(rename = "50%", default)]
    pub p50: Option<f64>,
}

impl SurprisePercentiles {
    /// All four percentiles, highest first, or `None` if any is missing
    pub fn features(&self) -> Option<[f64; 4]> {
        Some([self.p100?, self.p95?, self.p90?, self.p50?])
    }
}

/// A catalog recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    /// May contain nulls from upstream data; those entries are ignored
    #[serde(default)]
    pub ingredient_ids: Vec<Option<String>>,
    #[serde(default)]
    pub vector: Vec<f64>,
    #[serde(default)]
    pub surprises: SurprisePercentiles,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Recipe {
    /// Non-null ingredient ids, in recipe order
    pub fn ingredients(&self) -> impl Iterator<Item = &str> {
        self.ingredient_ids.iter().filter_map(|id| id.as_deref())
    }
}

/// A catalog ingredient with its (optional) cluster memberships
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub subcluster_id: Option<String>,
}

impl Ingredient {
    pub fn groups(&self) -> ItemGroups<'_> {
        ItemGroups {
            group: self.subcluster_id.as_deref(),
            supergroup: self.cluster_id.as_deref(),
        }
    }
}

/// Group and supergroup an item rolls up into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemGroups<'a> {
    pub group: Option<&'a str>,
    pub supergroup: Option<&'a str>,
}

/// Three nearest supergroups of a supergroup by embedding similarity
///
/// A slot is `None` where the neighbor was pruned by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NeighborEntry {
    #[serde(default)]
    pub most_similar: Option<String>,
    #[serde(default)]
    pub second_most_similar: Option<String>,
    #[serde(default)]
    pub third_most_similar: Option<String>,
}

impl NeighborEntry {
    /// Neighbors from most to least similar
    pub fn ranked(&self) -> [Option<&str>; 3] {
        [
            self.most_similar.as_deref(),
            self.second_most_similar.as_deref(),
            self.third_most_similar.as_deref(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_skips_null_ingredients() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"id":"1","title":"Soup","ingredient_ids":["10",null,"12"]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = recipe.ingredients().collect();
        assert_eq!(ids, vec!["10", "12"]);
    }

    #[test]
    fn test_surprise_percentile_keys() {
        let s: SurprisePercentiles =
            serde_json::from_str(r#"{"100%": 3.5, "95%": 2.0, "90%": 1.5, "50%": 0.1}"#).unwrap();
        assert_eq!(s.features(), Some([3.5, 2.0, 1.5, 0.1]));

        let partial: SurprisePercentiles = serde_json::from_str(r#"{"100%": 3.5}"#).unwrap();
        assert_eq!(partial.p100, Some(3.5));
        assert_eq!(partial.features(), None);
    }

    #[test]
    fn test_ingredient_without_clusters() {
        let ing: Ingredient = serde_json::from_str(r#"{"id":"7","name":"truffle"}"#).unwrap();
        assert_eq!(ing.groups(), ItemGroups::default());
    }

    #[test]
    fn test_neighbor_entry_with_pruned_slot() {
        let entry: NeighborEntry =
            serde_json::from_str(r#"{"most_similar":"3","second_most_similar":null,"third_most_similar":"9"}"#)
                .unwrap();
        assert_eq!(entry.ranked(), [Some("3"), None, Some("9")]);
    }
}
