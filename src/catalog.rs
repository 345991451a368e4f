use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::models::{Ingredient, NeighborEntry, Recipe};

/// Recipes and ingredients shown to users during onboarding
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OnboardingSet {
    #[serde(default)]
    pub recipe_ids: Vec<String>,
    #[serde(default)]
    pub ingredient_ids: Vec<String>,
}

/// Read-only recipe catalog, loaded once at start-up
#[derive(Debug, Default)]
pub struct Catalog {
    recipes: HashMap<String, Recipe>,
    ingredients: HashMap<String, Ingredient>,
    neighbors: HashMap<String, NeighborEntry>,
    onboarding: OnboardingSet,
}

/// Referential problems found in the catalog data
#[derive(Debug, Default, PartialEq)]
pub struct CatalogReport {
    /// Recipe id to ingredient ids absent from the ingredient table
    pub missing_ingredients: BTreeMap<String, Vec<String>>,
    pub recipes_without_surprise: Vec<String>,
    pub ingredients_without_cluster: Vec<String>,
}

impl CatalogReport {
    pub fn is_clean(&self) -> bool {
        self.missing_ingredients.is_empty()
            && self.recipes_without_surprise.is_empty()
            && self.ingredients_without_cluster.is_empty()
    }
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> anyhow::Result<T> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

impl Catalog {
    pub fn new(
        recipes: Vec<Recipe>,
        ingredients: Vec<Ingredient>,
        neighbors: HashMap<String, NeighborEntry>,
        onboarding: OnboardingSet,
    ) -> Self {
        Self {
            recipes: recipes.into_iter().map(|r| (r.id.clone(), r)).collect(),
            ingredients: ingredients.into_iter().map(|i| (i.id.clone(), i)).collect(),
            neighbors,
            onboarding,
        }
    }

    /// Loads `recipes.json`, `ingredients.json`, `neighbors.json` and
    /// `onboarding.json` from `dir`
    pub fn load_from_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let recipes: Vec<Recipe> = read_json(dir, "recipes.json")?;
        let ingredients: Vec<Ingredient> = read_json(dir, "ingredients.json")?;
        let neighbors: HashMap<String, NeighborEntry> = read_json(dir, "neighbors.json")?;
        let onboarding: OnboardingSet = read_json(dir, "onboarding.json")?;

        let catalog = Self::new(recipes, ingredients, neighbors, onboarding);

        tracing::info!(
            recipes = catalog.recipes.len(),
            ingredients = catalog.ingredients.len(),
            supergroups = catalog.neighbors.len(),
            archetypes = catalog.onboarding.recipe_ids.len(),
            "Catalog loaded"
        );

        let report = catalog.validate();
        if !report.is_clean() {
            tracing::warn!(
                recipes_with_missing_ingredients = report.missing_ingredients.len(),
                recipes_without_surprise = report.recipes_without_surprise.len(),
                ingredients_without_cluster = report.ingredients_without_cluster.len(),
                "Catalog has incomplete records"
            );
        }

        Ok(catalog)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.get(id)
    }

    pub fn neighbors(&self, supergroup_id: &str) -> Option<&NeighborEntry> {
        self.neighbors.get(supergroup_id)
    }

    pub fn recipe_ids(&self) -> impl Iterator<Item = &String> {
        self.recipes.keys()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn onboarding(&self) -> &OnboardingSet {
        &self.onboarding
    }

    /// Onboarding recipes present in the catalog, ordered by id
    pub fn archetypes(&self) -> Vec<&Recipe> {
        let mut ids: Vec<&String> = self.onboarding.recipe_ids.iter().collect();
        ids.sort();
        ids.dedup();
        ids.into_iter().filter_map(|id| self.recipes.get(id)).collect()
    }

    pub fn validate(&self) -> CatalogReport {
        let mut report = CatalogReport::default();

        for recipe in self.recipes.values() {
            let missing: Vec<String> = recipe
                .ingredients()
                .filter(|id| !self.ingredients.contains_key(*id))
                .map(str::to_string)
                .collect();
            if !missing.is_empty() {
                report.missing_ingredients.insert(recipe.id.clone(), missing);
            }
            if recipe.surprises.p100.is_none() {
                report.recipes_without_surprise.push(recipe.id.clone());
            }
        }

        let mut unclustered: HashSet<&str> = HashSet::new();
        for ingredient in self.ingredients.values() {
            if ingredient.cluster_id.is_none() {
                unclustered.insert(ingredient.id.as_str());
            }
        }
        report.ingredients_without_cluster = unclustered.into_iter().map(str::to_string).collect();

        report.recipes_without_surprise.sort();
        report.ingredients_without_cluster.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SurprisePercentiles;

    fn recipe(id: &str, ingredients: Vec<Option<&str>>, p100: Option<f64>) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: format!("Recipe {}", id),
            ingredient_ids: ingredients.into_iter().map(|i| i.map(str::to_string)).collect(),
            vector: vec![1.0, 0.0],
            surprises: SurprisePercentiles {
                p100,
                ..Default::default()
            },
            url: None,
            image: None,
        }
    }

    fn ingredient(id: &str, cluster: Option<&str>) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            name: id.to_string(),
            cluster_id: cluster.map(str::to_string),
            subcluster_id: None,
        }
    }

    #[test]
    fn test_validate_reports_missing_references() {
        let catalog = Catalog::new(
            vec![
                recipe("1", vec![Some("a"), None, Some("ghost")], Some(2.0)),
                recipe("2", vec![Some("b")], None),
            ],
            vec![ingredient("a", Some("c1")), ingredient("b", None)],
            HashMap::new(),
            OnboardingSet::default(),
        );

        let report = catalog.validate();
        assert_eq!(report.missing_ingredients["1"], vec!["ghost".to_string()]);
        assert_eq!(report.recipes_without_surprise, vec!["2".to_string()]);
        assert_eq!(report.ingredients_without_cluster, vec!["b".to_string()]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_archetypes_sorted_and_filtered() {
        let catalog = Catalog::new(
            vec![recipe("9", vec![], None), recipe("3", vec![], None)],
            vec![],
            HashMap::new(),
            OnboardingSet {
                recipe_ids: vec!["9".to_string(), "missing".to_string(), "3".to_string()],
                ingredient_ids: vec![],
            },
        );

        let ids: Vec<&str> = catalog.archetypes().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "9"]);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = std::env::temp_dir().join(format!("qchef-catalog-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("recipes.json"),
            r#"[{"id":"1","title":"Soup","ingredient_ids":["a"],"vector":[0.1,0.2],"surprises":{"100%":2.5}}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("ingredients.json"),
            r#"[{"id":"a","name":"leek","cluster_id":"c1","subcluster_id":"s1"}]"#,
        )
        .unwrap();
        std::fs::write(dir.join("neighbors.json"), r#"{"c1":{"most_similar":"c2"}}"#).unwrap();
        std::fs::write(dir.join("onboarding.json"), r#"{"recipe_ids":["1"]}"#).unwrap();

        let catalog = Catalog::load_from_dir(&dir).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.ingredient("a").unwrap().subcluster_id.as_deref(), Some("s1"));
        assert_eq!(
            catalog.neighbors("c1").unwrap().most_similar.as_deref(),
            Some("c2")
        );
        assert_eq!(catalog.archetypes().len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_missing_dir_fails() {
        let result = Catalog::load_from_dir("/nonexistent/qchef");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("recipes.json"));
    }
}
