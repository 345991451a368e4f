use crate::{
    catalog::Catalog,
    error::{EngineError, EngineResult},
    models::{rating::observe_into, Dimension, Granularity, ItemGroups, Recipe, UserProfile},
};

/// Weights of the most, second and third most similar neighbor supergroups
pub const NEIGHBOR_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Shrinks neighbor-derived estimates toward neutral
pub const NEIGHBOR_DISCOUNT: f64 = 0.75;

/// Applied to negative ingredient taste ratings before averaging a recipe
pub const NEGATIVE_TASTE_MULTIPLIER: f64 = 1.5;

/// Records one observation for an item and the groups it belongs to
///
/// Each level keeps its own counter, so one call updates up to three
/// aggregates.
pub fn record_rating(
    profile: &mut UserProfile,
    item_id: &str,
    groups: ItemGroups<'_>,
    dimension: Dimension,
    value: f64,
) {
    let ratings = profile.ratings.dimension_mut(dimension);
    observe_into(ratings.table_mut(Granularity::Item), item_id, value);
    if let Some(group) = groups.group {
        observe_into(ratings.table_mut(Granularity::Group), group, value);
    }
    if let Some(supergroup) = groups.supergroup {
        observe_into(ratings.table_mut(Granularity::Supergroup), supergroup, value);
    }
}

/// Records a rating given directly to a supergroup (onboarding clusters)
pub fn record_supergroup_rating(
    profile: &mut UserProfile,
    supergroup_id: &str,
    dimension: Dimension,
    value: f64,
) {
    let ratings = profile.ratings.dimension_mut(dimension);
    observe_into(ratings.table_mut(Granularity::Supergroup), supergroup_id, value);
}

/// Records a whole-recipe rating and propagates it to every ingredient
///
/// Returns the number of ingredients updated.
pub fn record_recipe_rating(
    profile: &mut UserProfile,
    recipe: &Recipe,
    catalog: &Catalog,
    dimension: Dimension,
    value: f64,
) -> usize {
    observe_into(
        &mut profile.ratings.dimension_mut(dimension).recipe,
        &recipe.id,
        value,
    );

    let mut updated = 0;
    for ingredient_id in recipe.ingredients() {
        let groups = match catalog.ingredient(ingredient_id) {
            Some(ingredient) => ingredient.groups(),
            None => {
                tracing::debug!(
                    recipe_id = %recipe.id,
                    ingredient_id = %ingredient_id,
                    "Ingredient missing from catalog, rating item level only"
                );
                ItemGroups::default()
            }
        };
        record_rating(profile, ingredient_id, groups, dimension, value);
        updated += 1;
    }
    updated
}

/// Resolves a user's ratings against the catalog hierarchy
pub struct RatingResolver<'a> {
    profile: &'a UserProfile,
    catalog: &'a Catalog,
}

impl<'a> RatingResolver<'a> {
    pub fn new(profile: &'a UserProfile, catalog: &'a Catalog) -> Self {
        Self { profile, catalog }
    }

    /// Best available estimate of the user's rating for an ingredient
    ///
    /// Falls back item > group > supergroup > neighbor estimate (taste only).
    pub fn rating(&self, item_id: &str, dimension: Dimension) -> EngineResult<f64> {
        let ratings = self.profile.ratings.dimension(dimension);

        if let Some(agg) = ratings.item.get(item_id) {
            return Ok(agg.mean);
        }

        let groups = self
            .catalog
            .ingredient(item_id)
            .map(|ingredient| ingredient.groups())
            .unwrap_or_default();

        if let Some(agg) = groups.group.and_then(|g| ratings.group.get(g)) {
            return Ok(agg.mean);
        }
        if let Some(agg) = groups.supergroup.and_then(|s| ratings.supergroup.get(s)) {
            return Ok(agg.mean);
        }

        if dimension == Dimension::Taste {
            if let Some(estimate) = groups.supergroup.and_then(|s| self.neighbor_estimate(s)) {
                return Ok(estimate);
            }
        }

        Err(EngineError::NoRatingAvailable(item_id.to_string()))
    }

    /// Discounted, weighted mean of the user's taste ratings of the nearest
    /// supergroups; weights are renormalized over the rated neighbors
    fn neighbor_estimate(&self, supergroup_id: &str) -> Option<f64> {
        let entry = self.catalog.neighbors(supergroup_id)?;
        let rated = &self.profile.ratings.taste.supergroup;

        let (weighted_sum, weight_total) = entry
            .ranked()
            .iter()
            .zip(NEIGHBOR_WEIGHTS)
            .filter_map(|(neighbor, weight)| {
                let agg = rated.get((*neighbor)?)?;
                Some((agg.mean * weight, weight))
            })
            .fold((0.0, 0.0), |(sum, total), (value, weight)| {
                (sum + value, total + weight)
            });

        if weight_total == 0.0 {
            return None;
        }
        Some(weighted_sum / weight_total * NEIGHBOR_DISCOUNT)
    }

    /// Mean of the recipe's resolvable ingredient ratings
    ///
    /// Unresolvable ingredients are skipped. Negative taste ratings are
    /// amplified by [`NEGATIVE_TASTE_MULTIPLIER`].
    pub fn recipe_rating(&self, recipe: &Recipe, dimension: Dimension) -> EngineResult<f64> {
        let mut sum = 0.0;
        let mut resolved = 0usize;

        for ingredient_id in recipe.ingredients() {
            match self.rating(ingredient_id, dimension) {
                Ok(rating) => {
                    let rating = if dimension == Dimension::Taste && rating < 0.0 {
                        rating * NEGATIVE_TASTE_MULTIPLIER
                    } else {
                        rating
                    };
                    sum += rating;
                    resolved += 1;
                }
                Err(e) => {
                    tracing::debug!(
                        recipe_id = %recipe.id,
                        ingredient_id = %ingredient_id,
                        error = %e,
                        "Skipping unrated ingredient"
                    );
                }
            }
        }

        if resolved == 0 {
            return Err(EngineError::NoIngredientRatings(recipe.id.clone()));
        }
        Ok(sum / resolved as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OnboardingSet;
    use crate::models::{Ingredient, NeighborEntry, SurprisePercentiles};
    use std::collections::HashMap;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn ingredient(id: &str, sub: Option<&str>, cluster: Option<&str>) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            name: id.to_string(),
            cluster_id: cluster.map(str::to_string),
            subcluster_id: sub.map(str::to_string),
        }
    }

    fn recipe(id: &str, ingredients: &[Option<&str>]) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: id.to_string(),
            ingredient_ids: ingredients.iter().map(|i| i.map(str::to_string)).collect(),
            vector: vec![],
            surprises: SurprisePercentiles::default(),
            url: None,
            image: None,
        }
    }

    fn test_catalog() -> Catalog {
        let mut neighbors = HashMap::new();
        neighbors.insert(
            "fungi".to_string(),
            NeighborEntry {
                most_similar: Some("roots".to_string()),
                second_most_similar: None,
                third_most_similar: Some("alliums".to_string()),
            },
        );
        Catalog::new(
            vec![
                recipe("A", &[Some("chicken"), Some("lemon")]),
                recipe("B", &[Some("truffle")]),
            ],
            vec![
                ingredient("chicken", Some("poultry"), Some("meat")),
                ingredient("duck", Some("poultry"), Some("meat")),
                ingredient("beef", Some("bovine"), Some("meat")),
                ingredient("lemon", Some("citrus"), Some("fruit")),
                ingredient("truffle", None, Some("fungi")),
                ingredient("mystery", None, None),
            ],
            neighbors,
            OnboardingSet::default(),
        )
    }

    #[test]
    fn test_record_rating_updates_every_level_independently() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        let chicken = catalog.ingredient("chicken").unwrap();
        let beef = catalog.ingredient("beef").unwrap();

        record_rating(&mut profile, "chicken", chicken.groups(), Dimension::Taste, 1.0);
        record_rating(&mut profile, "beef", beef.groups(), Dimension::Taste, 0.0);

        let taste = &profile.ratings.taste;
        assert_eq!(taste.item["chicken"].count, 1);
        assert_eq!(taste.group["poultry"].count, 1);
        assert_eq!(taste.group["bovine"].count, 1);
        assert_eq!(taste.supergroup["meat"].count, 2);
        assert_close(taste.supergroup["meat"].mean, 0.5);
        assert!(profile.ratings.familiarity.item.is_empty());
    }

    #[test]
    fn test_record_rating_tolerates_missing_groups() {
        let mut profile = UserProfile::new("u", None);
        record_rating(&mut profile, "mystery", ItemGroups::default(), Dimension::Surprise, 0.3);

        assert_eq!(profile.ratings.surprise.item.len(), 1);
        assert!(profile.ratings.surprise.group.is_empty());
        assert!(profile.ratings.surprise.supergroup.is_empty());
    }

    #[test]
    fn test_record_recipe_rating_propagates_to_ingredients() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        let soup = recipe("soup", &[Some("lemon"), None, Some("unknown")]);

        let updated = record_recipe_rating(&mut profile, &soup, &catalog, Dimension::Familiarity, 0.5);

        assert_eq!(updated, 2);
        let fam = &profile.ratings.familiarity;
        assert_eq!(fam.recipe["soup"].count, 1);
        assert_eq!(fam.item["lemon"].count, 1);
        assert_eq!(fam.group["citrus"].count, 1);
        assert_eq!(fam.item["unknown"].count, 1);
    }

    #[test]
    fn test_resolution_order() {
        let catalog = test_catalog();
        let resolver_for = |profile: &UserProfile| -> EngineResult<f64> {
            RatingResolver::new(profile, &catalog).rating("duck", Dimension::Taste)
        };

        let mut profile = UserProfile::new("u", None);
        assert_eq!(
            resolver_for(&profile),
            Err(EngineError::NoRatingAvailable("duck".to_string()))
        );

        record_supergroup_rating(&mut profile, "meat", Dimension::Taste, -0.4);
        assert_close(resolver_for(&profile).unwrap(), -0.4);

        profile
            .ratings
            .taste
            .group
            .insert("poultry".to_string(), crate::models::RatingAggregate::first(0.2));
        assert_close(resolver_for(&profile).unwrap(), 0.2);

        profile
            .ratings
            .taste
            .item
            .insert("duck".to_string(), crate::models::RatingAggregate::first(0.9));
        assert_close(resolver_for(&profile).unwrap(), 0.9);
    }

    #[test]
    fn test_neighbor_estimate_renormalizes_and_discounts() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        record_supergroup_rating(&mut profile, "roots", Dimension::Taste, 0.8);
        record_supergroup_rating(&mut profile, "alliums", Dimension::Taste, 0.4);

        let rating = RatingResolver::new(&profile, &catalog)
            .rating("truffle", Dimension::Taste)
            .unwrap();

        let expected = (0.8 * 0.5 + 0.4 * 0.2) / 0.7 * NEIGHBOR_DISCOUNT;
        assert_close(rating, expected);
    }

    #[test]
    fn test_neighbor_estimate_only_for_taste() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        record_supergroup_rating(&mut profile, "roots", Dimension::Familiarity, 0.8);
        record_supergroup_rating(&mut profile, "roots", Dimension::Taste, 0.8);

        let resolver = RatingResolver::new(&profile, &catalog);
        assert!(resolver.rating("truffle", Dimension::Taste).is_ok());
        assert_eq!(
            resolver.rating("truffle", Dimension::Familiarity),
            Err(EngineError::NoRatingAvailable("truffle".to_string()))
        );
    }

    #[test]
    fn test_recipe_rating_scenario() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        profile
            .ratings
            .taste
            .item
            .insert("chicken".to_string(), crate::models::RatingAggregate::first(0.8));
        profile
            .ratings
            .taste
            .item
            .insert("lemon".to_string(), crate::models::RatingAggregate::first(0.6));

        let resolver = RatingResolver::new(&profile, &catalog);
        let a = catalog.recipe("A").unwrap();
        let b = catalog.recipe("B").unwrap();

        assert_close(resolver.recipe_rating(a, Dimension::Taste).unwrap(), 0.7);
        assert_eq!(
            resolver.recipe_rating(b, Dimension::Taste),
            Err(EngineError::NoIngredientRatings("B".to_string()))
        );

        // A neighbor rating lets truffle resolve
        record_supergroup_rating(&mut profile, "roots", Dimension::Taste, 0.4);
        let resolver = RatingResolver::new(&profile, &catalog);
        assert_close(
            resolver.recipe_rating(b, Dimension::Taste).unwrap(),
            0.4 * NEIGHBOR_DISCOUNT,
        );
    }

    #[test]
    fn test_recipe_rating_amplifies_negative_taste_only() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        for dim in [Dimension::Taste, Dimension::Familiarity] {
            record_rating(&mut profile, "chicken", ItemGroups::default(), dim, -0.4);
            record_rating(&mut profile, "lemon", ItemGroups::default(), dim, 0.6);
        }

        let resolver = RatingResolver::new(&profile, &catalog);
        let a = catalog.recipe("A").unwrap();
        assert_close(
            resolver.recipe_rating(a, Dimension::Taste).unwrap(),
            (-0.4 * NEGATIVE_TASTE_MULTIPLIER + 0.6) / 2.0,
        );
        assert_close(resolver.recipe_rating(a, Dimension::Familiarity).unwrap(), 0.1);
    }

    #[test]
    fn test_recipe_rating_ignores_order_and_nulls() {
        let catalog = test_catalog();
        let mut profile = UserProfile::new("u", None);
        record_rating(&mut profile, "chicken", ItemGroups::default(), Dimension::Taste, 0.25);
        record_rating(&mut profile, "lemon", ItemGroups::default(), Dimension::Taste, 0.75);

        let resolver = RatingResolver::new(&profile, &catalog);
        let forward = recipe("f", &[Some("chicken"), None, Some("lemon"), Some("mystery")]);
        let backward = recipe("b", &[Some("mystery"), Some("lemon"), Some("chicken"), None]);

        assert_close(
            resolver.recipe_rating(&forward, Dimension::Taste).unwrap(),
            resolver.recipe_rating(&backward, Dimension::Taste).unwrap(),
        );
    }

    #[test]
    fn test_recipe_rating_with_only_nulls_fails() {
        let catalog = test_catalog();
        let profile = UserProfile::new("u", None);
        let empty = recipe("e", &[None, None]);
        assert_eq!(
            RatingResolver::new(&profile, &catalog).recipe_rating(&empty, Dimension::Taste),
            Err(EngineError::NoIngredientRatings("e".to_string()))
        );
    }
}
