use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Dimension, Granularity};

/// Running mean of every observation submitted for one key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RatingAggregate {
    pub mean: f64,
    pub count: u32,
}

impl RatingAggregate {
    /// Creates an aggregate from its first observation
    pub fn first(value: f64) -> Self {
        Self {
            mean: value,
            count: 1,
        }
    }

    /// Folds one more observation into the mean
    pub fn observe(&mut self, value: f64) {
        let n = f64::from(self.count);
        self.mean = (self.mean * n + value) / (n + 1.0);
        self.count += 1;
    }
}

/// Observes `value` under `id`, creating the aggregate on first sight
pub(crate) fn observe_into(table: &mut HashMap<String, RatingAggregate>, id: &str, value: f64) {
    table
        .entry(id.to_string())
        .and_modify(|agg| agg.observe(value))
        .or_insert_with(|| RatingAggregate::first(value));
}

/// Aggregates for one dimension, at every granularity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DimensionRatings {
    #[serde(default)]
    pub item: HashMap<String, RatingAggregate>,
    #[serde(default)]
    pub group: HashMap<String, RatingAggregate>,
    #[serde(default)]
    pub supergroup: HashMap<String, RatingAggregate>,
    /// Whole-recipe ratings
    #[serde(default)]
    pub recipe: HashMap<String, RatingAggregate>,
}

impl DimensionRatings {
    pub fn table(&self, granularity: Granularity) -> &HashMap<String, RatingAggregate> {
        match granularity {
            Granularity::Item => &self.item,
            Granularity::Group => &self.group,
            Granularity::Supergroup => &self.supergroup,
        }
    }

    pub fn table_mut(&mut self, granularity: Granularity) -> &mut HashMap<String, RatingAggregate> {
        match granularity {
            Granularity::Item => &mut self.item,
            Granularity::Group => &mut self.group,
            Granularity::Supergroup => &mut self.supergroup,
        }
    }
}

/// Every rating a user has given, keyed by dimension
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingTables {
    #[serde(default)]
    pub taste: DimensionRatings,
    #[serde(default)]
    pub familiarity: DimensionRatings,
    #[serde(default)]
    pub surprise: DimensionRatings,
}

impl RatingTables {
    pub fn dimension(&self, dimension: Dimension) -> &DimensionRatings {
        match dimension {
            Dimension::Taste => &self.taste,
            Dimension::Familiarity => &self.familiarity,
            Dimension::Surprise => &self.surprise,
        }
    }

    pub fn dimension_mut(&mut self, dimension: Dimension) -> &mut DimensionRatings {
        match dimension {
            Dimension::Taste => &mut self.taste,
            Dimension::Familiarity => &mut self.familiarity,
            Dimension::Surprise => &mut self.surprise,
        }
    }

    /// Ids of recipes rated on any dimension
    pub fn rated_recipes(&self) -> impl Iterator<Item = &String> {
        self.taste
            .recipe
            .keys()
            .chain(self.familiarity.recipe.keys())
            .chain(self.surprise.recipe.keys())
    }
}
