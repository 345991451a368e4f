use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::EngineError;

pub mod profile;
pub mod rating;
pub mod recipe;

pub use profile::{
    ActionEvent, RecipeAction, RecipeReview, ServedBatch, ServedRecipe, UserProfile,
};
pub use rating::{DimensionRatings, RatingAggregate, RatingTables};
pub use recipe::{Ingredient, ItemGroups, NeighborEntry, Recipe, SurprisePercentiles};

/// A rating dimension users give feedback on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Taste,
    Familiarity,
    Surprise,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Taste, Dimension::Familiarity, Dimension::Surprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Taste => "taste",
            Dimension::Familiarity => "familiarity",
            Dimension::Surprise => "surprise",
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "taste" => Ok(Dimension::Taste),
            "familiarity" => Ok(Dimension::Familiarity),
            "surprise" => Ok(Dimension::Surprise),
            _ => Err(EngineError::UnknownDimension(s.to_string())),
        }
    }
}

/// Level of the ingredient hierarchy a rating aggregate is kept at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// A single ingredient
    Item,
    /// The ingredient's subcluster
    Group,
    /// The ingredient's cluster
    Supergroup,
}
