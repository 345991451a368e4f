use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::RatingTables;

/// Lifecycle events a recipe goes through for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeAction {
    /// Shown in a recommendation batch
    Served,
    /// Seen during onboarding or validation; never counts as served
    Validated,
    Viewed,
    Saved,
    Cooked,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub timestamp: DateTime<Utc>,
    pub action: RecipeAction,
}

/// Scores that justified serving one recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedRecipe {
    pub recipe_id: String,
    pub taste: f64,
    #[serde(default)]
    pub surprise: Option<f64>,
}

/// One recommendation batch in the served ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedBatch {
    pub timestamp: DateTime<Utc>,
    pub recipes: Vec<ServedRecipe>,
}

/// A user's write-up of a recipe they cooked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeReview {
    pub cook_rating: f64,
    #[serde(default)]
    pub how: Option<String>,
    #[serde(default)]
    pub why: Option<String>,
    /// Encoded photo as sent by the client
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "Utc::now")]
    pub reviewed_at: DateTime<Utc>,
}

/// Everything the engine knows about one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Assigned once at creation; profiles predating group assignment have none
    #[serde(default)]
    experiment_group: Option<u8>,
    #[serde(default)]
    pub onboarded: bool,
    #[serde(default)]
    pub ratings: RatingTables,
    /// Recipe id to its ordered action log
    #[serde(default)]
    pub history: HashMap<String, Vec<ActionEvent>>,
    #[serde(default)]
    pub served_recipes: Vec<ServedBatch>,
    /// Latest review per recipe id
    #[serde(default)]
    pub reviews: HashMap<String, RecipeReview>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, experiment_group: Option<u8>) -> Self {
        Self {
            user_id: user_id.into(),
            experiment_group,
            onboarded: false,
            ratings: RatingTables::default(),
            history: HashMap::new(),
            served_recipes: Vec::new(),
            reviews: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn experiment_group(&self) -> Option<u8> {
        self.experiment_group
    }

    /// Appends an action to a recipe's log
    ///
    /// Until the user is onboarded every action is recorded as `Validated`.
    pub fn record_action(&mut self, recipe_id: &str, timestamp: DateTime<Utc>, action: RecipeAction) {
        let action = if self.onboarded {
            action
        } else {
            RecipeAction::Validated
        };
        let log = self.history.entry(recipe_id.to_string()).or_default();
        log.push(ActionEvent { timestamp, action });
        log.sort_by_key(|event| event.timestamp);
    }

    /// Number of times a recipe was served to this user
    pub fn times_served(&self, recipe_id: &str) -> usize {
        self.history
            .get(recipe_id)
            .map(|log| {
                log.iter()
                    .filter(|event| event.action == RecipeAction::Served)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Appends a batch to the ledger and a `Served` event per recipe
    ///
    /// Batches shown before onboarding is complete are logged as `Validated`.
    pub fn record_served_batch(&mut self, batch: ServedBatch) {
        let action = if self.onboarded {
            RecipeAction::Served
        } else {
            RecipeAction::Validated
        };
        for served in &batch.recipes {
            self.history
                .entry(served.recipe_id.clone())
                .or_default()
                .push(ActionEvent {
                    timestamp: batch.timestamp,
                    action: action.clone(),
                });
        }
        self.served_recipes.push(batch);
    }

    /// Stores a review, replacing any earlier one for the same recipe
    pub fn record_review(&mut self, recipe_id: &str, review: RecipeReview) {
        self.reviews.insert(recipe_id.to_string(), review);
    }

    /// Recipes this user has rated on any dimension
    pub fn rated_recipe_ids(&self) -> HashSet<&str> {
        self.ratings.rated_recipes().map(String::as_str).collect()
    }
}
