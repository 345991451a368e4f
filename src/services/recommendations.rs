use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::{
    catalog::Catalog,
    db::{LockToken, ProfileLock, ProfileStore},
    error::{AppError, AppResult},
    models::{
        Dimension, ItemGroups, Recipe, RecipeAction, RecipeReview, ServedBatch, UserProfile,
    },
    services::{
        classifier::ClassifierEnsemble,
        experiment::{self, ServerFlags},
        ranker::{Combination, Ranker},
        ratings,
    },
};

/// What a batch of submitted ratings refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingTarget {
    Ingredient,
    Supergroup,
    Recipe,
}

/// One lifecycle event reported by a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggedAction {
    pub recipe_id: String,
    pub action: RecipeAction,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Recipes chosen for one request, in ranked order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationBatch {
    pub recipes: Vec<Recipe>,
    pub strategy: Combination,
}

/// Entry points wrapping the engine in a fetch, compute, persist cycle
pub struct RecommendationService {
    profiles: Arc<dyn ProfileStore>,
    lock: Arc<dyn ProfileLock>,
    catalog: Arc<Catalog>,
    models: Option<Arc<ClassifierEnsemble>>,
    flags: ServerFlags,
    exclude_onboarding: bool,
    num_groups: u8,
}

impl RecommendationService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        lock: Arc<dyn ProfileLock>,
        catalog: Arc<Catalog>,
        models: Option<Arc<ClassifierEnsemble>>,
        flags: ServerFlags,
    ) -> Self {
        Self {
            profiles,
            lock,
            catalog,
            models,
            flags,
            exclude_onboarding: true,
            num_groups: 4,
        }
    }

    pub fn with_onboarding_excluded(mut self, exclude: bool) -> Self {
        self.exclude_onboarding = exclude;
        self
    }

    pub fn with_experiment_groups(mut self, num_groups: u8) -> Self {
        self.num_groups = num_groups.max(1);
        self
    }

    /// Runs `update` on the user's profile under the profile lock and
    /// persists the result
    async fn with_profile<T>(
        &self,
        user_id: &str,
        update: impl FnOnce(&mut UserProfile) -> AppResult<T>,
    ) -> AppResult<T> {
        let token = self.lock.acquire(user_id).await?;
        let result = self.update_locked(user_id, update).await;
        self.release(user_id, token).await;
        result
    }

    async fn update_locked<T>(
        &self,
        user_id: &str,
        update: impl FnOnce(&mut UserProfile) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut profile = self
            .profiles
            .fetch_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;

        let value = update(&mut profile)?;
        self.profiles.persist_profile(&profile).await?;
        Ok(value)
    }

    async fn release(&self, user_id: &str, token: LockToken) {
        if let Err(e) = self.lock.release(user_id, token).await {
            tracing::error!(user_id, error = %e, "Failed to release profile lock");
        }
    }

    /// Creates a profile, assigning an experiment group once
    ///
    /// Returns the stored profile and whether it was newly created.
    #[tracing::instrument(skip(self))]
    pub async fn create_profile(
        &self,
        user_id: &str,
        experiment_group: Option<u8>,
    ) -> AppResult<(UserProfile, bool)> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
        }
        if let Some(group) = experiment_group {
            if group >= self.num_groups {
                return Err(AppError::InvalidInput(format!(
                    "experiment_group must be below {}",
                    self.num_groups
                )));
            }
        }

        let group =
            experiment_group.unwrap_or_else(|| rand::thread_rng().gen_range(0..self.num_groups));
        let profile = UserProfile::new(user_id, Some(group));

        if self.profiles.create_profile(&profile).await? {
            tracing::info!(user_id, group, "Profile created");
            return Ok((profile, true));
        }

        let existing = self
            .profiles
            .fetch_profile(user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("profile {} vanished after insert", user_id)))?;
        Ok((existing, false))
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_onboarding(&self, user_id: &str) -> AppResult<UserProfile> {
        self.with_profile(user_id, |profile| {
            profile.onboarded = true;
            Ok(profile.clone())
        })
        .await
    }

    /// Feeds a batch of ratings into the aggregator; returns how many were
    /// applied
    #[tracing::instrument(skip(self, values), fields(count = values.len()))]
    pub async fn submit(
        &self,
        user_id: &str,
        dimension: &str,
        target: RatingTarget,
        values: HashMap<String, f64>,
    ) -> AppResult<usize> {
        let dimension: Dimension = dimension.parse()?;
        if let Some((id, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AppError::InvalidInput(format!("rating for {} is not a number", id)));
        }

        let catalog = &self.catalog;
        self.with_profile(user_id, |profile| {
            let mut applied = 0;
            for (id, value) in &values {
                match target {
                    RatingTarget::Ingredient => {
                        let groups = catalog
                            .ingredient(id)
                            .map(|ingredient| ingredient.groups())
                            .unwrap_or_else(ItemGroups::default);
                        ratings::record_rating(profile, id, groups, dimension, *value);
                    }
                    RatingTarget::Supergroup => {
                        ratings::record_supergroup_rating(profile, id, dimension, *value);
                    }
                    RatingTarget::Recipe => {
                        let Some(recipe) = catalog.recipe(id) else {
                            tracing::warn!(recipe_id = %id, "Rating for unknown recipe ignored");
                            continue;
                        };
                        ratings::record_recipe_rating(profile, recipe, catalog, dimension, *value);
                    }
                }
                applied += 1;
            }
            Ok(applied)
        })
        .await
    }

    #[tracing::instrument(skip(self, actions), fields(count = actions.len()))]
    pub async fn log_actions(&self, user_id: &str, actions: Vec<LoggedAction>) -> AppResult<()> {
        self.with_profile(user_id, |profile| {
            for entry in actions {
                profile.record_action(&entry.recipe_id, entry.timestamp, entry.action);
            }
            Ok(())
        })
        .await
    }

    /// Stores cook reviews keyed by recipe id; returns how many were kept
    #[tracing::instrument(skip(self, reviews), fields(count = reviews.len()))]
    pub async fn submit_reviews(
        &self,
        user_id: &str,
        reviews: HashMap<String, RecipeReview>,
    ) -> AppResult<usize> {
        if let Some((id, _)) = reviews.iter().find(|(_, r)| !r.cook_rating.is_finite()) {
            return Err(AppError::InvalidInput(format!("cook_rating for {} is not a number", id)));
        }

        let catalog = &self.catalog;
        self.with_profile(user_id, |profile| {
            let mut applied = 0;
            for (recipe_id, review) in reviews {
                if catalog.recipe(&recipe_id).is_none() {
                    tracing::warn!(recipe_id = %recipe_id, "Review for unknown recipe ignored");
                    continue;
                }
                profile.record_review(&recipe_id, review);
                applied += 1;
            }
            Ok(applied)
        })
        .await
    }

    /// Recipes the user may be served: unrated, and outside the onboarding
    /// set when that is excluded
    fn candidate_pool<'a>(&'a self, profile: &UserProfile) -> Vec<&'a str> {
        let rated = profile.rated_recipe_ids();
        let onboarding = &self.catalog.onboarding().recipe_ids;

        let mut pool: Vec<&str> = self
            .catalog
            .recipe_ids()
            .map(String::as_str)
            .filter(|id| !rated.contains(id))
            .filter(|id| !(self.exclude_onboarding && onboarding.iter().any(|o| o == id)))
            .collect();
        pool.sort_unstable();
        pool
    }

    /// Ranks, records and returns the next batch for a user
    #[tracing::instrument(skip(self))]
    pub async fn rank(
        &self,
        user_id: &str,
        num_wanted: usize,
        strategy_override: Option<Combination>,
    ) -> AppResult<RecommendationBatch> {
        if num_wanted == 0 {
            return Err(AppError::InvalidInput("num_wanted must be positive".to_string()));
        }

        self.with_profile(user_id, |profile| {
            let plan = experiment::route(profile.experiment_group(), &self.flags, strategy_override);
            let pool = self.candidate_pool(profile);

            let ranker = Ranker::new(profile, &self.catalog, self.models.as_deref());
            let selected = ranker.rank(&pool, num_wanted, &plan)?;

            tracing::info!(
                user_id = %profile.user_id,
                pool = pool.len(),
                selected = selected.len(),
                strategy = ?plan.combination,
                "Recommendations ranked"
            );

            let batch = ServedBatch {
                timestamp: Utc::now(),
                recipes: selected.iter().map(|s| s.to_served()).collect(),
            };
            let recipes: Vec<Recipe> = selected.iter().map(|s| s.recipe.clone()).collect();

            profile.record_served_batch(batch);
            Ok(RecommendationBatch {
                recipes,
                strategy: plan.combination,
            })
        })
        .await
    }
}
