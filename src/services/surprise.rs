use crate::{
    catalog::Catalog,
    error::{EngineError, EngineResult},
    models::{Dimension, Recipe, UserProfile},
    services::{classifier::ClassifierEnsemble, similarity::cosine_similarity},
};

/// Supergroup familiarity ratings needed before experience can be judged
pub const MIN_FAMILIARITY_RATINGS: usize = 20;

/// Width of the surprise window around the target offset
pub const SURPRISE_SIGMA: f64 = 2.0;

/// Extra offset per experience tier
pub const SURPRISE_DELTA: f64 = 1.0;

/// Length of the ensemble feature vector: four surprise percentiles and one
/// archetype rating per dimension
pub const ENSEMBLE_FEATURE_LEN: usize = 4 + Dimension::ALL.len();

/// Culinary experience, ordered from least to most adventurous
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExperienceLevel {
    Novice,
    Moderate,
    Foodie,
}

impl ExperienceLevel {
    const LEVELS: [ExperienceLevel; 3] = [Self::Novice, Self::Moderate, Self::Foodie];

    /// Classifies a user from the mean of their supergroup familiarity ratings
    pub fn classify(profile: &UserProfile) -> EngineResult<Self> {
        let familiarity = &profile.ratings.familiarity.supergroup;
        if familiarity.len() < MIN_FAMILIARITY_RATINGS {
            return Err(EngineError::OnboardingIncomplete {
                rated: familiarity.len(),
                required: MIN_FAMILIARITY_RATINGS,
            });
        }

        let mean = familiarity.values().map(|agg| agg.mean).sum::<f64>() / familiarity.len() as f64;
        Ok(Self::from_mean(mean))
    }

    /// `floor(mean) + 1`, clamped to the known tiers
    pub fn from_mean(mean: f64) -> Self {
        let bucket = (mean.floor() as i64 + 1).clamp(0, 2) as usize;
        Self::LEVELS[bucket]
    }

    pub fn tier(self) -> u8 {
        self as u8
    }
}

/// Simple surprise: peaks when the recipe's raw surprise sits at the tier's
/// target offset and decays linearly to zero one sigma away
pub fn simple_surprise(level: ExperienceLevel, raw_surprise: f64) -> f64 {
    let offset = raw_surprise - SURPRISE_SIGMA - f64::from(level.tier()) * SURPRISE_DELTA;
    1.0 - (offset / SURPRISE_SIGMA).abs().min(1.0)
}

/// One archetype the user rated, with its embedding
#[derive(Debug, Clone, Copy)]
struct ArchetypeRating<'a> {
    vector: &'a [f64],
    rating: f64,
}

enum Model<'a> {
    Simple(ExperienceLevel),
    Ensemble {
        models: &'a ClassifierEnsemble,
        /// Taste, familiarity and surprise ratings of the archetypes
        archetypes: [Vec<ArchetypeRating<'a>>; 3],
    },
}

/// Surprise scorer prepared for one user
///
/// Per-user state is validated once here so that ranking a pool only fails
/// per recipe on missing recipe data.
pub struct SurpriseScorer<'a> {
    model: Model<'a>,
}

impl<'a> SurpriseScorer<'a> {
    pub fn for_user(
        profile: &UserProfile,
        catalog: &'a Catalog,
        models: Option<&'a ClassifierEnsemble>,
        simple: bool,
    ) -> EngineResult<Self> {
        let models = match (simple, models) {
            (true, _) => None,
            (false, None) => {
                tracing::warn!(
                    user_id = %profile.user_id,
                    "No surprise classifiers loaded, using the simple model"
                );
                None
            }
            (false, Some(models)) => Some(models),
        };

        let model = match models {
            None => Model::Simple(ExperienceLevel::classify(profile)?),
            Some(models) => Model::Ensemble {
                models,
                archetypes: archetype_ratings(profile, catalog)?,
            },
        };
        Ok(Self { model })
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.model, Model::Simple(_))
    }

    pub fn score(&self, recipe: &Recipe) -> EngineResult<f64> {
        match &self.model {
            Model::Simple(level) => {
                let raw = recipe
                    .surprises
                    .p100
                    .ok_or_else(|| EngineError::MissingSurpriseData(recipe.id.clone()))?;
                Ok(simple_surprise(*level, raw))
            }
            Model::Ensemble { models, archetypes } => {
                let features = ensemble_features(recipe, archetypes)?;
                Ok(models.score(&features)?.combined())
            }
        }
    }
}

fn archetype_ratings<'a>(
    profile: &UserProfile,
    catalog: &'a Catalog,
) -> EngineResult<[Vec<ArchetypeRating<'a>>; 3]> {
    let archetypes = catalog.archetypes();

    let collect = |dimension: Dimension| -> EngineResult<Vec<ArchetypeRating<'a>>> {
        let rated = &profile.ratings.dimension(dimension).recipe;
        let ratings: Vec<ArchetypeRating<'a>> = archetypes
            .iter()
            .copied()
            .filter_map(|recipe| {
                rated.get(&recipe.id).map(|agg| ArchetypeRating {
                    vector: recipe.vector.as_slice(),
                    rating: agg.mean,
                })
            })
            .collect();
        if ratings.is_empty() {
            return Err(EngineError::OnboardingIncomplete {
                rated: 0,
                required: archetypes.len().max(1),
            });
        }
        Ok(ratings)
    };

    Ok([
        collect(Dimension::Taste)?,
        collect(Dimension::Familiarity)?,
        collect(Dimension::Surprise)?,
    ])
}

/// Percentile features followed by one similarity-weighted archetype rating
/// per dimension
fn ensemble_features(recipe: &Recipe, archetypes: &[Vec<ArchetypeRating<'_>>; 3]) -> EngineResult<Vec<f64>> {
    let percentiles = recipe
        .surprises
        .features()
        .ok_or_else(|| EngineError::MissingSurpriseData(recipe.id.clone()))?;

    let mut features = percentiles.to_vec();
    for ratings in archetypes {
        features.push(weighted_rating(&recipe.vector, ratings));
    }
    Ok(features)
}

/// Mean of archetype ratings weighted by non-negative similarity to `vector`;
/// unweighted when no archetype is similar at all
fn weighted_rating(vector: &[f64], ratings: &[ArchetypeRating<'_>]) -> f64 {
    let (sum, total) = ratings.iter().fold((0.0, 0.0), |(sum, total), archetype| {
        let weight = cosine_similarity(vector, archetype.vector).max(0.0);
        (sum + weight * archetype.rating, total + weight)
    });

    if total > 0.0 {
        sum / total
    } else {
        ratings.iter().map(|a| a.rating).sum::<f64>() / ratings.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OnboardingSet;
    use crate::models::{RatingAggregate, SurprisePercentiles};
    use crate::services::classifier::LogisticClassifier;
    use std::collections::HashMap;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn recipe(id: &str, vector: Vec<f64>, p100: Option<f64>) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: id.to_string(),
            ingredient_ids: vec![],
            vector,
            surprises: SurprisePercentiles {
                p100,
                p95: p100.map(|v| v - 0.5),
                p90: p100.map(|v| v - 1.0),
                p50: p100.map(|v| v - 2.0),
            },
            url: None,
            image: None,
        }
    }

    fn profile_with_familiarity(count: usize, value: f64) -> UserProfile {
        let mut profile = UserProfile::new("u", Some(1));
        for i in 0..count {
            profile
                .ratings
                .familiarity
                .supergroup
                .insert(format!("c{}", i), RatingAggregate::first(value));
        }
        profile
    }

    fn archetype_catalog() -> Catalog {
        Catalog::new(
            vec![
                recipe("arch-a", vec![1.0, 0.0], Some(3.0)),
                recipe("arch-b", vec![0.0, 1.0], Some(3.0)),
                recipe("target", vec![1.0, 0.0], Some(4.0)),
            ],
            vec![],
            HashMap::new(),
            OnboardingSet {
                recipe_ids: vec!["arch-a".to_string(), "arch-b".to_string()],
                ingredient_ids: vec![],
            },
        )
    }

    fn rate_archetypes(profile: &mut UserProfile, a: f64, b: f64) {
        for dimension in Dimension::ALL {
            let table = &mut profile.ratings.dimension_mut(dimension).recipe;
            table.insert("arch-a".to_string(), RatingAggregate::first(a));
            table.insert("arch-b".to_string(), RatingAggregate::first(b));
        }
    }

    fn constant(bias: f64) -> LogisticClassifier {
        LogisticClassifier {
            weights: vec![0.0; ENSEMBLE_FEATURE_LEN],
            bias,
        }
    }

    #[test]
    fn test_moderate_scenario() {
        let profile = profile_with_familiarity(25, 0.3);
        assert_eq!(ExperienceLevel::classify(&profile), Ok(ExperienceLevel::Moderate));
        assert_eq!(ExperienceLevel::Moderate.tier(), 1);
    }

    #[test]
    fn test_experience_buckets() {
        assert_eq!(ExperienceLevel::from_mean(-0.7), ExperienceLevel::Novice);
        assert_eq!(ExperienceLevel::from_mean(0.0), ExperienceLevel::Moderate);
        assert_eq!(ExperienceLevel::from_mean(1.0), ExperienceLevel::Foodie);
        assert_eq!(ExperienceLevel::from_mean(-3.0), ExperienceLevel::Novice);
        assert_eq!(ExperienceLevel::from_mean(4.0), ExperienceLevel::Foodie);
    }

    #[test]
    fn test_experience_requires_enough_ratings() {
        let profile = profile_with_familiarity(19, 0.3);
        assert_eq!(
            ExperienceLevel::classify(&profile),
            Err(EngineError::OnboardingIncomplete {
                rated: 19,
                required: MIN_FAMILIARITY_RATINGS
            })
        );
    }

    #[test]
    fn test_simple_surprise_peaks_at_tier_target() {
        assert_close(simple_surprise(ExperienceLevel::Novice, 2.0), 1.0);
        assert_close(simple_surprise(ExperienceLevel::Moderate, 3.0), 1.0);
        assert_close(simple_surprise(ExperienceLevel::Foodie, 4.0), 1.0);

        assert_close(simple_surprise(ExperienceLevel::Moderate, 4.0), 0.5);
        assert_close(simple_surprise(ExperienceLevel::Moderate, 2.0), 0.5);
        assert_close(simple_surprise(ExperienceLevel::Novice, 10.0), 0.0);
    }

    #[test]
    fn test_simple_scorer_needs_raw_surprise() {
        let catalog = archetype_catalog();
        let profile = profile_with_familiarity(20, 0.3);
        let scorer = SurpriseScorer::for_user(&profile, &catalog, None, true).unwrap();
        assert!(scorer.is_simple());

        assert_close(scorer.score(catalog.recipe("arch-a").unwrap()).unwrap(), 1.0);
        let bare = recipe("bare", vec![], None);
        assert_eq!(
            scorer.score(&bare),
            Err(EngineError::MissingSurpriseData("bare".to_string()))
        );
    }

    #[test]
    fn test_missing_models_fall_back_to_simple() {
        let catalog = archetype_catalog();
        let profile = profile_with_familiarity(20, 0.3);
        let scorer = SurpriseScorer::for_user(&profile, &catalog, None, false).unwrap();
        assert!(scorer.is_simple());
    }

    #[test]
    fn test_ensemble_requires_archetype_ratings() {
        let catalog = archetype_catalog();
        let models = ClassifierEnsemble {
            fam_high: constant(0.0),
            fam_low: constant(0.0),
            surp_pos: constant(0.0),
            surp_neg: constant(0.0),
        };
        let profile = UserProfile::new("u", None);
        let result = SurpriseScorer::for_user(&profile, &catalog, Some(&models), false);
        assert!(matches!(result, Err(EngineError::OnboardingIncomplete { .. })));
    }

    #[test]
    fn test_ensemble_combines_with_max() {
        let catalog = archetype_catalog();
        let models = ClassifierEnsemble {
            fam_high: constant(0.0),
            fam_low: constant(0.0),
            surp_pos: constant(2.0),
            surp_neg: constant(-2.0),
        };
        let mut profile = UserProfile::new("u", None);
        rate_archetypes(&mut profile, 1.0, -1.0);

        let scorer = SurpriseScorer::for_user(&profile, &catalog, Some(&models), false).unwrap();
        assert!(!scorer.is_simple());

        let sigmoid = |z: f64| 1.0 / (1.0 + (-z).exp());
        let score = scorer.score(catalog.recipe("target").unwrap()).unwrap();
        assert_close(score, sigmoid(2.0) - sigmoid(-2.0));
    }

    #[test]
    fn test_archetype_weighting_follows_similarity() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let ratings = vec![
            ArchetypeRating {
                vector: &a,
                rating: 1.0,
            },
            ArchetypeRating {
                vector: &b,
                rating: -1.0,
            },
        ];

        // Orthogonal to b, so only a contributes
        assert_close(weighted_rating(&[1.0, 0.0], &ratings), 1.0);
        assert_close(weighted_rating(&[1.0, 1.0], &ratings), 0.0);
        // No positive similarity: plain mean
        assert_close(weighted_rating(&[-1.0, -1.0], &ratings), 0.0);
    }

    #[test]
    fn test_ensemble_features_layout() {
        let catalog = archetype_catalog();
        let mut profile = UserProfile::new("u", None);
        rate_archetypes(&mut profile, 0.5, -0.5);
        let archetypes = archetype_ratings(&profile, &catalog).unwrap();

        let features = ensemble_features(catalog.recipe("target").unwrap(), &archetypes).unwrap();
        assert_eq!(features.len(), ENSEMBLE_FEATURE_LEN);
        assert_eq!(&features[..4], &[4.0, 3.5, 3.0, 2.0]);
        assert_close(features[4], 0.5);

        let bare = recipe("bare", vec![1.0, 0.0], None);
        assert!(ensemble_features(&bare, &archetypes).is_err());
    }
}
