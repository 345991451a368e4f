use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::Catalog,
    error::{EngineError, EngineResult},
    models::{Dimension, Recipe, ServedRecipe, UserProfile},
    services::{
        classifier::ClassifierEnsemble,
        diversity::{DiversityCandidate, DiversitySelector},
        pareto::peel_fronts,
        ratings::RatingResolver,
        surprise::SurpriseScorer,
    },
};

/// Score subtracted per previous serving of a recipe
pub const SERVED_RECIPE_PENALTY: f64 = 0.5;

/// How taste and surprise are combined into a ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Combination {
    TasteOnly,
    #[serde(rename = "avg")]
    Average,
    /// Pareto fronts over min-max scaled scores
    Pareto,
    /// Pareto fronts over unscaled scores
    ParetoRaw,
}

impl Combination {
    pub fn needs_surprise(self) -> bool {
        !matches!(self, Self::TasteOnly)
    }
}

/// Fully resolved parameters of one ranking pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankPlan {
    pub combination: Combination,
    /// Minimum scaled taste score a candidate must reach
    pub taste_drop: Option<f64>,
    /// Minimum scaled surprise score a candidate must reach
    pub surprise_drop: Option<f64>,
    pub diversity: bool,
    pub simple_surprise: bool,
}

impl RankPlan {
    pub fn new(combination: Combination) -> Self {
        Self {
            combination,
            taste_drop: None,
            surprise_drop: None,
            diversity: true,
            simple_surprise: false,
        }
    }

    pub fn with_drops(mut self, taste_drop: Option<f64>, surprise_drop: Option<f64>) -> Self {
        self.taste_drop = taste_drop;
        self.surprise_drop = surprise_drop;
        self
    }

    pub fn needs_surprise(&self) -> bool {
        self.combination.needs_surprise() || self.surprise_drop.is_some()
    }
}

/// A candidate with the scores used to rank it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecipe<'a> {
    pub recipe: &'a Recipe,
    pub taste: f64,
    pub surprise: Option<f64>,
}

impl ScoredRecipe<'_> {
    pub fn to_served(&self) -> ServedRecipe {
        ServedRecipe {
            recipe_id: self.recipe.id.clone(),
            taste: self.taste,
            surprise: self.surprise,
        }
    }
}

/// Scores with both dimensions scaled to `[0, 1]` across the pool
#[derive(Debug, Clone, Copy)]
struct Scaled {
    taste: f64,
    surprise: Option<f64>,
}

/// Ranks candidate recipes for one user
pub struct Ranker<'a> {
    profile: &'a UserProfile,
    catalog: &'a Catalog,
    models: Option<&'a ClassifierEnsemble>,
}

impl<'a> Ranker<'a> {
    pub fn new(
        profile: &'a UserProfile,
        catalog: &'a Catalog,
        models: Option<&'a ClassifierEnsemble>,
    ) -> Self {
        Self {
            profile,
            catalog,
            models,
        }
    }

    /// Picks up to `num_wanted` recipes out of `candidates`
    ///
    /// Candidates that cannot be scored are dropped. Fails only when none
    /// survive scoring, or when the user cannot be scored for surprise at all.
    pub fn rank(
        &self,
        candidates: &[&str],
        num_wanted: usize,
        plan: &RankPlan,
    ) -> EngineResult<Vec<ScoredRecipe<'a>>> {
        let mut scored = self.score_candidates(candidates, plan)?;
        if scored.is_empty() {
            return Err(EngineError::NoCandidatesAvailable);
        }
        tracing::debug!(
            user_id = %self.profile.user_id,
            pool = candidates.len(),
            scored = scored.len(),
            combination = ?plan.combination,
            "Scored candidate pool"
        );

        self.apply_served_penalty(&mut scored);

        let scaled = scale(&scored);
        let (pool, scaled) = trim(scored, scaled, num_wanted, plan);

        let selected = match plan.combination {
            Combination::TasteOnly => select_sorted(pool, &scaled, num_wanted, plan, |s| s.taste),
            Combination::Average => select_sorted(pool, &scaled, num_wanted, plan, |s| {
                (s.taste + s.surprise.unwrap_or(0.0)) / 2.0
            }),
            Combination::Pareto | Combination::ParetoRaw => {
                select_pareto(pool, &scaled, num_wanted, plan)
            }
        };
        Ok(selected)
    }

    fn score_candidates(
        &self,
        candidates: &[&str],
        plan: &RankPlan,
    ) -> EngineResult<Vec<ScoredRecipe<'a>>> {
        let resolver = RatingResolver::new(self.profile, self.catalog);
        let surprise = if plan.needs_surprise() {
            Some(SurpriseScorer::for_user(
                self.profile,
                self.catalog,
                self.models,
                plan.simple_surprise,
            )?)
        } else {
            None
        };

        let mut scored = Vec::with_capacity(candidates.len());
        for &id in candidates {
            let Some(recipe) = self.catalog.recipe(id) else {
                tracing::debug!(recipe_id = %id, "Candidate not in catalog");
                continue;
            };
            let taste = match resolver.recipe_rating(recipe, Dimension::Taste) {
                Ok(taste) => taste,
                Err(e) => {
                    tracing::debug!(recipe_id = %id, error = %e, "Dropping candidate");
                    continue;
                }
            };
            let surprise = match surprise.as_ref().map(|scorer| scorer.score(recipe)) {
                None => None,
                Some(Ok(value)) => Some(value),
                Some(Err(e)) => {
                    tracing::debug!(recipe_id = %id, error = %e, "Dropping candidate");
                    continue;
                }
            };
            scored.push(ScoredRecipe {
                recipe,
                taste,
                surprise,
            });
        }
        Ok(scored)
    }

    fn apply_served_penalty(&self, scored: &mut [ScoredRecipe<'a>]) {
        for candidate in scored.iter_mut() {
            let times = self.profile.times_served(&candidate.recipe.id);
            if times == 0 {
                continue;
            }
            let penalty = SERVED_RECIPE_PENALTY * times.max(1) as f64;
            candidate.taste -= penalty;
            if let Some(surprise) = candidate.surprise.as_mut() {
                *surprise -= penalty;
            }
        }
    }
}

/// Min-max scales values into `[0, 1]`; a constant column scales to 1.0
fn min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 1.0 })
        .collect()
}

fn scale(scored: &[ScoredRecipe<'_>]) -> Vec<Scaled> {
    let taste: Vec<f64> = scored.iter().map(|s| s.taste).collect();
    let taste = min_max(&taste);

    let surprise: Option<Vec<f64>> = scored.iter().map(|s| s.surprise).collect();
    let surprise = surprise.map(|values| min_max(&values));

    taste
        .into_iter()
        .enumerate()
        .map(|(i, taste)| Scaled {
            taste,
            surprise: surprise.as_ref().map(|s| s[i]),
        })
        .collect()
}

/// Drops candidates below the plan's percentile thresholds, unless that
/// would leave fewer than `num_wanted`
fn trim<'a>(
    scored: Vec<ScoredRecipe<'a>>,
    scaled: Vec<Scaled>,
    num_wanted: usize,
    plan: &RankPlan,
) -> (Vec<ScoredRecipe<'a>>, Vec<Scaled>) {
    if plan.taste_drop.is_none() && plan.surprise_drop.is_none() {
        return (scored, scaled);
    }

    let passes = |s: &Scaled| {
        plan.taste_drop.map_or(true, |drop| s.taste >= drop)
            && match (plan.surprise_drop, s.surprise) {
                (Some(drop), Some(surprise)) => surprise >= drop,
                _ => true,
            }
    };

    let kept = scaled.iter().filter(|s| passes(s)).count();
    if kept < num_wanted {
        tracing::warn!(
            kept,
            num_wanted,
            pool = scored.len(),
            "Percentile trimming left too few candidates, using untrimmed pool"
        );
        return (scored, scaled);
    }

    scored
        .into_iter()
        .zip(scaled)
        .filter(|(_, s)| passes(s))
        .unzip()
}

fn diversity_candidates<'a>(
    pool: &[ScoredRecipe<'a>],
    indices: &[usize],
    key: impl Fn(usize) -> f64,
) -> Vec<DiversityCandidate<'a>> {
    indices
        .iter()
        .map(|&i| DiversityCandidate {
            id: pool[i].recipe.id.as_str(),
            score: key(i),
            vector: pool[i].recipe.vector.as_slice(),
        })
        .collect()
}

/// Picks the chosen candidates out of `pool`, in selection order
fn take_by_id<'a>(pool: &[ScoredRecipe<'a>], chosen: &[DiversityCandidate<'_>]) -> Vec<ScoredRecipe<'a>> {
    chosen
        .iter()
        .filter_map(|c| pool.iter().find(|s| s.recipe.id == c.id).cloned())
        .collect()
}

fn select_sorted<'a>(
    pool: Vec<ScoredRecipe<'a>>,
    scaled: &[Scaled],
    num_wanted: usize,
    plan: &RankPlan,
    key: impl Fn(&Scaled) -> f64,
) -> Vec<ScoredRecipe<'a>> {
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.sort_by(|&a, &b| {
        key(&scaled[b])
            .total_cmp(&key(&scaled[a]))
            .then_with(|| pool[a].recipe.id.cmp(&pool[b].recipe.id))
    });

    if plan.diversity {
        let candidates = diversity_candidates(&pool, &order, |i| key(&scaled[i]));
        let chosen = DiversitySelector::default().select(candidates, num_wanted, &[]);
        return take_by_id(&pool, &chosen);
    }

    order
        .into_iter()
        .take(num_wanted)
        .map(|i| pool[i].clone())
        .collect()
}

fn select_pareto<'a>(
    pool: Vec<ScoredRecipe<'a>>,
    scaled: &[Scaled],
    num_wanted: usize,
    plan: &RankPlan,
) -> Vec<ScoredRecipe<'a>> {
    let points: Vec<(f64, f64)> = match plan.combination {
        Combination::ParetoRaw => pool
            .iter()
            .map(|s| (s.taste, s.surprise.unwrap_or(0.0)))
            .collect(),
        _ => scaled
            .iter()
            .map(|s| (s.taste, s.surprise.unwrap_or(0.0)))
            .collect(),
    };
    let key = |i: usize| (points[i].0 + points[i].1) / 2.0;

    let mut selected: Vec<ScoredRecipe<'a>> = Vec::with_capacity(num_wanted);
    for mut front in peel_fronts(&points) {
        let room = num_wanted.saturating_sub(selected.len());
        if room == 0 {
            break;
        }
        front.sort_by(|&a, &b| key(b).total_cmp(&key(a)));

        if front.len() <= room {
            selected.extend(front.into_iter().map(|i| pool[i].clone()));
            continue;
        }

        if plan.diversity {
            let existing: Vec<&[f64]> = selected.iter().map(|s| s.recipe.vector.as_slice()).collect();
            let candidates = diversity_candidates(&pool, &front, key);
            let chosen = DiversitySelector::default().select(candidates, room, &existing);
            selected.extend(take_by_id(&pool, &chosen));
        } else {
            let mut rng = rand::thread_rng();
            selected.extend(
                front
                    .choose_multiple(&mut rng, room)
                    .map(|&i| pool[i].clone()),
            );
        }
    }
    selected
}
