use std::collections::HashMap;

use super::similarity::cosine_similarity;

/// Similarities at or below this incur no penalty
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

pub const SIMILARITY_PENALTY: f64 = 1.0;

/// Candidates this close to a selected item are near-duplicates
///
/// Near-duplicates are held back whatever their penalized score, so a twin
/// of a chosen item loses to any distinct candidate and is only used to
/// backfill.
pub const DUPLICATE_SIMILARITY: f64 = 0.999;

/// A scored item with an embedding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityCandidate<'a> {
    pub id: &'a str,
    pub score: f64,
    pub vector: &'a [f64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Chosen,
    Duplicate,
}

/// Greedy selection trading raw score for spread in embedding space
#[derive(Debug, Clone, Copy)]
pub struct DiversitySelector {
    threshold: f64,
    penalty: f64,
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self {
            threshold: SIMILARITY_THRESHOLD,
            penalty: SIMILARITY_PENALTY,
        }
    }
}

impl DiversitySelector {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Score after subtracting the similarity penalty
    pub fn penalized(&self, score: f64, similarity: f64) -> f64 {
        let sim = similarity.max(0.0);
        score - self.penalty * (sim * sim - self.threshold * self.threshold).max(0.0)
    }

    /// Picks up to `count` distinct candidates
    ///
    /// Similarity is measured against everything chosen so far plus
    /// `existing`. Near-duplicates are skipped and only used to backfill
    /// once no other candidate is left.
    pub fn select<'a>(
        &self,
        candidates: Vec<DiversityCandidate<'a>>,
        count: usize,
        existing: &[&[f64]],
    ) -> Vec<DiversityCandidate<'a>> {
        let sorted = dedupe_sorted(candidates);
        let mut slots = vec![Slot::Pending; sorted.len()];
        let mut chosen: Vec<usize> = Vec::with_capacity(count.min(sorted.len()));

        while chosen.len() < count {
            let mut best: Option<(usize, f64)> = None;

            for i in 0..sorted.len() {
                if slots[i] != Slot::Pending {
                    continue;
                }
                let candidate = &sorted[i];
                // Penalized scores never exceed raw scores, and raw scores only fall
                if let Some((_, best_score)) = best {
                    if candidate.score <= best_score {
                        break;
                    }
                }

                let nearest = chosen
                    .iter()
                    .map(|&c| sorted[c].vector)
                    .chain(existing.iter().copied())
                    .map(|v| cosine_similarity(candidate.vector, v))
                    .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));

                let Some(sim) = nearest else {
                    best = Some((i, candidate.score));
                    continue;
                };

                if sim > self.threshold && sim >= DUPLICATE_SIMILARITY {
                    slots[i] = Slot::Duplicate;
                    continue;
                }

                let score = self.penalized(candidate.score, sim);
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((i, score));
                }
            }

            match best {
                Some((i, _)) => {
                    slots[i] = Slot::Chosen;
                    chosen.push(i);
                }
                None => break,
            }
        }

        let backfill: Vec<usize> = (0..sorted.len())
            .filter(|&i| slots[i] == Slot::Duplicate)
            .take(count.saturating_sub(chosen.len()))
            .collect();
        chosen.extend(backfill);

        chosen.into_iter().map(|i| sorted[i]).collect()
    }
}

/// Keeps the best-scoring entry per id, ordered by score then id
fn dedupe_sorted(candidates: Vec<DiversityCandidate<'_>>) -> Vec<DiversityCandidate<'_>> {
    let mut best: HashMap<&str, DiversityCandidate<'_>> = HashMap::new();
    for candidate in candidates {
        best.entry(candidate.id)
            .and_modify(|kept| {
                if candidate.score > kept.score {
                    *kept = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut sorted: Vec<DiversityCandidate<'_>> = best.into_values().collect();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(b.id)));
    sorted
}
