pub mod classifier;
pub mod diversity;
pub mod experiment;
pub mod pareto;
pub mod ranker;
pub mod ratings;
pub mod recommendations;
pub mod similarity;
pub mod surprise;

pub use recommendations::{LoggedAction, RatingTarget, RecommendationBatch, RecommendationService};
