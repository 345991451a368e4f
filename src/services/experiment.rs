use crate::services::ranker::{Combination, RankPlan};

/// Group assumed for profiles that never got one
pub const DEFAULT_GROUP: u8 = 1;

/// Server-wide switches that decide how requests are routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerFlags {
    pub longitudinal_state: bool,
    pub experimental_state: bool,
    pub return_taste: bool,
    pub return_surprise: bool,
    pub diversity_enabled: bool,
    pub simple_surprise: bool,
}

impl Default for ServerFlags {
    fn default() -> Self {
        Self {
            longitudinal_state: false,
            experimental_state: false,
            return_taste: true,
            return_surprise: false,
            diversity_enabled: true,
            simple_surprise: false,
        }
    }
}

/// Ranking arm of the longitudinal study
fn longitudinal_plan(group: u8) -> RankPlan {
    match group {
        0 => RankPlan::new(Combination::TasteOnly).with_drops(None, Some(0.75)),
        2 => RankPlan::new(Combination::Pareto).with_drops(Some(0.5), Some(0.25)),
        3 => RankPlan::new(Combination::ParetoRaw).with_drops(Some(0.25), Some(0.5)),
        1 => RankPlan::new(Combination::TasteOnly),
        other => {
            tracing::warn!(group = other, "Unknown longitudinal group, using group 1");
            RankPlan::new(Combination::TasteOnly)
        }
    }
}

/// Lab study: group 0 is the taste-only control
fn lab_plan(group: u8) -> RankPlan {
    if group == 0 {
        RankPlan::new(Combination::TasteOnly)
    } else {
        RankPlan::new(Combination::Pareto).with_drops(Some(0.5), Some(0.5))
    }
}

/// Both flags average the two scores; surprise alone ranks by Pareto front
fn flag_plan(flags: &ServerFlags) -> RankPlan {
    match (flags.return_taste, flags.return_surprise) {
        (true, true) => RankPlan::new(Combination::Average),
        (false, true) => RankPlan::new(Combination::Pareto),
        _ => RankPlan::new(Combination::TasteOnly),
    }
}

/// Chooses the ranking plan for one request
///
/// A manual override wins, then the longitudinal study, then the lab study,
/// then the plain flags.
pub fn route(group: Option<u8>, flags: &ServerFlags, manual: Option<Combination>) -> RankPlan {
    let group = group.unwrap_or(DEFAULT_GROUP);

    let plan = if let Some(combination) = manual {
        RankPlan::new(combination)
    } else if flags.longitudinal_state {
        longitudinal_plan(group)
    } else if flags.experimental_state {
        lab_plan(group)
    } else {
        flag_plan(flags)
    };

    RankPlan {
        diversity: flags.diversity_enabled,
        simple_surprise: flags.simple_surprise,
        ..plan
    }
}
