mod entry;
mod race_result;
mod regatta;
mod scoring_config;
mod season;
mod standing;

pub use entry::{Entry, Race};
pub use race_result::{FinishOutcome, RaceResult, ScoringCode};
pub use regatta::{Regatta, Season};
pub use scoring_config::{
    CustomFormula, DiscardRule, MissingResultPolicy, PenaltyRule, PointTable, ScoreDirection,
    ScoringConfiguration, ScoringSystem, TieBreakRule, points_key,
};
pub use season::{SeasonRaceResult, SeasonRegatta, SeasonRegattaResult, SeasonStanding};
pub use standing::{RaceScore, SeriesStanding};
