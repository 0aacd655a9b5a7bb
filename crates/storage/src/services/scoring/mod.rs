//! Pure scoring engine: no I/O, deterministic for a given input.

pub mod discard;
pub mod race_score;
pub mod season;
pub mod series;
pub mod tie_break;

pub use discard::{DiscardCandidate, DiscardOutcome, DiscardStrategy, apply_discards};
pub use race_score::{ScoredResult, penalty_points, score_race};
pub use season::{SeasonComputation, SeasonInput, SeasonRegattaInput, aggregate_season_standings};
pub use series::{SeriesComputation, SeriesInput, compute_series_standings};
pub use tie_break::{Contender, Placement, TieBreakRecord, TieBreaker, rank_contenders};
