use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Entry, FinishOutcome};

/// Points one entry scored in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RaceScore {
    pub race_id: Uuid,
    pub race_sequence: u32,
    pub outcome: FinishOutcome,
    /// Finishing place after any corrected-time re-ranking; `None` for coded outcomes.
    pub position: Option<u32>,
    pub points: f64,
    pub discarded: bool,
}

/// Computed standing of one entry in one regatta division.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeriesStanding {
    pub regatta_id: Uuid,
    pub division: Option<String>,
    pub entry: Entry,
    pub rank: u32,
    pub race_scores: Vec<RaceScore>,
    pub total_points: f64,
    pub net_points: f64,
    pub races_sailed: u32,
    pub discards_used: u32,
    pub wins: u32,
    pub podiums: u32,
    pub best_finish: Option<u32>,
    pub worst_finish: Option<u32>,
    pub tied: bool,
    pub tie_breaker: Option<String>,
}

impl SeriesStanding {
    pub fn discarded_points(&self) -> f64 {
        self.race_scores
            .iter()
            .filter(|score| score.discarded)
            .map(|score| score.points)
            .sum()
    }

    pub fn score_for_race(&self, race_id: Uuid) -> Option<&RaceScore> {
        self.race_scores.iter().find(|score| score.race_id == race_id)
    }
}
