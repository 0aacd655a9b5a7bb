use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::FinishOutcome;

/// Membership of a regatta in a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeasonRegatta {
    pub season_id: Uuid,
    pub regatta_id: Uuid,
    pub sequence: u32,
    /// Multiplier applied to the regatta's net points.
    pub weight: Decimal,
    pub is_championship: bool,
}

/// How one sailor fared in one regatta of the season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeasonRegattaResult {
    pub regatta_id: Uuid,
    pub sequence: u32,
    pub entry_id: Uuid,
    pub weight: f64,
    pub is_championship: bool,
    pub rank: u32,
    pub net_points: f64,
    pub weighted_points: f64,
}

/// One race in the season-wide, renumbered race sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeasonRaceResult {
    pub season_race_number: u32,
    pub regatta_id: Uuid,
    pub race_id: Uuid,
    pub outcome: FinishOutcome,
    pub position: Option<u32>,
    /// Race points multiplied by the regatta weight.
    pub points: f64,
    /// Already dropped by the regatta's own discard rule; never counted at season level.
    pub regatta_discarded: bool,
    /// Dropped by the season discard rule.
    pub discarded: bool,
}

/// Season-long standing of one sailor, keyed by season, user and division.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeasonStanding {
    pub season_id: Uuid,
    pub division: Option<String>,
    pub user_id: Uuid,
    pub entry_ids: Vec<Uuid>,
    pub name: String,
    pub sail_number: String,
    pub rank: u32,
    pub regatta_results: Vec<SeasonRegattaResult>,
    pub race_results: Vec<SeasonRaceResult>,
    /// Season race numbers dropped by the season discard rule.
    pub discards: Vec<u32>,
    pub total_points: f64,
    pub net_points: f64,
    pub regattas_sailed: u32,
    pub races_sailed: u32,
    pub wins: u32,
    pub podiums: u32,
    pub best_finish: Option<u32>,
    pub worst_finish: Option<u32>,
    pub tied: bool,
    pub tie_breaker: Option<String>,
}
