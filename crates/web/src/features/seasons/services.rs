use std::collections::BTreeMap;

use sqlx::PgPool;
use storage::{
    dto::standings::{
        DivisionRecompute, RecomputeResponse, SeasonCompositionRequest, StandingsFilter,
    },
    error::Result,
    models::{SeasonRegatta, SeasonStanding},
    repository::{season::SeasonRepository, standings::StandingsRepository},
    services::standings_computation,
};
use uuid::Uuid;

pub async fn list_standings(
    pool: &PgPool,
    season_id: Uuid,
    filter: &StandingsFilter,
) -> Result<(Vec<SeasonStanding>, i64)> {
    SeasonRepository::new(pool).get_season(season_id).await?;

    StandingsRepository::new(pool)
        .list_season_standings(season_id, filter.division(), &filter.pagination)
        .await
}

/// Recomputes the season and summarises the stored result per division
pub async fn recompute(
    pool: &PgPool,
    season_id: Uuid,
    allow_partial: bool,
) -> Result<RecomputeResponse> {
    let recomputed =
        standings_computation::compute_and_store_season_standings(pool, season_id, allow_partial)
            .await?;

    let mut per_division: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for standing in &recomputed.computation.standings {
        *per_division.entry(standing.division.clone()).or_default() += 1;
    }

    Ok(RecomputeResponse {
        id: season_id,
        divisions: per_division
            .into_iter()
            .map(|(division, standings)| DivisionRecompute {
                division,
                standings,
                persisted: recomputed.persisted,
            })
            .collect(),
        report: recomputed.computation.report,
    })
}

pub async fn replace_composition(
    pool: &PgPool,
    season_id: Uuid,
    request: &SeasonCompositionRequest,
) -> Result<Vec<SeasonRegatta>> {
    let repo = SeasonRepository::new(pool);
    repo.get_season(season_id).await?;

    let regattas: Vec<SeasonRegatta> = request
        .regattas
        .iter()
        .map(|regatta| SeasonRegatta {
            season_id,
            regatta_id: regatta.regatta_id,
            sequence: regatta.sequence,
            weight: regatta.weight,
            is_championship: regatta.is_championship,
        })
        .collect();

    repo.replace_composition(season_id, &regattas).await
}
