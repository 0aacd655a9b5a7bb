use importer::formats::ExportFormat;
use sqlx::PgPool;
use storage::{
    dto::standings::{RecomputeQuery, RecomputeResponse, StandingsFilter},
    error::Result,
    models::SeriesStanding,
    repository::{regatta::RegattaRepository, standings::StandingsRepository},
    services::standings_computation,
};
use uuid::Uuid;

/// Stored standings of one regatta division, in rank order
pub async fn list_standings(
    pool: &PgPool,
    regatta_id: Uuid,
    filter: &StandingsFilter,
) -> Result<(Vec<SeriesStanding>, i64)> {
    RegattaRepository::new(pool).get_regatta(regatta_id).await?;

    StandingsRepository::new(pool)
        .list_series_standings(regatta_id, filter.division(), &filter.pagination)
        .await
}

pub async fn recompute(
    pool: &PgPool,
    regatta_id: Uuid,
    query: &RecomputeQuery,
) -> Result<RecomputeResponse> {
    standings_computation::recompute_regatta(
        pool,
        regatta_id,
        query.division.as_deref(),
        query.allow_partial,
    )
    .await
}

pub async fn export(
    pool: &PgPool,
    regatta_id: Uuid,
    division: Option<&str>,
    format: ExportFormat,
) -> importer::Result<String> {
    importer::export_regatta(pool, regatta_id, division, format).await
}
