use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::dto::common::PaginationParams;
use crate::error::Result;
use crate::models::{
    Entry, RaceScore, SeasonRaceResult, SeasonRegattaResult, SeasonStanding, SeriesStanding,
};

/// Standings rows store "no division" as the empty string so it can be part of the key.
pub(crate) fn division_key(division: Option<&str>) -> &str {
    division.unwrap_or("")
}

fn division_from_key(key: String) -> Option<String> {
    if key.is_empty() { None } else { Some(key) }
}

/// Serializes writers of the same standings key until the transaction ends.
pub(crate) async fn lock_standings_key(
    tx: &mut Transaction<'_, Postgres>,
    scope: &str,
    id: Uuid,
    division: Option<&str>,
) -> Result<()> {
    let key = format!("{}:{}:{}", scope, id, division_key(division));
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[derive(FromRow)]
struct SeriesStandingRow {
    regatta_id: Uuid,
    division: String,
    entry: Json<Entry>,
    rank: i32,
    race_scores: Json<Vec<RaceScore>>,
    total_points: f64,
    net_points: f64,
    races_sailed: i32,
    discards_used: i32,
    wins: i32,
    podiums: i32,
    best_finish: Option<i32>,
    worst_finish: Option<i32>,
    tied: bool,
    tie_breaker: Option<String>,
}

impl From<SeriesStandingRow> for SeriesStanding {
    fn from(row: SeriesStandingRow) -> Self {
        Self {
            regatta_id: row.regatta_id,
            division: division_from_key(row.division),
            entry: row.entry.0,
            rank: row.rank as u32,
            race_scores: row.race_scores.0,
            total_points: row.total_points,
            net_points: row.net_points,
            races_sailed: row.races_sailed as u32,
            discards_used: row.discards_used as u32,
            wins: row.wins as u32,
            podiums: row.podiums as u32,
            best_finish: row.best_finish.map(|p| p as u32),
            worst_finish: row.worst_finish.map(|p| p as u32),
            tied: row.tied,
            tie_breaker: row.tie_breaker,
        }
    }
}

#[derive(FromRow)]
struct SeasonStandingRow {
    season_id: Uuid,
    division: String,
    user_id: Uuid,
    entry_ids: Vec<Uuid>,
    name: String,
    sail_number: String,
    rank: i32,
    regatta_results: Json<Vec<SeasonRegattaResult>>,
    race_results: Json<Vec<SeasonRaceResult>>,
    discards: Vec<i32>,
    total_points: f64,
    net_points: f64,
    regattas_sailed: i32,
    races_sailed: i32,
    wins: i32,
    podiums: i32,
    best_finish: Option<i32>,
    worst_finish: Option<i32>,
    tied: bool,
    tie_breaker: Option<String>,
}

impl From<SeasonStandingRow> for SeasonStanding {
    fn from(row: SeasonStandingRow) -> Self {
        Self {
            season_id: row.season_id,
            division: division_from_key(row.division),
            user_id: row.user_id,
            entry_ids: row.entry_ids,
            name: row.name,
            sail_number: row.sail_number,
            rank: row.rank as u32,
            regatta_results: row.regatta_results.0,
            race_results: row.race_results.0,
            discards: row.discards.into_iter().map(|d| d as u32).collect(),
            total_points: row.total_points,
            net_points: row.net_points,
            regattas_sailed: row.regattas_sailed as u32,
            races_sailed: row.races_sailed as u32,
            wins: row.wins as u32,
            podiums: row.podiums as u32,
            best_finish: row.best_finish.map(|p| p as u32),
            worst_finish: row.worst_finish.map(|p| p as u32),
            tied: row.tied,
            tie_breaker: row.tie_breaker,
        }
    }
}

pub struct StandingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StandingsRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replaces every standing of one regatta division in a single transaction.
    pub async fn replace_series_standings(
        &self,
        regatta_id: Uuid,
        division: Option<&str>,
        standings: &[SeriesStanding],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        lock_standings_key(&mut tx, "series", regatta_id, division).await?;

        sqlx::query("DELETE FROM series_standings WHERE regatta_id = $1 AND division = $2")
            .bind(regatta_id)
            .bind(division_key(division))
            .execute(&mut *tx)
            .await?;

        let mut written = 0u64;
        for standing in standings {
            written += sqlx::query(
                r#"
                INSERT INTO series_standings (
                    regatta_id, division, entry_id, entry, rank, race_scores,
                    total_points, net_points, races_sailed, discards_used,
                    wins, podiums, best_finish, worst_finish, tied, tie_breaker
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(regatta_id)
            .bind(division_key(division))
            .bind(standing.entry.entry_id)
            .bind(Json(&standing.entry))
            .bind(standing.rank as i32)
            .bind(Json(&standing.race_scores))
            .bind(standing.total_points)
            .bind(standing.net_points)
            .bind(standing.races_sailed as i32)
            .bind(standing.discards_used as i32)
            .bind(standing.wins as i32)
            .bind(standing.podiums as i32)
            .bind(standing.best_finish.map(|p| p as i32))
            .bind(standing.worst_finish.map(|p| p as i32))
            .bind(standing.tied)
            .bind(standing.tie_breaker.as_deref())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        info!(
            "Stored {} series standings for regatta {} division '{}'",
            written,
            regatta_id,
            division_key(division)
        );
        Ok(written)
    }

    pub async fn list_series_standings(
        &self,
        regatta_id: Uuid,
        division: Option<&str>,
        pagination: &PaginationParams,
    ) -> Result<(Vec<SeriesStanding>, i64)> {
        let total_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM series_standings WHERE regatta_id = $1 AND division = $2",
        )
        .bind(regatta_id)
        .bind(division_key(division))
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SeriesStandingRow>(
            r#"
            SELECT regatta_id, division, entry, rank, race_scores, total_points, net_points,
                   races_sailed, discards_used, wins, podiums, best_finish, worst_finish,
                   tied, tie_breaker
            FROM series_standings
            WHERE regatta_id = $1 AND division = $2
            ORDER BY rank, entry->>'sail_number', entry_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(regatta_id)
        .bind(division_key(division))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(SeriesStanding::from).collect(), total_items))
    }

    /// All stored standings of a regatta, every division, in rank order.
    pub async fn all_series_standings(&self, regatta_id: Uuid) -> Result<Vec<SeriesStanding>> {
        let rows = sqlx::query_as::<_, SeriesStandingRow>(
            r#"
            SELECT regatta_id, division, entry, rank, race_scores, total_points, net_points,
                   races_sailed, discards_used, wins, podiums, best_finish, worst_finish,
                   tied, tie_breaker
            FROM series_standings
            WHERE regatta_id = $1
            ORDER BY division, rank, entry->>'sail_number', entry_id
            "#,
        )
        .bind(regatta_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SeriesStanding::from).collect())
    }

    /// Replaces all season standings at once; partial season results are never visible.
    pub async fn replace_season_standings(
        &self,
        season_id: Uuid,
        standings: &[SeasonStanding],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        lock_standings_key(&mut tx, "season", season_id, None).await?;

        sqlx::query("DELETE FROM season_standings WHERE season_id = $1")
            .bind(season_id)
            .execute(&mut *tx)
            .await?;

        let mut written = 0u64;
        for standing in standings {
            let discards: Vec<i32> = standing.discards.iter().map(|d| *d as i32).collect();

            written += sqlx::query(
                r#"
                INSERT INTO season_standings (
                    season_id, division, user_id, entry_ids, name, sail_number, rank,
                    regatta_results, race_results, discards, total_points, net_points,
                    regattas_sailed, races_sailed, wins, podiums, best_finish, worst_finish,
                    tied, tie_breaker
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                        $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
                "#,
            )
            .bind(season_id)
            .bind(division_key(standing.division.as_deref()))
            .bind(standing.user_id)
            .bind(&standing.entry_ids)
            .bind(&standing.name)
            .bind(&standing.sail_number)
            .bind(standing.rank as i32)
            .bind(Json(&standing.regatta_results))
            .bind(Json(&standing.race_results))
            .bind(discards)
            .bind(standing.total_points)
            .bind(standing.net_points)
            .bind(standing.regattas_sailed as i32)
            .bind(standing.races_sailed as i32)
            .bind(standing.wins as i32)
            .bind(standing.podiums as i32)
            .bind(standing.best_finish.map(|p| p as i32))
            .bind(standing.worst_finish.map(|p| p as i32))
            .bind(standing.tied)
            .bind(standing.tie_breaker.as_deref())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        info!("Stored {} season standings for season {}", written, season_id);
        Ok(written)
    }

    pub async fn list_season_standings(
        &self,
        season_id: Uuid,
        division: Option<&str>,
        pagination: &PaginationParams,
    ) -> Result<(Vec<SeasonStanding>, i64)> {
        let total_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM season_standings WHERE season_id = $1 AND division = $2",
        )
        .bind(season_id)
        .bind(division_key(division))
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SeasonStandingRow>(
            r#"
            SELECT season_id, division, user_id, entry_ids, name, sail_number, rank,
                   regatta_results, race_results, discards, total_points, net_points,
                   regattas_sailed, races_sailed, wins, podiums, best_finish, worst_finish,
                   tied, tie_breaker
            FROM season_standings
            WHERE season_id = $1 AND division = $2
            ORDER BY rank, sail_number, user_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(season_id)
        .bind(division_key(division))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(SeasonStanding::from).collect(), total_items))
    }
}
