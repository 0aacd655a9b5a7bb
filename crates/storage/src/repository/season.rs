use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, ScoringError, StorageError};
use crate::models::{ScoringConfiguration, Season, SeasonRegatta};
use crate::repository::standings::lock_standings_key;

#[derive(FromRow)]
struct SeasonRegattaRow {
    season_id: Uuid,
    regatta_id: Uuid,
    sequence: i32,
    weight: Decimal,
    is_championship: bool,
}

impl From<SeasonRegattaRow> for SeasonRegatta {
    fn from(row: SeasonRegattaRow) -> Self {
        Self {
            season_id: row.season_id,
            regatta_id: row.regatta_id,
            sequence: row.sequence.max(0) as u32,
            weight: row.weight,
            is_championship: row.is_championship,
        }
    }
}

pub struct SeasonRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SeasonRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_season(&self, season_id: Uuid) -> Result<Season> {
        sqlx::query_as::<_, Season>(
            "SELECT season_id, name, year, created_at FROM seasons WHERE season_id = $1",
        )
        .bind(season_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)
    }

    pub async fn list_season_regattas(&self, season_id: Uuid) -> Result<Vec<SeasonRegatta>> {
        let rows = sqlx::query_as::<_, SeasonRegattaRow>(
            r#"
            SELECT season_id, regatta_id, sequence, weight, is_championship
            FROM season_regattas
            WHERE season_id = $1
            ORDER BY sequence, regatta_id
            "#,
        )
        .bind(season_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SeasonRegatta::from).collect())
    }

    /// The season's discard and tie-break settings, `None` when unset.
    pub async fn get_scoring_configuration(
        &self,
        season_id: Uuid,
    ) -> Result<Option<ScoringConfiguration>> {
        let value = sqlx::query_scalar::<_, Option<Json<serde_json::Value>>>(
            "SELECT scoring_configuration FROM seasons WHERE season_id = $1",
        )
        .bind(season_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        let Some(Json(value)) = value else {
            return Ok(None);
        };

        let config: ScoringConfiguration = serde_json::from_value(value).map_err(|e| {
            ScoringError::configuration(format!("Invalid season scoring configuration: {}", e))
        })?;
        config.validate()?;

        Ok(Some(config))
    }

    /// Replaces the season's regatta list.
    pub async fn replace_composition(
        &self,
        season_id: Uuid,
        regattas: &[SeasonRegatta],
    ) -> Result<Vec<SeasonRegatta>> {
        let mut tx = self.pool.begin().await?;
        lock_standings_key(&mut tx, "season", season_id, None).await?;

        sqlx::query("DELETE FROM season_regattas WHERE season_id = $1")
            .bind(season_id)
            .execute(&mut *tx)
            .await?;

        for regatta in regattas {
            sqlx::query(
                r#"
                INSERT INTO season_regattas (season_id, regatta_id, sequence, weight, is_championship)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(season_id)
            .bind(regatta.regatta_id)
            .bind(regatta.sequence as i32)
            .bind(regatta.weight)
            .bind(regatta.is_championship)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                let err = StorageError::from(e);
                if err.is_foreign_key_violation() {
                    StorageError::ConstraintViolation(format!(
                        "Regatta {} does not exist",
                        regatta.regatta_id
                    ))
                } else if err.is_unique_violation() {
                    StorageError::ConstraintViolation(format!(
                        "Regatta {} listed twice",
                        regatta.regatta_id
                    ))
                } else {
                    err
                }
            })?;
        }

        tx.commit().await?;

        self.list_season_regattas(season_id).await
    }
}
