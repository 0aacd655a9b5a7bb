use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use sqlx::PgPool;
use sqlx::types::Json;
use storage::models::{FinishOutcome, ScoringConfiguration};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{LegacyEvent, LegacyFile};
use crate::{ImporterError, Result};

/// Persists a validated legacy file as a regatta.
///
/// A file covers the divisions of its competitors (the event division when a competitor
/// names none). Re-importing a slug replaces the entries of those divisions only; their
/// results and stored standings go with them. Races are matched by sequence and kept.
pub struct LegacyTransformer<'a> {
    pool: &'a PgPool,
}

impl<'a> LegacyTransformer<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn import_to_database(&self, file: &LegacyFile) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let regatta_id = self.upsert_regatta(&file.event, &mut tx).await?;
        let divisions = division_keys(file);
        self.clear_divisions(regatta_id, &divisions, &mut tx).await?;

        let entries = self.insert_entries(regatta_id, file, &mut tx).await?;
        let races = self.upsert_races(regatta_id, file, &mut tx).await?;

        let mut imported = 0;
        for result in &file.results {
            let (Some(entry_id), Some(race_id), Some(outcome)) = (
                entries.get(&result.competitor),
                races.get(&result.race),
                result.outcome,
            ) else {
                continue;
            };

            let (position, code) = match outcome {
                FinishOutcome::Position(position) => (Some(position as i32), None),
                FinishOutcome::Code(code) => (None, Some(code.as_str())),
            };

            sqlx::query(
                r#"
                INSERT INTO race_results (race_id, entry_id, position, code, elapsed_time, corrected_time, revision)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(race_id)
            .bind(entry_id)
            .bind(position)
            .bind(code)
            .bind(result.elapsed_time)
            .bind(result.corrected_time)
            .bind(result.revision.unwrap_or(1) as i32)
            .execute(&mut *tx)
            .await?;
            imported += 1;
        }

        self.upsert_configuration(regatta_id, file.event.division.as_deref(), &file.config, &mut tx)
            .await?;
        let dropped = self.drop_unused_races(regatta_id, &races, &mut tx).await?;

        tx.commit().await?;

        info!(
            "Imported '{}' ({}): {} entries, {} races, {} results, {} stale races dropped",
            file.event.slug,
            divisions.join(", "),
            entries.len(),
            races.len(),
            imported,
            dropped
        );
        Ok(regatta_id)
    }

    async fn upsert_regatta(
        &self,
        event: &LegacyEvent,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Uuid> {
        let regatta_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO regattas (name, slug, venue, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (slug)
            DO UPDATE SET
                name = EXCLUDED.name,
                venue = EXCLUDED.venue,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date
            RETURNING regatta_id
            "#,
        )
        .bind(&event.name)
        .bind(&event.slug)
        .bind(&event.venue)
        .bind(event.start_date)
        .bind(event.end_date)
        .fetch_one(&mut **tx)
        .await?;

        Ok(regatta_id)
    }

    async fn clear_divisions(
        &self,
        regatta_id: Uuid,
        divisions: &[String],
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<()> {
        let cleared = sqlx::query(
            "DELETE FROM entries WHERE regatta_id = $1 AND COALESCE(division, '') = ANY($2)",
        )
        .bind(regatta_id)
        .bind(divisions)
        .execute(&mut **tx)
        .await?;

        debug!(
            "Cleared {} entries of regatta {}",
            cleared.rows_affected(),
            regatta_id
        );
        Ok(())
    }

    /// Returns competitor number to stored entry id.
    async fn insert_entries(
        &self,
        regatta_id: Uuid,
        file: &LegacyFile,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<HashMap<u32, Uuid>> {
        let mut ids = HashMap::with_capacity(file.competitors.len());

        for competitor in &file.competitors {
            let entry = &competitor.entry;
            let entry_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO entries (regatta_id, user_id, name, sail_number, boat_class, division, club)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING entry_id
                "#,
            )
            .bind(regatta_id)
            .bind(entry.user_id)
            .bind(&entry.name)
            .bind(&entry.sail_number)
            .bind(&entry.boat_class)
            .bind(entry.division.as_deref().or(file.event.division.as_deref()))
            .bind(&entry.club)
            .fetch_one(&mut **tx)
            .await?;

            ids.insert(competitor.number, entry_id);
        }

        Ok(ids)
    }

    /// Returns race number to stored race id. Races already stored under the same
    /// sequence keep their id, so results of other divisions stay attached.
    async fn upsert_races(
        &self,
        regatta_id: Uuid,
        file: &LegacyFile,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<HashMap<u32, Uuid>> {
        let mut ids = HashMap::with_capacity(file.races.len());

        for race in &file.races {
            let race_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO races (regatta_id, sequence, name)
                VALUES ($1, $2, $3)
                ON CONFLICT (regatta_id, sequence)
                DO UPDATE SET name = COALESCE(EXCLUDED.name, races.name)
                RETURNING race_id
                "#,
            )
            .bind(regatta_id)
            .bind(race.race.sequence as i32)
            .bind(&race.race.name)
            .fetch_one(&mut **tx)
            .await?;

            ids.insert(race.number, race_id);
        }

        Ok(ids)
    }

    /// Removes races the file does not name and no division has results for.
    async fn drop_unused_races(
        &self,
        regatta_id: Uuid,
        races: &HashMap<u32, Uuid>,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<u64> {
        let kept: Vec<Uuid> = races.values().copied().collect();

        let dropped = sqlx::query(
            r#"
            DELETE FROM races r
            WHERE r.regatta_id = $1
              AND r.race_id <> ALL($2)
              AND NOT EXISTS (SELECT 1 FROM race_results rr WHERE rr.race_id = r.race_id)
            "#,
        )
        .bind(regatta_id)
        .bind(&kept)
        .execute(&mut **tx)
        .await?;

        Ok(dropped.rows_affected())
    }

    async fn upsert_configuration(
        &self,
        regatta_id: Uuid,
        division: Option<&str>,
        config: &ScoringConfiguration,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<()> {
        let first_place_points = match config.first_place_points {
            Some(points) => Some(Decimal::from_f64(points).ok_or_else(|| {
                ImporterError::ValidationError(format!("Invalid first place points {}", points))
            })?),
            None => None,
        };
        let tie_breaking_rules: Vec<&str> =
            config.tie_breaking_rules.iter().map(|rule| rule.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO scoring_configurations (
                regatta_id, division, system, discard_rule, use_corrected_time,
                exclude_dns_dnc_from_discard, first_place_points, tie_breaking_rules,
                missing_result_policy, code_penalties, bonus_table, custom_formula
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (regatta_id, division)
            DO UPDATE SET
                system = EXCLUDED.system,
                discard_rule = EXCLUDED.discard_rule,
                use_corrected_time = EXCLUDED.use_corrected_time,
                exclude_dns_dnc_from_discard = EXCLUDED.exclude_dns_dnc_from_discard,
                first_place_points = EXCLUDED.first_place_points,
                tie_breaking_rules = EXCLUDED.tie_breaking_rules,
                missing_result_policy = EXCLUDED.missing_result_policy,
                code_penalties = EXCLUDED.code_penalties,
                bonus_table = EXCLUDED.bonus_table,
                custom_formula = EXCLUDED.custom_formula,
                updated_at = NOW()
            "#,
        )
        .bind(regatta_id)
        .bind(division.unwrap_or(""))
        .bind(config.system.as_str())
        .bind(Json(&config.discard_rule))
        .bind(config.use_corrected_time)
        .bind(config.exclude_dns_dnc_from_discard)
        .bind(first_place_points)
        .bind(Json(tie_breaking_rules))
        .bind(config.missing_result_policy.map(|policy| policy.as_str()))
        .bind(Json(&config.code_penalties))
        .bind(Json(&config.bonus_table))
        .bind(config.custom_formula.as_ref().map(Json))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// Division keys a file covers, `''` standing for entries without a division.
pub(crate) fn division_keys(file: &LegacyFile) -> Vec<String> {
    let event_division = file.event.division.as_deref();

    let mut keys: Vec<String> = file
        .competitors
        .iter()
        .map(|competitor| competitor.entry.division.as_deref().or(event_division))
        .chain(std::iter::once(event_division))
        .map(|division| division.unwrap_or("").to_string())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}
