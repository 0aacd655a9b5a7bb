use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, ScoringError, StorageError};
use crate::models::{
    CustomFormula, DiscardRule, Entry, FinishOutcome, MissingResultPolicy, PenaltyRule,
    PointTable, Race, RaceResult, Regatta, ScoringCode, ScoringConfiguration, TieBreakRule,
};
use crate::services::scoring::SeriesInput;

#[derive(FromRow)]
struct EntryRow {
    entry_id: Uuid,
    user_id: Option<Uuid>,
    name: String,
    sail_number: String,
    boat_class: String,
    division: Option<String>,
    club: Option<String>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Self {
            entry_id: row.entry_id,
            user_id: row.user_id,
            name: row.name,
            sail_number: row.sail_number,
            boat_class: row.boat_class,
            division: row.division,
            club: row.club,
        }
    }
}

#[derive(FromRow)]
struct RaceRow {
    race_id: Uuid,
    sequence: i32,
    name: Option<String>,
}

#[derive(FromRow)]
struct ResultRow {
    race_id: Uuid,
    entry_id: Uuid,
    position: Option<i32>,
    code: Option<String>,
    elapsed_time: Option<f64>,
    corrected_time: Option<f64>,
    revision: i32,
}

impl TryFrom<ResultRow> for RaceResult {
    type Error = ScoringError;

    fn try_from(row: ResultRow) -> std::result::Result<Self, Self::Error> {
        let outcome = FinishOutcome::from_columns(row.position, row.code.as_deref())
            .map_err(|reason| ScoringError::integrity(Some(row.race_id), Some(row.entry_id), reason))?;

        let revision = u32::try_from(row.revision).map_err(|_| {
            ScoringError::integrity(
                Some(row.race_id),
                Some(row.entry_id),
                format!("Invalid revision {}", row.revision),
            )
        })?;

        Ok(Self {
            race_id: row.race_id,
            entry_id: row.entry_id,
            outcome,
            elapsed_time: row.elapsed_time,
            corrected_time: row.corrected_time,
            revision,
        })
    }
}

/// Stored form of a [`ScoringConfiguration`]. JSON columns are decoded by hand so a bad
/// value surfaces as a configuration error instead of a database error.
#[derive(FromRow)]
pub(crate) struct ScoringConfigurationRow {
    system: String,
    discard_rule: Json<serde_json::Value>,
    use_corrected_time: bool,
    exclude_dns_dnc_from_discard: bool,
    first_place_points: Option<Decimal>,
    tie_breaking_rules: Json<Vec<String>>,
    missing_result_policy: Option<String>,
    code_penalties: Json<serde_json::Value>,
    bonus_table: Option<Json<serde_json::Value>>,
    custom_formula: Option<Json<serde_json::Value>>,
}

fn decode_column<T: serde::de::DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> std::result::Result<T, ScoringError> {
    serde_json::from_value(value)
        .map_err(|e| ScoringError::configuration(format!("Invalid {}: {}", column, e)))
}

impl TryFrom<ScoringConfigurationRow> for ScoringConfiguration {
    type Error = ScoringError;

    fn try_from(row: ScoringConfigurationRow) -> std::result::Result<Self, Self::Error> {
        let first_place_points = match row.first_place_points {
            Some(points) => Some(points.to_f64().ok_or_else(|| {
                ScoringError::configuration(format!("Invalid first_place_points {}", points))
            })?),
            None => None,
        };

        let tie_breaking_rules = row
            .tie_breaking_rules
            .0
            .iter()
            .map(|rule| rule.parse::<TieBreakRule>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let missing_result_policy = row
            .missing_result_policy
            .as_deref()
            .map(str::parse::<MissingResultPolicy>)
            .transpose()?;

        let config = Self {
            system: row.system.parse()?,
            discard_rule: decode_column::<DiscardRule>("discard_rule", row.discard_rule.0)?,
            use_corrected_time: row.use_corrected_time,
            exclude_dns_dnc_from_discard: row.exclude_dns_dnc_from_discard,
            first_place_points,
            tie_breaking_rules,
            missing_result_policy,
            code_penalties: decode_column::<BTreeMap<ScoringCode, PenaltyRule>>(
                "code_penalties",
                row.code_penalties.0,
            )?,
            bonus_table: match row.bonus_table {
                Some(Json(value)) => decode_column::<PointTable>("bonus_table", value)?,
                None => PointTable::bonus_point(),
            },
            custom_formula: row
                .custom_formula
                .map(|Json(value)| decode_column::<CustomFormula>("custom_formula", value))
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }
}

pub struct RegattaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RegattaRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_regatta(&self, regatta_id: Uuid) -> Result<Regatta> {
        sqlx::query_as::<_, Regatta>(
            r#"
            SELECT regatta_id, name, slug, venue, start_date, end_date, created_at
            FROM regattas
            WHERE regatta_id = $1
            "#,
        )
        .bind(regatta_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)
    }

    /// Divisions that have entries. `None` stands for entries without a division.
    pub async fn list_divisions(&self, regatta_id: Uuid) -> Result<Vec<Option<String>>> {
        let divisions = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT DISTINCT division
            FROM entries
            WHERE regatta_id = $1
            ORDER BY division NULLS FIRST
            "#,
        )
        .bind(regatta_id)
        .fetch_all(self.pool)
        .await?;

        Ok(divisions)
    }

    pub async fn list_entries(&self, regatta_id: Uuid, division: Option<&str>) -> Result<Vec<Entry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT entry_id, user_id, name, sail_number, boat_class, division, club
            FROM entries
            WHERE regatta_id = $1
              AND division IS NOT DISTINCT FROM $2
            ORDER BY sail_number, entry_id
            "#,
        )
        .bind(regatta_id)
        .bind(division)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    pub async fn list_races(&self, regatta_id: Uuid) -> Result<Vec<Race>> {
        let rows = sqlx::query_as::<_, RaceRow>(
            r#"
            SELECT race_id, sequence, name
            FROM races
            WHERE regatta_id = $1
            ORDER BY sequence, race_id
            "#,
        )
        .bind(regatta_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Race {
                race_id: row.race_id,
                sequence: row.sequence.max(0) as u32,
                name: row.name,
            })
            .collect())
    }

    /// Every revision of every result for the division's entries in this regatta's
    /// races. Rows that cannot be decoded come back as integrity errors.
    pub async fn list_results(
        &self,
        regatta_id: Uuid,
        division: Option<&str>,
    ) -> Result<(Vec<RaceResult>, Vec<ScoringError>)> {
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT rr.race_id, rr.entry_id, rr.position, rr.code,
                   rr.elapsed_time, rr.corrected_time, rr.revision
            FROM race_results rr
            INNER JOIN races r ON r.race_id = rr.race_id
            INNER JOIN entries e ON e.entry_id = rr.entry_id
            WHERE r.regatta_id = $1
              AND e.division IS NOT DISTINCT FROM $2
            ORDER BY r.sequence, rr.entry_id, rr.revision
            "#,
        )
        .bind(regatta_id)
        .bind(division)
        .fetch_all(self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();

        for row in rows {
            match RaceResult::try_from(row) {
                Ok(result) => results.push(result),
                Err(err) => rejected.push(err),
            }
        }

        Ok((results, rejected))
    }

    /// The division's own configuration, else the regatta-wide one, else `None`.
    pub async fn get_scoring_configuration(
        &self,
        regatta_id: Uuid,
        division: Option<&str>,
    ) -> Result<Option<ScoringConfiguration>> {
        let row = sqlx::query_as::<_, ScoringConfigurationRow>(
            r#"
            SELECT system, discard_rule, use_corrected_time, exclude_dns_dnc_from_discard,
                   first_place_points, tie_breaking_rules, missing_result_policy,
                   code_penalties, bonus_table, custom_formula
            FROM scoring_configurations
            WHERE regatta_id = $1
              AND division IN (COALESCE($2, ''), '')
            ORDER BY (division = '')
            LIMIT 1
            "#,
        )
        .bind(regatta_id)
        .bind(division)
        .fetch_optional(self.pool)
        .await?;

        let config = row.map(ScoringConfiguration::try_from).transpose()?;
        Ok(config)
    }

    /// Reads everything needed to score one division. All reads happen here, before
    /// any standings are written.
    pub async fn load_series_input(
        &self,
        regatta_id: Uuid,
        division: Option<&str>,
    ) -> Result<SeriesInput> {
        self.get_regatta(regatta_id).await?;

        let entries = self.list_entries(regatta_id, division).await?;
        let races = self.list_races(regatta_id).await?;
        let (results, load_errors) = self.list_results(regatta_id, division).await?;
        let config = self.get_scoring_configuration(regatta_id, division).await?;

        Ok(SeriesInput {
            regatta_id,
            division: division.map(str::to_string),
            entries,
            races,
            results,
            config,
            load_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_row() -> ScoringConfigurationRow {
        ScoringConfigurationRow {
            system: "low_point".to_string(),
            discard_rule: Json(json!({"type": "worst_n", "count": 1, "min_races_for_discard": 4})),
            use_corrected_time: false,
            exclude_dns_dnc_from_discard: true,
            first_place_points: Some(Decimal::new(75, 2)),
            tie_breaking_rules: Json(vec!["most_firsts".to_string()]),
            missing_result_policy: Some("exclude".to_string()),
            code_penalties: Json(json!({"DSQ": {"type": "fixed", "points": 20.0}})),
            bonus_table: None,
            custom_formula: None,
        }
    }

    #[test]
    fn test_configuration_row_decodes() {
        let config = ScoringConfiguration::try_from(config_row()).unwrap();

        assert_eq!(
            config.discard_rule,
            DiscardRule::WorstN {
                count: 1,
                min_races_for_discard: Some(4),
            }
        );
        assert_eq!(config.first_place_points, Some(0.75));
        assert_eq!(config.tie_breaking_rules, vec![TieBreakRule::MostFirsts]);
        assert_eq!(config.missing_result_policy, Some(MissingResultPolicy::Exclude));
        assert_eq!(
            config.penalty_rule(ScoringCode::Dsq),
            PenaltyRule::Fixed { points: 20.0 }
        );
    }

    #[test]
    fn test_unknown_system_is_configuration_error() {
        let mut row = config_row();
        row.system = "golf".to_string();

        let err = ScoringConfiguration::try_from(row).unwrap_err();
        assert!(matches!(err, ScoringError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_tie_break_rule_is_configuration_error() {
        let mut row = config_row();
        row.tie_breaking_rules = Json(vec!["coin_toss".to_string()]);

        let err = ScoringConfiguration::try_from(row).unwrap_err();
        assert!(matches!(err, ScoringError::Configuration { .. }));
    }

    #[test]
    fn test_negative_discard_count_is_configuration_error() {
        let mut row = config_row();
        row.discard_rule = Json(json!({"type": "worst_n", "count": -2}));

        let err = ScoringConfiguration::try_from(row).unwrap_err();
        assert!(matches!(err, ScoringError::Configuration { .. }));
    }

    #[test]
    fn test_result_row_with_both_position_and_code_is_rejected() {
        let row = ResultRow {
            race_id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
            position: Some(3),
            code: Some("DNF".to_string()),
            elapsed_time: None,
            corrected_time: None,
            revision: 1,
        };

        let err = RaceResult::try_from(row).unwrap_err();
        assert!(matches!(err, ScoringError::DataIntegrity { .. }));
    }
}
