use super::models::LegacyFile;
use crate::{ImporterError, Result};
use std::collections::{HashMap, HashSet};
use tracing::warn;

pub struct LegacyValidator;

impl LegacyValidator {
    pub fn validate(file: &LegacyFile) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        if file.event.name.trim().is_empty() {
            report.errors.push("Event name is required".to_string());
        }
        if file.event.slug.trim().is_empty() {
            report.errors.push("Event slug is required".to_string());
        }
        if let (Some(start), Some(end)) = (file.event.start_date, file.event.end_date)
            && end < start
        {
            report
                .errors
                .push("Event end date must be >= start date".to_string());
        }

        if file.event.venue.is_none() {
            report.warnings.push("Event venue is not specified".to_string());
        }
        if file.event.start_date.is_none() {
            report
                .warnings
                .push("Event start date is not specified".to_string());
        }

        if let Err(err) = file.config.validate() {
            report.errors.push(err.to_string());
        }

        if file.competitors.is_empty() {
            report
                .errors
                .push("At least one competitor is required".to_string());
        }
        if file.races.is_empty() {
            report.errors.push("At least one race is required".to_string());
        }

        let mut entry_ids = HashSet::new();
        let mut sail_numbers: HashMap<&str, u32> = HashMap::new();
        for competitor in &file.competitors {
            let entry = &competitor.entry;

            if !entry_ids.insert(entry.entry_id) {
                report.errors.push(format!(
                    "Competitor {} reuses entry id {}",
                    competitor.number, entry.entry_id
                ));
            }
            if entry.name.trim().is_empty() && entry.sail_number.trim().is_empty() {
                report.errors.push(format!(
                    "Competitor {} has neither a name nor a sail number",
                    competitor.number
                ));
            }
            if !entry.sail_number.is_empty()
                && let Some(first) = sail_numbers.insert(entry.sail_number.as_str(), competitor.number)
            {
                report.warnings.push(format!(
                    "Sail number '{}' is used by competitors {} and {}",
                    entry.sail_number, first, competitor.number
                ));
            }
            if let Some(division) = &file.event.division
                && entry.division.as_ref() != Some(division)
            {
                report.warnings.push(format!(
                    "Competitor {} is not in event division '{}'",
                    competitor.number, division
                ));
            }
        }

        let mut race_ids = HashSet::new();
        let mut sequences = HashSet::new();
        for race in &file.races {
            if !race_ids.insert(race.race.race_id) {
                report.errors.push(format!(
                    "Race {} reuses race id {}",
                    race.number, race.race.race_id
                ));
            }
            if race.race.sequence < 1 {
                report.errors.push(format!(
                    "Race {} has invalid sequence {}. Sequence must be >= 1",
                    race.number, race.race.sequence
                ));
            }
            if !sequences.insert(race.race.sequence) {
                report.errors.push(format!(
                    "Race {} reuses sequence {}",
                    race.number, race.race.sequence
                ));
            }
        }

        let mut with_results = HashSet::new();
        for result in &file.results {
            let label = format!("competitor {} race {}", result.competitor, result.race);

            if file.competitor(result.competitor).is_none() {
                report
                    .errors
                    .push(format!("Result for {} references an unknown competitor", label));
            }
            if file.race(result.race).is_none() {
                report
                    .errors
                    .push(format!("Result for {} references an unknown race", label));
            }
            if result.outcome.is_none() {
                report
                    .errors
                    .push(format!("Result for {} has neither a position nor a code", label));
            }
            if result.revision == Some(0) {
                report
                    .errors
                    .push(format!("Result for {} has revision 0. Revision must be >= 1", label));
            }
            with_results.insert(result.competitor);
        }

        for competitor in &file.competitors {
            if !with_results.contains(&competitor.number) {
                report.warnings.push(format!(
                    "Competitor {} ({}) has no results",
                    competitor.number,
                    competitor.entry.label()
                ));
            }
        }

        if !file.competitors.is_empty()
            && file.competitors.iter().all(|c| c.recorded.net.is_none())
        {
            report
                .warnings
                .push("File carries no recorded totals; standings will be computed".to_string());
        }

        if !report.errors.is_empty() {
            Err(ImporterError::ValidationError(format!(
                "Validation failed with {} error(s): {}",
                report.errors.len(),
                report.errors.join("; ")
            )))
        } else {
            Ok(report)
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }
}
