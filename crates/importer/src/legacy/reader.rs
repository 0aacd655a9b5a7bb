use std::collections::BTreeMap;
use std::str::FromStr;

use storage::models::{
    CustomFormula, DiscardRule, Entry, FinishOutcome, MissingResultPolicy, PenaltyRule,
    PointTable, Race, ScoringCode, ScoringConfiguration, TieBreakRule,
};
use tracing::debug;
use uuid::Uuid;

use super::models::{LegacyCompetitor, LegacyEvent, LegacyFile, LegacyRace, LegacyResult, RecordedTotals};
use crate::formats::csv::split_line;
use crate::{ImporterError, Result};

/// One parsed line; `line` is 1-based for error messages.
struct Record {
    line: usize,
    key: String,
    value: String,
    competitor: Option<u32>,
    race: Option<u32>,
}

#[derive(Default)]
struct DiscardFields {
    kind: Option<String>,
    count: Option<i32>,
    pct: Option<f64>,
    min: Option<i32>,
}

#[derive(Default)]
struct TableFields {
    points: Option<Vec<f64>>,
    beyond: Option<(f64, f64)>,
}

impl TableFields {
    fn build(self, fallback: PointTable) -> PointTable {
        let (beyond_multiplier, beyond_offset) = self
            .beyond
            .unwrap_or((fallback.beyond_multiplier, fallback.beyond_offset));
        PointTable {
            points: self.points.unwrap_or(fallback.points),
            beyond_multiplier,
            beyond_offset,
        }
    }
}

pub struct LegacyReader;

fn number(line: usize, field: &str, what: &str) -> Result<Option<u32>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ImporterError::parse(line, format!("Invalid {} number '{}'", what, field)))
}

fn value<T: FromStr>(record: &Record) -> Result<T> {
    record.value.trim().parse::<T>().map_err(|_| {
        ImporterError::parse(
            record.line,
            format!("Invalid value '{}' for {}", record.value, record.key),
        )
    })
}

fn flag(record: &Record) -> Result<bool> {
    match record.value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(ImporterError::parse(
            record.line,
            format!("Invalid flag '{}' for {}", other, record.key),
        )),
    }
}

fn list(record: &Record) -> Result<Vec<f64>> {
    record
        .value
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.trim().parse::<f64>().map_err(|_| {
                ImporterError::parse(record.line, format!("Invalid number '{}' in {}", part, record.key))
            })
        })
        .collect()
}

fn pair(record: &Record) -> Result<(f64, f64)> {
    match list(record)?.as_slice() {
        [multiplier, offset] => Ok((*multiplier, *offset)),
        _ => Err(ImporterError::parse(
            record.line,
            format!("{} needs 'multiplier;offset'", record.key),
        )),
    }
}

fn penalty(record: &Record) -> Result<(ScoringCode, PenaltyRule)> {
    let invalid = || ImporterError::parse(record.line, format!("Invalid penalty '{}'", record.value));

    let (code, rule) = record.value.split_once('=').ok_or_else(invalid)?;
    let code: ScoringCode = code.parse().map_err(|reason| ImporterError::parse(record.line, reason))?;

    let rule = match rule.trim() {
        "race" => PenaltyRule::EntriesInRacePlusOne,
        "series" => PenaltyRule::EntriesInSeriesPlusOne,
        fixed => {
            let points = fixed
                .strip_prefix("fixed:")
                .and_then(|p| p.parse::<f64>().ok())
                .ok_or_else(invalid)?;
            PenaltyRule::Fixed { points }
        }
    };

    Ok((code, rule))
}

fn required<T>(field: Option<T>, line: usize, key: &str) -> Result<T> {
    field.ok_or_else(|| ImporterError::parse(line, format!("{} needs a number column", key)))
}

impl LegacyReader {
    pub fn parse(content: &str) -> Result<LegacyFile> {
        let records = Self::records(content)?;

        let mut event = LegacyEvent::default();
        let mut config = ScoringConfiguration::default();
        let mut discard = DiscardFields::default();
        let mut bonus = TableFields::default();
        let mut custom = TableFields::default();
        let mut custom_high: Option<bool> = None;
        let mut competitors: BTreeMap<u32, LegacyCompetitor> = BTreeMap::new();
        let mut races: BTreeMap<u32, LegacyRace> = BTreeMap::new();
        let mut results: BTreeMap<(u32, u32), LegacyResult> = BTreeMap::new();

        for record in &records {
            let key = record.key.as_str();

            if let Some(series_key) = key.strip_prefix("ser") {
                match series_key {
                    "event" => event.name = record.value.clone(),
                    "slug" => event.slug = record.value.clone(),
                    "venue" => event.venue = Some(record.value.clone()),
                    "start" => event.start_date = Some(value(record)?),
                    "end" => event.end_date = Some(value(record)?),
                    "division" => event.division = Some(record.value.clone()),
                    "system" => config.system = record.value.parse()?,
                    "discardtype" => discard.kind = Some(record.value.trim().to_lowercase()),
                    "discardcount" => discard.count = Some(value(record)?),
                    "discardpct" => discard.pct = Some(value(record)?),
                    "discardmin" => discard.min = Some(value(record)?),
                    "corrected" => config.use_corrected_time = flag(record)?,
                    "excludedns" => config.exclude_dns_dnc_from_discard = flag(record)?,
                    "firstpoints" => config.first_place_points = Some(value(record)?),
                    "tiebreak" => {
                        config.tie_breaking_rules = record
                            .value
                            .split(';')
                            .filter(|rule| !rule.trim().is_empty())
                            .map(TieBreakRule::from_str)
                            .collect::<std::result::Result<_, _>>()?;
                    }
                    "missing" if record.value.trim().is_empty() => {
                        config.missing_result_policy = None
                    }
                    "missing" => {
                        config.missing_result_policy =
                            Some(record.value.parse::<MissingResultPolicy>()?)
                    }
                    "penalty" => {
                        let (code, rule) = penalty(record)?;
                        config.code_penalties.insert(code, rule);
                    }
                    "table" => bonus.points = Some(list(record)?),
                    "tablebeyond" => bonus.beyond = Some(pair(record)?),
                    "customtable" => custom.points = Some(list(record)?),
                    "custombeyond" => custom.beyond = Some(pair(record)?),
                    "customhigh" => custom_high = Some(flag(record)?),
                    _ => debug!("Ignoring unknown series key '{}' on line {}", key, record.line),
                }
                continue;
            }

            if let Some(comp_key) = key.strip_prefix("comp") {
                let number = required(record.competitor, record.line, key)?;
                let competitor = competitors.entry(number).or_insert_with(|| LegacyCompetitor {
                    number,
                    entry: Entry::new(Uuid::new_v4(), "", ""),
                    recorded: RecordedTotals::default(),
                });

                match comp_key {
                    "entryid" => competitor.entry.entry_id = value(record)?,
                    "userid" => competitor.entry.user_id = Some(value(record)?),
                    "name" | "helmname" => competitor.entry.name = record.value.clone(),
                    "sailno" => competitor.entry.sail_number = record.value.clone(),
                    "class" => competitor.entry.boat_class = record.value.clone(),
                    "division" => competitor.entry.division = Some(record.value.clone()),
                    "club" => competitor.entry.club = Some(record.value.clone()),
                    "rank" => competitor.recorded.rank = Some(value(record)?),
                    "total" => competitor.recorded.total = Some(value(record)?),
                    "nett" => competitor.recorded.net = Some(value(record)?),
                    "tied" => competitor.recorded.tied = flag(record)?,
                    "tiebreak" => competitor.recorded.tie_breaker = Some(record.value.clone()),
                    _ => debug!("Ignoring unknown competitor key '{}' on line {}", key, record.line),
                }
                continue;
            }

            if let Some(race_key) = key.strip_prefix("race") {
                let number = required(record.race, record.line, key)?;
                let race = races.entry(number).or_insert_with(|| LegacyRace {
                    number,
                    race: Race::new(Uuid::new_v4(), number),
                });

                match race_key {
                    "id" => race.race.race_id = value(record)?,
                    "seq" => race.race.sequence = value(record)?,
                    "name" => race.race.name = Some(record.value.clone()),
                    _ => debug!("Ignoring unknown race key '{}' on line {}", key, record.line),
                }
                continue;
            }

            if let Some(result_key) = key.strip_prefix('r') {
                let competitor = required(record.competitor, record.line, key)?;
                let race = required(record.race, record.line, key)?;
                let result = results
                    .entry((competitor, race))
                    .or_insert_with(|| LegacyResult {
                        competitor,
                        race,
                        ..Default::default()
                    });

                match result_key {
                    "pos" => {
                        Self::set_outcome(result, record, FinishOutcome::Position(value(record)?))?
                    }
                    "cod" => {
                        let code: ScoringCode = record
                            .value
                            .parse()
                            .map_err(|reason| ImporterError::parse(record.line, reason))?;
                        Self::set_outcome(result, record, FinishOutcome::Code(code))?
                    }
                    "ela" => result.elapsed_time = Some(value(record)?),
                    "cor" => result.corrected_time = Some(value(record)?),
                    "rev" => result.revision = Some(value(record)?),
                    "pts" => result.points = Some(value(record)?),
                    "place" => result.place = Some(value(record)?),
                    "disc" => result.discarded = flag(record)?,
                    _ => debug!("Ignoring unknown result key '{}' on line {}", key, record.line),
                }
                continue;
            }

            debug!("Ignoring unknown key '{}' on line {}", key, record.line);
        }

        config.discard_rule = Self::discard_rule(discard)?;
        config.bonus_table = bonus.build(PointTable::bonus_point());
        if custom.points.is_some() || custom_high.is_some() {
            config.custom_formula = Some(CustomFormula {
                table: custom.build(PointTable::bonus_point()),
                higher_is_better: custom_high.unwrap_or(false),
            });
        }

        Ok(LegacyFile {
            event,
            config,
            competitors: competitors.into_values().collect(),
            races: races.into_values().collect(),
            results: results.into_values().collect(),
        })
    }

    fn records(content: &str) -> Result<Vec<Record>> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                let line_no = idx + 1;
                let fields = split_line(line).map_err(|reason| ImporterError::parse(line_no, reason))?;

                let [key, raw_value, competitor, race]: [String; 4] = fields
                    .try_into()
                    .map_err(|fields: Vec<String>| {
                        ImporterError::parse(line_no, format!("Expected 4 fields, found {}", fields.len()))
                    })?;

                Ok(Record {
                    line: line_no,
                    key: key.trim().to_lowercase(),
                    value: raw_value,
                    competitor: number(line_no, &competitor, "competitor")?,
                    race: number(line_no, &race, "race")?,
                })
            })
            .collect()
    }

    fn set_outcome(result: &mut LegacyResult, record: &Record, outcome: FinishOutcome) -> Result<()> {
        if outcome == FinishOutcome::Position(0) {
            return Err(ImporterError::parse(record.line, "Finish position must be >= 1"));
        }
        if let Some(existing) = result.outcome
            && existing != outcome
        {
            return Err(ImporterError::parse(
                record.line,
                format!(
                    "Competitor {} race {} has both {} and {}",
                    result.competitor, result.race, existing, outcome
                ),
            ));
        }
        result.outcome = Some(outcome);
        Ok(())
    }

    fn discard_rule(fields: DiscardFields) -> Result<DiscardRule> {
        let missing = |what: &str| {
            ImporterError::ValidationError(format!("Discard rule is missing {}", what))
        };

        let rule = match fields.kind.as_deref() {
            None | Some("none") => DiscardRule::None,
            Some("worst_n") => DiscardRule::WorstN {
                count: fields.count.ok_or_else(|| missing("serdiscardcount"))?,
                min_races_for_discard: fields.min,
            },
            Some("percentage") => DiscardRule::Percentage {
                pct: fields.pct.ok_or_else(|| missing("serdiscardpct"))?,
                min_races_for_discard: fields.min,
            },
            Some(other) => {
                return Err(ImporterError::ValidationError(format!(
                    "Unknown discard type '{}'",
                    other
                )));
            }
        };

        Ok(rule)
    }
}
