use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use super::discard::{DiscardCandidate, apply_discards};
use super::race_score::{ScoredResult, penalty_points, score_race};
use super::tie_break::{Contender, TieBreakRecord, TieBreaker, rank_contenders};
use crate::error::{ComputationReport, ScoringError};
use crate::models::{
    Entry, FinishOutcome, MissingResultPolicy, Race, RaceResult, RaceScore, ScoringCode,
    ScoringConfiguration, SeriesStanding,
};

/// Everything loaded for one regatta division before scoring.
#[derive(Debug, Clone, Default)]
pub struct SeriesInput {
    pub regatta_id: Uuid,
    pub division: Option<String>,
    pub entries: Vec<Entry>,
    pub races: Vec<Race>,
    pub results: Vec<RaceResult>,
    /// `None` falls back to the default low point configuration.
    pub config: Option<ScoringConfiguration>,
    /// Rows rejected while loading, carried into the report.
    pub load_errors: Vec<ScoringError>,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesComputation {
    /// Ordered by rank.
    pub standings: Vec<SeriesStanding>,
    pub report: ComputationReport,
}

struct ScoredRace<'a> {
    race: &'a Race,
    entries_in_race: u32,
    scores: HashMap<Uuid, ScoredResult>,
}

/// Computes ranked standings for one regatta division.
///
/// A malformed configuration aborts with [`ScoringError::Configuration`]. Bad result rows
/// and unresolved missing results are reported and skipped.
pub fn compute_series_standings(input: &SeriesInput) -> Result<SeriesComputation, ScoringError> {
    let config = input.config.clone().unwrap_or_default();
    config.validate()?;

    let direction = config.direction();
    let mut report = ComputationReport::default();
    for error in &input.load_errors {
        report.push_error(error.clone());
    }

    let entries = unique_entries(&input.entries, &mut report);
    let entry_ids: HashSet<Uuid> = entries.iter().map(|entry| entry.entry_id).collect();

    let mut races: Vec<&Race> = input.races.iter().collect();
    races.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.race_id.cmp(&b.race_id)));
    let race_ids: HashSet<Uuid> = races.iter().map(|race| race.race_id).collect();

    let effective = effective_results(&input.results, &entry_ids, &race_ids, &mut report);
    let entries_in_series = entries.len() as u32;

    let scored_races: Vec<ScoredRace> = races
        .iter()
        .filter_map(|race| {
            let results: Vec<RaceResult> = effective
                .range((race.race_id, Uuid::nil())..=(race.race_id, Uuid::max()))
                .map(|(_, result)| (*result).clone())
                .collect();

            if results.is_empty() {
                report.push_warning(format!(
                    "Race {} (sequence {}) has no results and is not scored",
                    race.race_id, race.sequence
                ));
                return None;
            }

            let scores = score_race(&results, entries_in_series, &config, &mut report)
                .into_iter()
                .map(|scored| (scored.entry_id, scored))
                .collect();

            Some(ScoredRace {
                race,
                entries_in_race: results.len() as u32,
                scores,
            })
        })
        .collect();

    let final_race = scored_races.last().map(|scored| scored.race.race_id);

    let mut rows: Vec<SeriesStanding> = Vec::with_capacity(entries.len());
    let mut contenders: Vec<Contender> = Vec::with_capacity(entries.len());

    'entries: for entry in &entries {
        let mut race_scores: Vec<RaceScore> = Vec::with_capacity(scored_races.len());

        for scored_race in &scored_races {
            let race = scored_race.race;

            if let Some(scored) = scored_race.scores.get(&entry.entry_id) {
                race_scores.push(RaceScore {
                    race_id: race.race_id,
                    race_sequence: race.sequence,
                    outcome: scored.outcome,
                    position: scored.position,
                    points: scored.points,
                    discarded: false,
                });
                continue;
            }

            match config.missing_result_policy {
                Some(MissingResultPolicy::TreatAsDnc) => race_scores.push(RaceScore {
                    race_id: race.race_id,
                    race_sequence: race.sequence,
                    outcome: FinishOutcome::Code(ScoringCode::Dnc),
                    position: None,
                    points: penalty_points(
                        ScoringCode::Dnc,
                        scored_race.entries_in_race,
                        entries_in_series,
                        &config,
                    ),
                    discarded: false,
                }),
                Some(MissingResultPolicy::Exclude) => {
                    debug!(
                        "Entry {} has no result for race {}; excluded from that race",
                        entry.entry_id, race.race_id
                    );
                }
                None => {
                    report.push_error(ScoringError::AmbiguousResult {
                        entry_id: entry.entry_id,
                        race_id: race.race_id,
                    });
                    continue 'entries;
                }
            }
        }

        let candidates: Vec<DiscardCandidate> = race_scores
            .iter()
            .map(|score| DiscardCandidate {
                sequence: score.race_sequence,
                points: score.points,
                discardable: !(config.exclude_dns_dnc_from_discard
                    && score.outcome.is_non_starter()),
            })
            .collect();

        let outcome = apply_discards(&candidates, &config.discard_rule, direction)?;
        for &idx in &outcome.discarded {
            race_scores[idx].discarded = true;
        }

        let positions: Vec<u32> = race_scores.iter().filter_map(|s| s.position).collect();
        let last_race_points = final_race.and_then(|race_id| {
            race_scores
                .iter()
                .find(|score| score.race_id == race_id)
                .map(|score| score.points)
        });

        contenders.push(Contender {
            net_points: outcome.net,
            record: TieBreakRecord {
                positions: positions.clone(),
                last_race_points,
                discarded_points: outcome.discarded_points(),
            },
            label: entry.label().to_string(),
            sort_key: format!("{}|{}", entry.sail_number, entry.entry_id),
        });

        rows.push(SeriesStanding {
            regatta_id: input.regatta_id,
            division: input.division.clone(),
            entry: (*entry).clone(),
            rank: 0,
            races_sailed: race_scores.len() as u32,
            discards_used: outcome.discarded.len() as u32,
            race_scores,
            total_points: outcome.total,
            net_points: outcome.net,
            wins: positions.iter().filter(|&&p| p == 1).count() as u32,
            podiums: positions.iter().filter(|&&p| p <= 3).count() as u32,
            best_finish: positions.iter().min().copied(),
            worst_finish: positions.iter().max().copied(),
            tied: false,
            tie_breaker: None,
        });
    }

    let tie_breaker = TieBreaker::new(&config.tie_breaking_rules, direction);
    let placements = rank_contenders(&contenders, direction, &tie_breaker);

    let mut slots: Vec<Option<SeriesStanding>> = rows.into_iter().map(Some).collect();
    let standings = placements
        .into_iter()
        .filter_map(|placement| {
            let mut standing = slots[placement.index].take()?;
            standing.rank = placement.rank;
            standing.tied = placement.tied;
            standing.tie_breaker = placement.tie_breaker;
            Some(standing)
        })
        .collect();

    Ok(SeriesComputation { standings, report })
}

fn unique_entries<'a>(entries: &'a [Entry], report: &mut ComputationReport) -> Vec<&'a Entry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| {
            let first = seen.insert(entry.entry_id);
            if !first {
                report.push_error(ScoringError::integrity(
                    None,
                    Some(entry.entry_id),
                    "Duplicate entry registration ignored",
                ));
            }
            first
        })
        .collect()
}

/// Keeps the highest revision per (race, entry) and drops rows pointing at unknown
/// races or entries.
fn effective_results<'a>(
    results: &'a [RaceResult],
    entry_ids: &HashSet<Uuid>,
    race_ids: &HashSet<Uuid>,
    report: &mut ComputationReport,
) -> BTreeMap<(Uuid, Uuid), &'a RaceResult> {
    let mut effective: BTreeMap<(Uuid, Uuid), &RaceResult> = BTreeMap::new();

    for result in results {
        if !race_ids.contains(&result.race_id) {
            report.push_error(ScoringError::integrity(
                Some(result.race_id),
                Some(result.entry_id),
                "Result references a race that is not part of this series",
            ));
            continue;
        }
        if !entry_ids.contains(&result.entry_id) {
            report.push_error(ScoringError::integrity(
                Some(result.race_id),
                Some(result.entry_id),
                "Result references an entry that is not registered in this series",
            ));
            continue;
        }
        if result.outcome == FinishOutcome::Position(0) {
            report.push_error(ScoringError::integrity(
                Some(result.race_id),
                Some(result.entry_id),
                "Finish position must be >= 1",
            ));
            continue;
        }

        let key = (result.race_id, result.entry_id);
        match effective.get(&key) {
            Some(existing) if existing.revision > result.revision => {}
            Some(existing) if existing.revision == result.revision => {
                report.push_error(ScoringError::integrity(
                    Some(result.race_id),
                    Some(result.entry_id),
                    format!(
                        "Two results share revision {}; the later one is ignored",
                        result.revision
                    ),
                ));
            }
            _ => {
                effective.insert(key, result);
            }
        }
    }

    effective
}
