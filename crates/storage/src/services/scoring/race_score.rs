use uuid::Uuid;

use crate::error::ComputationReport;
use crate::models::{FinishOutcome, PenaltyRule, RaceResult, ScoringCode, ScoringConfiguration};

/// Points and effective place for one result of one race.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub entry_id: Uuid,
    pub outcome: FinishOutcome,
    pub position: Option<u32>,
    pub points: f64,
}

/// Points for a scoring code.
pub fn penalty_points(
    code: ScoringCode,
    entries_in_race: u32,
    entries_in_series: u32,
    config: &ScoringConfiguration,
) -> f64 {
    match config.penalty_rule(code) {
        PenaltyRule::EntriesInRacePlusOne => {
            config.points_for_place(entries_in_race + 1, entries_in_race)
        }
        PenaltyRule::EntriesInSeriesPlusOne => {
            config.points_for_place(entries_in_series + 1, entries_in_race)
        }
        PenaltyRule::Fixed { points } => points,
    }
}

/// Scores the effective results of a single race.
///
/// `results` must hold at most one result per entry. The entry count of the race is the
/// number of results passed in.
pub fn score_race(
    results: &[RaceResult],
    entries_in_series: u32,
    config: &ScoringConfiguration,
    report: &mut ComputationReport,
) -> Vec<ScoredResult> {
    let entries_in_race = results.len() as u32;

    let mut scored: Vec<ScoredResult> = results
        .iter()
        .filter_map(|result| match result.outcome {
            FinishOutcome::Code(code) => Some(ScoredResult {
                entry_id: result.entry_id,
                outcome: result.outcome,
                position: None,
                points: penalty_points(code, entries_in_race, entries_in_series, config),
            }),
            FinishOutcome::Position(_) => None,
        })
        .collect();

    let finishers: Vec<&RaceResult> = results
        .iter()
        .filter(|result| matches!(result.outcome, FinishOutcome::Position(_)))
        .collect();

    if config.use_corrected_time {
        scored.extend(score_by_corrected_time(&finishers, entries_in_race, config, report));
    } else {
        scored.extend(finishers.iter().filter_map(|result| {
            let position = result.outcome.position()?;
            Some(ScoredResult {
                entry_id: result.entry_id,
                outcome: result.outcome,
                position: Some(position),
                points: config.points_for_place(position, entries_in_race),
            })
        }));
    }

    scored
}

fn score_by_corrected_time(
    finishers: &[&RaceResult],
    entries_in_race: u32,
    config: &ScoringConfiguration,
    report: &mut ComputationReport,
) -> Vec<ScoredResult> {
    let recorded = |result: &RaceResult| result.outcome.position().unwrap_or(u32::MAX);

    let mut timed: Vec<(&RaceResult, f64)> = finishers
        .iter()
        .filter_map(|result| result.corrected_time.map(|time| (*result, time)))
        .collect();
    timed.sort_by(|(a, a_time), (b, b_time)| {
        a_time
            .total_cmp(b_time)
            .then_with(|| recorded(*a).cmp(&recorded(*b)))
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });

    let mut untimed: Vec<&RaceResult> = finishers
        .iter()
        .filter(|result| result.corrected_time.is_none())
        .copied()
        .collect();
    untimed.sort_by(|a, b| {
        recorded(*a)
            .cmp(&recorded(*b))
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });

    let mut scored = Vec::with_capacity(finishers.len());
    let mut place = 1u32;
    let mut idx = 0;

    while idx < timed.len() {
        let group_time = timed[idx].1;
        let group_len = timed[idx..]
            .iter()
            .take_while(|(_, time)| (time - group_time).abs() < 1e-9)
            .count();

        // boats tied on corrected time share the average of the places they occupy
        let points = (place..place + group_len as u32)
            .map(|p| config.points_for_place(p, entries_in_race))
            .sum::<f64>()
            / group_len as f64;

        for (result, _) in &timed[idx..idx + group_len] {
            scored.push(ScoredResult {
                entry_id: result.entry_id,
                outcome: result.outcome,
                position: Some(place),
                points,
            });
        }

        place += group_len as u32;
        idx += group_len;
    }

    for result in untimed {
        report.push_warning(format!(
            "Entry {} finished race {} without a corrected time; ranked after timed finishers",
            result.entry_id, result.race_id
        ));
        scored.push(ScoredResult {
            entry_id: result.entry_id,
            outcome: result.outcome,
            position: Some(place),
            points: config.points_for_place(place, entries_in_race),
        });
        place += 1;
    }

    scored
}
