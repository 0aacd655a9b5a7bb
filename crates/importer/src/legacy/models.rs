use std::collections::BTreeMap;

use chrono::NaiveDate;
use storage::models::{
    Entry, FinishOutcome, Race, RaceResult, Regatta, ScoringConfiguration, SeriesStanding,
};
use storage::services::scoring::SeriesInput;
use uuid::Uuid;

/// Event header of a legacy file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyEvent {
    pub name: String,
    pub slug: String,
    pub venue: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub division: Option<String>,
}

impl From<&Regatta> for LegacyEvent {
    fn from(regatta: &Regatta) -> Self {
        Self {
            name: regatta.name.clone(),
            slug: regatta.slug.clone(),
            venue: regatta.venue.clone(),
            start_date: regatta.start_date,
            end_date: regatta.end_date,
            division: None,
        }
    }
}

/// Totals a file claims for a competitor. Informational on import; recomputed anyway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedTotals {
    pub rank: Option<u32>,
    pub total: Option<f64>,
    pub net: Option<f64>,
    pub tied: bool,
    pub tie_breaker: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCompetitor {
    /// Competitor number used by result lines.
    pub number: u32,
    pub entry: Entry,
    pub recorded: RecordedTotals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRace {
    /// Race number used by result lines; also the race sequence.
    pub number: u32,
    pub race: Race,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyResult {
    pub competitor: u32,
    pub race: u32,
    /// `None` when the file gave neither a position nor a code.
    pub outcome: Option<FinishOutcome>,
    pub elapsed_time: Option<f64>,
    pub corrected_time: Option<f64>,
    pub revision: Option<u32>,
    /// Computed values as exported.
    pub points: Option<f64>,
    pub place: Option<u32>,
    pub discarded: bool,
}

/// In-memory form of a legacy interchange file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyFile {
    pub event: LegacyEvent,
    pub config: ScoringConfiguration,
    pub competitors: Vec<LegacyCompetitor>,
    pub races: Vec<LegacyRace>,
    pub results: Vec<LegacyResult>,
}

impl LegacyFile {
    /// Builds an exportable file from a scored series. Results are the effective
    /// (highest revision) ones.
    pub fn from_series(event: LegacyEvent, input: &SeriesInput, standings: &[SeriesStanding]) -> Self {
        let mut entries: Vec<&Entry> = input.entries.iter().collect();
        entries.sort_by(|a, b| {
            a.sail_number
                .cmp(&b.sail_number)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });

        let competitors: Vec<LegacyCompetitor> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let standing = standings.iter().find(|s| s.entry.entry_id == entry.entry_id);
                LegacyCompetitor {
                    number: idx as u32 + 1,
                    entry: (*entry).clone(),
                    recorded: standing
                        .map(|s| RecordedTotals {
                            rank: Some(s.rank),
                            total: Some(s.total_points),
                            net: Some(s.net_points),
                            tied: s.tied,
                            tie_breaker: s.tie_breaker.clone(),
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();

        let mut races: Vec<&Race> = input.races.iter().collect();
        races.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.race_id.cmp(&b.race_id)));
        let races: Vec<LegacyRace> = races
            .into_iter()
            .enumerate()
            .map(|(idx, race)| LegacyRace {
                number: idx as u32 + 1,
                race: race.clone(),
            })
            .collect();

        let competitor_number: BTreeMap<Uuid, u32> = competitors
            .iter()
            .map(|c| (c.entry.entry_id, c.number))
            .collect();
        let race_number: BTreeMap<Uuid, u32> =
            races.iter().map(|r| (r.race.race_id, r.number)).collect();

        let mut effective: BTreeMap<(u32, u32), &RaceResult> = BTreeMap::new();
        for result in &input.results {
            let (Some(&comp), Some(&race)) = (
                competitor_number.get(&result.entry_id),
                race_number.get(&result.race_id),
            ) else {
                continue;
            };
            match effective.get(&(comp, race)) {
                Some(existing) if existing.revision >= result.revision => {}
                _ => {
                    effective.insert((comp, race), result);
                }
            }
        }

        let results = effective
            .into_iter()
            .map(|((comp, race), result)| {
                let score = standings
                    .iter()
                    .find(|s| s.entry.entry_id == result.entry_id)
                    .and_then(|s| s.score_for_race(result.race_id));

                LegacyResult {
                    competitor: comp,
                    race,
                    outcome: Some(result.outcome),
                    elapsed_time: result.elapsed_time,
                    corrected_time: result.corrected_time,
                    revision: Some(result.revision),
                    points: score.map(|s| s.points),
                    place: score.and_then(|s| s.position),
                    discarded: score.is_some_and(|s| s.discarded),
                }
            })
            .collect();

        Self {
            event,
            config: input.config.clone().unwrap_or_default(),
            competitors,
            races,
            results,
        }
    }

    pub fn competitor(&self, number: u32) -> Option<&LegacyCompetitor> {
        self.competitors.iter().find(|c| c.number == number)
    }

    pub fn race(&self, number: u32) -> Option<&LegacyRace> {
        self.races.iter().find(|r| r.number == number)
    }

    /// Scoring input equivalent to the file. Results with no outcome or dangling
    /// references are left out; the validator reports them.
    pub fn to_series_input(&self, regatta_id: Uuid) -> SeriesInput {
        let results = self
            .results
            .iter()
            .filter_map(|result| {
                let competitor = self.competitor(result.competitor)?;
                let race = self.race(result.race)?;
                Some(RaceResult {
                    race_id: race.race.race_id,
                    entry_id: competitor.entry.entry_id,
                    outcome: result.outcome?,
                    elapsed_time: result.elapsed_time,
                    corrected_time: result.corrected_time,
                    revision: result.revision.unwrap_or(1),
                })
            })
            .collect();

        SeriesInput {
            regatta_id,
            division: self.event.division.clone(),
            entries: self.competitors.iter().map(|c| c.entry.clone()).collect(),
            races: self.races.iter().map(|r| r.race.clone()).collect(),
            results,
            config: Some(self.config.clone()),
            load_errors: Vec::new(),
        }
    }
}
