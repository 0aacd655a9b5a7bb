use std::collections::{BTreeMap, HashMap};

use rust_decimal::prelude::ToPrimitive;
use tracing::info;
use uuid::Uuid;

use super::discard::{DiscardCandidate, apply_discards};
use super::tie_break::{Contender, TieBreakRecord, TieBreaker, rank_contenders};
use crate::error::{ComputationReport, ScoringError};
use crate::models::{
    ScoringConfiguration, SeasonRaceResult, SeasonRegatta, SeasonRegattaResult, SeasonStanding,
    SeriesStanding,
};

/// A member regatta together with the outcome of scoring it.
#[derive(Debug, Clone)]
pub struct SeasonRegattaInput {
    pub season_regatta: SeasonRegatta,
    pub standings: Result<Vec<SeriesStanding>, ScoringError>,
}

#[derive(Debug, Clone)]
pub struct SeasonInput {
    pub season_id: Uuid,
    /// Season-level discard and tie-break settings; `None` uses the defaults.
    pub config: Option<ScoringConfiguration>,
    pub regattas: Vec<SeasonRegattaInput>,
}

#[derive(Debug, Clone, Default)]
pub struct SeasonComputation {
    /// Grouped by division (unassigned first), ranked within each division.
    pub standings: Vec<SeasonStanding>,
    pub report: ComputationReport,
}

/// Standings of one sailor accumulated while walking the season's regattas.
struct Competitor<'a> {
    user_id: Uuid,
    entry_ids: Vec<Uuid>,
    latest: &'a SeriesStanding,
    regattas: Vec<SeasonRegattaResult>,
    races: Vec<SeasonRaceResult>,
}

/// One division's worth of competitors plus its season race numbering.
#[derive(Default)]
struct DivisionTable<'a> {
    competitors: Vec<Competitor<'a>>,
    by_entry: HashMap<Uuid, usize>,
    by_user: HashMap<Uuid, usize>,
    race_numbers: HashMap<Uuid, u32>,
}

impl<'a> DivisionTable<'a> {
    /// Finds the competitor behind an entry: a known `entry_id` wins, then `user_id`.
    fn resolve(&mut self, standing: &'a SeriesStanding) -> usize {
        let entry = &standing.entry;

        let found = self
            .by_entry
            .get(&entry.entry_id)
            .or_else(|| entry.user_id.as_ref().and_then(|user| self.by_user.get(user)))
            .copied();

        let idx = match found {
            Some(idx) => idx,
            None => {
                let user_id = entry.user_id.unwrap_or(entry.entry_id);
                self.competitors.push(Competitor {
                    user_id,
                    entry_ids: Vec::new(),
                    latest: standing,
                    regattas: Vec::new(),
                    races: Vec::new(),
                });
                let idx = self.competitors.len() - 1;
                self.by_user.insert(user_id, idx);
                idx
            }
        };

        self.by_entry.insert(entry.entry_id, idx);
        if let Some(user) = entry.user_id {
            self.by_user.entry(user).or_insert(idx);
        }
        let competitor = &mut self.competitors[idx];
        if !competitor.entry_ids.contains(&entry.entry_id) {
            competitor.entry_ids.push(entry.entry_id);
        }
        competitor.latest = standing;
        idx
    }

    fn number_races(&mut self, standings: &[&SeriesStanding]) {
        let mut races: Vec<(u32, Uuid)> = standings
            .iter()
            .flat_map(|s| s.race_scores.iter().map(|r| (r.race_sequence, r.race_id)))
            .collect();
        races.sort();
        races.dedup();

        for (_, race_id) in races {
            let next = self.race_numbers.len() as u32 + 1;
            self.race_numbers.entry(race_id).or_insert(next);
        }
    }
}

/// Rolls regatta standings up into season standings per division.
pub fn aggregate_season_standings(input: &SeasonInput) -> Result<SeasonComputation, ScoringError> {
    let config = input.config.clone().unwrap_or_default();
    config.validate()?;

    let direction = config.direction();
    let mut report = ComputationReport::default();

    let mut regattas: Vec<&SeasonRegattaInput> = input.regattas.iter().collect();
    regattas.sort_by(|a, b| {
        a.season_regatta
            .sequence
            .cmp(&b.season_regatta.sequence)
            .then_with(|| a.season_regatta.regatta_id.cmp(&b.season_regatta.regatta_id))
    });

    let mut divisions: BTreeMap<Option<String>, DivisionTable> = BTreeMap::new();

    for regatta in regattas {
        let membership = &regatta.season_regatta;

        let standings = match &regatta.standings {
            Ok(standings) => standings,
            Err(err) => {
                report.push_error(ScoringError::RegattaFailed {
                    regatta_id: membership.regatta_id,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let Some(weight) = membership.weight.to_f64().filter(|w| w.is_finite() && *w >= 0.0)
        else {
            report.push_error(ScoringError::RegattaFailed {
                regatta_id: membership.regatta_id,
                reason: format!("Invalid regatta weight {}", membership.weight),
            });
            continue;
        };

        let mut by_division: BTreeMap<Option<String>, Vec<&SeriesStanding>> = BTreeMap::new();
        for standing in standings {
            by_division
                .entry(standing.division.clone())
                .or_default()
                .push(standing);
        }

        for (division, group) in by_division {
            let table = divisions.entry(division).or_default();
            table.number_races(&group);

            for standing in group {
                let idx = table.resolve(standing);
                let race_numbers = &table.race_numbers;
                let competitor = &mut table.competitors[idx];

                competitor.regattas.push(SeasonRegattaResult {
                    regatta_id: membership.regatta_id,
                    sequence: membership.sequence,
                    entry_id: standing.entry.entry_id,
                    weight,
                    is_championship: membership.is_championship,
                    rank: standing.rank,
                    net_points: standing.net_points,
                    weighted_points: standing.net_points * weight,
                });

                competitor
                    .races
                    .extend(standing.race_scores.iter().filter_map(|score| {
                        Some(SeasonRaceResult {
                            season_race_number: *race_numbers.get(&score.race_id)?,
                            regatta_id: membership.regatta_id,
                            race_id: score.race_id,
                            outcome: score.outcome,
                            position: score.position,
                            points: score.points * weight,
                            regatta_discarded: score.discarded,
                            discarded: false,
                        })
                    }));
            }
        }
    }

    let tie_breaker = TieBreaker::new(&config.tie_breaking_rules, direction);
    let mut season_standings = Vec::new();

    for (division, table) in divisions {
        let last_slot = table.race_numbers.values().max().copied();
        let mut rows = Vec::with_capacity(table.competitors.len());
        let mut contenders = Vec::with_capacity(table.competitors.len());

        for mut competitor in table.competitors {
            competitor.races.sort_by_key(|race| race.season_race_number);

            let counted: Vec<usize> = (0..competitor.races.len())
                .filter(|&idx| !competitor.races[idx].regatta_discarded)
                .collect();
            let candidates: Vec<DiscardCandidate> = counted
                .iter()
                .map(|&idx| {
                    let race = &competitor.races[idx];
                    DiscardCandidate {
                        sequence: race.season_race_number,
                        points: race.points,
                        discardable: !(config.exclude_dns_dnc_from_discard
                            && race.outcome.is_non_starter()),
                    }
                })
                .collect();

            let outcome = apply_discards(&candidates, &config.discard_rule, direction)?;
            let mut discards = Vec::with_capacity(outcome.discarded.len());
            for &candidate in &outcome.discarded {
                let race = &mut competitor.races[counted[candidate]];
                race.discarded = true;
                discards.push(race.season_race_number);
            }

            let total: f64 = competitor.regattas.iter().map(|r| r.weighted_points).sum();
            let net = total - outcome.discarded_points();

            let ranks: Vec<u32> = competitor.regattas.iter().map(|r| r.rank).collect();
            let positions: Vec<u32> = competitor
                .races
                .iter()
                .filter(|race| !race.regatta_discarded)
                .filter_map(|race| race.position)
                .collect();
            let last_race_points = last_slot.and_then(|slot| {
                competitor
                    .races
                    .iter()
                    .find(|race| race.season_race_number == slot && !race.regatta_discarded)
                    .map(|race| race.points)
            });

            let latest: &SeriesStanding = competitor.latest;
            let entry = &latest.entry;
            contenders.push(Contender {
                net_points: net,
                record: TieBreakRecord {
                    positions,
                    last_race_points,
                    discarded_points: outcome.discarded_points(),
                },
                label: entry.label().to_string(),
                sort_key: format!("{}|{}", entry.sail_number, competitor.user_id),
            });

            rows.push(SeasonStanding {
                season_id: input.season_id,
                division: division.clone(),
                user_id: competitor.user_id,
                entry_ids: competitor.entry_ids,
                name: entry.name.clone(),
                sail_number: entry.sail_number.clone(),
                rank: 0,
                regattas_sailed: competitor.regattas.len() as u32,
                races_sailed: counted.len() as u32,
                regatta_results: competitor.regattas,
                race_results: competitor.races,
                discards,
                total_points: total,
                net_points: net,
                wins: ranks.iter().filter(|&&r| r == 1).count() as u32,
                podiums: ranks.iter().filter(|&&r| r <= 3).count() as u32,
                best_finish: ranks.iter().min().copied(),
                worst_finish: ranks.iter().max().copied(),
                tied: false,
                tie_breaker: None,
            });
        }

        let mut slots: Vec<Option<SeasonStanding>> = rows.into_iter().map(Some).collect();
        for placement in rank_contenders(&contenders, direction, &tie_breaker) {
            if let Some(mut standing) = slots[placement.index].take() {
                standing.rank = placement.rank;
                standing.tied = placement.tied;
                standing.tie_breaker = placement.tie_breaker;
                season_standings.push(standing);
            }
        }
    }

    info!(
        "Aggregated {} season standings for season {}",
        season_standings.len(),
        input.season_id
    );

    Ok(SeasonComputation {
        standings: season_standings,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscardRule, Entry, FinishOutcome, RaceScore, TieBreakRule};
    use rust_decimal::Decimal;

    fn standing(
        regatta_id: Uuid,
        entry: &Entry,
        rank: u32,
        races: &[(Uuid, u32, f64, bool)],
    ) -> SeriesStanding {
        let race_scores: Vec<RaceScore> = races
            .iter()
            .enumerate()
            .map(|(i, (race_id, position, points, discarded))| RaceScore {
                race_id: *race_id,
                race_sequence: i as u32 + 1,
                outcome: FinishOutcome::Position(*position),
                position: Some(*position),
                points: *points,
                discarded: *discarded,
            })
            .collect();
        let total: f64 = race_scores.iter().map(|r| r.points).sum();
        let net: f64 = race_scores.iter().filter(|r| !r.discarded).map(|r| r.points).sum();

        SeriesStanding {
            regatta_id,
            division: entry.division.clone(),
            entry: entry.clone(),
            rank,
            races_sailed: race_scores.len() as u32,
            discards_used: race_scores.iter().filter(|r| r.discarded).count() as u32,
            race_scores,
            total_points: total,
            net_points: net,
            wins: 0,
            podiums: 0,
            best_finish: None,
            worst_finish: None,
            tied: false,
            tie_breaker: None,
        }
    }

    fn membership(season_id: Uuid, regatta_id: Uuid, sequence: u32, weight: Decimal) -> SeasonRegatta {
        SeasonRegatta {
            season_id,
            regatta_id,
            sequence,
            weight,
            is_championship: false,
        }
    }

    fn sailor(user_id: Uuid, sail: &str) -> Entry {
        Entry {
            user_id: Some(user_id),
            ..Entry::new(Uuid::new_v4(), format!("Sailor {}", sail), sail)
        }
    }

    #[test]
    fn test_total_is_weighted_sum_of_regatta_nets() {
        let season_id = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());
        let (a1, b1, a2, b2) = (sailor(alice, "1"), sailor(bob, "2"), sailor(alice, "1"), sailor(bob, "2"));
        let races1 = (Uuid::new_v4(), Uuid::new_v4());
        let races2 = (Uuid::new_v4(), Uuid::new_v4());

        let input = SeasonInput {
            season_id,
            config: None,
            regattas: vec![
                SeasonRegattaInput {
                    season_regatta: membership(season_id, r1, 1, Decimal::ONE),
                    standings: Ok(vec![
                        standing(r1, &a1, 1, &[(races1.0, 1, 1.0, false), (races1.1, 1, 1.0, false)]),
                        standing(r1, &b1, 2, &[(races1.0, 2, 2.0, false), (races1.1, 2, 2.0, false)]),
                    ]),
                },
                SeasonRegattaInput {
                    season_regatta: membership(season_id, r2, 2, Decimal::new(15, 1)),
                    standings: Ok(vec![
                        standing(r2, &b2, 1, &[(races2.0, 1, 1.0, false), (races2.1, 1, 1.0, false)]),
                        standing(r2, &a2, 2, &[(races2.0, 2, 2.0, false), (races2.1, 2, 2.0, false)]),
                    ]),
                },
            ],
        };

        let computation = aggregate_season_standings(&input).unwrap();
        assert_eq!(computation.standings.len(), 2);

        let alice_row = computation.standings.iter().find(|s| s.user_id == alice).unwrap();
        // 2 * 1.0 + 4 * 1.5
        assert_eq!(alice_row.total_points, 8.0);
        assert_eq!(alice_row.net_points, 8.0);
        assert_eq!(alice_row.entry_ids, vec![a1.entry_id, a2.entry_id]);
        assert_eq!(alice_row.regattas_sailed, 2);
        assert_eq!(alice_row.wins, 1);
        let numbers: Vec<u32> = alice_row.race_results.iter().map(|r| r.season_race_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);

        let bob_row = computation.standings.iter().find(|s| s.user_id == bob).unwrap();
        // 4 * 1.0 + 2 * 1.5
        assert_eq!(bob_row.total_points, 7.0);
        assert_eq!(bob_row.rank, 1);
        assert_eq!(alice_row.rank, 2);
    }

    #[test]
    fn test_regatta_discards_are_not_counted_or_rediscarded() {
        let season_id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let regatta_id = Uuid::new_v4();
        let entry = sailor(user, "7");
        let races: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        let input = SeasonInput {
            season_id,
            config: Some(ScoringConfiguration {
                discard_rule: DiscardRule::WorstN {
                    count: 1,
                    min_races_for_discard: Some(3),
                },
                ..Default::default()
            }),
            regattas: vec![SeasonRegattaInput {
                season_regatta: membership(season_id, regatta_id, 1, Decimal::TWO),
                standings: Ok(vec![standing(
                    regatta_id,
                    &entry,
                    1,
                    &[
                        (races[0], 1, 1.0, false),
                        (races[1], 9, 9.0, true),
                        (races[2], 3, 3.0, false),
                        (races[3], 2, 2.0, false),
                    ],
                )]),
            }],
        };

        let computation = aggregate_season_standings(&input).unwrap();
        let row = &computation.standings[0];

        // weighted regatta net is (1 + 3 + 2) * 2 = 12; the season drops the doubled 3
        assert_eq!(row.total_points, 12.0);
        assert_eq!(row.net_points, 6.0);
        assert_eq!(row.discards, vec![3]);
        assert_eq!(row.races_sailed, 3);
        assert!(row.race_results[1].regatta_discarded);
        assert!(!row.race_results[1].discarded);
    }

    #[test]
    fn test_season_min_races_counts_across_regattas() {
        let season_id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());

        let input = SeasonInput {
            season_id,
            config: Some(ScoringConfiguration {
                discard_rule: DiscardRule::WorstN {
                    count: 1,
                    min_races_for_discard: Some(4),
                },
                ..Default::default()
            }),
            regattas: vec![
                SeasonRegattaInput {
                    season_regatta: membership(season_id, r1, 1, Decimal::ONE),
                    standings: Ok(vec![standing(
                        r1,
                        &sailor(user, "5"),
                        1,
                        &[(Uuid::new_v4(), 1, 1.0, false), (Uuid::new_v4(), 4, 4.0, false)],
                    )]),
                },
                SeasonRegattaInput {
                    season_regatta: membership(season_id, r2, 2, Decimal::ONE),
                    standings: Ok(vec![standing(
                        r2,
                        &sailor(user, "5"),
                        1,
                        &[(Uuid::new_v4(), 2, 2.0, false), (Uuid::new_v4(), 1, 1.0, false)],
                    )]),
                },
            ],
        };

        let computation = aggregate_season_standings(&input).unwrap();
        let row = &computation.standings[0];

        assert_eq!(row.races_sailed, 4);
        assert_eq!(row.discards, vec![2]);
        assert_eq!(row.net_points, 4.0);
    }

    #[test]
    fn test_failed_regatta_is_reported_and_excluded() {
        let season_id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let (good, bad) = (Uuid::new_v4(), Uuid::new_v4());

        let input = SeasonInput {
            season_id,
            config: None,
            regattas: vec![
                SeasonRegattaInput {
                    season_regatta: membership(season_id, good, 1, Decimal::ONE),
                    standings: Ok(vec![standing(
                        good,
                        &sailor(user, "3"),
                        1,
                        &[(Uuid::new_v4(), 1, 1.0, false)],
                    )]),
                },
                SeasonRegattaInput {
                    season_regatta: membership(season_id, bad, 2, Decimal::ONE),
                    standings: Err(ScoringError::configuration("discard count must be >= 0")),
                },
            ],
        };

        let computation = aggregate_season_standings(&input).unwrap();

        assert_eq!(computation.standings[0].regattas_sailed, 1);
        assert_eq!(
            computation.report.errors,
            vec![ScoringError::RegattaFailed {
                regatta_id: bad,
                reason: "Configuration error: discard count must be >= 0".to_string(),
            }]
        );
    }

    #[test]
    fn test_entry_without_user_is_followed_by_entry_id() {
        let season_id = Uuid::new_v4();
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());
        let guest = Entry::new(Uuid::new_v4(), "Guest", "GST 1");

        let input = SeasonInput {
            season_id,
            config: None,
            regattas: vec![
                SeasonRegattaInput {
                    season_regatta: membership(season_id, r1, 1, Decimal::ONE),
                    standings: Ok(vec![standing(r1, &guest, 1, &[(Uuid::new_v4(), 1, 1.0, false)])]),
                },
                SeasonRegattaInput {
                    season_regatta: membership(season_id, r2, 2, Decimal::ONE),
                    standings: Ok(vec![standing(r2, &guest, 1, &[(Uuid::new_v4(), 1, 1.0, false)])]),
                },
            ],
        };

        let computation = aggregate_season_standings(&input).unwrap();

        assert_eq!(computation.standings.len(), 1);
        assert_eq!(computation.standings[0].user_id, guest.entry_id);
        assert_eq!(computation.standings[0].entry_ids, vec![guest.entry_id]);
        assert_eq!(computation.standings[0].total_points, 2.0);
    }

    #[test]
    fn test_user_id_learned_later_links_new_entry() {
        let season_id = Uuid::new_v4();
        let (r1, r2, r3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let user = Uuid::new_v4();
        let anonymous = Entry::new(Uuid::new_v4(), "Guest", "GST 1");
        let claimed = Entry {
            user_id: Some(user),
            ..anonymous.clone()
        };
        let fresh = sailor(user, "GST 1");

        let input = SeasonInput {
            season_id,
            config: None,
            regattas: [(r1, &anonymous), (r2, &claimed), (r3, &fresh)]
                .into_iter()
                .enumerate()
                .map(|(i, (regatta_id, entry))| SeasonRegattaInput {
                    season_regatta: membership(season_id, regatta_id, i as u32 + 1, Decimal::ONE),
                    standings: Ok(vec![standing(
                        regatta_id,
                        entry,
                        1,
                        &[(Uuid::new_v4(), 1, 1.0, false)],
                    )]),
                })
                .collect(),
        };

        let computation = aggregate_season_standings(&input).unwrap();

        assert_eq!(computation.standings.len(), 1);
        let row = &computation.standings[0];
        assert_eq!(row.entry_ids, vec![anonymous.entry_id, fresh.entry_id]);
        assert_eq!(row.regattas_sailed, 3);
        assert_eq!(row.total_points, 3.0);
    }

    #[test]
    fn test_season_tie_broken_by_most_firsts() {
        let season_id = Uuid::new_v4();
        let regatta_id = Uuid::new_v4();
        let (a, b) = (sailor(Uuid::new_v4(), "1"), sailor(Uuid::new_v4(), "2"));
        let (race1, race2) = (Uuid::new_v4(), Uuid::new_v4());

        let input = SeasonInput {
            season_id,
            config: None,
            regattas: vec![SeasonRegattaInput {
                season_regatta: membership(season_id, regatta_id, 1, Decimal::ONE),
                standings: Ok(vec![
                    standing(regatta_id, &a, 1, &[(race1, 1, 1.0, false), (race2, 3, 3.0, false)]),
                    standing(regatta_id, &b, 2, &[(race1, 2, 2.0, false), (race2, 2, 2.0, false)]),
                ]),
            }],
        };

        let computation = aggregate_season_standings(&input).unwrap();

        let a_row = computation.standings.iter().find(|s| s.sail_number == "1").unwrap();
        let b_row = computation.standings.iter().find(|s| s.sail_number == "2").unwrap();
        assert_eq!(a_row.net_points, b_row.net_points);
        assert_eq!((a_row.rank, b_row.rank), (1, 2));
        assert!(!a_row.tied && !b_row.tied);
        assert!(a_row.tie_breaker.is_some());
    }

    #[test]
    fn test_unresolved_season_tie_shares_rank() {
        let season_id = Uuid::new_v4();
        let regatta_id = Uuid::new_v4();
        let (a, b, c) = (
            sailor(Uuid::new_v4(), "1"),
            sailor(Uuid::new_v4(), "2"),
            sailor(Uuid::new_v4(), "3"),
        );
        let (race1, race2) = (Uuid::new_v4(), Uuid::new_v4());

        let input = SeasonInput {
            season_id,
            config: Some(ScoringConfiguration {
                tie_breaking_rules: vec![TieBreakRule::MostFirsts],
                ..Default::default()
            }),
            regattas: vec![SeasonRegattaInput {
                season_regatta: membership(season_id, regatta_id, 1, Decimal::ONE),
                standings: Ok(vec![
                    standing(regatta_id, &a, 1, &[(race1, 1, 1.0, false), (race2, 2, 2.0, false)]),
                    standing(regatta_id, &b, 1, &[(race1, 2, 2.0, false), (race2, 1, 1.0, false)]),
                    standing(regatta_id, &c, 3, &[(race1, 3, 3.0, false), (race2, 3, 3.0, false)]),
                ]),
            }],
        };

        let computation = aggregate_season_standings(&input).unwrap();

        let ranks: Vec<(String, u32, bool)> = computation
            .standings
            .iter()
            .map(|s| (s.sail_number.clone(), s.rank, s.tied))
            .collect();
        assert_eq!(
            ranks,
            vec![
                ("1".to_string(), 1, true),
                ("2".to_string(), 1, true),
                ("3".to_string(), 3, false),
            ]
        );
        assert!(
            computation.standings[0]
                .tie_breaker
                .as_deref()
                .is_some_and(|text| text.starts_with("unresolved tie"))
        );
    }

    #[test]
    fn test_negative_weight_fails_regatta() {
        let season_id = Uuid::new_v4();
        let regatta_id = Uuid::new_v4();

        let input = SeasonInput {
            season_id,
            config: None,
            regattas: vec![SeasonRegattaInput {
                season_regatta: membership(season_id, regatta_id, 1, Decimal::NEGATIVE_ONE),
                standings: Ok(vec![standing(
                    regatta_id,
                    &sailor(Uuid::new_v4(), "9"),
                    1,
                    &[(Uuid::new_v4(), 1, 1.0, false)],
                )]),
            }],
        };

        let computation = aggregate_season_standings(&input).unwrap();

        assert!(computation.standings.is_empty());
        assert!(matches!(
            computation.report.errors[0],
            ScoringError::RegattaFailed { .. }
        ));
    }
}
