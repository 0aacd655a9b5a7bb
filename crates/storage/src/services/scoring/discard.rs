use crate::error::ScoringError;
use crate::models::{DiscardRule, ScoreDirection};

/// One race score as seen by the discard engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscardCandidate {
    pub sequence: u32,
    pub points: f64,
    /// `false` keeps the race in the total no matter how bad it is.
    pub discardable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscardOutcome {
    /// Indices into the candidate slice, ascending.
    pub discarded: Vec<usize>,
    pub total: f64,
    pub net: f64,
}

impl DiscardOutcome {
    pub fn discarded_points(&self) -> f64 {
        self.total - self.net
    }

    pub fn is_discarded(&self, index: usize) -> bool {
        self.discarded.binary_search(&index).is_ok()
    }
}

/// Decides how many races an entry may drop after sailing `races_sailed` races.
pub trait DiscardStrategy {
    fn discard_count(&self, races_sailed: usize) -> usize;
}

pub struct NoDiscard;

impl DiscardStrategy for NoDiscard {
    fn discard_count(&self, _races_sailed: usize) -> usize {
        0
    }
}

pub struct WorstN {
    pub count: usize,
    pub min_races: usize,
}

impl DiscardStrategy for WorstN {
    fn discard_count(&self, races_sailed: usize) -> usize {
        if races_sailed < self.min_races {
            return 0;
        }
        self.count
    }
}

pub struct Percentage {
    pub pct: f64,
    pub min_races: usize,
}

impl DiscardStrategy for Percentage {
    fn discard_count(&self, races_sailed: usize) -> usize {
        if races_sailed < self.min_races {
            return 0;
        }
        (races_sailed as f64 * self.pct / 100.0 + 1e-9).floor() as usize
    }
}

/// Picks the strategy for a rule, rejecting malformed rules.
pub fn strategy_for(rule: &DiscardRule) -> Result<Box<dyn DiscardStrategy>, ScoringError> {
    rule.validate()?;

    let min_races = rule.min_races_for_discard().unwrap_or(0).max(0) as usize;

    Ok(match rule {
        DiscardRule::None => Box::new(NoDiscard),
        DiscardRule::WorstN { count, .. } => Box::new(WorstN {
            count: (*count).max(0) as usize,
            min_races,
        }),
        DiscardRule::Percentage { pct, .. } => Box::new(Percentage {
            pct: *pct,
            min_races,
        }),
    })
}

/// Selects the races to drop and computes total and net points.
///
/// Worst scores go first; equal scores drop the earliest race first, so the same input
/// always yields the same discard set.
pub fn apply_discards(
    candidates: &[DiscardCandidate],
    rule: &DiscardRule,
    direction: ScoreDirection,
) -> Result<DiscardOutcome, ScoringError> {
    let strategy = strategy_for(rule)?;
    let total: f64 = candidates.iter().map(|c| c.points).sum();

    let mut pool: Vec<usize> = (0..candidates.len())
        .filter(|&idx| candidates[idx].discardable)
        .collect();

    let count = strategy
        .discard_count(candidates.len())
        .min(pool.len());

    pool.sort_by(|&a, &b| {
        // reversed: the worse score sorts first
        direction
            .compare(candidates[b].points, candidates[a].points)
            .then_with(|| candidates[a].sequence.cmp(&candidates[b].sequence))
            .then_with(|| a.cmp(&b))
    });

    let mut discarded: Vec<usize> = pool.into_iter().take(count).collect();
    discarded.sort_unstable();

    let discarded_points: f64 = discarded.iter().map(|&idx| candidates[idx].points).sum();

    Ok(DiscardOutcome {
        discarded,
        total,
        net: total - discarded_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidates(points: &[f64]) -> Vec<DiscardCandidate> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| DiscardCandidate {
                sequence: i as u32 + 1,
                points: *p,
                discardable: true,
            })
            .collect()
    }

    fn worst(count: i32, min: i32) -> DiscardRule {
        DiscardRule::WorstN {
            count,
            min_races_for_discard: Some(min),
        }
    }

    #[test]
    fn test_worst_one_after_three_races() {
        let outcome = apply_discards(
            &candidates(&[1.0, 5.0, 2.0]),
            &worst(1, 3),
            ScoreDirection::LowerIsBetter,
        )
        .unwrap();

        assert_eq!(outcome.discarded, vec![1]);
        assert_eq!(outcome.total, 8.0);
        assert_eq!(outcome.net, 3.0);
    }

    #[test]
    fn test_no_discard_below_threshold() {
        let outcome = apply_discards(
            &candidates(&[1.0, 5.0]),
            &worst(1, 3),
            ScoreDirection::LowerIsBetter,
        )
        .unwrap();

        assert!(outcome.discarded.is_empty());
        assert_eq!(outcome.net, outcome.total);
    }

    #[test]
    fn test_equal_scores_drop_oldest_race_first() {
        let outcome = apply_discards(
            &candidates(&[4.0, 2.0, 4.0, 4.0]),
            &worst(2, 0),
            ScoreDirection::LowerIsBetter,
        )
        .unwrap();

        assert_eq!(outcome.discarded, vec![0, 2]);
    }

    #[test]
    fn test_high_point_drops_lowest_scores() {
        let outcome = apply_discards(
            &candidates(&[10.0, 2.0, 7.0]),
            &worst(1, 0),
            ScoreDirection::HigherIsBetter,
        )
        .unwrap();

        assert_eq!(outcome.discarded, vec![1]);
        assert_eq!(outcome.net, 17.0);
    }

    #[test]
    fn test_percentage_floors_count() {
        let rule = DiscardRule::Percentage {
            pct: 30.0,
            min_races_for_discard: None,
        };
        let outcome = apply_discards(
            &candidates(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]),
            &rule,
            ScoreDirection::LowerIsBetter,
        )
        .unwrap();

        // floor(7 * 30 / 100) = 2
        assert_eq!(outcome.discarded, vec![5, 6]);
        assert_eq!(outcome.net, 15.0);
    }

    #[test]
    fn test_non_discardable_races_are_kept() {
        let mut races = candidates(&[2.0, 9.0, 3.0]);
        races[1].discardable = false;

        let outcome =
            apply_discards(&races, &worst(1, 0), ScoreDirection::LowerIsBetter).unwrap();

        assert_eq!(outcome.discarded, vec![2]);
        assert_eq!(outcome.net, 11.0);
    }

    #[test]
    fn test_count_capped_at_pool_size() {
        let outcome = apply_discards(
            &candidates(&[2.0, 3.0]),
            &worst(5, 0),
            ScoreDirection::LowerIsBetter,
        )
        .unwrap();

        assert_eq!(outcome.discarded, vec![0, 1]);
        assert_eq!(outcome.net, 0.0);
    }

    #[test]
    fn test_malformed_rule_is_rejected() {
        let result = apply_discards(
            &candidates(&[1.0]),
            &worst(-1, 0),
            ScoreDirection::LowerIsBetter,
        );
        assert!(matches!(result, Err(ScoringError::Configuration { .. })));
    }

    fn rule_strategy() -> impl Strategy<Value = DiscardRule> {
        prop_oneof![
            Just(DiscardRule::None),
            (0i32..5, 0i32..8).prop_map(|(count, min)| worst(count, min)),
            (0.0f64..=100.0, 0i32..8).prop_map(|(pct, min)| DiscardRule::Percentage {
                pct,
                min_races_for_discard: Some(min),
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_net_is_total_minus_discarded(
            points in prop::collection::vec(0.0f64..50.0, 0..15),
            rule in rule_strategy(),
        ) {
            let races = candidates(&points);
            let outcome = apply_discards(&races, &rule, ScoreDirection::LowerIsBetter).unwrap();

            let discarded_sum: f64 = outcome.discarded.iter().map(|&i| races[i].points).sum();
            prop_assert!((outcome.net - (outcome.total - discarded_sum)).abs() < 1e-9);
            prop_assert!(outcome.discarded.len() <= races.len());

            let again = apply_discards(&races, &rule, ScoreDirection::LowerIsBetter).unwrap();
            prop_assert_eq!(outcome, again);
        }
    }
}
