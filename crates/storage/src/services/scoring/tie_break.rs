use std::cmp::Ordering;

use crate::models::{ScoreDirection, TieBreakRule, points_key};

/// What the tie-break rules need to know about one contender.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TieBreakRecord {
    /// Finishing places of every scored race, discarded ones included.
    pub positions: Vec<u32>,
    /// Points in the final race of the series, if the contender has a score there.
    pub last_race_points: Option<f64>,
    pub discarded_points: f64,
}

impl TieBreakRecord {
    fn count_of_place(&self, place: u32) -> usize {
        self.positions.iter().filter(|&&p| p == place).count()
    }
}

pub trait TieBreakStrategy {
    fn rule(&self) -> TieBreakRule;

    /// `Ordering::Less` ranks `a` ahead of `b`.
    fn compare(&self, a: &TieBreakRecord, b: &TieBreakRecord, direction: ScoreDirection)
    -> Ordering;
}

/// More 1sts wins, then more 2nds, and so on.
pub struct MostFirsts;

impl TieBreakStrategy for MostFirsts {
    fn rule(&self) -> TieBreakRule {
        TieBreakRule::MostFirsts
    }

    fn compare(&self, a: &TieBreakRecord, b: &TieBreakRecord, _: ScoreDirection) -> Ordering {
        let deepest = a
            .positions
            .iter()
            .chain(&b.positions)
            .copied()
            .max()
            .unwrap_or(0);

        (1..=deepest)
            .map(|place| b.count_of_place(place).cmp(&a.count_of_place(place)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Better score in the last race. Having a score beats having none.
pub struct HeadToHeadLastRace;

impl TieBreakStrategy for HeadToHeadLastRace {
    fn rule(&self) -> TieBreakRule {
        TieBreakRule::HeadToHeadLastRace
    }

    fn compare(
        &self,
        a: &TieBreakRecord,
        b: &TieBreakRecord,
        direction: ScoreDirection,
    ) -> Ordering {
        match (a.last_race_points, b.last_race_points) {
            (Some(a_points), Some(b_points)) => direction.compare_rounded(a_points, b_points),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Better aggregate of discarded scores.
pub struct LowestDiscardedPoints;

impl TieBreakStrategy for LowestDiscardedPoints {
    fn rule(&self) -> TieBreakRule {
        TieBreakRule::LowestDiscardedPoints
    }

    fn compare(
        &self,
        a: &TieBreakRecord,
        b: &TieBreakRecord,
        direction: ScoreDirection,
    ) -> Ordering {
        direction.compare_rounded(a.discarded_points, b.discarded_points)
    }
}

pub fn strategy_for(rule: TieBreakRule) -> Box<dyn TieBreakStrategy> {
    match rule {
        TieBreakRule::MostFirsts => Box::new(MostFirsts),
        TieBreakRule::HeadToHeadLastRace => Box::new(HeadToHeadLastRace),
        TieBreakRule::LowestDiscardedPoints => Box::new(LowestDiscardedPoints),
    }
}

/// Ordered rule list, evaluated left to right until one discriminates.
pub struct TieBreaker {
    strategies: Vec<Box<dyn TieBreakStrategy>>,
    direction: ScoreDirection,
}

impl TieBreaker {
    pub fn new(rules: &[TieBreakRule], direction: ScoreDirection) -> Self {
        Self {
            strategies: rules.iter().map(|rule| strategy_for(*rule)).collect(),
            direction,
        }
    }

    /// The ordering and the rule that produced it; `None` when no rule discriminates.
    pub fn compare(
        &self,
        a: &TieBreakRecord,
        b: &TieBreakRecord,
    ) -> (Ordering, Option<TieBreakRule>) {
        self.strategies
            .iter()
            .map(|strategy| (strategy.compare(a, b, self.direction), strategy.rule()))
            .find(|(ordering, _)| ordering.is_ne())
            .map(|(ordering, rule)| (ordering, Some(rule)))
            .unwrap_or((Ordering::Equal, None))
    }
}

/// Input of [`rank_contenders`].
#[derive(Debug, Clone)]
pub struct Contender {
    pub net_points: f64,
    pub record: TieBreakRecord,
    /// Human-readable name used in tie-break explanations.
    pub label: String,
    /// Final ordering key for contenders that stay tied, so output order is stable.
    pub sort_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Index into the contender slice.
    pub index: usize,
    pub rank: u32,
    pub tied: bool,
    pub tie_breaker: Option<String>,
}

/// Orders contenders by net points, breaks ties, and assigns competition ranks
/// (tied contenders share a rank and the next rank is skipped).
pub fn rank_contenders(
    contenders: &[Contender],
    direction: ScoreDirection,
    tie_breaker: &TieBreaker,
) -> Vec<Placement> {
    let same_net = |a: &Contender, b: &Contender| points_key(a.net_points) == points_key(b.net_points);

    let mut order: Vec<usize> = (0..contenders.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, cb) = (&contenders[a], &contenders[b]);
        direction
            .compare_rounded(ca.net_points, cb.net_points)
            .then_with(|| tie_breaker.compare(&ca.record, &cb.record).0)
            .then_with(|| ca.sort_key.cmp(&cb.sort_key))
    });

    let mut placements: Vec<Placement> = Vec::with_capacity(order.len());

    for (pos, &idx) in order.iter().enumerate() {
        let current = &contenders[idx];
        let tied_with_previous = pos > 0 && {
            let previous = &contenders[order[pos - 1]];
            same_net(previous, current)
                && tie_breaker.compare(&previous.record, &current.record).0 == Ordering::Equal
        };

        let rank = if tied_with_previous {
            placements[pos - 1].rank
        } else {
            pos as u32 + 1
        };

        if tied_with_previous {
            placements[pos - 1].tied = true;
        }

        placements.push(Placement {
            index: idx,
            rank,
            tied: tied_with_previous,
            tie_breaker: None,
        });
    }

    for pos in 0..order.len() {
        let current = &contenders[order[pos]];
        let neighbour = [pos.checked_sub(1), Some(pos + 1)]
            .into_iter()
            .flatten()
            .filter(|&n| n < order.len())
            .find(|&n| same_net(&contenders[order[n]], current));

        let Some(neighbour) = neighbour else {
            continue;
        };

        let other = &contenders[order[neighbour]];
        let explanation = match tie_breaker.compare(&current.record, &other.record) {
            (_, Some(rule)) => format!("{} vs {}", rule, other.label),
            (_, None) => format!("unresolved tie with {}", other.label),
        };
        placements[pos].tie_breaker = Some(explanation);
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(positions: &[u32]) -> TieBreakRecord {
        TieBreakRecord {
            positions: positions.to_vec(),
            last_race_points: positions.last().map(|p| *p as f64),
            discarded_points: 0.0,
        }
    }

    fn contender(label: &str, net: f64, record: TieBreakRecord) -> Contender {
        Contender {
            net_points: net,
            record,
            label: label.to_string(),
            sort_key: label.to_string(),
        }
    }

    #[test]
    fn test_most_firsts_cascades_to_seconds() {
        let a = record(&[1, 2, 2, 5]);
        let b = record(&[1, 3, 3, 3]);
        assert_eq!(
            MostFirsts.compare(&a, &b, ScoreDirection::LowerIsBetter),
            Ordering::Less
        );
        assert_eq!(
            MostFirsts.compare(&b, &a, ScoreDirection::LowerIsBetter),
            Ordering::Greater
        );
    }

    #[test]
    fn test_head_to_head_prefers_contender_with_score() {
        let mut a = record(&[2]);
        let b = record(&[1]);
        assert_eq!(
            HeadToHeadLastRace.compare(&a, &b, ScoreDirection::LowerIsBetter),
            Ordering::Greater
        );

        a.last_race_points = None;
        assert_eq!(
            HeadToHeadLastRace.compare(&b, &a, ScoreDirection::LowerIsBetter),
            Ordering::Less
        );
    }

    #[test]
    fn test_identical_counts_remain_tied() {
        let tie_breaker = TieBreaker::new(&[TieBreakRule::MostFirsts], ScoreDirection::LowerIsBetter);
        let contenders = vec![
            contender("A", 6.0, record(&[1, 2, 3])),
            contender("B", 6.0, record(&[2, 1, 3])),
            contender("C", 9.0, record(&[3, 3, 3])),
        ];

        let placements = rank_contenders(&contenders, ScoreDirection::LowerIsBetter, &tie_breaker);

        assert_eq!(placements[0].rank, 1);
        assert_eq!(placements[1].rank, 1);
        assert!(placements[0].tied && placements[1].tied);
        assert_eq!(placements[2].rank, 3);
        assert!(!placements[2].tied);
        assert_eq!(
            placements[0].tie_breaker.as_deref(),
            Some("unresolved tie with B")
        );
        assert_eq!(placements[2].tie_breaker, None);
    }

    #[test]
    fn test_most_firsts_separates_when_counts_differ() {
        let tie_breaker = TieBreaker::new(
            &[TieBreakRule::MostFirsts, TieBreakRule::HeadToHeadLastRace],
            ScoreDirection::LowerIsBetter,
        );
        let contenders = vec![
            contender("A", 6.0, record(&[2, 2, 2])),
            contender("B", 6.0, record(&[1, 2, 3])),
        ];

        let placements = rank_contenders(&contenders, ScoreDirection::LowerIsBetter, &tie_breaker);

        assert_eq!(placements[0].index, 1);
        assert_eq!(placements[0].rank, 1);
        assert_eq!(placements[1].rank, 2);
        assert!(!placements[0].tied);
        assert_eq!(placements[0].tie_breaker.as_deref(), Some("most_firsts vs A"));
    }

    #[test]
    fn test_falls_through_to_last_race() {
        let tie_breaker = TieBreaker::new(
            &[TieBreakRule::MostFirsts, TieBreakRule::HeadToHeadLastRace],
            ScoreDirection::LowerIsBetter,
        );
        let contenders = vec![
            contender("A", 6.0, record(&[1, 3, 2])),
            contender("B", 6.0, record(&[2, 3, 1])),
        ];

        let placements = rank_contenders(&contenders, ScoreDirection::LowerIsBetter, &tie_breaker);

        assert_eq!(placements[0].index, 1);
        assert_eq!(
            placements[1].tie_breaker.as_deref(),
            Some("head_to_head_last_race vs B")
        );
    }

    #[test]
    fn test_lowest_discarded_points_follows_direction() {
        let mut a = record(&[1]);
        let mut b = record(&[1]);
        a.discarded_points = 4.0;
        b.discarded_points = 7.0;

        assert_eq!(
            LowestDiscardedPoints.compare(&a, &b, ScoreDirection::LowerIsBetter),
            Ordering::Less
        );
        assert_eq!(
            LowestDiscardedPoints.compare(&a, &b, ScoreDirection::HigherIsBetter),
            Ordering::Greater
        );
    }
}
