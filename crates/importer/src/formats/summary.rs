use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use storage::models::SeriesStanding;

use super::csv::format_points;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodiumPlace {
    pub rank: u32,
    pub sail_number: String,
    pub name: String,
    pub net_points: f64,
    pub tied: bool,
}

/// Presentation-ready digest of a set of series standings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsSummary {
    pub entries: usize,
    pub races: usize,
    pub leader: Option<PodiumPlace>,
    pub podium: Vec<PodiumPlace>,
    /// Ranks shared by more than one entry.
    pub tied_ranks: Vec<u32>,
    pub discards_applied: u32,
}

fn podium_place(standing: &SeriesStanding) -> PodiumPlace {
    PodiumPlace {
        rank: standing.rank,
        sail_number: standing.entry.sail_number.clone(),
        name: standing.entry.name.clone(),
        net_points: standing.net_points,
        tied: standing.tied,
    }
}

pub fn summarize(standings: &[SeriesStanding]) -> StandingsSummary {
    let races: BTreeSet<_> = standings
        .iter()
        .flat_map(|s| s.race_scores.iter().map(|r| r.race_id))
        .collect();

    let tied_ranks: BTreeSet<u32> = standings.iter().filter(|s| s.tied).map(|s| s.rank).collect();

    StandingsSummary {
        entries: standings.len(),
        races: races.len(),
        leader: standings.iter().find(|s| s.rank == 1).map(podium_place),
        podium: standings
            .iter()
            .filter(|s| s.rank <= 3)
            .map(podium_place)
            .collect(),
        tied_ranks: tied_ranks.into_iter().collect(),
        discards_applied: standings.iter().map(|s| s.discards_used).sum(),
    }
}

impl fmt::Display for StandingsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} entries, {} races", self.entries, self.races)?;

        match &self.leader {
            Some(leader) => writeln!(
                f,
                "Leader: {} {} ({} pts)",
                leader.sail_number,
                leader.name,
                format_points(leader.net_points)
            )?,
            None => writeln!(f, "Leader: none")?,
        }

        for place in &self.podium {
            writeln!(
                f,
                "  {}{}. {} {} {}",
                place.rank,
                if place.tied { "=" } else { "" },
                place.sail_number,
                place.name,
                format_points(place.net_points)
            )?;
        }

        if !self.tied_ranks.is_empty() {
            let ranks: Vec<String> = self.tied_ranks.iter().map(u32::to_string).collect();
            writeln!(f, "Tied ranks: {}", ranks.join(", "))?;
        }

        write!(f, "Discards applied: {}", self.discards_applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::models::Entry;
    use uuid::Uuid;

    fn standing(sail: &str, rank: u32, net: f64, tied: bool) -> SeriesStanding {
        SeriesStanding {
            regatta_id: Uuid::nil(),
            division: None,
            entry: Entry::new(Uuid::new_v4(), format!("Boat {}", sail), sail),
            rank,
            race_scores: vec![],
            total_points: net + 2.0,
            net_points: net,
            races_sailed: 3,
            discards_used: 1,
            wins: 0,
            podiums: 0,
            best_finish: None,
            worst_finish: None,
            tied,
            tie_breaker: None,
        }
    }

    #[test]
    fn test_summary_reports_ties_and_podium() {
        let summary = summarize(&[
            standing("1", 1, 4.0, false),
            standing("2", 2, 6.0, true),
            standing("3", 2, 6.0, true),
            standing("4", 4, 9.0, false),
        ]);

        assert_eq!(summary.entries, 4);
        assert_eq!(summary.leader.as_ref().map(|l| l.sail_number.as_str()), Some("1"));
        assert_eq!(summary.podium.len(), 3);
        assert_eq!(summary.tied_ranks, vec![2]);
        assert_eq!(summary.discards_applied, 4);

        let text = summary.to_string();
        assert!(text.contains("Leader: 1 Boat 1 (4 pts)"));
        assert!(text.contains("2=. 3 Boat 3 6"));
        assert!(text.contains("Tied ranks: 2"));
    }
}
