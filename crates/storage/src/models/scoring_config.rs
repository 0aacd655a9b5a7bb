use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ScoringError;
use crate::models::ScoringCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSystem {
    #[default]
    LowPoint,
    HighPoint,
    BonusPoint,
    Custom,
}

impl ScoringSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowPoint => "low_point",
            Self::HighPoint => "high_point",
            Self::BonusPoint => "bonus_point",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ScoringSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringSystem {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "low_point" | "lowpoint" => Ok(Self::LowPoint),
            "high_point" | "highpoint" => Ok(Self::HighPoint),
            "bonus_point" | "bonuspoint" => Ok(Self::BonusPoint),
            "custom" => Ok(Self::Custom),
            _ => Err(ScoringError::configuration(format!(
                "Unknown scoring system: '{}'",
                s
            ))),
        }
    }
}

/// Which end of the points scale wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    LowerIsBetter,
    HigherIsBetter,
}

impl ScoreDirection {
    /// `Ordering::Less` means `a` is the better score.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self {
            Self::LowerIsBetter => a.total_cmp(&b),
            Self::HigherIsBetter => b.total_cmp(&a),
        }
    }

    /// Same as [`compare`](Self::compare) but treats values within 1e-6 as equal.
    pub fn compare_rounded(&self, a: f64, b: f64) -> Ordering {
        match self {
            Self::LowerIsBetter => points_key(a).cmp(&points_key(b)),
            Self::HigherIsBetter => points_key(b).cmp(&points_key(a)),
        }
    }
}

/// Integer key at micro-point resolution, so equal totals built from different
/// float additions still compare equal.
pub fn points_key(points: f64) -> i64 {
    (points * 1_000_000.0).round() as i64
}

/// Which races an entry may drop from its total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscardRule {
    #[default]
    None,
    WorstN {
        count: i32,
        #[serde(default)]
        min_races_for_discard: Option<i32>,
    },
    Percentage {
        pct: f64,
        #[serde(default)]
        min_races_for_discard: Option<i32>,
    },
}

impl DiscardRule {
    pub fn min_races_for_discard(&self) -> Option<i32> {
        match self {
            Self::None => None,
            Self::WorstN {
                min_races_for_discard,
                ..
            }
            | Self::Percentage {
                min_races_for_discard,
                ..
            } => *min_races_for_discard,
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if let Some(min) = self.min_races_for_discard()
            && min < 0
        {
            return Err(ScoringError::configuration(format!(
                "min_races_for_discard must be >= 0, got {}",
                min
            )));
        }

        match self {
            Self::None => Ok(()),
            Self::WorstN { count, .. } if *count < 0 => Err(ScoringError::configuration(
                format!("Discard count must be >= 0, got {}", count),
            )),
            Self::Percentage { pct, .. } if !pct.is_finite() || *pct < 0.0 || *pct > 100.0 => {
                Err(ScoringError::configuration(format!(
                    "Discard percentage must be within [0, 100], got {}",
                    pct
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn describe(&self) -> String {
        let threshold = |min: &Option<i32>| match min {
            Some(min) if *min > 0 => format!(" once {} races are sailed", min),
            _ => String::new(),
        };

        match self {
            Self::None => "no discards".to_string(),
            Self::WorstN {
                count,
                min_races_for_discard,
            } => format!(
                "worst {} discarded{}",
                count,
                threshold(min_races_for_discard)
            ),
            Self::Percentage {
                pct,
                min_races_for_discard,
            } => format!(
                "worst {}% discarded{}",
                pct,
                threshold(min_races_for_discard)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakRule {
    MostFirsts,
    HeadToHeadLastRace,
    LowestDiscardedPoints,
}

impl TieBreakRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MostFirsts => "most_firsts",
            Self::HeadToHeadLastRace => "head_to_head_last_race",
            Self::LowestDiscardedPoints => "lowest_discarded_points",
        }
    }
}

impl fmt::Display for TieBreakRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieBreakRule {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "most_firsts" => Ok(Self::MostFirsts),
            "head_to_head_last_race" => Ok(Self::HeadToHeadLastRace),
            "lowest_discarded_points" => Ok(Self::LowestDiscardedPoints),
            _ => Err(ScoringError::configuration(format!(
                "Unknown tie-break rule: '{}'",
                s
            ))),
        }
    }
}

/// Points given for a scoring code.
///
/// The two `PlusOne` rules yield a penalty *place*, which the scoring system then turns
/// into points like any finishing place. `Fixed` is taken as points verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PenaltyRule {
    EntriesInRacePlusOne,
    EntriesInSeriesPlusOne,
    Fixed { points: f64 },
}

/// What to do when an entry has no result for a race that other entries sailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingResultPolicy {
    /// Score the entry as DNC.
    TreatAsDnc,
    /// Leave the race out of the entry's score line.
    Exclude,
}

impl MissingResultPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TreatAsDnc => "treat_as_dnc",
            Self::Exclude => "exclude",
        }
    }
}

impl FromStr for MissingResultPolicy {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "treat_as_dnc" | "dnc" => Ok(Self::TreatAsDnc),
            "exclude" => Ok(Self::Exclude),
            _ => Err(ScoringError::configuration(format!(
                "Unknown missing-result policy: '{}'",
                s
            ))),
        }
    }
}

/// Points per finishing place: explicit values for the first places, then a linear
/// formula `place * beyond_multiplier + beyond_offset` for everything past the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PointTable {
    pub points: Vec<f64>,
    pub beyond_multiplier: f64,
    pub beyond_offset: f64,
}

impl PointTable {
    /// Bonus point table from the racing rules: 0, 3, 5.7, 8, 10, 11.7, then place + 6.
    pub fn bonus_point() -> Self {
        Self {
            points: vec![0.0, 3.0, 5.7, 8.0, 10.0, 11.7],
            beyond_multiplier: 1.0,
            beyond_offset: 6.0,
        }
    }

    pub fn points_for(&self, place: u32) -> f64 {
        match place.checked_sub(1).and_then(|idx| self.points.get(idx as usize)) {
            Some(points) => *points,
            None => place as f64 * self.beyond_multiplier + self.beyond_offset,
        }
    }

    fn validate(&self, label: &str) -> Result<(), ScoringError> {
        let all_finite = self.points.iter().all(|p| p.is_finite())
            && self.beyond_multiplier.is_finite()
            && self.beyond_offset.is_finite();
        if !all_finite {
            return Err(ScoringError::configuration(format!(
                "{} contains non-finite values",
                label
            )));
        }
        Ok(())
    }
}

impl Default for PointTable {
    fn default() -> Self {
        Self::bonus_point()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomFormula {
    pub table: PointTable,
    #[serde(default)]
    pub higher_is_better: bool,
}

/// Everything that decides how a regatta (or a season) turns results into points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoringConfiguration {
    pub system: ScoringSystem,
    #[serde(default)]
    pub discard_rule: DiscardRule,
    #[serde(default)]
    pub use_corrected_time: bool,
    #[serde(default)]
    pub exclude_dns_dnc_from_discard: bool,
    #[serde(default)]
    pub first_place_points: Option<f64>,
    #[serde(default = "default_tie_breaking_rules")]
    pub tie_breaking_rules: Vec<TieBreakRule>,
    #[serde(default)]
    pub missing_result_policy: Option<MissingResultPolicy>,
    #[serde(default)]
    pub code_penalties: BTreeMap<ScoringCode, PenaltyRule>,
    #[serde(default)]
    pub bonus_table: PointTable,
    #[serde(default)]
    pub custom_formula: Option<CustomFormula>,
}

fn default_tie_breaking_rules() -> Vec<TieBreakRule> {
    vec![TieBreakRule::MostFirsts, TieBreakRule::HeadToHeadLastRace]
}

impl Default for ScoringConfiguration {
    fn default() -> Self {
        Self {
            system: ScoringSystem::LowPoint,
            discard_rule: DiscardRule::None,
            use_corrected_time: false,
            exclude_dns_dnc_from_discard: false,
            first_place_points: None,
            tie_breaking_rules: default_tie_breaking_rules(),
            missing_result_policy: Some(MissingResultPolicy::TreatAsDnc),
            code_penalties: BTreeMap::new(),
            bonus_table: PointTable::bonus_point(),
            custom_formula: None,
        }
    }
}

impl ScoringConfiguration {
    pub fn validate(&self) -> Result<(), ScoringError> {
        self.discard_rule.validate()?;

        if let Some(first) = self.first_place_points
            && !first.is_finite()
        {
            return Err(ScoringError::configuration(
                "first_place_points must be a finite number",
            ));
        }

        for (code, rule) in &self.code_penalties {
            if let PenaltyRule::Fixed { points } = rule
                && !points.is_finite()
            {
                return Err(ScoringError::configuration(format!(
                    "Fixed penalty for {} must be a finite number",
                    code
                )));
            }
        }

        match self.system {
            ScoringSystem::BonusPoint => self.bonus_table.validate("Bonus point table")?,
            ScoringSystem::Custom => match &self.custom_formula {
                Some(formula) => formula.table.validate("Custom formula table")?,
                None => {
                    return Err(ScoringError::configuration(
                        "Custom scoring system requires a custom_formula",
                    ));
                }
            },
            ScoringSystem::LowPoint | ScoringSystem::HighPoint => {}
        }

        Ok(())
    }

    pub fn direction(&self) -> ScoreDirection {
        match (self.system, &self.custom_formula) {
            (ScoringSystem::HighPoint, _) => ScoreDirection::HigherIsBetter,
            (ScoringSystem::Custom, Some(formula)) if formula.higher_is_better => {
                ScoreDirection::HigherIsBetter
            }
            _ => ScoreDirection::LowerIsBetter,
        }
    }

    pub fn penalty_rule(&self, code: ScoringCode) -> PenaltyRule {
        if let Some(rule) = self.code_penalties.get(&code) {
            return *rule;
        }

        if code.is_non_starter() {
            PenaltyRule::EntriesInSeriesPlusOne
        } else {
            PenaltyRule::EntriesInRacePlusOne
        }
    }

    /// Points for finishing `place` in a race with `entries_in_race` starters.
    pub fn points_for_place(&self, place: u32, entries_in_race: u32) -> f64 {
        match self.system {
            ScoringSystem::LowPoint => place as f64 - 1.0 + self.first_place_points.unwrap_or(1.0),
            ScoringSystem::HighPoint => {
                let entries = entries_in_race as f64;
                let offset = self
                    .first_place_points
                    .map(|first| first - entries)
                    .unwrap_or(0.0);
                (entries - place as f64 + 1.0).max(0.0) + offset
            }
            ScoringSystem::BonusPoint => self.bonus_table.points_for(place),
            // validate() rejects a custom system without a formula
            ScoringSystem::Custom => self
                .custom_formula
                .as_ref()
                .map(|formula| formula.table.points_for(place))
                .unwrap_or(place as f64),
        }
    }
}
