use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Non-numeric finish outcome recorded by the race committee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoringCode {
    Dnf,
    Dns,
    Dsq,
    Ocs,
    Ret,
    Dnc,
    Bfd,
    Ufd,
    Dne,
}

impl ScoringCode {
    pub const ALL: [ScoringCode; 9] = [
        Self::Dnf,
        Self::Dns,
        Self::Dsq,
        Self::Ocs,
        Self::Ret,
        Self::Dnc,
        Self::Bfd,
        Self::Ufd,
        Self::Dne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dnf => "DNF",
            Self::Dns => "DNS",
            Self::Dsq => "DSQ",
            Self::Ocs => "OCS",
            Self::Ret => "RET",
            Self::Dnc => "DNC",
            Self::Bfd => "BFD",
            Self::Ufd => "UFD",
            Self::Dne => "DNE",
        }
    }

    /// DNS and DNC mark a race the entry never started.
    pub fn is_non_starter(&self) -> bool {
        matches!(self, Self::Dns | Self::Dnc)
    }
}

impl fmt::Display for ScoringCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == normalized)
            .ok_or_else(|| format!("Unknown scoring code: '{}'", s))
    }
}

/// Either a numeric finishing place or a scoring code, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FinishOutcome {
    Position(u32),
    Code(ScoringCode),
}

impl FinishOutcome {
    pub fn position(&self) -> Option<u32> {
        match self {
            Self::Position(position) => Some(*position),
            Self::Code(_) => None,
        }
    }

    pub fn code(&self) -> Option<ScoringCode> {
        match self {
            Self::Position(_) => None,
            Self::Code(code) => Some(*code),
        }
    }

    pub fn is_non_starter(&self) -> bool {
        self.code().is_some_and(|code| code.is_non_starter())
    }

    /// Builds an outcome from the nullable column pair used in storage.
    pub fn from_columns(position: Option<i32>, code: Option<&str>) -> Result<Self, String> {
        match (position, code) {
            (Some(position), None) if position >= 1 => Ok(Self::Position(position as u32)),
            (Some(position), None) => Err(format!("Invalid finish position: {}", position)),
            (None, Some(code)) => code.parse().map(Self::Code),
            (Some(_), Some(_)) => Err("Result has both a finish position and a scoring code".to_string()),
            (None, None) => Err("Result has neither a finish position nor a scoring code".to_string()),
        }
    }
}

impl fmt::Display for FinishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(position) => write!(f, "{}", position),
            Self::Code(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for FinishOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<u32>() {
            Ok(0) => Err("Finish position must be >= 1".to_string()),
            Ok(position) => Ok(Self::Position(position)),
            Err(_) => trimmed.parse().map(Self::Code),
        }
    }
}

/// One entry's outcome in one race. Corrections are recorded as a new row with a
/// higher `revision`; only the highest revision per race and entry is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RaceResult {
    pub race_id: Uuid,
    pub entry_id: Uuid,
    pub outcome: FinishOutcome,
    /// Seconds.
    pub elapsed_time: Option<f64>,
    /// Seconds, after handicap correction.
    pub corrected_time: Option<f64>,
    #[serde(default = "default_revision")]
    pub revision: u32,
}

fn default_revision() -> u32 {
    1
}

impl RaceResult {
    pub fn new(race_id: Uuid, entry_id: Uuid, outcome: FinishOutcome) -> Self {
        Self {
            race_id,
            entry_id,
            outcome,
            elapsed_time: None,
            corrected_time: None,
            revision: default_revision(),
        }
    }

    pub fn finished(race_id: Uuid, entry_id: Uuid, position: u32) -> Self {
        Self::new(race_id, entry_id, FinishOutcome::Position(position))
    }

    pub fn coded(race_id: Uuid, entry_id: Uuid, code: ScoringCode) -> Self {
        Self::new(race_id, entry_id, FinishOutcome::Code(code))
    }

    pub fn with_corrected_time(mut self, seconds: f64) -> Self {
        self.corrected_time = Some(seconds);
        self
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_code_parsing_is_case_insensitive() {
        assert_eq!("dnf".parse::<ScoringCode>().unwrap(), ScoringCode::Dnf);
        assert_eq!(" OCS ".parse::<ScoringCode>().unwrap(), ScoringCode::Ocs);
        assert!("XYZ".parse::<ScoringCode>().is_err());
    }

    #[test]
    fn test_outcome_from_columns() {
        assert_eq!(
            FinishOutcome::from_columns(Some(3), None).unwrap(),
            FinishOutcome::Position(3)
        );
        assert_eq!(
            FinishOutcome::from_columns(None, Some("DSQ")).unwrap(),
            FinishOutcome::Code(ScoringCode::Dsq)
        );
        assert!(FinishOutcome::from_columns(Some(2), Some("DNF")).is_err());
        assert!(FinishOutcome::from_columns(None, None).is_err());
        assert!(FinishOutcome::from_columns(Some(0), None).is_err());
    }

    #[test]
    fn test_outcome_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            FinishOutcome::Position(4),
            FinishOutcome::Code(ScoringCode::Bfd),
        ])
        .unwrap();
        assert_eq!(json, r#"[4,"BFD"]"#);

        let parsed: Vec<FinishOutcome> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[1], FinishOutcome::Code(ScoringCode::Bfd));
    }

    #[test]
    fn test_outcome_from_str() {
        assert_eq!("7".parse::<FinishOutcome>().unwrap(), FinishOutcome::Position(7));
        assert_eq!(
            "dnc".parse::<FinishOutcome>().unwrap(),
            FinishOutcome::Code(ScoringCode::Dnc)
        );
        assert!("0".parse::<FinishOutcome>().is_err());
    }
}
