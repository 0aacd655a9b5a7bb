use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::ComputationReport;

#[derive(Debug, Deserialize, IntoParams)]
pub struct StandingsFilter {
    #[serde(flatten)]
    pub pagination: super::common::PaginationParams,
    pub division: Option<String>,
}

impl StandingsFilter {
    pub fn validate(&self) -> Result<(), String> {
        self.pagination.validate()?;

        if let Some(ref division) = self.division
            && division.trim().is_empty()
        {
            return Err("division must not be blank".to_string());
        }

        Ok(())
    }

    pub fn division(&self) -> Option<&str> {
        self.division.as_deref()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RecomputeQuery {
    /// Recompute one division only; all divisions when omitted.
    pub division: Option<String>,
    /// Persist standings even when the computation reported errors.
    #[serde(default)]
    pub allow_partial: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DivisionRecompute {
    pub division: Option<String>,
    pub standings: usize,
    pub persisted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecomputeResponse {
    pub id: Uuid,
    pub divisions: Vec<DivisionRecompute>,
    pub report: ComputationReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Legacy,
    Json,
    Summary,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Legacy => "text/plain; charset=utf-8",
            Self::Json => "application/json",
            Self::Summary => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Legacy => "blw",
            Self::Json => "json",
            Self::Summary => "txt",
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    pub division: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SeasonRegattaRequest {
    pub regatta_id: Uuid,
    #[validate(range(min = 1, message = "sequence must be >= 1"))]
    pub sequence: u32,
    #[serde(default = "default_weight")]
    #[validate(custom(function = "validate_weight"))]
    #[schema(value_type = f64)]
    pub weight: Decimal,
    #[serde(default)]
    pub is_championship: bool,
}

fn default_weight() -> Decimal {
    Decimal::ONE
}

fn validate_weight(weight: &Decimal) -> Result<(), validator::ValidationError> {
    if weight.is_sign_negative() && !weight.is_zero() {
        Err(validator::ValidationError::new("negative_weight"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SeasonCompositionRequest {
    #[validate(length(min = 1, message = "a season needs at least one regatta"))]
    #[validate(nested)]
    pub regattas: Vec<SeasonRegattaRequest>,
}
