use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if e.code().as_deref() == Some("23505")
        )
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if e.code().as_deref() == Some("23503")
        )
    }
}

/// Problems found while turning race results into standings.
///
/// `Configuration` aborts the computation it belongs to. The other variants are
/// collected into a [`ComputationReport`] and the rest of the computation proceeds.
#[derive(Debug, Clone, PartialEq, Error, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Data integrity error: {message}")]
    DataIntegrity {
        race_id: Option<Uuid>,
        entry_id: Option<Uuid>,
        message: String,
    },

    #[error(
        "Entry {entry_id} has no result for race {race_id} and no missing-result policy is configured"
    )]
    AmbiguousResult { entry_id: Uuid, race_id: Uuid },

    #[error("Regatta {regatta_id} excluded from season: {reason}")]
    RegattaFailed { regatta_id: Uuid, reason: String },
}

impl ScoringError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn integrity(race_id: Option<Uuid>, entry_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            race_id,
            entry_id,
            message: message.into(),
        }
    }
}

/// Non-fatal issues gathered during one computation, returned next to the standings
/// so the caller can decide whether to publish them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ComputationReport {
    pub errors: Vec<ScoringError>,
    pub warnings: Vec<String>,
}

impl ComputationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn push_error(&mut self, error: ScoringError) {
        warn!("{}", error);
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn merge(&mut self, other: ComputationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn log(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }
}
