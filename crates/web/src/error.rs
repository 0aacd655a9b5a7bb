use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use importer::ImporterError;
use serde_json::json;
use std::fmt;
use storage::error::{ScoringError, StorageError};
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Storage(StorageError),
    Export(ImporterError),
    Validation(ValidationErrors),
    BadRequest(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::Export(e) => write!(f, "Export error: {}", e),
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

fn storage_status(error: &StorageError) -> StatusCode {
    match error {
        StorageError::NotFound => StatusCode::NOT_FOUND,
        StorageError::ConstraintViolation(_) => StatusCode::CONFLICT,
        StorageError::Scoring(ScoringError::Configuration { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn storage_body(error: &StorageError) -> serde_json::Value {
    match error {
        StorageError::NotFound => json!({
            "error": "Resource not found"
        }),
        StorageError::ConstraintViolation(msg) => json!({
            "error": msg
        }),
        StorageError::Scoring(scoring @ ScoringError::Configuration { .. }) => json!({
            "error": scoring.to_string()
        }),
        e => {
            tracing::error!("Storage error: {:?}", e);
            json!({
                "error": "An internal error occurred"
            })
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status_code, body) = match &self {
            Self::Storage(e) | Self::Export(ImporterError::StorageError(e)) => {
                (storage_status(e), storage_body(e))
            }
            Self::Export(ImporterError::ScoringError(scoring @ ScoringError::Configuration { .. })) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": scoring.to_string()
                }),
            ),
            Self::Export(e) => {
                tracing::error!("Export error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "An internal error occurred"
                    }),
                )
            }
            Self::Validation(errors) => {
                let field_errors: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errors)| {
                        errors.iter().map(move |e| {
                            format!(
                                "{}: {}",
                                field,
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            )
                        })
                    })
                    .collect();

                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": "Validation failed",
                        "details": field_errors
                    }),
                )
            }
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": msg
                }),
            ),
        };

        (status_code, Json(body)).into_response()
    }
}

impl From<StorageError> for WebError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error)
    }
}

impl From<ImporterError> for WebError {
    fn from(error: ImporterError) -> Self {
        Self::Export(error)
    }
}

impl From<ValidationErrors> for WebError {
    fn from(error: ValidationErrors) -> Self {
        Self::Validation(error)
    }
}

pub type ApiResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_is_unprocessable() {
        let error = WebError::from(StorageError::Scoring(ScoringError::configuration(
            "discard count must be >= 0",
        )));
        assert_eq!(error.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let error = WebError::from(ImporterError::ScoringError(ScoringError::configuration(
            "Unknown scoring system",
        )));
        assert_eq!(error.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_and_conflict() {
        assert_eq!(
            WebError::from(StorageError::NotFound).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::from(ImporterError::StorageError(StorageError::NotFound))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::from(StorageError::ConstraintViolation("dup".to_string()))
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
    }
}
