use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Relational store fault while building a preference profile
    #[error("Preference extraction failed: {0}")]
    Extraction(String),

    /// None of the seed movies has a stored embedding
    #[error("No embeddings available for seed movies")]
    NoSeedEmbeddings,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Both candidate sources failed for a personalized request
    #[error("Recommendations unavailable: {0}")]
    RecommendationUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a candidate branch can degrade past this error instead of
    /// failing the whole recommendation.
    ///
    /// Configuration bugs (dimension mismatches, empty averaging input) are
    /// never recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AppError::DimensionMismatch { .. } | AppError::EmptyInput(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::RecommendationUnavailable(_) | AppError::Timeout(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::VectorIndex(_) | AppError::HttpClient(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Extraction(_)
            | AppError::NoSeedEmbeddings
            | AppError::DimensionMismatch { .. }
            | AppError::EmptyInput(_)
            | AppError::Database(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_bugs_are_not_recoverable() {
        assert!(!AppError::DimensionMismatch {
            expected: 384,
            actual: 512
        }
        .is_recoverable());
        assert!(!AppError::EmptyInput("vectors".to_string()).is_recoverable());
    }

    #[test]
    fn test_branch_failures_are_recoverable() {
        assert!(AppError::NoSeedEmbeddings.is_recoverable());
        assert!(AppError::Timeout("vector search".to_string()).is_recoverable());
        assert!(AppError::VectorIndex("503".to_string()).is_recoverable());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 3"
        );
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        let response = AppError::RecommendationUnavailable("both failed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
