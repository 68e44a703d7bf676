//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::BasketError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body could not be understood.
    #[error("{0}")]
    BadRequest(String),

    /// Basket lifecycle error.
    #[error(transparent)]
    Basket(#[from] BasketError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Basket(err) => match err {
                BasketError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                BasketError::BasketNotFound(_) | BasketError::ItemNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                BasketError::InvalidState { .. } => StatusCode::CONFLICT,
                BasketError::StoreUnavailable(_) | BasketError::AuditUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("api_errors_total", "status" => status.as_str().to_owned()).increment(1);
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "downstream unavailable");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use audit_log::AuditError;
    use common::BasketId;
    use domain::{BasketStatus, StoreError};

    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                BasketError::InvalidPayload("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                BasketError::BasketNotFound(BasketId::new("b")),
                StatusCode::NOT_FOUND,
            ),
            (
                BasketError::InvalidState {
                    current: BasketStatus::Paid,
                    action: "decide",
                },
                StatusCode::CONFLICT,
            ),
            (
                BasketError::StoreUnavailable(StoreError::Unavailable("down".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                BasketError::AuditUnavailable(AuditError::Unavailable("down".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
