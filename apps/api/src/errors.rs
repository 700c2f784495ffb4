use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::interview::models::Phase;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {session_id} is in phase {actual}, expected {expected}")]
    InvalidPhase {
        session_id: String,
        expected: String,
        actual: Phase,
    },

    /// Upstream AI failure. `session_id` is set when the caller can retry
    /// against an existing session (intro submission).
    #[error("Gateway error: {source}")]
    Gateway {
        #[source]
        source: GatewayError,
        session_id: Option<String>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed media: {0}")]
    MalformedMedia(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_phase(session_id: &str, expected: &str, actual: Phase) -> Self {
        AppError::InvalidPhase {
            session_id: session_id.to_string(),
            expected: expected.to_string(),
            actual,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(source: GatewayError) -> Self {
        AppError::Gateway {
            source,
            session_id: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut session = None;
        let (status, code, message) = match &self {
            AppError::SessionNotFound(id) => {
                session = Some(id.clone());
                (
                    StatusCode::NOT_FOUND,
                    "SESSION_NOT_FOUND",
                    format!("Session {id} not found"),
                )
            }
            AppError::InvalidPhase { session_id, .. } => {
                session = Some(session_id.clone());
                (StatusCode::CONFLICT, "INVALID_PHASE", self.to_string())
            }
            AppError::Gateway { source, session_id } => {
                tracing::error!("Gateway error: {source}");
                session = session_id.clone();
                let status = if matches!(source, GatewayError::Timeout(_)) {
                    (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT")
                } else {
                    (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR")
                };
                (status.0, status.1, format!("AI analysis failed: {source}"))
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::MalformedMedia(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "MALFORMED_MEDIA",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(id) = session {
            error["session_id"] = json!(id);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_invalid_phase_use_distinct_statuses() {
        let not_found = AppError::SessionNotFound("session_1_abcd1234".into()).into_response();
        let wrong_phase =
            AppError::invalid_phase("session_1_abcd1234", "QUESTIONING", Phase::Intro)
                .into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(wrong_phase.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_gateway_timeout_maps_to_504() {
        let err = AppError::from(GatewayError::Timeout(std::time::Duration::from_secs(5)));
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_gateway_failure_maps_to_502() {
        let err = AppError::from(GatewayError::EmptyContent);
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
