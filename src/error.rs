/// Application error taxonomy
///
/// Storage code returns `anyhow::Result`; marketplace rules and HTTP handlers use
/// `AppError`, which knows its HTTP status and renders as a JSON error body.

use crate::quota::QuotaKind;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// A body or query string axum could not decode
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("quota exceeded for {kind}: limit is {limit}, requested {requested}")]
    QuotaExceeded {
        kind: QuotaKind,
        limit: i64,
        requested: i64,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Rejected { status, .. } => *status,
            Self::QuotaExceeded { kind, .. } if kind.is_rate() => StatusCode::TOO_MANY_REQUESTS,
            Self::QuotaExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "conflict",
            Self::Rejected { .. } => "invalid_request",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected { status: rejection.status(), message: rejection.body_text() }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected { status: rejection.status(), message: rejection.body_text() }
    }
}

/// Whether a storage error came from a UNIQUE constraint
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(sqlx::Error::as_database_error)
        .is_some_and(|db| db.is_unique_violation())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!("❌ Request failed: {:#}", self);
            "internal server error".to_string()
        } else {
            tracing::debug!("⚠️ Request rejected ({}): {}", status, self);
            self.to_string()
        };

        let mut body = json!({ "error": self.code(), "message": message });
        if let Self::QuotaExceeded { kind, limit, requested } = &self {
            body["quota"] = json!({ "kind": kind, "limit": limit, "requested": requested });
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_quotas_map_to_too_many_requests() {
        let err = AppError::QuotaExceeded { kind: QuotaKind::VersionsPerDay, limit: 2, requested: 3 };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::QuotaExceeded { kind: QuotaKind::FileSize, limit: 2, requested: 3 };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn rejections_keep_their_status_and_json_shape() {
        let err = AppError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: "Failed to parse the request body as JSON".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "invalid_request");
        assert!(body["message"].as_str().unwrap().contains("JSON"));
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let response = AppError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
