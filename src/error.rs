use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Every failure a handler can report. Vendor-specific error shapes are translated into one of
/// these at the client boundary, so the frontend contract does not move when a vendor does.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid phone number or password")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("Upstream service denied the request")]
    PermissionDenied,
    #[error("Upstream service quota exceeded")]
    RateLimited,
    #[error("Upstream service timed out")]
    UpstreamTimeout,
    #[error("Upstream service unavailable")]
    UpstreamUnavailable,
    #[error("Upstream service returned unexpected data")]
    UpstreamDataInvalid,
    #[error("{0} is not configured on this server")]
    FeatureDisabled(&'static str),
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::PermissionDenied => "upstream_permission_denied",
            AppError::RateLimited => "upstream_rate_limited",
            AppError::UpstreamTimeout => "upstream_timeout",
            AppError::UpstreamUnavailable => "upstream_unavailable",
            AppError::UpstreamDataInvalid => "upstream_data_invalid",
            AppError::FeatureDisabled(_) => "feature_disabled",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpstreamUnavailable | AppError::UpstreamDataInvalid => {
                StatusCode::BAD_GATEWAY
            }
            AppError::FeatureDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a non-success HTTP status from a vendor. Returns `None` for statuses that carry
    /// a body worth inspecting (2xx, and 400 which vendors use for their own validation errors).
    pub fn from_upstream_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(AppError::PermissionDenied),
            StatusCode::TOO_MANY_REQUESTS => Some(AppError::RateLimited),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                Some(AppError::UpstreamTimeout)
            }
            s if s.is_server_error() => Some(AppError::UpstreamUnavailable),
            s if s.is_success() || s == StatusCode::BAD_REQUEST => None,
            _ => Some(AppError::UpstreamDataInvalid),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::UpstreamTimeout
        } else if e.is_decode() {
            AppError::UpstreamDataInvalid
        } else if let Some(status) = e.status() {
            AppError::from_upstream_status(status).unwrap_or(AppError::UpstreamDataInvalid)
        } else {
            AppError::UpstreamUnavailable
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {e}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        } else {
            warn!(code = self.code(), error = %self, "request rejected");
        }
        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
