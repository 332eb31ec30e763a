use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::ErrorEnvelope;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    EntityNotFound(String),

    #[error("{0}")]
    ImproperPayload(String),

    #[error("{0}")]
    PreconditionFailed(String),

    /// An error envelope returned by a downstream service, re-emitted as is
    #[error("{message}")]
    Proxied {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("{0}")]
    BackendUnreachable(String),

    #[error("{0}")]
    BackendTimeout(String),

    /// The inbound request outlived the server's request timeout
    #[error("{0}")]
    RequestTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::EntityNotFound(msg.into())
    }

    pub fn improper_payload(msg: impl Into<String>) -> Self {
        Self::ImproperPayload(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Rebuilds a downstream error from the `meta.status` and `error` of its envelope.
    pub fn proxied(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Proxied {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ApiError::EntityNotFound(_) => "entity-not-found",
            ApiError::ImproperPayload(_) => "improper-payload",
            ApiError::PreconditionFailed(_) => "precondition-failed",
            ApiError::Proxied { code, .. } => code,
            ApiError::BackendUnreachable(_) => "backend-unreachable",
            ApiError::BackendTimeout(_) => "backend-timeout",
            ApiError::RequestTimeout(_) => "request-timeout",
            ApiError::Internal(_) => "server-crash",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ImproperPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Proxied { status, .. } => *status,
            ApiError::BackendUnreachable(_) => StatusCode::BAD_GATEWAY,
            ApiError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::ImproperPayload(rejection.body_text())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::BackendTimeout(format!("The downstream call timed out: {err}"))
        } else {
            Self::BackendUnreachable(format!("The downstream call failed: {err}"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let body = ErrorEnvelope::new(status, self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (ApiError::not_found("x"), "entity-not-found", 404),
            (ApiError::improper_payload("x"), "improper-payload", 400),
            (ApiError::precondition("x"), "precondition-failed", 412),
            (ApiError::internal("x"), "server-crash", 500),
            (ApiError::RequestTimeout("x".into()), "request-timeout", 408),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status().as_u16(), status);
        }
    }

    #[test]
    fn test_proxied_keeps_downstream_code() {
        let err = ApiError::proxied(412, "precondition-failed", "the 'data.name' field is missing");
        assert_eq!(err.code(), "precondition-failed");
        assert_eq!(err.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(err.to_string(), "the 'data.name' field is missing");

        // nonsense statuses from downstream still produce a valid response
        let err = ApiError::proxied(42, "weird", "?");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "weird");
    }
}
