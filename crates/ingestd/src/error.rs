// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Leaf error type for the ingestion service.
///
/// Each variant carries the information needed to render an HTTP response;
/// infrastructure failures (Mongo, reqwest, io) are wrapped in `Store`/
/// `Upstream`/`Internal` rather than matched on individually.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("ticket not found")]
    TicketNotFound,

    #[error("job not found")]
    JobNotFound,

    #[error("ingestion already running for tenant {0}")]
    AlreadyRunning(String),

    #[error("rate limit exceeded, retry after {retry_after_secs:.1}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("circuit breaker open for {0}")]
    BreakerOpen(String),

    #[error("lock not held")]
    LockNotHeld,

    #[error("upstream request failed: {0}")]
    Upstream(#[source] anyhow::Error),

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::TenantNotFound(_) => "TENANT_NOT_FOUND",
            Self::TicketNotFound => "TICKET_NOT_FOUND",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::AlreadyRunning(_) => "ALREADY_RUNNING",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::BreakerOpen(_) => "BREAKER_OPEN",
            Self::LockNotHeld => "LOCK_NOT_HELD",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TenantNotFound(_) | Self::TicketNotFound | Self::JobNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::AlreadyRunning(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BreakerOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::LockNotHeld => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Top-level error response envelope, matching the shape used throughout
/// the external interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Store(_) | Self::Internal(_) | Self::Upstream(_)) {
            tracing::error!(err = %self, "request failed");
        }

        let mut response = (
            self.status(),
            Json(ErrorResponse {
                error: ErrorBody { code: self.code().to_owned(), message: self.to_string() },
            }),
        )
            .into_response();

        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) =
                axum::http::HeaderValue::from_str(&retry_after_secs.ceil().to_string())
            {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
