// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the ingestion daemon.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with all ingestion routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/tenants/{tenant_id}/ingest", post(http::trigger_ingestion))
        .route("/api/v1/tenants/{tenant_id}/ingest/cancel", post(http::cancel_ingestion))
        .route("/api/v1/tenants/{tenant_id}/ingest/status", get(http::ingestion_status))
        .route("/api/v1/tenants/{tenant_id}/jobs", get(http::list_jobs))
        .route("/api/v1/tenants/{tenant_id}/jobs/{job_id}", get(http::get_job))
        .route("/api/v1/tenants/{tenant_id}/tickets", get(http::list_tickets))
        .route("/api/v1/tenants/{tenant_id}/tickets/{ticket_id}", get(http::get_ticket))
        .route(
            "/api/v1/tenants/{tenant_id}/tickets/{ticket_id}/history",
            get(http::ticket_history),
        )
        .route("/api/v1/tenants/{tenant_id}/stats", get(http::tenant_stats))
        .route("/api/v1/tenants/{tenant_id}/lock", get(http::lock_status))
        .route("/api/v1/breakers", get(http::list_breakers))
        .route("/api/v1/breakers/{name}/reset", post(http::reset_breaker))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
