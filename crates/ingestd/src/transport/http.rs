// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the ticket ingestion API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::default_window;
use crate::error::{IngestError, Result};
use crate::model::{HistoryEntry, IngestionJob, LockRecord, Ticket, TicketStatus};
use crate::state::AppState;
use crate::store::TicketFilter;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: DependencyHealth,
    pub breakers: Vec<crate::circuit_breaker::BreakerStatus>,
}

#[derive(Debug, Serialize)]
pub struct DependencyHealth {
    pub name: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /api/v1/health`
///
/// Reports dependency health, not just process liveness: a round trip
/// against the ticket store (the one dependency every request path needs)
/// and a snapshot of every registered circuit breaker's state. A store
/// failure is surfaced as `status: "degraded"` with a 200 rather than
/// flipping to an error status, so load balancers keep routing traffic to
/// an instance that can still serve cached/breaker-gated responses.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = match state
        .tickets
        .list_tickets("__healthcheck__", TicketFilter { limit: 1, ..Default::default() })
        .await
    {
        Ok(_) => DependencyHealth { name: "ticket_store", healthy: true, error: None },
        Err(e) => {
            tracing::warn!(err = %e, "health check: ticket store unreachable");
            DependencyHealth { name: "ticket_store", healthy: false, error: Some(e.to_string()) }
        }
    };

    let status = if store.healthy { "ok" } else { "degraded" };
    Json(HealthResponse { status, store, breakers: state.breakers.status_all() })
}

/// Every tenant-scoped route rejects a blank tenant id up front — listing
/// or mutating without a tenant predicate is exactly the isolation bug this
/// service exists to rule out, so it is refused at the boundary rather than
/// trusted to fall out of an empty-string query downstream.
fn require_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(IngestError::BadRequest("tenant_id must not be empty".to_owned()));
    }
    Ok(())
}

/// `POST /api/v1/tenants/{tenant_id}/ingest`
///
/// Starts an ingestion run for `tenant_id`, or `409 Conflict` if one is
/// already in progress (enforced by the distributed lock, not an
/// in-process check — see `crate::orchestrator::Orchestrator::start`).
///
/// Does not consult the rate limiter: that budget caps upstream-API call
/// volume inside the orchestrator's page loop, not HTTP trigger frequency,
/// and the lock service already rejects a concurrent run per tenant.
pub async fn trigger_ingestion(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<IngestionJob>> {
    require_tenant_id(&tenant_id)?;
    let job = state.orchestrator.start(&tenant_id).await?;
    Ok(Json(job))
}

/// `POST /api/v1/tenants/{tenant_id}/ingest/cancel`
pub async fn cancel_ingestion(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    require_tenant_id(&tenant_id)?;
    let cancelled = state.orchestrator.cancel(&tenant_id).await;
    if !cancelled {
        return Err(IngestError::JobNotFound);
    }
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

/// `GET /api/v1/tenants/{tenant_id}/ingest/status`
///
/// The currently running job for a tenant, if any — distinct from
/// `GET .../jobs/{job_id}` in that callers don't need to already know a
/// job id, just the tenant whose ingestion status they want to poll.
pub async fn ingestion_status(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Option<IngestionJob>>> {
    require_tenant_id(&tenant_id)?;
    let job = state.jobs.running_for_tenant(&tenant_id).await.map_err(IngestError::Store)?;
    Ok(Json(job))
}

/// `GET /api/v1/tenants/{tenant_id}/jobs/{job_id}`
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, job_id)): Path<(String, String)>,
) -> Result<Json<IngestionJob>> {
    require_tenant_id(&tenant_id)?;
    let job = state.jobs.get(&job_id).await.map_err(IngestError::Store)?;
    let job = job.filter(|j| j.tenant_id == tenant_id);
    job.map(Json).ok_or(IngestError::JobNotFound)
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_job_limit")]
    limit: i64,
}

fn default_job_limit() -> i64 {
    20
}

/// `GET /api/v1/tenants/{tenant_id}/jobs`
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<IngestionJob>>> {
    require_tenant_id(&tenant_id)?;
    let jobs =
        state.jobs.list_for_tenant(&tenant_id, query.limit).await.map_err(IngestError::Store)?;
    Ok(Json(jobs))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListTicketsQuery {
    #[serde(default)]
    include_deleted: bool,
    status: Option<TicketStatus>,
    #[serde(default = "default_ticket_limit")]
    limit: i64,
    #[serde(default)]
    skip: i64,
}

fn default_ticket_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub items: Vec<Ticket>,
    pub has_more: bool,
}

/// `GET /api/v1/tenants/{tenant_id}/tickets`
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<TicketListResponse>> {
    require_tenant_id(&tenant_id)?;
    let filter = TicketFilter {
        include_deleted: query.include_deleted,
        status: query.status,
        limit: query.limit,
        skip: query.skip,
    };
    let page = state.tickets.list_tickets(&tenant_id, filter).await.map_err(IngestError::Store)?;
    Ok(Json(TicketListResponse { items: page.items, has_more: page.has_more }))
}

/// `GET /api/v1/tenants/{tenant_id}/tickets/{ticket_id}`
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, ticket_id)): Path<(String, String)>,
) -> Result<Json<Ticket>> {
    require_tenant_id(&tenant_id)?;
    let ticket =
        state.tickets.get_by_id(&tenant_id, &ticket_id).await.map_err(IngestError::Store)?;
    ticket.map(Json).ok_or(IngestError::TicketNotFound)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: i64,
}

fn default_history_limit() -> i64 {
    100
}

/// `GET /api/v1/tenants/{tenant_id}/tickets/{ticket_id}/history`
pub async fn ticket_history(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, ticket_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>> {
    require_tenant_id(&tenant_id)?;
    // Confirm the ticket belongs to this tenant before returning its history.
    state
        .tickets
        .get_by_id(&tenant_id, &ticket_id)
        .await
        .map_err(IngestError::Store)?
        .ok_or(IngestError::TicketNotFound)?;

    let entries =
        state.history.list_for_ticket(&ticket_id, query.limit).await.map_err(IngestError::Store)?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize, Default)]
pub struct StatsQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

/// `GET /api/v1/tenants/{tenant_id}/stats`
pub async fn tenant_stats(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<crate::analytics::TenantStatsResponse>> {
    require_tenant_id(&tenant_id)?;
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or_else(|| default_window(to).0);

    let response =
        state.analytics.tenant_stats(&tenant_id, from, to).await.map_err(IngestError::Store)?;
    Ok(Json(response))
}

/// `GET /api/v1/tenants/{tenant_id}/lock`
pub async fn lock_status(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Option<LockRecord>>> {
    require_tenant_id(&tenant_id)?;
    let status = state.lock_service.status(&tenant_id).await.map_err(IngestError::Store)?;
    Ok(Json(status))
}

/// `GET /api/v1/breakers`
pub async fn list_breakers(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<crate::circuit_breaker::BreakerStatus>> {
    Json(state.breakers.status_all())
}

/// `POST /api/v1/breakers/{name}/reset`
///
/// Manual operator override: force a breaker back to CLOSED without
/// waiting for its timeout, for use once a known-transient upstream
/// incident has resolved.
pub async fn reset_breaker(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let breaker = state
        .breakers
        .get_or_create(&name, crate::circuit_breaker::CircuitBreakerConfig::default());
    breaker.reset();
    Ok(Json(serde_json::json!({ "reset": true })))
}
