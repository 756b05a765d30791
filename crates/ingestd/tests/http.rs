// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the ingestion daemon's HTTP API.
//!
//! Uses `axum_test::TestServer` — no real TCP needed. All tests run against
//! the in-memory store so they exercise the full router/handler/service
//! stack without a Mongo instance.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::Utc;
use ingestd::circuit_breaker::BreakerRegistry;
use ingestd::classifier::{Classifier, KeywordClassifier};
use ingestd::config::Config;
use ingestd::lock_service::LockService;
use ingestd::model::{HistoryAction, Ticket, TicketStatus, Urgency};
use ingestd::notifier::Notifier;
use ingestd::state::AppState;
use ingestd::store::memory::{
    MemoryHistoryRepository, MemoryIngestionLogRepository, MemoryJobRepository,
    MemoryLockRepository, MemoryTicketRepository,
};
use ingestd::transport::build_router;
use tokio_util::sync::CancellationToken;

fn test_config(auth_token: Option<String>) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        auth_token,
        mongo_uri: None,
        mongo_db: "ingestion".into(),
        upstream_url: None,
        upstream_token: None,
        upstream_page_size: 100,
        notify_url: None,
        rate_limit_per_minute: 60,
        rate_limit_window_secs: 60,
        breaker_failure_threshold: 5,
        breaker_success_threshold: 1,
        breaker_window_size: 10,
        breaker_timeout_secs: 30,
        lock_ttl_secs: 60,
        analytics_soft_timeout_ms: 2000,
        notify_workers: 1,
        notify_queue_capacity: 16,
    }
}

struct Fixture {
    state: Arc<AppState>,
}

impl Fixture {
    fn new(auth_token: Option<String>) -> Self {
        let config = test_config(auth_token);
        let shutdown = CancellationToken::new();

        let tickets = Arc::new(MemoryTicketRepository::new());
        let jobs = Arc::new(MemoryJobRepository::new());
        let history_repo = Arc::new(MemoryHistoryRepository::new());
        let log_repo = Arc::new(MemoryIngestionLogRepository::new());
        let lock_repo = Arc::new(MemoryLockRepository::new());

        let lock_service = Arc::new(LockService::new(lock_repo, config.lock_ttl()));
        let classifier: Arc<dyn Classifier> = Arc::new(KeywordClassifier);
        let breakers = Arc::new(BreakerRegistry::new());
        let breaker_config = ingestd::circuit_breaker::CircuitBreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            success_threshold: config.breaker_success_threshold,
            window_size: config.breaker_window_size,
            timeout: config.breaker_timeout(),
            half_open_max_calls: 1,
        };
        let notifier = Notifier::spawn(
            config.notify_url.clone(),
            config.notify_workers,
            config.notify_queue_capacity,
            Arc::clone(&breakers),
            breaker_config,
            shutdown.clone(),
        );

        let state = Arc::new(AppState::new(
            config,
            tickets,
            jobs,
            history_repo,
            log_repo,
            lock_service,
            classifier,
            notifier,
            breakers,
            shutdown,
        ));

        Self { state }
    }

    fn server(&self) -> TestServer {
        TestServer::new(build_router(Arc::clone(&self.state))).expect("failed to build test server")
    }

    fn ticket(&self, tenant_id: &str, external_id: &str) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_owned(),
            external_id: external_id.to_owned(),
            customer_id: "cust-1".into(),
            subject: "billing question".into(),
            message: "my invoice looks wrong".into(),
            source: "api".into(),
            status: TicketStatus::Open,
            urgency: Urgency::Medium,
            sentiment: ingestd::model::Sentiment::Neutral,
            requires_action: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    async fn insert_ticket(&self, ticket: Ticket) -> Ticket {
        use ingestd::store::TicketRepository;
        let (stored, _created) = self.state.tickets.upsert(ticket).await.expect("upsert ticket");
        stored
    }
}

#[tokio::test]
async fn health_reports_store_and_breakers() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"]["healthy"], true);
    assert!(body["breakers"].as_array().is_some());
}

#[tokio::test]
async fn health_is_exempt_from_auth() {
    let fx = Fixture::new(Some("secret-token".into()));
    let server = fx.server();

    // No Authorization header at all.
    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let fx = Fixture::new(Some("secret-token".into()));
    let server = fx.server();

    let resp = server.get("/api/v1/tenants/acme/tickets").await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_with_wrong_token_is_unauthorized() {
    let fx = Fixture::new(Some("secret-token".into()));
    let server = fx.server();

    let resp = server
        .get("/api/v1/tenants/acme/tickets")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer wrong-token")
        .await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_with_correct_token_succeeds() {
    let fx = Fixture::new(Some("secret-token".into()));
    let server = fx.server();

    let resp = server
        .get("/api/v1/tenants/acme/tickets")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer secret-token")
        .await;
    resp.assert_status_ok();
}

#[tokio::test]
async fn list_tickets_rejects_blank_tenant_id() {
    let fx = Fixture::new(None);
    let server = fx.server();

    // Routing still matches a literal space; the handler rejects it.
    let resp = server.get("/api/v1/tenants/%20/tickets").await;
    resp.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn list_and_get_tickets_are_tenant_scoped() {
    let fx = Fixture::new(None);
    fx.insert_ticket(fx.ticket("acme", "t-1")).await;
    fx.insert_ticket(fx.ticket("acme", "t-2")).await;
    fx.insert_ticket(fx.ticket("globex", "t-3")).await;
    let server = fx.server();

    let resp = server.get("/api/v1/tenants/acme/tickets").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let items = body["items"].as_array().expect("items array");
    assert_eq!(items.len(), 2);

    let resp = server.get("/api/v1/tenants/globex/tickets").await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["items"].as_array().expect("items array").len(), 1);
}

#[tokio::test]
async fn get_ticket_from_wrong_tenant_is_not_found() {
    let fx = Fixture::new(None);
    let ticket = fx.insert_ticket(fx.ticket("acme", "t-1")).await;
    let server = fx.server();

    let resp = server.get(&format!("/api/v1/tenants/globex/tickets/{}", ticket.id)).await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ticket_history_for_unknown_ticket_is_not_found() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.get("/api/v1/tenants/acme/tickets/does-not-exist/history").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ticket_history_lists_recorded_entries() {
    let fx = Fixture::new(None);
    let ticket = fx.insert_ticket(fx.ticket("acme", "t-1")).await;

    fx.state
        .history
        .record(&ticket.id, "acme", HistoryAction::Created, Default::default())
        .await
        .expect("record history");

    let server = fx.server();
    let resp = server.get(&format!("/api/v1/tenants/acme/tickets/{}/history", ticket.id)).await;
    resp.assert_status_ok();
    let entries: Vec<serde_json::Value> = resp.json();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "created");
}

#[tokio::test]
async fn lock_status_is_empty_before_any_ingestion_run() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.get("/api/v1/tenants/acme/lock").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body.is_null());
}

#[tokio::test]
async fn ingestion_status_is_null_when_nothing_running() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.get("/api/v1/tenants/acme/ingest/status").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body.is_null());
}

#[tokio::test]
async fn cancel_ingestion_with_no_running_job_is_not_found() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.post("/api/v1/tenants/acme/ingest/cancel").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trigger_ingestion_without_upstream_url_fails_fast() {
    // No `upstream_url` configured: the orchestrator acquires the lock,
    // creates the job, then fails the first page fetch immediately. The
    // triggering request still gets a 200 with the freshly created job —
    // failure surfaces in the job's own status, polled separately.
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.post("/api/v1/tenants/acme/ingest").await;
    resp.assert_status_ok();
    let job: serde_json::Value = resp.json();
    assert_eq!(job["tenant_id"], "acme");
    assert_eq!(job["status"], "running");
}

#[tokio::test]
async fn list_breakers_starts_empty_until_first_use() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.get("/api/v1/breakers").await;
    resp.assert_status_ok();
    let breakers: Vec<serde_json::Value> = resp.json();
    assert!(breakers.is_empty());
}

#[tokio::test]
async fn reset_breaker_creates_it_closed() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.post("/api/v1/breakers/some-breaker/reset").await;
    resp.assert_status_ok();

    let resp = server.get("/api/v1/breakers").await;
    let breakers: Vec<serde_json::Value> = resp.json();
    assert_eq!(breakers.len(), 1);
    assert_eq!(breakers[0]["name"], "some-breaker");
    assert_eq!(breakers[0]["state"], "closed");
}

#[tokio::test]
async fn tenant_stats_reports_zero_for_an_unseen_tenant() {
    let fx = Fixture::new(None);
    let server = fx.server();

    let resp = server.get("/api/v1/tenants/acme/stats").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["total_tickets"], 0);
}
