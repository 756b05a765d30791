// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `ingestd` binary and drive it
//! over HTTP, including a full ingestion run against an in-process mock
//! upstream ticket source.

use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ingestd_specs::IngestdProcess;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn spawn_mock_upstream(tickets: serde_json::Value) -> String {
    async fn health() -> &'static str {
        "ok"
    }

    async fn list_tickets(State(tickets): State<serde_json::Value>) -> Json<serde_json::Value> {
        let total_count = tickets.as_array().map(|a| a.len()).unwrap_or(0);
        Json(serde_json::json!({ "tickets": tickets, "next_page": null, "total_count": total_count }))
    }

    let router = Router::new()
        .route("/health", get(health))
        .route("/external/support-tickets", get(list_tickets))
        .with_state(tickets);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_health_reports_ok_with_no_dependencies_configured() -> anyhow::Result<()> {
    let daemon = IngestdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(daemon.health_url()).await?.json().await?;
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["store"]["healthy"], true);
    assert!(resp["breakers"].as_array().is_some());

    Ok(())
}

#[tokio::test]
async fn http_protected_routes_require_bearer_token() -> anyhow::Result<()> {
    let daemon = IngestdProcess::build().auth_token("smoke-secret").spawn()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/tenants/acme/tickets", daemon.base_url());

    let unauthorized = client.get(&url).send().await?;
    assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

    let authorized = client.get(&url).bearer_auth("smoke-secret").send().await?;
    assert_eq!(authorized.status(), reqwest::StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn http_full_ingestion_run_against_mock_upstream() -> anyhow::Result<()> {
    let upstream = spawn_mock_upstream(serde_json::json!([
        {
            "external_id": "SMOKE-1",
            "customer_id": "cust-1",
            "subject": "Outage",
            "message": "production is down, urgent please help",
            "created_at": "2026-07-30T12:00:00Z",
            "updated_at": "2026-07-30T12:00:00Z"
        }
    ]))
    .await;

    let daemon = IngestdProcess::build().upstream_url(&upstream).spawn()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = daemon.base_url();

    let job: serde_json::Value = client
        .post(format!("{base}/api/v1/tenants/acme/ingest"))
        .send()
        .await?
        .json()
        .await?;
    let job_id = job["id"].as_str().expect("job id present").to_owned();

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let finished = loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("ingestion job never finished");
        }
        let polled: serde_json::Value = client
            .get(format!("{base}/api/v1/tenants/acme/jobs/{job_id}"))
            .send()
            .await?
            .json()
            .await?;
        if polled["status"] != "running" {
            break polled;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["stats"]["created"], 1);

    let tickets: serde_json::Value = client
        .get(format!("{base}/api/v1/tenants/acme/tickets"))
        .send()
        .await?
        .json()
        .await?;
    let items = tickets["items"].as_array().expect("items array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["urgency"], "high");

    let stats: serde_json::Value = client
        .get(format!(
            "{base}/api/v1/tenants/acme/stats?from=2020-01-01T00:00:00Z&to=2030-01-01T00:00:00Z"
        ))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stats["total_tickets"], 1);

    Ok(())
}

#[tokio::test]
async fn http_ingestion_status_tracks_the_running_job() -> anyhow::Result<()> {
    let upstream = spawn_mock_upstream(serde_json::json!([])).await;
    let daemon = IngestdProcess::build().upstream_url(&upstream).spawn()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = daemon.base_url();

    let before: serde_json::Value = client
        .get(format!("{base}/api/v1/tenants/acme/ingest/status"))
        .send()
        .await?
        .json()
        .await?;
    assert!(before.is_null());

    client.post(format!("{base}/api/v1/tenants/acme/ingest")).send().await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("ingestion status never cleared");
        }
        let status: serde_json::Value = client
            .get(format!("{base}/api/v1/tenants/acme/ingest/status"))
            .send()
            .await?
            .json()
            .await?;
        if status.is_null() {
            // The empty-upstream run finished and cleared its own status.
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok(())
}

#[tokio::test]
async fn http_unknown_job_is_not_found() -> anyhow::Result<()> {
    let daemon = IngestdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!(
        "{}/api/v1/tenants/acme/jobs/does-not-exist",
        daemon.base_url()
    ))
    .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    Ok(())
}

