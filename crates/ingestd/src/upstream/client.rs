// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the upstream ticket source API.
//!
//! A thin `reqwest` wrapper (base URL + bearer token +
//! `.error_for_status()?.json().await?`), with pagination and
//! `429 Too Many Requests` handling for the ticket source's paged listing
//! endpoint.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::model::RawTicket;

/// HTTP client wrapper for the upstream ticket source.
pub struct UpstreamClient {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
}

/// One page of the upstream ticket listing.
#[derive(Debug, Deserialize)]
pub struct TicketPage {
    pub tickets: Vec<RawTicket>,
    pub next_page: Option<u32>,
    pub total_count: u64,
}

/// Classification of a failed page fetch, distinguishing the three retry
/// policies the orchestrator applies: throttled fetches retry the same
/// page after honoring `Retry-After`, transient failures get a bounded
/// exponential backoff, and fatal ones are recorded and the page is
/// skipped outright.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream rate limited this client, retry after {0:?}")]
    RateLimited(Duration),
    #[error("transient upstream error: {0}")]
    Transient(String),
    #[error("fatal upstream error: {0}")]
    Fatal(String),
}

impl UpstreamClient {
    pub fn new(base_url: String, auth_token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_owned(), auth_token, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Check upstream reachability.
    pub async fn health(&self) -> anyhow::Result<()> {
        let req = self.client.get(self.url("/health"));
        self.apply_auth(req).send().await?.error_for_status()?;
        Ok(())
    }

    /// Fetch one page of tickets for a tenant.
    ///
    /// Classifies failures instead of collapsing them into one error type:
    /// a `429` reports the upstream's `Retry-After` back to the caller
    /// without sleeping here (the caller's retry goes through the rate
    /// limiter first), a transport-level error or `5xx` is `Transient`, and
    /// any other non-2xx status is `Fatal`.
    pub async fn fetch_page(
        &self,
        tenant_id: &str,
        page: u32,
        page_size: u32,
        include_deleted: bool,
    ) -> Result<TicketPage, FetchError> {
        let req = self.client.get(self.url("/external/support-tickets")).query(&[
            ("tenant_id", tenant_id.to_owned()),
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
            ("include_deleted", include_deleted.to_string()),
        ]);

        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(FetchError::RateLimited(Duration::from_secs(retry_after)));
        }

        if resp.status().is_server_error() {
            return Err(FetchError::Transient(format!("upstream returned {}", resp.status())));
        }
        if resp.status().is_client_error() {
            return Err(FetchError::Fatal(format!("upstream returned {}", resp.status())));
        }

        resp.json().await.map_err(|e| FetchError::Fatal(format!("decoding page: {e}")))
    }
}

fn classify_transport_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        FetchError::Transient(e.to_string())
    } else {
        FetchError::Fatal(e.to_string())
    }
}
