// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion orchestrator: runs one ingestion job per tenant, coordinating
//! the lock service, rate limiter, circuit breaker, upstream client, and
//! sync engine, and reporting job status through [`crate::store::JobRepository`].
//!
//! A run is a background task (spawned from [`Orchestrator::start`]) so the
//! triggering HTTP request returns immediately with a job id and status is
//! polled separately. Cancellation is cooperative via a per-job
//! [`CancellationToken`], checked between upstream pages so a cancelled
//! run stops promptly without corrupting partially-synced state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::error::IngestError;
use crate::lock_service::{LockGuard, LockService};
use crate::model::{IngestionJob, IngestionLogEntry, IngestionStats, JobStatus};
use crate::notifier::{NotificationRequest, Notifier};
use crate::rate_limiter::RateLimiter;
use crate::store::{IngestionLogRepository, JobRepository};
use crate::sync_engine::{SyncEngine, SyncOutcome};
use crate::upstream::client::{FetchError, TicketPage, UpstreamClient};

const UPSTREAM_BREAKER_NAME: &str = "upstream-ticket-source";

/// Bound on per-page transient-error retries before the page is skipped
/// (spec'd as "bounded exponential backoff with a bounded retry count").
const MAX_TRANSIENT_RETRIES: u32 = 3;
const TRANSIENT_BACKOFF_BASE: std::time::Duration = std::time::Duration::from_millis(250);

pub struct Orchestrator {
    jobs: Arc<dyn JobRepository>,
    log: Arc<dyn IngestionLogRepository>,
    lock_service: Arc<LockService>,
    rate_limiter: Arc<RateLimiter>,
    breakers: Arc<BreakerRegistry>,
    breaker_config: CircuitBreakerConfig,
    sync_engine: Arc<SyncEngine>,
    notifier: Notifier,
    upstream_url: Option<String>,
    upstream_token: Option<String>,
    page_size: u32,
    lock_refresh_interval: std::time::Duration,
    running: RwLock<HashMap<String, CancellationToken>>,
}

#[allow(clippy::too_many_arguments)]
impl Orchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        log: Arc<dyn IngestionLogRepository>,
        lock_service: Arc<LockService>,
        rate_limiter: Arc<RateLimiter>,
        breakers: Arc<BreakerRegistry>,
        breaker_config: CircuitBreakerConfig,
        sync_engine: Arc<SyncEngine>,
        notifier: Notifier,
        upstream_url: Option<String>,
        upstream_token: Option<String>,
        page_size: u32,
        lock_ttl: chrono::Duration,
    ) -> Self {
        let ttl_secs = lock_ttl.num_seconds().max(2) as u64;
        Self {
            jobs,
            log,
            lock_service,
            rate_limiter,
            breakers,
            breaker_config,
            sync_engine,
            notifier,
            upstream_url,
            upstream_token,
            page_size,
            lock_refresh_interval: std::time::Duration::from_secs(ttl_secs / 2),
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Start an ingestion run for `tenant_id`, returning the freshly
    /// created job record. Fails with [`IngestError::AlreadyRunning`] if a
    /// run is already in progress for this tenant — the lock service is the
    /// source of truth for that, not an in-process check, so this is safe
    /// under multiple `ingestd` instances sharing one Mongo deployment.
    pub async fn start(self: &Arc<Self>, tenant_id: &str) -> crate::error::Result<IngestionJob> {
        let job_id = Uuid::new_v4().to_string();

        if !self
            .lock_service
            .acquire(tenant_id, &job_id)
            .await
            .map_err(IngestError::Store)?
        {
            return Err(IngestError::AlreadyRunning(tenant_id.to_owned()));
        }
        let lock_guard =
            LockGuard::new(Arc::clone(&self.lock_service), tenant_id.to_owned(), job_id.clone());

        let now = Utc::now();
        let job = IngestionJob {
            id: job_id.clone(),
            tenant_id: tenant_id.to_owned(),
            status: JobStatus::Running,
            started_at: now,
            finished_at: None,
            stats: IngestionStats::default(),
            processed_pages: 0,
            total_pages: None,
            error: None,
        };
        self.jobs.create(job.clone()).await.map_err(IngestError::Store)?;

        let cancel = CancellationToken::new();
        self.running.write().await.insert(tenant_id.to_owned(), cancel.clone());

        let this = Arc::clone(self);
        let tenant_id = tenant_id.to_owned();
        let job_id_for_task = job_id.clone();
        tokio::spawn(async move {
            let outcome = this.run(&tenant_id, &job_id_for_task, cancel.clone()).await;
            this.running.write().await.remove(&tenant_id);
            drop(lock_guard);
            this.finish_job(&tenant_id, &job_id_for_task, now, outcome).await;
        });

        Ok(job)
    }

    /// Request cancellation of the running job for a tenant. Returns
    /// `false` if no job is currently running.
    pub async fn cancel(&self, tenant_id: &str) -> bool {
        if let Some(token) = self.running.read().await.get(tenant_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    async fn finish_job(
        &self,
        tenant_id: &str,
        job_id: &str,
        started_at: chrono::DateTime<Utc>,
        outcome: RunOutcome,
    ) {
        let finished_at = Utc::now();
        let (status, error) = match &outcome {
            RunOutcome::Completed(_) => (JobStatus::Completed, None),
            RunOutcome::Cancelled(_) => (JobStatus::Cancelled, None),
            RunOutcome::Failed(_, e) => (JobStatus::Failed, Some(e.clone())),
        };
        let stats = outcome.stats();

        if let Err(e) =
            self.jobs.finish(job_id, status, stats.clone(), error.clone(), finished_at).await
        {
            tracing::error!(tenant_id, job_id, err = %e, "failed to record job completion");
        }

        let log_entry = IngestionLogEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_owned(),
            job_id: job_id.to_owned(),
            status,
            stats,
            started_at,
            finished_at,
            error,
        };
        if let Err(e) = self.log.record(log_entry).await {
            tracing::error!(tenant_id, job_id, err = %e, "failed to record ingestion log entry");
        }
    }

    async fn run(&self, tenant_id: &str, job_id: &str, cancel: CancellationToken) -> RunOutcome {
        let Some(upstream_url) = self.upstream_url.clone() else {
            return RunOutcome::Failed(
                IngestionStats::default(),
                "no upstream_url configured".to_owned(),
            );
        };

        let client = match UpstreamClient::new(upstream_url, self.upstream_token.clone()) {
            Ok(c) => c,
            Err(e) => return RunOutcome::Failed(IngestionStats::default(), e.to_string()),
        };

        let breaker = self.breakers.get_or_create(UPSTREAM_BREAKER_NAME, self.breaker_config.clone());
        let mut stats = IngestionStats::default();
        let mut seen_external_ids = Vec::new();
        let mut page_num: u32 = 1;
        let mut processed_pages: u64 = 0;
        let mut last_refresh = tokio::time::Instant::now();

        loop {
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled(stats);
            }

            if last_refresh.elapsed() >= self.lock_refresh_interval {
                if let Err(e) = self.lock_service.refresh(tenant_id, job_id).await {
                    tracing::warn!(tenant_id, job_id, err = %e, "lock refresh failed");
                }
                last_refresh = tokio::time::Instant::now();
            }

            let Some(page) = self
                .fetch_page_with_retry(
                    &client,
                    &breaker,
                    tenant_id,
                    job_id,
                    page_num,
                    &cancel,
                    &mut stats,
                )
                .await
            else {
                if cancel.is_cancelled() {
                    return RunOutcome::Cancelled(stats);
                }
                // The page was skipped after exhausting its retries (or
                // failed fatally). We have no later page number to resume
                // from, so the run ends here with whatever was already synced.
                break;
            };

            for raw in page.tickets {
                if cancel.is_cancelled() {
                    return RunOutcome::Cancelled(stats);
                }

                stats.fetched += 1;
                seen_external_ids.push(raw.external_id.clone());

                match self.sync_engine.sync_ticket(tenant_id, raw).await {
                    Ok((SyncOutcome::Created, ticket)) => {
                        stats.created += 1;
                        self.maybe_notify(tenant_id, &ticket);
                    }
                    Ok((SyncOutcome::Updated, ticket)) => {
                        stats.updated += 1;
                        self.maybe_notify(tenant_id, &ticket);
                    }
                    Ok((SyncOutcome::Unchanged, _)) => stats.unchanged += 1,
                    Err(e) => {
                        tracing::warn!(tenant_id, job_id, err = %e, "skipping ticket after sync error");
                        stats.errors += 1;
                    }
                }
            }

            processed_pages += 1;
            let total_pages = if self.page_size > 0 {
                Some(page.total_count.div_ceil(self.page_size as u64))
            } else {
                None
            };
            if let Err(e) = self.jobs.update_progress(job_id, processed_pages, total_pages).await {
                tracing::warn!(tenant_id, job_id, err = %e, "failed to persist ingestion progress");
            }

            match page.next_page {
                Some(next) => page_num = next,
                None => break,
            }
        }

        match self.sync_engine.detect_and_delete_missing(tenant_id, &seen_external_ids).await {
            Ok(deleted) => stats.deleted = deleted,
            Err(e) => tracing::warn!(tenant_id, job_id, err = %e, "deletion detection failed"),
        }

        tracing::info!(tenant_id, job_id, ?stats, "ingestion run completed");
        RunOutcome::Completed(stats)
    }

    /// Fetch one page, applying the retry policy for each failure kind:
    /// `RateLimited` retries the same page after honoring `Retry-After`
    /// (itself re-acquiring the rate limiter first), `Transient` retries up
    /// to [`MAX_TRANSIENT_RETRIES`] times with exponential backoff, and
    /// `Fatal` is recorded and returns `None` immediately. Returns `None`
    /// (after incrementing `stats.skipped`) once a page is given up on, or
    /// if cancellation fires while waiting.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_page_with_retry(
        &self,
        client: &UpstreamClient,
        breaker: &crate::circuit_breaker::CircuitBreaker,
        tenant_id: &str,
        job_id: &str,
        page: u32,
        cancel: &CancellationToken,
        stats: &mut IngestionStats,
    ) -> Option<TicketPage> {
        let mut transient_attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return None;
            }

            loop {
                match self.rate_limiter.try_acquire() {
                    Ok(()) => break,
                    Err(wait) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return None,
                            _ = tokio::time::sleep(wait) => {}
                        }
                    }
                }
            }

            if let Err(e) = breaker.permit() {
                tracing::warn!(tenant_id, job_id, err = %e, "breaker open, skipping page");
                stats.skipped += 1;
                return None;
            }

            match client.fetch_page(tenant_id, page, self.page_size, false).await {
                Ok(page) => {
                    breaker.record_success();
                    return Some(page);
                }
                Err(FetchError::RateLimited(retry_after)) => {
                    breaker.record_success();
                    tracing::warn!(tenant_id, job_id, ?retry_after, "upstream throttled, retrying page");
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(retry_after) => {}
                    }
                    // Loops back around to re-acquire the rate limiter before
                    // retrying, per the throttled-retry contract.
                }
                Err(FetchError::Transient(msg)) => {
                    breaker.record_failure();
                    transient_attempts += 1;
                    if transient_attempts > MAX_TRANSIENT_RETRIES {
                        tracing::warn!(tenant_id, job_id, err = %msg, "page failed after retries, skipping");
                        stats.skipped += 1;
                        return None;
                    }
                    let backoff = TRANSIENT_BACKOFF_BASE * 2u32.pow(transient_attempts - 1);
                    tracing::warn!(tenant_id, job_id, err = %msg, attempt = transient_attempts, ?backoff, "transient upstream error, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(FetchError::Fatal(msg)) => {
                    breaker.record_failure();
                    tracing::warn!(tenant_id, job_id, err = %msg, "fatal upstream error, skipping page");
                    stats.skipped += 1;
                    return None;
                }
            }
        }
    }

    /// Queue a notification for tickets the classifier flagged as high
    /// urgency or needing action.
    fn maybe_notify(&self, tenant_id: &str, ticket: &crate::model::Ticket) {
        if ticket.urgency != crate::model::Urgency::High && !ticket.requires_action {
            return;
        }
        self.notifier.notify(NotificationRequest {
            ticket_id: ticket.id.clone(),
            tenant_id: tenant_id.to_owned(),
            urgency: ticket.urgency,
            reason: if ticket.urgency == crate::model::Urgency::High {
                "high urgency ticket synced".to_owned()
            } else {
                "ticket requires action".to_owned()
            },
        });
    }
}

enum RunOutcome {
    Completed(IngestionStats),
    Cancelled(IngestionStats),
    Failed(IngestionStats, String),
}

impl RunOutcome {
    fn stats(&self) -> IngestionStats {
        match self {
            Self::Completed(s) | Self::Cancelled(s) | Self::Failed(s, _) => s.clone(),
        }
    }
}

/// Periodically releases expired locks, independent of any particular
/// tenant's ingestion run.
pub fn spawn_lock_sweeper(
    lock_service: Arc<LockService>,
    interval: std::time::Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            match lock_service.sweep_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "swept expired locks"),
                Err(e) => tracing::warn!(err = %e, "lock sweep failed"),
            }
        }
    });
}
