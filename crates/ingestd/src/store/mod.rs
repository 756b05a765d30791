// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage ports. Each trait is a seam between the domain logic in the
//! sibling modules (`sync_engine`, `lock_service`, `history`, `orchestrator`,
//! `analytics`) and a concrete backend — [`memory`] for tests and local
//! development, [`mongo`] for production.
//!
//! Traits are `async_trait` and object-safe so `AppState` can hold
//! `Arc<dyn TicketRepository>` etc. without committing to a backend at
//! compile time.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    HistoryEntry, IngestionJob, IngestionLogEntry, IngestionStats, JobStatus, LockRecord, Ticket,
};

/// A page of results plus whether more pages exist, used by list operations
/// that may return more rows than a single response should carry.
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Filters accepted by [`TicketRepository::list_tickets`].
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub include_deleted: bool,
    pub status: Option<crate::model::TicketStatus>,
    pub limit: i64,
    pub skip: i64,
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Insert a new ticket or update the existing one with the same
    /// `(tenant_id, external_id)`, returning the stored row and whether it
    /// was newly created. Must be atomic with respect to concurrent callers
    /// for the same key — see [`mongo::MongoTicketRepository::upsert`] for
    /// the `find_one_and_update` implementation backing this guarantee.
    async fn upsert(&self, ticket: Ticket) -> anyhow::Result<(Ticket, bool)>;

    async fn get(&self, tenant_id: &str, external_id: &str) -> anyhow::Result<Option<Ticket>>;

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Ticket>>;

    async fn list_tickets(
        &self,
        tenant_id: &str,
        filter: TicketFilter,
    ) -> anyhow::Result<Page<Ticket>>;

    /// List every non-deleted ticket for a tenant whose `external_id` is not
    /// in `seen_external_ids`, i.e. tickets the upstream source stopped
    /// reporting. Used by the sync engine to detect deletions.
    async fn list_missing(
        &self,
        tenant_id: &str,
        seen_external_ids: &[String],
    ) -> anyhow::Result<Vec<Ticket>>;

    async fn soft_delete(&self, tenant_id: &str, id: &str, at: DateTime<Utc>)
        -> anyhow::Result<()>;

    /// Aggregate per-tenant statistics. Implemented as a single aggregation
    /// pipeline in the Mongo backend (see [`mongo`]) so latency stays
    /// proportional to one pass over the tenant's tickets rather than one
    /// round trip per metric.
    async fn tenant_stats(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<TenantStats>;
}

/// Aggregate ticket statistics for a tenant over a time window.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TenantStats {
    pub total_tickets: u64,
    pub by_status: std::collections::BTreeMap<String, u64>,
    pub urgency_high_ratio: f64,
    pub hourly_trend: Vec<HourlyBucket>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HourlyBucket {
    pub hour: String,
    pub count: u64,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: IngestionJob) -> anyhow::Result<()>;

    async fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        stats: IngestionStats,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Persist the page-loop's progress counters between ticks, independent
    /// of [`JobRepository::finish`], so a status poll mid-run sees how far
    /// the job has gotten rather than only fetched/created/etc. totals.
    async fn update_progress(
        &self,
        job_id: &str,
        processed_pages: u64,
        total_pages: Option<u64>,
    ) -> anyhow::Result<()>;

    async fn get(&self, job_id: &str) -> anyhow::Result<Option<IngestionJob>>;

    /// The currently running job for a tenant, if any. Used by the HTTP
    /// layer to report lock/job status without going through the lock
    /// service itself.
    async fn running_for_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<IngestionJob>>;

    async fn list_for_tenant(&self, tenant_id: &str, limit: i64) -> anyhow::Result<Vec<IngestionJob>>;
}

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> anyhow::Result<()>;

    async fn list_for_ticket(&self, ticket_id: &str, limit: i64) -> anyhow::Result<Vec<HistoryEntry>>;
}

#[async_trait]
pub trait IngestionLogRepository: Send + Sync {
    async fn record(&self, entry: IngestionLogEntry) -> anyhow::Result<()>;

    async fn list_for_tenant(&self, tenant_id: &str, limit: i64) -> anyhow::Result<Vec<IngestionLogEntry>>;
}

/// Outcome of a lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    AlreadyHeld,
}

#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Atomically acquire `name` for `owner_id`, succeeding if the lock is
    /// free or its previous holder's lease has expired. Must be implemented
    /// as a single compare-and-swap operation — a separate read-then-write
    /// admits a race where two callers both observe the lock as free and
    /// both proceed to "acquire" it. See [`mongo::MongoLockRepository::acquire`].
    async fn acquire(
        &self,
        name: &str,
        owner_id: &str,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LockOutcome>;

    async fn release(&self, name: &str, owner_id: &str) -> anyhow::Result<bool>;

    async fn refresh(
        &self,
        name: &str,
        owner_id: &str,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn status(&self, name: &str) -> anyhow::Result<Option<LockRecord>>;

    /// Release every lock whose lease has expired as of `now`. Run
    /// periodically so `status()` calls made between runs reads don't have
    /// to special-case expiry themselves.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;
}
