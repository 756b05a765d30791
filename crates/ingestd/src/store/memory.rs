// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store implementations, backed by `RwLock<HashMap<..>>`.
//! Intended for tests and local development; not durable and not shared
//! across processes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::{
    HistoryEntry, IngestionJob, IngestionLogEntry, IngestionStats, JobStatus, LockRecord, Ticket,
    TicketStatus,
};
use crate::store::{
    HistoryRepository, IngestionLogRepository, JobRepository, LockOutcome, LockRepository, Page,
    TenantStats, TicketFilter, TicketRepository,
};

#[derive(Default)]
pub struct MemoryTicketRepository {
    // Keyed by surrogate id; the (tenant_id, external_id) uniqueness
    // constraint is enforced by the secondary index below.
    rows: RwLock<HashMap<String, Ticket>>,
    by_natural_key: RwLock<HashMap<(String, String), String>>,
}

impl MemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketRepository for MemoryTicketRepository {
    async fn upsert(&self, mut ticket: Ticket) -> anyhow::Result<(Ticket, bool)> {
        let key = (ticket.tenant_id.clone(), ticket.external_id.clone());
        let mut by_key = self.by_natural_key.write().await;
        let mut rows = self.rows.write().await;

        if let Some(existing_id) = by_key.get(&key) {
            let existing = rows.get(existing_id).cloned();
            if let Some(existing) = existing {
                ticket.id = existing.id.clone();
                ticket.created_at = existing.created_at;
                rows.insert(existing.id.clone(), ticket.clone());
                return Ok((ticket, false));
            }
        }

        by_key.insert(key, ticket.id.clone());
        rows.insert(ticket.id.clone(), ticket.clone());
        Ok((ticket, true))
    }

    async fn get(&self, tenant_id: &str, external_id: &str) -> anyhow::Result<Option<Ticket>> {
        let by_key = self.by_natural_key.read().await;
        let Some(id) = by_key.get(&(tenant_id.to_owned(), external_id.to_owned())) else {
            return Ok(None);
        };
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Ticket>> {
        Ok(self.rows.read().await.get(id).filter(|t| t.tenant_id == tenant_id).cloned())
    }

    async fn list_tickets(
        &self,
        tenant_id: &str,
        filter: TicketFilter,
    ) -> anyhow::Result<Page<Ticket>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Ticket> = rows
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .filter(|t| filter.include_deleted || !t.is_deleted())
            .filter(|t| filter.status.map(|s| s as u8 == t.status as u8).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let skip = filter.skip.max(0) as usize;
        let limit = if filter.limit <= 0 { matching.len() } else { filter.limit as usize };
        let has_more = matching.len() > skip + limit;
        let items = matching.into_iter().skip(skip).take(limit).collect();
        Ok(Page { items, has_more })
    }

    async fn list_missing(
        &self,
        tenant_id: &str,
        seen_external_ids: &[String],
    ) -> anyhow::Result<Vec<Ticket>> {
        let seen: std::collections::HashSet<&String> = seen_external_ids.iter().collect();
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|t| t.tenant_id == tenant_id && !t.is_deleted())
            .filter(|t| !seen.contains(&t.external_id))
            .cloned()
            .collect())
    }

    async fn soft_delete(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(ticket) = rows.get_mut(id) {
            if ticket.tenant_id == tenant_id {
                ticket.deleted_at = Some(at);
                ticket.updated_at = at;
            }
        }
        Ok(())
    }

    async fn tenant_stats(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<TenantStats> {
        let rows = self.rows.read().await;
        // total_tickets/by_status/urgency_high_ratio are all-time for the
        // tenant; only hourly_trend is scoped to [from, to].
        let matching: Vec<&Ticket> =
            rows.values().filter(|t| t.tenant_id == tenant_id && !t.is_deleted()).collect();

        let total_tickets = matching.len() as u64;
        let mut by_status = std::collections::BTreeMap::new();
        let mut high_count = 0u64;
        let mut hourly: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();

        for ticket in &matching {
            let status_key = status_key(ticket.status);
            *by_status.entry(status_key).or_insert(0) += 1;
            if matches!(ticket.urgency, crate::model::Urgency::High) {
                high_count += 1;
            }
            if ticket.created_at >= from && ticket.created_at <= to {
                let hour = ticket.created_at.format("%Y-%m-%d %H:00").to_string();
                *hourly.entry(hour).or_insert(0) += 1;
            }
        }

        let urgency_high_ratio =
            if total_tickets > 0 { high_count as f64 / total_tickets as f64 } else { 0.0 };

        Ok(TenantStats {
            total_tickets,
            by_status,
            urgency_high_ratio,
            hourly_trend: hourly
                .into_iter()
                .map(|(hour, count)| crate::store::HourlyBucket { hour, count })
                .collect(),
        })
    }
}

fn status_key(status: TicketStatus) -> String {
    match status {
        TicketStatus::Open => "open",
        TicketStatus::Pending => "pending",
        TicketStatus::Closed => "closed",
    }
    .to_owned()
}

#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: RwLock<HashMap<String, IngestionJob>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create(&self, job: IngestionJob) -> anyhow::Result<()> {
        self.jobs.write().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        stats: IngestionStats,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.status = status;
            job.stats = stats;
            job.error = error;
            job.finished_at = Some(at);
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        job_id: &str,
        processed_pages: u64,
        total_pages: Option<u64>,
    ) -> anyhow::Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.processed_pages = processed_pages;
            job.total_pages = total_pages;
        }
        Ok(())
    }

    async fn get(&self, job_id: &str) -> anyhow::Result<Option<IngestionJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn running_for_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<IngestionJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .find(|j| j.tenant_id == tenant_id && j.status == JobStatus::Running)
            .cloned())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<IngestionJob>> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<IngestionJob> =
            jobs.values().filter(|j| j.tenant_id == tenant_id).cloned().collect();
        list.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        list.truncate(if limit <= 0 { list.len() } else { limit as usize });
        Ok(list)
    }
}

#[derive(Default)]
pub struct MemoryHistoryRepository {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRepository for MemoryHistoryRepository {
    async fn record(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_for_ticket(
        &self,
        ticket_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<HistoryEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<HistoryEntry> =
            entries.iter().filter(|e| e.ticket_id == ticket_id).cloned().collect();
        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        matching.truncate(if limit <= 0 { matching.len() } else { limit as usize });
        Ok(matching)
    }
}

#[derive(Default)]
pub struct MemoryIngestionLogRepository {
    entries: RwLock<Vec<IngestionLogEntry>>,
}

impl MemoryIngestionLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestionLogRepository for MemoryIngestionLogRepository {
    async fn record(&self, entry: IngestionLogEntry) -> anyhow::Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<IngestionLogEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<IngestionLogEntry> =
            entries.iter().filter(|e| e.tenant_id == tenant_id).cloned().collect();
        matching.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        matching.truncate(if limit <= 0 { matching.len() } else { limit as usize });
        Ok(matching)
    }
}

#[derive(Default)]
pub struct MemoryLockRepository {
    locks: RwLock<HashMap<String, LockRecord>>,
}

impl MemoryLockRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockRepository for MemoryLockRepository {
    async fn acquire(
        &self,
        name: &str,
        owner_id: &str,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LockOutcome> {
        // A single write-lock critical section makes this check-and-set
        // atomic with respect to other callers of this in-memory store,
        // the equivalent guarantee the Mongo backend gets from
        // `find_one_and_update`.
        let mut locks = self.locks.write().await;
        match locks.get(name) {
            Some(existing) if existing.locked && existing.expires_at > now => {
                Ok(LockOutcome::AlreadyHeld)
            }
            _ => {
                locks.insert(
                    name.to_owned(),
                    LockRecord {
                        name: name.to_owned(),
                        owner_id: owner_id.to_owned(),
                        locked: true,
                        acquired_at: now,
                        expires_at: now + ttl,
                    },
                );
                Ok(LockOutcome::Acquired)
            }
        }
    }

    async fn release(&self, name: &str, owner_id: &str) -> anyhow::Result<bool> {
        let mut locks = self.locks.write().await;
        match locks.get(name) {
            Some(existing) if existing.owner_id == owner_id => {
                locks.remove(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn refresh(
        &self,
        name: &str,
        owner_id: &str,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut locks = self.locks.write().await;
        match locks.get_mut(name) {
            Some(existing) if existing.owner_id == owner_id && existing.locked => {
                existing.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn status(&self, name: &str) -> anyhow::Result<Option<LockRecord>> {
        Ok(self.locks.read().await.get(name).cloned())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, lock| lock.expires_at > now);
        Ok((before - locks.len()) as u64)
    }
}
