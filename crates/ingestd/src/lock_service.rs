// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed lock service used to serialize ingestion runs per tenant.
//!
//! Delegates the actual compare-and-swap to [`crate::store::LockRepository`]
//! — see `store::mongo::MongoLockRepository::acquire` for why that must be
//! one atomic operation rather than a read followed by a write. This module
//! adds the TTL/naming policy on top: lock names are namespaced
//! `ingestion:{tenant_id}` so two tenants' ingestion runs never contend,
//! with a 60-second default TTL.

use std::sync::Arc;

use chrono::Utc;

use crate::store::{LockOutcome, LockRecord, LockRepository};

pub struct LockService {
    repo: Arc<dyn LockRepository>,
    ttl: chrono::Duration,
}

impl LockService {
    pub fn new(repo: Arc<dyn LockRepository>, ttl: chrono::Duration) -> Self {
        Self { repo, ttl }
    }

    fn lock_name(tenant_id: &str) -> String {
        format!("ingestion:{tenant_id}")
    }

    /// Attempt to acquire the ingestion lock for a tenant. `owner_id`
    /// should uniquely identify the calling job (e.g. its job id) so that
    /// [`Self::release`] only releases a lock the same run acquired.
    pub async fn acquire(&self, tenant_id: &str, owner_id: &str) -> anyhow::Result<bool> {
        let now = Utc::now();
        let outcome = self.repo.acquire(&Self::lock_name(tenant_id), owner_id, self.ttl, now).await?;
        Ok(outcome == LockOutcome::Acquired)
    }

    pub async fn release(&self, tenant_id: &str, owner_id: &str) -> anyhow::Result<bool> {
        self.repo.release(&Self::lock_name(tenant_id), owner_id).await
    }

    /// Extend the lease on a lock already held by `owner_id`. Long-running
    /// ingestion jobs call this periodically so a run that legitimately
    /// takes longer than the TTL doesn't get its lock stolen mid-flight.
    pub async fn refresh(&self, tenant_id: &str, owner_id: &str) -> anyhow::Result<bool> {
        let now = Utc::now();
        self.repo.refresh(&Self::lock_name(tenant_id), owner_id, self.ttl, now).await
    }

    pub async fn status(&self, tenant_id: &str) -> anyhow::Result<Option<LockRecord>> {
        self.repo.status(&Self::lock_name(tenant_id)).await
    }

    /// Release every lock past its lease, regardless of tenant. Intended to
    /// be run on a timer (see `orchestrator::spawn_lock_sweeper`) so a job
    /// that crashed without releasing its lock doesn't block that tenant's
    /// ingestion forever.
    pub async fn sweep_expired(&self) -> anyhow::Result<u64> {
        self.repo.sweep_expired(Utc::now()).await
    }
}

/// RAII guard that releases an acquired lock on drop via a detached task.
///
/// Axum handlers and the orchestrator both need "release on every exit
/// path, including early return on error" — `Drop` spawning a detached
/// release task gives that guarantee without every caller remembering to
/// call `release()` explicitly.
pub struct LockGuard {
    service: Arc<LockService>,
    tenant_id: String,
    owner_id: String,
    released: bool,
}

impl LockGuard {
    pub fn new(service: Arc<LockService>, tenant_id: String, owner_id: String) -> Self {
        Self { service, tenant_id, owner_id, released: false }
    }

    pub async fn release(mut self) -> anyhow::Result<bool> {
        self.released = true;
        self.service.release(&self.tenant_id, &self.owner_id).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let service = Arc::clone(&self.service);
        let tenant_id = self.tenant_id.clone();
        let owner_id = self.owner_id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.release(&tenant_id, &owner_id).await {
                tracing::warn!(tenant_id = %tenant_id, err = %e, "failed to release lock on drop");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryLockRepository;

    fn service() -> LockService {
        LockService::new(Arc::new(MemoryLockRepository::new()), chrono::Duration::seconds(60))
    }

    #[tokio::test]
    async fn second_acquirer_is_rejected_while_held() {
        let svc = service();
        assert!(svc.acquire("tenant-a", "job-1").await.unwrap());
        assert!(!svc.acquire("tenant-a", "job-2").await.unwrap());
    }

    #[tokio::test]
    async fn different_tenants_do_not_contend() {
        let svc = service();
        assert!(svc.acquire("tenant-a", "job-1").await.unwrap());
        assert!(svc.acquire("tenant-b", "job-2").await.unwrap());
    }

    #[tokio::test]
    async fn release_then_reacquire_succeeds() {
        let svc = service();
        assert!(svc.acquire("tenant-a", "job-1").await.unwrap());
        assert!(svc.release("tenant-a", "job-1").await.unwrap());
        assert!(svc.acquire("tenant-a", "job-2").await.unwrap());
    }

    #[tokio::test]
    async fn release_by_non_owner_fails() {
        let svc = service();
        assert!(svc.acquire("tenant-a", "job-1").await.unwrap());
        assert!(!svc.release("tenant-a", "job-2").await.unwrap());
    }
}
