// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciles a batch of raw tickets from an upstream source against the
//! ticket store: classifies each raw ticket, upserts it idempotently,
//! records a history entry for whatever changed, and reports per-ticket
//! outcomes back to the orchestrator for stats.
//!
//! A sync is driven by comparing the upstream `updated_at` against the
//! stored one, not by content-diffing: re-syncing a payload whose
//! `updated_at` hasn't advanced is `Unchanged` even if a caller mutated
//! fields out of band, and a ticket the source stops reporting is
//! soft-deleted rather than removed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::history::{compute_changes, HistoryLog};
use crate::model::{HistoryAction, RawTicket, Ticket, TicketStatus};
use crate::store::TicketRepository;

/// Outcome of syncing a single raw ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

pub struct SyncEngine {
    tickets: Arc<dyn TicketRepository>,
    history: Arc<HistoryLog>,
    classifier: Arc<dyn Classifier>,
}

impl SyncEngine {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        history: Arc<HistoryLog>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self { tickets, history, classifier }
    }

    /// Classify and upsert one raw ticket, recording history for whatever
    /// changed. Driven by the upstream `updated_at`: if a stored ticket
    /// already exists and its `updated_at` is not strictly older than the
    /// upstream payload's, the sync is a no-op — `Unchanged`, nothing
    /// written, not even an upsert call. Returns the stored ticket
    /// alongside the outcome so callers (e.g. the orchestrator, deciding
    /// whether to queue a notification) can inspect its classification
    /// without re-running it.
    pub async fn sync_ticket(
        &self,
        tenant_id: &str,
        raw: RawTicket,
    ) -> anyhow::Result<(SyncOutcome, Ticket)> {
        let existing = self.tickets.get(tenant_id, &raw.external_id).await?;

        if let Some(existing) = existing {
            if raw.updated_at <= existing.updated_at {
                return Ok((SyncOutcome::Unchanged, existing));
            }

            let classification = self.classifier.classify(&raw.subject, &raw.message);
            let previous_fields = existing.diffable_fields();

            let candidate = Ticket {
                id: existing.id.clone(),
                tenant_id: tenant_id.to_owned(),
                external_id: raw.external_id,
                customer_id: raw.customer_id,
                subject: raw.subject,
                message: raw.message,
                source: raw.source,
                status: raw.status.unwrap_or(existing.status),
                urgency: classification.urgency,
                sentiment: classification.sentiment,
                requires_action: classification.requires_action,
                created_at: existing.created_at,
                updated_at: raw.updated_at,
                deleted_at: existing.deleted_at,
            };

            // The timestamp comparison above already selected the update
            // path; apply it, record the diff (even if empty — the
            // upstream payload still advanced `updated_at`), and report
            // `Updated` unconditionally.
            let (stored, _) = self.tickets.upsert(candidate).await?;
            let changes = compute_changes(&previous_fields, &stored.diffable_fields())?;
            self.history.record(&stored.id, tenant_id, HistoryAction::Updated, changes).await?;
            return Ok((SyncOutcome::Updated, stored));
        }

        let classification = self.classifier.classify(&raw.subject, &raw.message);
        let candidate = Ticket {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_owned(),
            external_id: raw.external_id,
            customer_id: raw.customer_id,
            subject: raw.subject,
            message: raw.message,
            source: raw.source,
            status: raw.status.unwrap_or(TicketStatus::Open),
            urgency: classification.urgency,
            sentiment: classification.sentiment,
            requires_action: classification.requires_action,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            deleted_at: None,
        };

        let (stored, _) = self.tickets.upsert(candidate).await?;
        self.history
            .record(&stored.id, tenant_id, HistoryAction::Created, Default::default())
            .await?;
        Ok((SyncOutcome::Created, stored))
    }

    /// Soft-delete a ticket, recording a `Deleted` history entry. No-op if
    /// the ticket is already deleted.
    pub async fn mark_deleted(&self, tenant_id: &str, ticket: &Ticket) -> anyhow::Result<bool> {
        if ticket.is_deleted() {
            return Ok(false);
        }
        let now = Utc::now();
        self.tickets.soft_delete(tenant_id, &ticket.id, now).await?;

        let mut changes = std::collections::BTreeMap::new();
        changes.insert(
            "deleted_at".to_owned(),
            crate::model::FieldChange {
                old: serde_json::Value::Null,
                new: serde_json::to_value(now)?,
            },
        );
        self.history.record(&ticket.id, tenant_id, HistoryAction::Deleted, changes).await?;
        Ok(true)
    }

    /// Soft-delete every ticket for `tenant_id` not present in
    /// `seen_external_ids`, i.e. tickets the upstream source stopped
    /// reporting in this run. Returns the number of tickets deleted.
    pub async fn detect_and_delete_missing(
        &self,
        tenant_id: &str,
        seen_external_ids: &[String],
    ) -> anyhow::Result<u64> {
        let missing = self.tickets.list_missing(tenant_id, seen_external_ids).await?;
        let mut deleted = 0u64;
        for ticket in &missing {
            if self.mark_deleted(tenant_id, ticket).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;
    use crate::store::memory::{MemoryHistoryRepository, MemoryTicketRepository};

    fn engine() -> SyncEngine {
        let tickets: Arc<dyn TicketRepository> = Arc::new(MemoryTicketRepository::new());
        let history = Arc::new(HistoryLog::new(Arc::new(MemoryHistoryRepository::new())));
        SyncEngine::new(tickets, history, Arc::new(KeywordClassifier))
    }

    fn raw(external_id: &str, message: &str) -> RawTicket {
        raw_at(external_id, message, Utc::now())
    }

    fn raw_at(
        external_id: &str,
        message: &str,
        updated_at: chrono::DateTime<Utc>,
    ) -> RawTicket {
        RawTicket {
            external_id: external_id.to_owned(),
            customer_id: "cust-1".to_owned(),
            subject: "Subject".to_owned(),
            message: message.to_owned(),
            source: "email".to_owned(),
            status: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[tokio::test]
    async fn first_sync_creates_a_ticket() {
        let engine = engine();
        let (outcome, _) = engine.sync_ticket("tenant-a", raw("ext-1", "hello")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Created);
    }

    #[tokio::test]
    async fn resyncing_same_timestamp_is_unchanged() {
        let engine = engine();
        let t0 = Utc::now();
        engine.sync_ticket("tenant-a", raw_at("ext-1", "hello", t0)).await.unwrap();
        let (outcome, _) = engine.sync_ticket("tenant-a", raw_at("ext-1", "hello", t0)).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
    }

    #[tokio::test]
    async fn resyncing_advanced_timestamp_with_identical_content_is_still_updated() {
        // The upstream updated_at comparison drives the outcome, not a
        // content diff: an advanced timestamp is an update even if nothing
        // in the diffable fields actually changed.
        let engine = engine();
        let t0 = Utc::now();
        engine.sync_ticket("tenant-a", raw_at("ext-1", "hello", t0)).await.unwrap();
        let (outcome, _) = engine
            .sync_ticket("tenant-a", raw_at("ext-1", "hello", t0 + chrono::Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);
    }

    #[tokio::test]
    async fn resyncing_changed_message_is_updated() {
        let engine = engine();
        let t0 = Utc::now();
        engine.sync_ticket("tenant-a", raw_at("ext-1", "hello", t0)).await.unwrap();
        let (outcome, _) = engine
            .sync_ticket(
                "tenant-a",
                raw_at("ext-1", "urgent help needed", t0 + chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);
    }

    #[tokio::test]
    async fn stale_upstream_timestamp_is_ignored_even_if_content_differs() {
        let engine = engine();
        let t0 = Utc::now();
        engine.sync_ticket("tenant-a", raw_at("ext-1", "hello", t0)).await.unwrap();
        let (outcome, ticket) = engine
            .sync_ticket(
                "tenant-a",
                raw_at("ext-1", "urgent help needed", t0 - chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(ticket.message, "hello");
    }

    #[tokio::test]
    async fn missing_tickets_are_soft_deleted() {
        let engine = engine();
        engine.sync_ticket("tenant-a", raw("ext-1", "hello")).await.unwrap();
        engine.sync_ticket("tenant-a", raw("ext-2", "hello")).await.unwrap();

        let deleted = engine
            .detect_and_delete_missing("tenant-a", &["ext-1".to_owned()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let ticket = engine.tickets.get("tenant-a", "ext-2").await.unwrap().unwrap();
        assert!(ticket.is_deleted());
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let engine = engine();
        engine.sync_ticket("tenant-a", raw("ext-1", "hello")).await.unwrap();
        assert!(engine.tickets.get("tenant-b", "ext-1").await.unwrap().is_none());
    }
}
