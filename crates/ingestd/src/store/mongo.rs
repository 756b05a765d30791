// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MongoDB-backed store implementations.
//!
//! [`MongoLockRepository::acquire`] must be a single `find_one_and_update`
//! compare-and-swap rather than a read followed by a write — two
//! concurrent callers reading first and writing second can both observe
//! no existing lock and both believe they acquired it. Every compound
//! index below leads with `tenant_id` and `(tenant_id, external_id)` is
//! unique, so cross-tenant queries never fall back to a collection scan
//! and two upstream tickets can never collide into the same stored one.

use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use crate::model::{
    HistoryEntry, IngestionJob, IngestionLogEntry, IngestionStats, JobStatus, LockRecord, Ticket,
};
use crate::store::{
    HistoryRepository, IngestionLogRepository, JobRepository, LockOutcome, LockRepository, Page,
    TenantStats, TicketFilter, TicketRepository,
};

/// Create every index this crate relies on. Called once at startup;
/// `create_index` is idempotent so repeated calls across restarts are safe.
pub async fn ensure_indexes(db: &Database) -> anyhow::Result<()> {
    let tickets: Collection<Ticket> = db.collection("tickets");
    tickets
        .create_index(
            IndexModel::builder()
                .keys(doc! { "tenant_id": 1, "external_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;
    tickets
        .create_index(IndexModel::builder().keys(doc! { "tenant_id": 1, "created_at": -1 }).build())
        .await?;
    tickets
        .create_index(IndexModel::builder().keys(doc! { "tenant_id": 1, "status": 1 }).build())
        .await?;
    tickets
        .create_index(IndexModel::builder().keys(doc! { "tenant_id": 1, "deleted_at": 1 }).build())
        .await?;
    tickets
        .create_index(IndexModel::builder().keys(doc! { "tenant_id": 1, "urgency": 1 }).build())
        .await?;

    let jobs: Collection<IngestionJob> = db.collection("ingestion_jobs");
    jobs.create_index(IndexModel::builder().keys(doc! { "tenant_id": 1, "status": 1 }).build())
        .await?;

    let history: Collection<HistoryEntry> = db.collection("ticket_history");
    history
        .create_index(IndexModel::builder().keys(doc! { "ticket_id": 1, "recorded_at": -1 }).build())
        .await?;

    let log: Collection<IngestionLogEntry> = db.collection("ingestion_log");
    log.create_index(IndexModel::builder().keys(doc! { "tenant_id": 1, "finished_at": -1 }).build())
        .await?;

    let locks: Collection<LockRecord> = db.collection("locks");
    locks
        .create_index(
            IndexModel::builder()
                .keys(doc! { "name": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    Ok(())
}

pub struct MongoTicketRepository {
    collection: Collection<Ticket>,
}

impl MongoTicketRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("tickets") }
    }
}

#[async_trait]
impl TicketRepository for MongoTicketRepository {
    async fn upsert(&self, ticket: Ticket) -> anyhow::Result<(Ticket, bool)> {
        let filter = doc! { "tenant_id": &ticket.tenant_id, "external_id": &ticket.external_id };
        let mut update_doc = bson::to_document(&ticket)?;
        // created_at/id are set on insert only, via $setOnInsert, so a
        // re-sync never overwrites the original creation timestamp or
        // surrogate id with the freshly-generated ones on `ticket`.
        let id = update_doc.remove("id").unwrap_or_else(|| bson::Bson::String(ticket.id.clone()));
        let created_at = update_doc
            .remove("created_at")
            .unwrap_or_else(|| bson::Bson::DateTime(bson::DateTime::from_chrono(ticket.created_at)));
        let update = doc! {
            "$set": update_doc,
            "$setOnInsert": { "id": id, "created_at": created_at },
        };

        let existing = self
            .collection
            .find_one_and_update(filter.clone(), update)
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .await?;

        let stored = self
            .collection
            .find_one(filter)
            .await?
            .ok_or_else(|| anyhow::anyhow!("ticket vanished immediately after upsert"))?;

        Ok((stored, existing.is_none()))
    }

    async fn get(&self, tenant_id: &str, external_id: &str) -> anyhow::Result<Option<Ticket>> {
        Ok(self
            .collection
            .find_one(doc! { "tenant_id": tenant_id, "external_id": external_id })
            .await?)
    }

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Ticket>> {
        Ok(self.collection.find_one(doc! { "tenant_id": tenant_id, "id": id }).await?)
    }

    async fn list_tickets(
        &self,
        tenant_id: &str,
        filter: TicketFilter,
    ) -> anyhow::Result<Page<Ticket>> {
        use futures_util::TryStreamExt;

        let mut query = doc! { "tenant_id": tenant_id };
        if !filter.include_deleted {
            query.insert("deleted_at", bson::Bson::Null);
        }
        if let Some(status) = filter.status {
            query.insert("status", bson::to_bson(&status)?);
        }

        let limit = if filter.limit <= 0 { 50 } else { filter.limit };
        let mut cursor = self
            .collection
            .find(query)
            .sort(doc! { "created_at": -1 })
            .skip(filter.skip.max(0) as u64)
            // fetch one extra row to learn whether another page follows
            .limit(limit + 1)
            .await?;

        let mut items = Vec::new();
        while let Some(ticket) = cursor.try_next().await? {
            items.push(ticket);
        }
        let has_more = items.len() as i64 > limit;
        items.truncate(limit as usize);
        Ok(Page { items, has_more })
    }

    async fn list_missing(
        &self,
        tenant_id: &str,
        seen_external_ids: &[String],
    ) -> anyhow::Result<Vec<Ticket>> {
        use futures_util::TryStreamExt;

        let mut cursor = self
            .collection
            .find(doc! {
                "tenant_id": tenant_id,
                "deleted_at": bson::Bson::Null,
                "external_id": { "$nin": seen_external_ids },
            })
            .await?;

        let mut tickets = Vec::new();
        while let Some(ticket) = cursor.try_next().await? {
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    async fn soft_delete(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.collection
            .update_one(
                doc! { "tenant_id": tenant_id, "id": id },
                doc! { "$set": {
                    "deleted_at": bson::DateTime::from_chrono(at),
                    "updated_at": bson::DateTime::from_chrono(at),
                }},
            )
            .await?;
        Ok(())
    }

    async fn tenant_stats(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<TenantStats> {
        use futures_util::TryStreamExt;

        // $match narrows to this tenant's non-deleted tickets only — no
        // date range here, so total_tickets/by_status/urgency_high_ratio
        // are all-time. The [from, to] window only applies inside
        // hourly_trend's own sub-$match, since that facet is the only one
        // meant to describe a window rather than the tenant's lifetime.
        let pipeline = vec![
            doc! { "$match": {
                "tenant_id": tenant_id,
                "deleted_at": bson::Bson::Null,
            }},
            doc! { "$facet": {
                "total": [ { "$count": "count" } ],
                "by_status": [
                    { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
                ],
                "high_urgency": [
                    { "$match": { "urgency": "high" } },
                    { "$count": "count" },
                ],
                "hourly_trend": [
                    { "$match": {
                        "created_at": { "$gte": bson::DateTime::from_chrono(from), "$lte": bson::DateTime::from_chrono(to) },
                    }},
                    {
                        "$group": {
                            "_id": { "$dateToString": { "format": "%Y-%m-%d %H:00", "date": "$created_at" } },
                            "count": { "$sum": 1 },
                        },
                    },
                    { "$sort": { "_id": 1 } },
                ],
            }},
        ];

        let mut cursor = self.collection.aggregate(pipeline).await?;
        let Some(doc) = cursor.try_next().await? else {
            return Ok(TenantStats::default());
        };

        let total_tickets = doc
            .get_array("total")
            .ok()
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_document())
            .and_then(|d| d.get_i32("count").ok())
            .unwrap_or(0) as u64;

        let mut by_status = std::collections::BTreeMap::new();
        if let Ok(arr) = doc.get_array("by_status") {
            for entry in arr {
                if let Some(d) = entry.as_document() {
                    let key = d.get_str("_id").unwrap_or("unknown").to_owned();
                    let count = d.get_i32("count").unwrap_or(0) as u64;
                    by_status.insert(key, count);
                }
            }
        }

        let high_count = doc
            .get_array("high_urgency")
            .ok()
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_document())
            .and_then(|d| d.get_i32("count").ok())
            .unwrap_or(0) as u64;

        let urgency_high_ratio =
            if total_tickets > 0 { high_count as f64 / total_tickets as f64 } else { 0.0 };

        let mut hourly_trend = Vec::new();
        if let Ok(arr) = doc.get_array("hourly_trend") {
            for entry in arr {
                if let Some(d) = entry.as_document() {
                    let hour = d.get_str("_id").unwrap_or_default().to_owned();
                    let count = d.get_i32("count").unwrap_or(0) as u64;
                    hourly_trend.push(crate::store::HourlyBucket { hour, count });
                }
            }
        }

        Ok(TenantStats { total_tickets, by_status, urgency_high_ratio, hourly_trend })
    }
}

pub struct MongoJobRepository {
    collection: Collection<IngestionJob>,
}

impl MongoJobRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("ingestion_jobs") }
    }
}

#[async_trait]
impl JobRepository for MongoJobRepository {
    async fn create(&self, job: IngestionJob) -> anyhow::Result<()> {
        self.collection.insert_one(job).await?;
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
        self.collection
            .update_one(
                doc! { "id": job_id },
                doc! { "$set": {
                    "status": bson::to_bson(&status)?,
                    "stats": bson::to_bson(&stats)?,
                    "error": error,
                    "finished_at": bson::DateTime::from_chrono(at),
                }},
            )
            .await?;
        Ok(())
    }

    async fn update_progress(
        &self,
        job_id: &str,
        processed_pages: u64,
        total_pages: Option<u64>,
    ) -> anyhow::Result<()> {
        self.collection
            .update_one(
                doc! { "id": job_id },
                doc! { "$set": {
                    "processed_pages": processed_pages as i64,
                    "total_pages": total_pages.map(|p| p as i64),
                }},
            )
            .await?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> anyhow::Result<Option<IngestionJob>> {
        Ok(self.collection.find_one(doc! { "id": job_id }).await?)
    }

    async fn running_for_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<IngestionJob>> {
        Ok(self
            .collection
            .find_one(doc! { "tenant_id": tenant_id, "status": "running" })
            .await?)
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<IngestionJob>> {
        use futures_util::TryStreamExt;
        let limit = if limit <= 0 { 50 } else { limit };
        let mut cursor = self
            .collection
            .find(doc! { "tenant_id": tenant_id })
            .sort(doc! { "started_at": -1 })
            .limit(limit)
            .await?;
        let mut jobs = Vec::new();
        while let Some(job) = cursor.try_next().await? {
            jobs.push(job);
        }
        Ok(jobs)
    }
}

pub struct MongoHistoryRepository {
    collection: Collection<HistoryEntry>,
}

impl MongoHistoryRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("ticket_history") }
    }
}

#[async_trait]
impl HistoryRepository for MongoHistoryRepository {
    async fn record(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        self.collection.insert_one(entry).await?;
        Ok(())
    }

    async fn list_for_ticket(
        &self,
        ticket_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<HistoryEntry>> {
        use futures_util::TryStreamExt;
        let limit = if limit <= 0 { 50 } else { limit };
        let mut cursor = self
            .collection
            .find(doc! { "ticket_id": ticket_id })
            .sort(doc! { "recorded_at": -1 })
            .limit(limit)
            .await?;
        let mut entries = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

pub struct MongoIngestionLogRepository {
    collection: Collection<IngestionLogEntry>,
}

impl MongoIngestionLogRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("ingestion_log") }
    }
}

#[async_trait]
impl IngestionLogRepository for MongoIngestionLogRepository {
    async fn record(&self, entry: IngestionLogEntry) -> anyhow::Result<()> {
        self.collection.insert_one(entry).await?;
        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<IngestionLogEntry>> {
        use futures_util::TryStreamExt;
        let limit = if limit <= 0 { 50 } else { limit };
        let mut cursor = self
            .collection
            .find(doc! { "tenant_id": tenant_id })
            .sort(doc! { "finished_at": -1 })
            .limit(limit)
            .await?;
        let mut entries = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

pub struct MongoLockRepository {
    collection: Collection<LockRecord>,
}

impl MongoLockRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("locks") }
    }
}

#[async_trait]
impl LockRepository for MongoLockRepository {
    async fn acquire(
        &self,
        name: &str,
        owner_id: &str,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LockOutcome> {
        // The filter accepts a document that is either unlocked or whose
        // lease already expired; combined with `upsert`, this makes
        // acquisition a single atomic compare-and-swap performed entirely
        // inside the server, eliminating the read/write race a
        // check-then-set implementation would have.
        let filter = doc! {
            "name": name,
            "$or": [
                { "locked": false },
                { "expires_at": { "$lt": bson::DateTime::from_chrono(now) } },
            ],
        };
        let update = doc! { "$set": {
            "name": name,
            "owner_id": owner_id,
            "locked": true,
            "acquired_at": bson::DateTime::from_chrono(now),
            "expires_at": bson::DateTime::from_chrono(now + ttl),
        }};

        let result = self
            .collection
            .find_one_and_update(filter, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        match result {
            Some(lock) if lock.owner_id == owner_id => Ok(LockOutcome::Acquired),
            _ => Ok(LockOutcome::AlreadyHeld),
        }
    }

    async fn release(&self, name: &str, owner_id: &str) -> anyhow::Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "name": name, "owner_id": owner_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn refresh(
        &self,
        name: &str,
        owner_id: &str,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "name": name, "owner_id": owner_id, "locked": true },
                doc! { "$set": { "expires_at": bson::DateTime::from_chrono(now + ttl) } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn status(&self, name: &str) -> anyhow::Result<Option<LockRecord>> {
        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "expires_at": { "$lt": bson::DateTime::from_chrono(now) } })
            .await?;
        Ok(result.deleted_count)
    }
}

