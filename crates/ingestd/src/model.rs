// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: tickets, ingestion jobs, lock records, and history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialize/deserialize a `DateTime<Utc>` as a native BSON date, not an
/// ISO8601 string, so Mongo's `$dateToString`/index range queries work on
/// these fields directly.
mod bson_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        bson::DateTime::from_chrono(*dt).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        Ok(bson::DateTime::deserialize(deserializer)?.to_chrono())
    }
}

mod bson_date_option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        dt.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|d| d.to_chrono()))
    }
}

/// Urgency classification assigned to a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Low
    }
}

/// Sentiment classification assigned to a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Closed,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

/// A support ticket, identified within a tenant by `external_id`.
///
/// `(tenant_id, external_id)` is the natural key used for idempotent
/// upserts; `id` is the store-assigned surrogate key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub tenant_id: String,
    pub external_id: String,
    pub customer_id: String,
    pub subject: String,
    pub message: String,
    pub source: String,
    pub status: TicketStatus,
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    pub requires_action: bool,
    #[serde(with = "bson_date")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_date")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "bson_date_option")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Field-level snapshot used by [`crate::sync_engine`] to compute diffs.
    /// Only fields that can change on re-sync are included; `id`,
    /// `tenant_id`, `external_id`, and `created_at` are immutable once set.
    pub fn diffable_fields(&self) -> TicketFields {
        TicketFields {
            customer_id: self.customer_id.clone(),
            subject: self.subject.clone(),
            message: self.message.clone(),
            source: self.source.clone(),
            status: self.status,
            urgency: self.urgency,
            sentiment: self.sentiment,
            requires_action: self.requires_action,
        }
    }
}

/// The mutable subset of [`Ticket`] fields, used for diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketFields {
    pub customer_id: String,
    pub subject: String,
    pub message: String,
    pub source: String,
    pub status: TicketStatus,
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    pub requires_action: bool,
}

/// Raw ticket payload as received from an upstream source, prior to
/// classification and persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTicket {
    pub external_id: String,
    pub customer_id: String,
    pub subject: String,
    pub message: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub status: Option<TicketStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Note: `RawTicket` is only ever deserialized from the upstream source's
// JSON payload, never read back from Mongo, so its timestamps stay plain
// ISO8601 `DateTime<Utc>` rather than using `bson_date`.

fn default_source() -> String {
    "api".to_owned()
}

/// Terminal state of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-run counters reported by an ingestion job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionStats {
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// A single ingestion run for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: String,
    pub tenant_id: String,
    pub status: JobStatus,
    #[serde(with = "bson_date")]
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "bson_date_option")]
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: IngestionStats,
    pub processed_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A distributed lock record, one per `(tenant_id, resource)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub name: String,
    pub owner_id: String,
    pub locked: bool,
    #[serde(with = "bson_date")]
    pub acquired_at: DateTime<Utc>,
    #[serde(with = "bson_date")]
    pub expires_at: DateTime<Utc>,
}

/// An append-only audit entry recording a field-level change to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub ticket_id: String,
    pub tenant_id: String,
    pub action: HistoryAction,
    pub changes: std::collections::BTreeMap<String, FieldChange>,
    #[serde(with = "bson_date")]
    pub recorded_at: DateTime<Utc>,
}

/// What kind of change a [`HistoryEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
}

/// Before/after value pair for a single changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// An audit record of a completed or failed ingestion run, kept independently
/// of [`IngestionJob`] so job records can be pruned without losing the
/// historical log of what ran and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionLogEntry {
    pub id: String,
    pub tenant_id: String,
    pub job_id: String,
    pub status: JobStatus,
    pub stats: IngestionStats,
    #[serde(with = "bson_date")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "bson_date")]
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
