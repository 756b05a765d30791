// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only history log of field-level ticket changes.
//!
//! Every ticket mutation records one entry here with a before/after diff,
//! never a full-document snapshot, so the audit trail stays cheap to
//! append and cheap to read back per ticket.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::model::{FieldChange, HistoryAction, HistoryEntry};
use crate::store::HistoryRepository;

pub struct HistoryLog {
    repo: Arc<dyn HistoryRepository>,
}

impl HistoryLog {
    pub fn new(repo: Arc<dyn HistoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        ticket_id: &str,
        tenant_id: &str,
        action: HistoryAction,
        changes: std::collections::BTreeMap<String, FieldChange>,
    ) -> anyhow::Result<()> {
        self.repo
            .record(HistoryEntry {
                id: Uuid::new_v4().to_string(),
                ticket_id: ticket_id.to_owned(),
                tenant_id: tenant_id.to_owned(),
                action,
                changes,
                recorded_at: Utc::now(),
            })
            .await
    }

    pub async fn list_for_ticket(&self, ticket_id: &str, limit: i64) -> anyhow::Result<Vec<HistoryEntry>> {
        self.repo.list_for_ticket(ticket_id, limit).await
    }
}

/// Compute a field-level diff between two serializable snapshots, returning
/// only the fields whose values changed.
pub fn compute_changes<T>(old: &T, new: &T) -> anyhow::Result<std::collections::BTreeMap<String, FieldChange>>
where
    T: Serialize,
{
    let old_value = serde_json::to_value(old)?;
    let new_value = serde_json::to_value(new)?;

    let (Some(old_map), Some(new_map)) = (old_value.as_object(), new_value.as_object()) else {
        anyhow::bail!("compute_changes requires struct-shaped values");
    };

    let mut changes = std::collections::BTreeMap::new();
    for (field, new_field_value) in new_map {
        let old_field_value = old_map.get(field).cloned().unwrap_or(serde_json::Value::Null);
        if &old_field_value != new_field_value {
            changes.insert(
                field.clone(),
                FieldChange { old: old_field_value, new: new_field_value.clone() },
            );
        }
    }
    Ok(changes)
}
