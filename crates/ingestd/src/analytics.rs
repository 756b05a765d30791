// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant analytics: total ticket counts, status breakdown, high-urgency
//! ratio, and hourly trend over a time window.
//!
//! The aggregation itself lives behind [`crate::store::TicketRepository`]
//! (a single `$facet` pipeline in the Mongo backend). This module adds a
//! soft 2-second latency budget on top: the query is never cancelled at
//! the deadline, since truncating a stats aggregation would return a
//! wrong answer rather than a timeout error, but a query that crosses the
//! budget is logged and flagged `degraded` in the response so slow
//! aggregations are visible without turning into a 504.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{TenantStats, TicketRepository};

pub struct AnalyticsService {
    tickets: Arc<dyn TicketRepository>,
    soft_timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantStatsResponse {
    #[serde(flatten)]
    pub stats: TenantStats,
    pub degraded: bool,
}

impl AnalyticsService {
    pub fn new(tickets: Arc<dyn TicketRepository>, soft_timeout: Duration) -> Self {
        Self { tickets, soft_timeout }
    }

    pub async fn tenant_stats(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<TenantStatsResponse> {
        let query = self.tickets.tenant_stats(tenant_id, from, to);
        tokio::pin!(query);

        let mut degraded = false;
        let stats = loop {
            tokio::select! {
                result = &mut query => break result?,
                _ = tokio::time::sleep(self.soft_timeout), if !degraded => {
                    degraded = true;
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        budget_ms = self.soft_timeout.as_millis() as u64,
                        "analytics query exceeded soft latency budget, continuing"
                    );
                }
            }
        };

        Ok(TenantStatsResponse { stats, degraded })
    }
}

/// Default lookback window applied when a caller doesn't specify one: the
/// last 24 hours.
pub fn default_window(to: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (to - chrono::Duration::hours(24), to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ticket, TicketStatus};
    use crate::store::memory::MemoryTicketRepository;

    fn ticket(external_id: &str, urgency: crate::model::Urgency) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: "tenant-a".to_owned(),
            external_id: external_id.to_owned(),
            customer_id: "cust-1".to_owned(),
            subject: "s".to_owned(),
            message: "m".to_owned(),
            source: "api".to_owned(),
            status: TicketStatus::Open,
            urgency,
            sentiment: crate::model::Sentiment::Neutral,
            requires_action: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn stats_within_budget_are_not_degraded() {
        let repo = Arc::new(MemoryTicketRepository::new());
        repo.upsert(ticket("ext-1", crate::model::Urgency::High)).await.unwrap();
        repo.upsert(ticket("ext-2", crate::model::Urgency::Low)).await.unwrap();

        let service = AnalyticsService::new(repo, Duration::from_secs(2));
        let (from, to) = default_window(Utc::now());
        let response = service.tenant_stats("tenant-a", from, to).await.unwrap();

        assert_eq!(response.stats.total_tickets, 2);
        assert!((response.stats.urgency_high_ratio - 0.5).abs() < f64::EPSILON);
        assert!(!response.degraded);
    }
}
