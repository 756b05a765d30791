// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification worker pool: posts an alert for every ticket the sync
//! engine classifies as high urgency or requiring action.
//!
//! A bounded worker pool sits in front of the outbound call so a burst of
//! high-urgency tickets during one ingestion run can't spawn unbounded
//! concurrent requests to the notification endpoint. Retries follow an
//! exponential-backoff-plus-jitter schedule, guarded by a circuit breaker
//! the same way the upstream ticket source fetch is.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::model::Urgency;

pub const NOTIFIER_BREAKER_NAME: &str = "notifier";

/// Bound on the in-memory dead-letter log so a sustained outage can't grow
/// it without limit.
const DEAD_LETTER_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRequest {
    pub ticket_id: String,
    pub tenant_id: String,
    pub urgency: Urgency,
    pub reason: String,
}

/// A notification that was never delivered, either because the circuit
/// breaker was open or because it exhausted its retries.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub request: NotificationRequest,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded, in-memory record of dropped notifications. Not persisted: a
/// process restart loses it, matching the fire-and-forget nature of
/// notification dispatch — the ticket data itself is never at risk, only
/// the alert about it.
#[derive(Default)]
pub struct DeadLetterLog {
    entries: Mutex<VecDeque<DeadLetter>>,
}

impl DeadLetterLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, letter: DeadLetter) {
        let mut entries = self.entries.lock();
        entries.push_back(letter);
        while entries.len() > DEAD_LETTER_CAPACITY {
            entries.pop_front();
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<DeadLetter> {
        let entries = self.entries.lock();
        entries.iter().rev().take(limit).cloned().collect()
    }
}

/// Queues notifications for a bounded pool of background workers to send.
///
/// Cloning `Notifier` is cheap and shares the same queue and worker pool —
/// callers get an `Arc`-like handle without wrapping it in `Arc` themselves.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationRequest>,
    dead_letters: Arc<DeadLetterLog>,
}

impl Notifier {
    /// Spawn `workers` background tasks draining a bounded queue of
    /// capacity `queue_capacity`, each posting to `notify_url` through the
    /// named circuit breaker in `breakers`. If `notify_url` is `None`,
    /// notifications are accepted and logged but never sent — useful for
    /// local development without a configured external endpoint.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        notify_url: Option<String>,
        workers: usize,
        queue_capacity: usize,
        breakers: Arc<BreakerRegistry>,
        breaker_config: CircuitBreakerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let dead_letters = Arc::new(DeadLetterLog::new());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        let breaker = breakers.get_or_create(NOTIFIER_BREAKER_NAME, breaker_config);

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let notify_url = notify_url.clone();
            let client = client.clone();
            let shutdown = shutdown.clone();
            let breaker = Arc::clone(&breaker);
            let dead_letters = Arc::clone(&dead_letters);
            tokio::spawn(async move {
                run_worker(worker_id, rx, notify_url, client, breaker, dead_letters, shutdown).await;
            });
        }

        Self { tx, dead_letters }
    }

    /// Queue a notification, dropping it (with a warning) if the queue is
    /// full rather than applying backpressure to the ingestion run that
    /// triggered it — a slow notification endpoint must never stall
    /// ticket sync.
    pub fn notify(&self, request: NotificationRequest) {
        if let Err(e) = self.tx.try_send(request) {
            tracing::warn!(err = %e, "notification queue full, dropping notification");
        }
    }

    /// Recent dropped notifications, most recent first.
    pub fn dead_letters(&self, limit: usize) -> Vec<DeadLetter> {
        self.dead_letters.recent(limit)
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<NotificationRequest>>>,
    notify_url: Option<String>,
    client: reqwest::Client,
    breaker: Arc<crate::circuit_breaker::CircuitBreaker>,
    dead_letters: Arc<DeadLetterLog>,
    shutdown: CancellationToken,
) {
    loop {
        let request = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => return,
                item = rx.recv() => item,
            }
        };
        let Some(request) = request else { return };

        let Some(ref url) = notify_url else {
            tracing::debug!(worker = worker_id, ticket_id = %request.ticket_id, "notify_url unset, skipping send");
            continue;
        };

        if let Err(e) = breaker.permit() {
            tracing::warn!(
                worker = worker_id, ticket_id = %request.ticket_id, err = %e,
                "notifier breaker open, dropping to dead letter"
            );
            dead_letters.push(DeadLetter {
                request,
                reason: "breaker open".to_owned(),
                recorded_at: Utc::now(),
            });
            continue;
        }

        let mut backoff = Duration::from_millis(250);
        let max_attempts = 3u32;
        let mut delivered = false;
        for attempt in 0..=max_attempts {
            match client.post(url).json(&request).send().await {
                Ok(resp) if resp.status().is_success() => {
                    breaker.record_success();
                    delivered = true;
                    break;
                }
                Ok(resp) => {
                    tracing::warn!(
                        worker = worker_id, ticket_id = %request.ticket_id,
                        status = %resp.status(), attempt, "notification endpoint returned error status"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        worker = worker_id, ticket_id = %request.ticket_id,
                        err = %e, attempt, "notification send failed"
                    );
                }
            }
            if attempt == max_attempts {
                breaker.record_failure();
                tracing::error!(
                    worker = worker_id, ticket_id = %request.ticket_id,
                    "giving up on notification after {max_attempts} attempts"
                );
                break;
            }
            tokio::time::sleep(jittered(backoff)).await;
            backoff = (backoff * 2).min(Duration::from_secs(5));
        }

        if !delivered {
            dead_letters.push(DeadLetter {
                request,
                reason: format!("exhausted {max_attempts} retries"),
                recorded_at: Utc::now(),
            });
        }
    }
}

/// Adds up to ±25% jitter to a backoff duration, so a burst of
/// simultaneously-failing notifications doesn't retry in lockstep.
fn jittered(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let jittered = jittered(base);
            assert!(jittered >= Duration::from_millis(740));
            assert!(jittered <= Duration::from_millis(1260));
        }
    }

    #[test]
    fn dead_letter_log_is_bounded() {
        let log = DeadLetterLog::new();
        for i in 0..(DEAD_LETTER_CAPACITY + 10) {
            log.push(DeadLetter {
                request: NotificationRequest {
                    ticket_id: i.to_string(),
                    tenant_id: "tenant-a".to_owned(),
                    urgency: Urgency::High,
                    reason: "test".to_owned(),
                },
                reason: "test".to_owned(),
                recorded_at: Utc::now(),
            });
        }
        assert_eq!(log.recent(usize::MAX).len(), DEAD_LETTER_CAPACITY);
    }
}
