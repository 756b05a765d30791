// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state threaded through every HTTP handler, assembled
//! once in [`crate::run`] and held behind `Arc` rather than rebuilt per
//! request.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::analytics::AnalyticsService;
use crate::circuit_breaker::BreakerRegistry;
use crate::classifier::Classifier;
use crate::config::Config;
use crate::history::HistoryLog;
use crate::lock_service::LockService;
use crate::notifier::Notifier;
use crate::orchestrator::Orchestrator;
use crate::rate_limiter::RateLimiter;
use crate::store::{HistoryRepository, IngestionLogRepository, JobRepository, TicketRepository};
use crate::sync_engine::SyncEngine;

pub struct AppState {
    pub config: Config,
    pub tickets: Arc<dyn TicketRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub history: Arc<HistoryLog>,
    pub rate_limiter: Arc<RateLimiter>,
    pub breakers: Arc<BreakerRegistry>,
    pub lock_service: Arc<LockService>,
    pub orchestrator: Arc<Orchestrator>,
    pub analytics: AnalyticsService,
    pub shutdown: CancellationToken,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        config: Config,
        tickets: Arc<dyn TicketRepository>,
        jobs: Arc<dyn JobRepository>,
        history_repo: Arc<dyn HistoryRepository>,
        log_repo: Arc<dyn IngestionLogRepository>,
        lock_service: Arc<LockService>,
        classifier: Arc<dyn Classifier>,
        notifier: Notifier,
        breakers: Arc<BreakerRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_window(),
        ));
        let history = Arc::new(HistoryLog::new(history_repo));
        let sync_engine =
            Arc::new(SyncEngine::new(Arc::clone(&tickets), Arc::clone(&history), classifier));
        let analytics =
            AnalyticsService::new(Arc::clone(&tickets), config.analytics_soft_timeout());

        let breaker_config = crate::circuit_breaker::CircuitBreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            success_threshold: config.breaker_success_threshold,
            window_size: config.breaker_window_size,
            timeout: config.breaker_timeout(),
            half_open_max_calls: 1,
        };

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&jobs),
            log_repo,
            Arc::clone(&lock_service),
            Arc::clone(&rate_limiter),
            Arc::clone(&breakers),
            breaker_config,
            sync_engine,
            notifier,
            config.upstream_url.clone(),
            config.upstream_token.clone(),
            config.upstream_page_size,
            config.lock_ttl(),
        ));

        Self {
            config,
            tickets,
            jobs,
            history,
            rate_limiter,
            breakers,
            lock_service,
            orchestrator,
            analytics,
            shutdown,
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.config.auth_token.as_deref()
    }
}
