// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ingestd: multi-tenant support-ticket ingestion and analytics backend.

pub mod analytics;
pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod lock_service;
pub mod model;
pub mod notifier;
pub mod orchestrator;
pub mod rate_limiter;
pub mod state;
pub mod store;
pub mod sync_engine;
pub mod transport;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::classifier::{Classifier, KeywordClassifier};
use crate::config::Config;
use crate::lock_service::LockService;
use crate::notifier::Notifier;
use crate::orchestrator::spawn_lock_sweeper;
use crate::state::AppState;
use crate::store::{HistoryRepository, IngestionLogRepository, JobRepository, TicketRepository};
use crate::transport::build_router;

const LOCK_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Run the ingestion daemon until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // `reqwest`'s rustls backend is built with `rustls-no-provider`, so the
    // process must install a default crypto provider itself before the
    // first TLS handshake (to the upstream ticket source or the notifier) —
    // otherwise that first HTTPS request panics instead of failing gracefully.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let (tickets, jobs, history_repo, log_repo, lock_repo): (
        Arc<dyn TicketRepository>,
        Arc<dyn JobRepository>,
        Arc<dyn HistoryRepository>,
        Arc<dyn IngestionLogRepository>,
        Arc<dyn crate::store::LockRepository>,
    ) = match &config.mongo_uri {
        Some(uri) => {
            let client = mongodb::Client::with_uri_str(uri).await?;
            let db = client.database(&config.mongo_db);
            crate::store::mongo::ensure_indexes(&db).await?;
            (
                Arc::new(crate::store::mongo::MongoTicketRepository::new(&db)),
                Arc::new(crate::store::mongo::MongoJobRepository::new(&db)),
                Arc::new(crate::store::mongo::MongoHistoryRepository::new(&db)),
                Arc::new(crate::store::mongo::MongoIngestionLogRepository::new(&db)),
                Arc::new(crate::store::mongo::MongoLockRepository::new(&db)),
            )
        }
        None => {
            tracing::warn!("INGESTD_MONGO_URI not set, using in-memory store (not for production)");
            (
                Arc::new(crate::store::memory::MemoryTicketRepository::new()),
                Arc::new(crate::store::memory::MemoryJobRepository::new()),
                Arc::new(crate::store::memory::MemoryHistoryRepository::new()),
                Arc::new(crate::store::memory::MemoryIngestionLogRepository::new()),
                Arc::new(crate::store::memory::MemoryLockRepository::new()),
            )
        }
    };

    let lock_service = Arc::new(LockService::new(lock_repo, config.lock_ttl()));
    let classifier: Arc<dyn Classifier> = Arc::new(KeywordClassifier);
    let breakers = Arc::new(BreakerRegistry::new());
    let breaker_config = CircuitBreakerConfig {
        failure_threshold: config.breaker_failure_threshold,
        success_threshold: config.breaker_success_threshold,
        window_size: config.breaker_window_size,
        timeout: config.breaker_timeout(),
        half_open_max_calls: 1,
    };
    let notifier = Notifier::spawn(
        config.notify_url.clone(),
        config.notify_workers,
        config.notify_queue_capacity,
        Arc::clone(&breakers),
        breaker_config,
        shutdown.clone(),
    );

    let state = Arc::new(AppState::new(
        config,
        tickets,
        jobs,
        history_repo,
        log_repo,
        Arc::clone(&lock_service),
        classifier,
        notifier,
        breakers,
        shutdown.clone(),
    ));

    spawn_lock_sweeper(lock_service, LOCK_SWEEP_INTERVAL, shutdown.clone());

    tracing::info!("ingestd listening on {addr}");
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
