// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration for the ingestion daemon.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "INGESTD_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "INGESTD_PORT")]
    pub port: u16,

    /// Bearer token for API auth. If unset, auth is disabled (local dev only).
    #[arg(long, env = "INGESTD_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// MongoDB connection string. If unset, the in-memory store is used
    /// (intended for tests and local development, not production).
    #[arg(long, env = "INGESTD_MONGO_URI")]
    pub mongo_uri: Option<String>,

    /// MongoDB database name.
    #[arg(long, default_value = "ingestion", env = "INGESTD_MONGO_DB")]
    pub mongo_db: String,

    /// Base URL of the upstream ticket source API.
    #[arg(long, env = "INGESTD_UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    /// Bearer token presented to the upstream ticket source.
    #[arg(long, env = "INGESTD_UPSTREAM_TOKEN")]
    pub upstream_token: Option<String>,

    /// Page size used when paginating the upstream ticket source.
    #[arg(long, default_value_t = 100, env = "INGESTD_UPSTREAM_PAGE_SIZE")]
    pub upstream_page_size: u32,

    /// URL the notifier posts high-urgency ticket alerts to.
    #[arg(long, env = "INGESTD_NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// Global request budget for the sliding-window rate limiter.
    #[arg(long, default_value_t = 60, env = "INGESTD_RATE_LIMIT_PER_MINUTE")]
    pub rate_limit_per_minute: u32,

    /// Window size, in seconds, for the sliding-window rate limiter.
    #[arg(long, default_value_t = 60, env = "INGESTD_RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: u64,

    /// Consecutive failures before the upstream circuit breaker opens.
    #[arg(long, default_value_t = 5, env = "INGESTD_BREAKER_FAILURE_THRESHOLD")]
    pub breaker_failure_threshold: u32,

    /// Successful half-open calls required before the breaker closes again.
    #[arg(long, default_value_t = 1, env = "INGESTD_BREAKER_SUCCESS_THRESHOLD")]
    pub breaker_success_threshold: u32,

    /// Sliding window size, in calls, used to evaluate the failure threshold.
    #[arg(long, default_value_t = 10, env = "INGESTD_BREAKER_WINDOW_SIZE")]
    pub breaker_window_size: usize,

    /// Seconds the breaker stays open before probing with a half-open call.
    #[arg(long, default_value_t = 30, env = "INGESTD_BREAKER_TIMEOUT_SECS")]
    pub breaker_timeout_secs: u64,

    /// TTL, in seconds, for distributed ingestion locks.
    #[arg(long, default_value_t = 60, env = "INGESTD_LOCK_TTL_SECS")]
    pub lock_ttl_secs: u64,

    /// Soft timeout, in milliseconds, applied to analytics requests. The
    /// handler is not aborted at this deadline; it only marks the response
    /// as degraded and logs a warning so slow aggregations are visible
    /// without turning into user-facing 504s.
    #[arg(long, default_value_t = 2000, env = "INGESTD_ANALYTICS_SOFT_TIMEOUT_MS")]
    pub analytics_soft_timeout_ms: u64,

    /// Number of concurrent workers draining the notification queue.
    #[arg(long, default_value_t = 4, env = "INGESTD_NOTIFY_WORKERS")]
    pub notify_workers: usize,

    /// Bound on the in-process notification queue.
    #[arg(long, default_value_t = 1024, env = "INGESTD_NOTIFY_QUEUE_CAPACITY")]
    pub notify_queue_capacity: usize,
}

impl Config {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_timeout_secs)
    }

    pub fn lock_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_ttl_secs as i64)
    }

    pub fn analytics_soft_timeout(&self) -> Duration {
        Duration::from_millis(self.analytics_soft_timeout_ms)
    }
}
