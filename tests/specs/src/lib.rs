// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `ingestd` binary as a subprocess and exercises it over
//! its one transport: plain HTTP on a TCP port.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `ingestd` binary.
pub fn ingestd_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("ingestd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Options applied when spawning an [`IngestdProcess`]. `upstream_url` and
/// `notify_url` default to unset, matching the daemon's own "no upstream
/// configured" startup mode used for tests that only exercise the HTTP
/// surface directly.
#[derive(Default)]
pub struct IngestdBuilder {
    auth_token: Option<String>,
    upstream_url: Option<String>,
    notify_url: Option<String>,
    rate_limit_per_minute: Option<u32>,
}

impl IngestdBuilder {
    /// Require a bearer token on every route but `/api/v1/health`.
    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    /// Point the daemon at a (real or mock) upstream ticket source.
    pub fn upstream_url(mut self, url: &str) -> Self {
        self.upstream_url = Some(url.to_owned());
        self
    }

    /// Point the daemon at a notification endpoint.
    pub fn notify_url(mut self, url: &str) -> Self {
        self.notify_url = Some(url.to_owned());
        self
    }

    /// Override the sliding-window rate limit budget.
    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    /// Spawn `ingestd` with the configured options, using the in-memory
    /// store (no `--mongo-uri` passed).
    pub fn spawn(self) -> anyhow::Result<IngestdProcess> {
        ensure_crypto();
        let binary = ingestd_binary();
        anyhow::ensure!(binary.exists(), "ingestd binary not found at {}", binary.display());

        let port = free_port()?;
        let mut cmd = Command::new(&binary);
        cmd.args(["--host", "127.0.0.1", "--port"]).arg(port.to_string());

        if let Some(ref token) = self.auth_token {
            cmd.args(["--auth-token", token]);
        }
        if let Some(ref url) = self.upstream_url {
            cmd.args(["--upstream-url", url]);
        }
        if let Some(ref url) = self.notify_url {
            cmd.args(["--notify-url", url]);
        }
        if let Some(limit) = self.rate_limit_per_minute {
            cmd.args(["--rate-limit-per-minute", &limit.to_string()]);
        }

        cmd.env("RUST_LOG", "warn").stdout(Stdio::null()).stderr(Stdio::null());

        let child = cmd.spawn()?;
        Ok(IngestdProcess { child, port })
    }
}

/// A running `ingestd` process, killed on drop.
pub struct IngestdProcess {
    child: Child,
    port: u16,
}

impl IngestdProcess {
    /// Create a builder for custom startup options.
    pub fn build() -> IngestdBuilder {
        IngestdBuilder::default()
    }

    /// Spawn `ingestd` with defaults: in-memory store, no auth, no upstream.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}/api/v1/health", self.base_url())
    }

    /// Poll `/api/v1/health` until it responds successfully or `timeout`
    /// elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = self.health_url();

        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("ingestd did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("ingestd did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for IngestdProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
