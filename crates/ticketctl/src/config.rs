// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;

/// Connection settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Base URL of the ingestd server.
    #[arg(long, env = "TICKETCTL_URL", default_value = "http://127.0.0.1:8080")]
    pub url: String,

    /// Bearer token for API authentication.
    #[arg(long, env = "TICKETCTL_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "TICKETCTL_TIMEOUT", default_value = "10")]
    pub timeout_secs: u64,
}
