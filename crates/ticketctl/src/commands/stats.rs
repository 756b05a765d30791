// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use serde_json::Value;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Tenant to show ingestion statistics for.
    pub tenant_id: String,
    /// Start of the window (RFC3339). Defaults to the server's 24h window.
    #[arg(long)]
    pub from: Option<String>,
    /// End of the window (RFC3339). Defaults to now.
    #[arg(long)]
    pub to: Option<String>,
}

pub async fn run(client: &Client, args: StatsArgs) -> anyhow::Result<i32> {
    let mut query = Vec::new();
    if let Some(from) = &args.from {
        query.push(format!("from={from}"));
    }
    if let Some(to) = &args.to {
        query.push(format!("to={to}"));
    }
    let mut path = format!("/api/v1/tenants/{}/stats", args.tenant_id);
    if !query.is_empty() {
        path.push('?');
        path.push_str(&query.join("&"));
    }
    let body: Value = client.get(&path).await?;
    super::print_ok(&body)
}
