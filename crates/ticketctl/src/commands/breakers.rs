// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use serde_json::Value;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Name of the circuit breaker to reset (e.g. "upstream-ticket-source").
    pub name: String,
}

pub async fn list(client: &Client) -> anyhow::Result<i32> {
    let body: Value = client.get("/api/v1/breakers").await?;
    super::print_ok(&body)
}

pub async fn reset(client: &Client, args: ResetArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/breakers/{}/reset", args.name);
    let body: Value = client.post(&path).await?;
    super::print_ok(&body)
}
