// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use serde_json::Value;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Tenant to ingest tickets for.
    pub tenant_id: String,
}

#[derive(Debug, Args)]
pub struct CancelArgs {
    /// Tenant whose in-flight ingestion run should be cancelled.
    pub tenant_id: String,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Tenant to report the currently running ingestion job for, if any.
    pub tenant_id: String,
}

pub async fn run(client: &Client, args: IngestArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/ingest", args.tenant_id);
    let job: Value = client.post(&path).await?;
    super::print_ok(&job)
}

pub async fn cancel(client: &Client, args: CancelArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/ingest/cancel", args.tenant_id);
    let body: Value = client.post(&path).await?;
    super::print_ok(&body)
}

pub async fn status(client: &Client, args: StatusArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/ingest/status", args.tenant_id);
    let body: Value = client.get(&path).await?;
    super::print_ok(&body)
}
