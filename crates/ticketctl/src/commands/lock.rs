// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use serde_json::Value;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct LockArgs {
    /// Tenant to show the ingestion lock for.
    pub tenant_id: String,
}

pub async fn run(client: &Client, args: LockArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/lock", args.tenant_id);
    let body: Value = client.get(&path).await?;
    super::print_ok(&body)
}
