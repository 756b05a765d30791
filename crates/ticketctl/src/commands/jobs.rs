// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use serde_json::Value;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct JobArgs {
    /// Tenant the job belongs to.
    pub tenant_id: String,
    /// Job ID to show.
    pub job_id: String,
}

#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Tenant to list jobs for.
    pub tenant_id: String,
    /// Maximum number of jobs to return.
    #[arg(long, default_value = "20")]
    pub limit: i64,
}

pub async fn get(client: &Client, args: JobArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/jobs/{}", args.tenant_id, args.job_id);
    let job: Value = client.get(&path).await?;
    super::print_ok(&job)
}

pub async fn list(client: &Client, args: JobsArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/jobs?limit={}", args.tenant_id, args.limit);
    let jobs: Value = client.get(&path).await?;
    super::print_ok(&jobs)
}
