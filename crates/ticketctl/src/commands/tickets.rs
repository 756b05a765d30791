// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use serde_json::Value;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Tenant to list tickets for.
    pub tenant_id: String,
    /// Include soft-deleted tickets.
    #[arg(long)]
    pub include_deleted: bool,
    /// Filter by status (open, pending, closed).
    #[arg(long)]
    pub status: Option<String>,
    /// Maximum number of tickets to return.
    #[arg(long, default_value = "50")]
    pub limit: i64,
    /// Number of tickets to skip.
    #[arg(long, default_value = "0")]
    pub skip: i64,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Tenant the ticket belongs to.
    pub tenant_id: String,
    /// Ticket ID to show.
    pub ticket_id: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Tenant the ticket belongs to.
    pub tenant_id: String,
    /// Ticket ID to show history for.
    pub ticket_id: String,
    /// Maximum number of history entries to return.
    #[arg(long, default_value = "100")]
    pub limit: i64,
}

pub async fn list(client: &Client, args: ListArgs) -> anyhow::Result<i32> {
    let mut path = format!(
        "/api/v1/tenants/{}/tickets?include_deleted={}&limit={}&skip={}",
        args.tenant_id, args.include_deleted, args.limit, args.skip
    );
    if let Some(status) = &args.status {
        path.push_str(&format!("&status={status}"));
    }
    let body: Value = client.get(&path).await?;
    super::print_ok(&body)
}

pub async fn get(client: &Client, args: GetArgs) -> anyhow::Result<i32> {
    let path = format!("/api/v1/tenants/{}/tickets/{}", args.tenant_id, args.ticket_id);
    let ticket: Value = client.get(&path).await?;
    super::print_ok(&ticket)
}

pub async fn history(client: &Client, args: HistoryArgs) -> anyhow::Result<i32> {
    let path = format!(
        "/api/v1/tenants/{}/tickets/{}/history?limit={}",
        args.tenant_id, args.ticket_id, args.limit
    );
    let entries: Value = client.get(&path).await?;
    super::print_ok(&entries)
}
