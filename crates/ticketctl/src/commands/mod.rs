// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod breakers;
pub mod health;
pub mod ingest;
pub mod jobs;
pub mod lock;
pub mod stats;
pub mod tickets;

use clap::Subcommand;

use crate::client::Client;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check whether ingestd is reachable.
    Health,
    /// Start an ingestion run for a tenant.
    Ingest(ingest::IngestArgs),
    /// Cancel an in-flight ingestion run for a tenant.
    Cancel(ingest::CancelArgs),
    /// Show the currently running ingestion job for a tenant, if any.
    Status(ingest::StatusArgs),
    /// Show a single ingestion job.
    Job(jobs::JobArgs),
    /// List recent ingestion jobs for a tenant.
    Jobs(jobs::JobsArgs),
    /// List tickets for a tenant.
    Tickets(tickets::ListArgs),
    /// Show a single ticket.
    Ticket(tickets::GetArgs),
    /// Show the change history for a ticket.
    History(tickets::HistoryArgs),
    /// Show ingestion statistics for a tenant.
    Stats(stats::StatsArgs),
    /// Show the distributed ingestion lock for a tenant.
    Lock(lock::LockArgs),
    /// List circuit breaker states.
    Breakers,
    /// Reset a circuit breaker to closed.
    ResetBreaker(breakers::ResetArgs),
}

impl Commands {
    pub async fn run(self, client: &Client) -> anyhow::Result<i32> {
        match self {
            Commands::Health => health::run(client).await,
            Commands::Ingest(args) => ingest::run(client, args).await,
            Commands::Cancel(args) => ingest::cancel(client, args).await,
            Commands::Status(args) => ingest::status(client, args).await,
            Commands::Job(args) => jobs::get(client, args).await,
            Commands::Jobs(args) => jobs::list(client, args).await,
            Commands::Tickets(args) => tickets::list(client, args).await,
            Commands::Ticket(args) => tickets::get(client, args).await,
            Commands::History(args) => tickets::history(client, args).await,
            Commands::Stats(args) => stats::run(client, args).await,
            Commands::Lock(args) => lock::run(client, args).await,
            Commands::Breakers => breakers::list(client).await,
            Commands::ResetBreaker(args) => breakers::reset(client, args).await,
        }
    }
}

/// Pretty-print a JSON-serializable response and return the CLI exit code.
fn print_ok<T: serde::Serialize>(value: &T) -> anyhow::Result<i32> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(0)
}
