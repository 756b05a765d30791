// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use ticketctl::client::Client;
use ticketctl::commands::Commands;
use ticketctl::config::Config;

#[derive(Parser)]
#[command(name = "ticketctl", version, about = "Admin CLI for the ingestd ticket ingestion daemon.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let client = match Client::new(&cli.config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };

    match cli.command.run(&client).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
