// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

use crate::client::Client;

pub async fn run(client: &Client) -> anyhow::Result<i32> {
    let body: Value = client.get("/api/v1/health").await?;
    super::print_ok(&body)
}
