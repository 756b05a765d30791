// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin HTTP client for the ingestd admin API.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl Client {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_owned(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn req(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .req(reqwest::Method::GET, path)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?
            .error_for_status()
            .with_context(|| format!("GET {path}"))?;
        resp.json().await.with_context(|| format!("decoding response for GET {path}"))
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .req(reqwest::Method::POST, path)
            .json(&Value::Null)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?
            .error_for_status()
            .with_context(|| format!("POST {path}"))?;
        resp.json().await.with_context(|| format!("decoding response for POST {path}"))
    }
}
