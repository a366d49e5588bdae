// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the destination service.
//!
//! Every call carries its own timeout from [`Timing`]. Callers decide what a
//! failure means: the pipeline treats a failed status lookup as "not yet
//! imported" and a failed submission as an item error.

use crate::config::{normalize_endpoint, Timing};
use crate::record::CreationRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors from the destination service.
#[derive(thiserror::Error, Debug)]
pub enum DestinationError {
    /// Network failure or timeout.
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx response.
    #[error("HTTP {0}")]
    Status(u16),
    /// 2xx response with a body that could not be read.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Result of a status lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatus {
    pub exists: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub imported_at: Option<String>,
    #[serde(default)]
    pub creation_type: Option<String>,
}

/// Result of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReceipt {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub duplicate: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a health probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Client bound to one destination endpoint.
#[derive(Clone)]
pub struct DestinationClient {
    client: reqwest::Client,
    endpoint: String,
    timing: Timing,
}

impl DestinationClient {
    pub fn new(endpoint: &str, timing: Timing) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("creation-importer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: normalize_endpoint(endpoint),
            timing,
        }
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.endpoint, path)
    }

    /// Look up whether `creation_id` was imported before.
    pub async fn check_status(&self, creation_id: &str) -> Result<ImportStatus, DestinationError> {
        let resp = self
            .client
            .get(self.url("/import/status"))
            .query(&[("creationId", creation_id)])
            .timeout(self.timing.status_timeout)
            .send()
            .await?;
        decode(resp).await
    }

    /// Submit one record.
    pub async fn submit(&self, record: &CreationRecord) -> Result<ImportReceipt, DestinationError> {
        let resp = self
            .client
            .post(self.url("/import"))
            .json(record)
            .timeout(self.timing.submit_timeout)
            .send()
            .await?;
        decode(resp).await
    }

    /// Probe the service.
    pub async fn health(&self) -> Result<HealthStatus, DestinationError> {
        self.health_within(self.timing.health_timeout).await
    }

    pub async fn health_within(&self, timeout: Duration) -> Result<HealthStatus, DestinationError> {
        let resp = self
            .client
            .get(self.url("/import/health"))
            .timeout(timeout)
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, DestinationError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(DestinationError::Status(status.as_u16()));
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| DestinationError::Decode(e.to_string()))
}
