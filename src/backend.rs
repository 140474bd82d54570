//! HTTP adapter for the dashboard backend API.
//!
//! Implements [`BackendSource`] against the REST surface the dashboard
//! already exposes. All requests carry the configured bearer token and are
//! bounded by a client-level timeout; any transport or non-2xx failure maps
//! to [`ChimeError::FetchFailed`] so callers treat it as skip-this-cycle.

use crate::config::BackendConfig;
use crate::error::{ChimeError, Result};
use crate::schedule::ScheduleConfig;
use crate::sources::{AssignedItem, BackendSource, FollowUpFeed, Principal};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// `reqwest`-backed [`BackendSource`].
pub struct HttpBackend {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error when the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig, fetch_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| ChimeError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    /// Override the base URL (used by contract tests against a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, principal: &Principal) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url).query(&[("principal", &principal.id)]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChimeError::FetchFailed(format!("GET {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChimeError::FetchFailed(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChimeError::FetchFailed(format!("GET {path}: invalid body: {e}")))
    }
}

#[async_trait]
impl BackendSource for HttpBackend {
    async fn schedule_config(&self, principal: &Principal) -> Result<ScheduleConfig> {
        self.get_json("/api/reminders/schedule", principal).await
    }

    async fn assigned_items(&self, principal: &Principal) -> Result<Vec<AssignedItem>> {
        self.get_json("/api/assignments", principal).await
    }

    async fn follow_up_events(&self, principal: &Principal) -> Result<FollowUpFeed> {
        self.get_json("/api/follow-ups", principal).await
    }
}
