//! HTTP metadata lookup client
//!
//! Posts the current record to `{base_url}/lookup` and maps the response:
//!
//! | Response | Outcome |
//! |---|---|
//! | 200 with a record body | `Ok(Some(record))` |
//! | 204, 404 | `Ok(None)` (no update available) |
//! | other 4xx with `{"message": ...}` | `FetchError::Alert(message)` |
//! | anything else | `FetchError::Other` |

use async_trait::async_trait;
use bibup_common::config::MetadataConfig;
use bibup_common::{ItemId, Record};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::MetadataSource;
use crate::error::FetchError;

const USER_AGENT: &str = concat!("bibup/", env!("CARGO_PKG_VERSION"));

/// Alert body returned by the lookup service
#[derive(Debug, Deserialize)]
struct AlertBody {
    message: String,
}

/// Rate limiter enforcing a minimum spacing between lookups
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Metadata source talking to a translation/lookup server over HTTP
pub struct HttpMetadataSource {
    http_client: reqwest::Client,
    base_url: String,
    lookup_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpMetadataSource {
    pub fn new(config: &MetadataConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            http_client,
            lookup_url: format!("{}/lookup", base_url),
            base_url,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit_ms)),
        })
    }

    pub fn lookup_url(&self) -> &str {
        &self.lookup_url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Any HTTP response from the lookup server counts as reachable
    pub async fn is_reachable(&self) -> bool {
        match self.http_client.head(&self.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.base_url, error = %e, "Lookup server unreachable");
                false
            }
        }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_updated_metadata(
        &self,
        item_id: ItemId,
        record: &Record,
    ) -> Result<Option<Record>, FetchError> {
        self.rate_limiter.wait().await;

        tracing::debug!(item_id, url = %self.lookup_url, "Requesting metadata lookup");

        let response = self
            .http_client
            .post(&self.lookup_url)
            .json(record)
            .send()
            .await
            .map_err(|e| FetchError::Other(anyhow::Error::new(e).context("lookup request failed")))?;

        let status = response.status();

        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            tracing::debug!(item_id, status = status.as_u16(), "No updated metadata available");
            return Ok(None);
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<AlertBody>(&body) {
                Ok(alert) => Err(FetchError::Alert(alert.message)),
                Err(_) => Err(FetchError::Other(anyhow::anyhow!(
                    "lookup returned {}: {}",
                    status.as_u16(),
                    body
                ))),
            };
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Other(anyhow::anyhow!(
                "lookup returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let updated: Record = response
            .json()
            .await
            .map_err(|e| FetchError::Other(anyhow::Error::new(e).context("invalid lookup response")))?;

        tracing::debug!(item_id, item_type = %updated.item_type, "Received updated metadata");
        Ok(Some(updated))
    }
}
