use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use promdash_core::config::Config;
use promdash_core::error::{PromdashError, Result};
use promdash_core::model::MetricsPayload;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};

use crate::decode::{DecodeOptions, normalize_body};

const ACCEPT_BOTH: &str = "application/json, text/plain;q=0.9";

/// Anything that can produce a fresh metrics payload per poll.
pub trait MetricsSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<MetricsPayload>> + Send;
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub attempts: u32,
    pub backoff: Duration,
    pub decode: DecodeOptions,
}

impl ScrapeConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            url: cfg.scrape_url.clone(),
            headers: cfg.scrape_headers.clone(),
            timeout: cfg.fetch_timeout,
            attempts: cfg.fetch_attempts.max(1),
            backoff: cfg.retry_backoff,
            decode: DecodeOptions {
                commit_untyped: cfg.commit_untyped,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeClient {
    client: Client,
    cfg: ScrapeConfig,
    headers: HeaderMap,
}

impl ScrapeClient {
    pub fn new(cfg: ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| PromdashError::Fetch(format!("failed to build http client: {e}")))?;
        let headers = build_http_headers(&cfg.headers);
        Ok(Self {
            client,
            cfg,
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.cfg.url
    }

    /// GETs the scrape URL, retrying transport errors and non-2xx statuses.
    pub async fn fetch_body(&self) -> Result<bytes::Bytes> {
        let url = self.cfg.url.as_str();
        let mut last_error = String::new();
        for attempt in 1..=self.cfg.attempts {
            match self.try_fetch(url).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    tracing::warn!(url = %url, attempt, error = %err, "scrape attempt failed");
                    last_error = err;
                }
            }
            if attempt < self.cfg.attempts {
                tokio::time::sleep(self.cfg.backoff * attempt).await;
            }
        }
        Err(PromdashError::Fetch(format!(
            "{url} failed after {} attempts: {last_error}",
            self.cfg.attempts
        )))
    }

    async fn try_fetch(&self, url: &str) -> std::result::Result<bytes::Bytes, String> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_BOTH)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("unexpected status {status}"));
        }
        resp.bytes().await.map_err(|e| e.to_string())
    }
}

impl MetricsSource for ScrapeClient {
    async fn fetch(&self) -> Result<MetricsPayload> {
        let body = self.fetch_body().await?;
        let payload = normalize_body(&body, self.cfg.decode, Utc::now());
        tracing::debug!(url = %self.cfg.url, metrics = payload.metrics.len(), "scrape normalized");
        Ok(payload)
    }
}

fn build_http_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (k, v) in headers {
        let name = HeaderName::try_from(k.as_str());
        let value = HeaderValue::try_from(v.as_str());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                out.insert(name, value);
            }
            _ => {
                tracing::warn!(header = %k, "ignored invalid scrape header");
            }
        }
    }
    out
}
