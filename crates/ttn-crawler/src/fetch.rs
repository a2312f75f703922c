//! Fetching JSON documents over HTTP.

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Why a document could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Transport failure, timeout, or a non-2xx response. All are treated the
  /// same way: the document is simply not there this round.
  #[error("{url} is unreachable: {reason}")]
  Unreachable { url: String, reason: String },

  /// The body arrived but is not JSON.
  #[error("{url} is not valid JSON: {source}")]
  Malformed {
    url:    String,
    #[source]
    source: serde_json::Error,
  },
}

impl FetchError {
  pub fn unreachable(url: impl Into<String>, reason: impl ToString) -> Self {
    Self::Unreachable { url: url.into(), reason: reason.to_string() }
  }
}

/// Source of tracker and thing documents.
///
/// The HTTP implementation is [`HttpFetcher`]; tests substitute an in-memory
/// map.
pub trait Fetch: Send + Sync {
  fn fetch_json<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Value, FetchError>> + Send + 'a;
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
  pub user_agent: String,
  /// Upper bound on one request, connect to last byte.
  pub timeout:    Duration,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      user_agent: concat!("ttn-collector/", env!("CARGO_PKG_VERSION")).to_owned(),
      timeout:    Duration::from_secs(30),
    }
  }
}

/// [`Fetch`] over plain HTTP GET.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
    let client = Client::builder()
      .user_agent(&config.user_agent)
      .timeout(config.timeout)
      .build()?;
    Ok(Self { client })
  }
}

impl Fetch for HttpFetcher {
  async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
    let resp = self
      .client
      .get(url)
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| FetchError::unreachable(url, e))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(FetchError::unreachable(url, format!("HTTP {status}")));
    }

    let body = resp
      .bytes()
      .await
      .map_err(|e| FetchError::unreachable(url, e))?;

    serde_json::from_slice(&body).map_err(|source| FetchError::Malformed {
      url: url.to_owned(),
      source,
    })
  }
}
