//! The tracker collector server.
//!
//! Configuration, and the wiring from configuration to a running
//! [`Pipeline`] and HTTP [`Router`]. The binary in `main.rs` only sequences
//! these.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use ttn_api::TrackerIdentity;
use ttn_core::{index::OpenOutcome, schema::SchemaValidator};
use ttn_crawler::{CrawlLimits, Crawler, FetchConfig, HttpFetcher, Pipeline, Scheduler};
use ttn_index_sqlite::SqliteIndex;

/// The pipeline as the server runs it.
pub type Collector = Pipeline<SqliteIndex, HttpFetcher>;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `TTN_*`
/// environment variables. Every key has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectorConfig {
  pub host:                String,
  pub port:                u16,
  pub index_dir:           PathBuf,
  pub schema_path:         PathBuf,
  pub sweep_interval_secs: u64,
  pub fetch_timeout_secs:  u64,
  pub user_agent:          String,
  pub max_depth:           Option<usize>,
  pub max_trackers:        Option<usize>,
  pub tracker_url:         Option<String>,
  pub tracker_uuid:        Option<String>,
  pub tracker_description: Option<String>,
  pub maintainer_name:     Option<String>,
  pub maintainer_email:    Option<String>,
}

impl Default for CollectorConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".into(),
      port:                8080,
      index_dir:           PathBuf::from("data/index"),
      schema_path:         PathBuf::from("schema/tracker.json"),
      sweep_interval_secs: 2 * 60 * 60,
      fetch_timeout_secs:  30,
      user_agent:          FetchConfig::default().user_agent,
      max_depth:           None,
      max_trackers:        None,
      tracker_url:         None,
      tracker_uuid:        None,
      tracker_description: None,
      maintainer_name:     None,
      maintainer_email:    None,
    }
  }
}

impl CollectorConfig {
  /// Layer the TOML file at `path` (optional) under `TTN_*` variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("TTN"))
      .build()
      .context("failed to read config file")?;

    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise CollectorConfig")?;
    anyhow::ensure!(cfg.sweep_interval_secs > 0, "sweep_interval_secs must be positive");
    anyhow::ensure!(cfg.fetch_timeout_secs > 0, "fetch_timeout_secs must be positive");
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_secs) }

  pub fn fetch_config(&self) -> FetchConfig {
    FetchConfig {
      user_agent: self.user_agent.clone(),
      timeout:    Duration::from_secs(self.fetch_timeout_secs),
    }
  }

  pub fn limits(&self) -> CrawlLimits {
    CrawlLimits { max_depth: self.max_depth, max_trackers: self.max_trackers }
  }

  pub fn identity(&self) -> TrackerIdentity {
    TrackerIdentity {
      url:              self.tracker_url.clone(),
      uuid:             self.tracker_uuid.clone(),
      description:      self.tracker_description.clone(),
      maintainer_name:  self.maintainer_name.clone(),
      maintainer_email: self.maintainer_email.clone(),
    }
  }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

/// Open the index, load the schema and assemble the pipeline. Must be called
/// from within a tokio runtime; the scheduler starts immediately.
///
/// The returned outcome tells the caller whether previously known trackers
/// need restoring.
pub async fn open(cfg: &CollectorConfig) -> anyhow::Result<(Collector, OpenOutcome)> {
  let schema_path = expand_tilde(&cfg.schema_path);
  let validator = SchemaValidator::from_file(&schema_path)
    .with_context(|| format!("failed to load tracker schema from {schema_path:?}"))?;

  let index_dir = expand_tilde(&cfg.index_dir);
  let (index, outcome) = SqliteIndex::open_or_create(&index_dir)
    .await
    .with_context(|| format!("failed to open index at {index_dir:?}"))?;

  let fetcher = HttpFetcher::new(&cfg.fetch_config()).context("failed to build HTTP client")?;

  let crawler = Crawler::new(Arc::new(index), Arc::new(fetcher), Arc::new(validator))
    .with_limits(cfg.limits());
  let pipeline = Pipeline::new(crawler, Arc::new(Scheduler::start()));
  Ok((pipeline, outcome))
}

/// The HTTP surface with request tracing.
pub fn router(pipeline: Collector, identity: TrackerIdentity) -> Router {
  ttn_api::api_router(pipeline, identity).layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
