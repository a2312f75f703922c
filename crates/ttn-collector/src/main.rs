//! ttn-collector server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the index,
//! restores it if it had to be rebuilt, starts the periodic sweep and serves
//! the JSON API over HTTP.
//!
//! # Checking a tracker
//!
//! To run the submission checks against a tracker without starting the
//! server:
//!
//! ```
//! cargo run -p ttn-collector -- --check https://example.org/tracker.json
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use ttn_collector::CollectorConfig;

#[derive(Parser)]
#[command(author, version, about = "Thing Tracker Network collector")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Check the tracker at this URL, print the outcome and exit.
  #[arg(long, value_name = "URL")]
  check: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = CollectorConfig::load(&cli.config)?;
  let (pipeline, outcome) = ttn_collector::open(&cfg).await?;

  // Helper mode: check one tracker and exit.
  if let Some(url) = cli.check {
    let submission = pipeline.check(&url).await;
    for message in &submission.messages {
      println!("{message}");
    }
    anyhow::ensure!(!submission.error, "tracker {url} did not pass the checks");
    println!("Tracker {url} looks fine");
    return Ok(());
  }

  pipeline.restore(&outcome).await;
  pipeline.start_sweep(cfg.sweep_interval());

  let app = ttn_collector::router(pipeline.clone(), cfg.identity());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  pipeline.scheduler().shutdown();
  tracing::info!("Shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
