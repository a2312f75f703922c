//! JSON API for the tracker collector.
//!
//! Exposes an axum [`Router`] over a [`Pipeline`]: read-only views of the
//! index, free-text search, tracker submission, and the collector's own
//! tracker document. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ttn_api::api_router(pipeline, identity))
//! ```

pub mod error;
pub mod submit;
pub mod things;
pub mod tracker_doc;
pub mod trackers;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use ttn_core::index::TrackerIndex;
use ttn_crawler::{Fetch, Pipeline};

pub use error::ApiError;
pub use tracker_doc::TrackerIdentity;

/// Shared state threaded through all handlers.
pub struct ApiState<I, F> {
  pub pipeline: Pipeline<I, F>,
  pub identity: Arc<TrackerIdentity>,
}

impl<I, F> Clone for ApiState<I, F> {
  fn clone(&self) -> Self {
    Self { pipeline: self.pipeline.clone(), identity: Arc::clone(&self.identity) }
  }
}

/// `?q=` for the search endpoints. A missing query searches for nothing.
#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  #[serde(default)]
  pub q: String,
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<I, F>(pipeline: Pipeline<I, F>, identity: TrackerIdentity) -> Router<()>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let state = ApiState { pipeline, identity: Arc::new(identity) };
  Router::new()
    // Trackers
    .route("/trackers", get(trackers::list::<I, F>))
    .route("/trackers/search", get(trackers::search::<I, F>))
    .route("/trackers/by-thing", get(trackers::by_thing::<I, F>))
    // Things
    .route("/things", get(things::list::<I, F>))
    .route("/things/{id}", get(things::get_one::<I, F>))
    .route("/search", get(things::search::<I, F>))
    // Submission
    .route("/submit", post(submit::handler::<I, F>))
    // The collector as a tracker in its own right
    .route("/tracker", get(tracker_doc::handler::<I, F>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
