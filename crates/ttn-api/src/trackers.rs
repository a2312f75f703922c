//! Handlers for `/trackers` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/trackers` | Every indexed tracker, oldest first |
//! | `GET`  | `/trackers/search` | `?q=`; matches descriptions |
//! | `GET`  | `/trackers/by-thing` | `?url=`; tracker that last wrote that thing, 404 if none |

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use ttn_core::{index::TrackerIndex, record::TrackerRecord};
use ttn_crawler::Fetch;

use crate::{ApiState, SearchParams, error::ApiError};

/// `GET /trackers`
pub async fn list<I, F>(
  State(state): State<ApiState<I, F>>,
) -> Result<Json<Vec<TrackerRecord>>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let trackers = state
    .pipeline
    .index()
    .list_trackers()
    .await
    .map_err(ApiError::index)?;
  Ok(Json(trackers))
}

/// `GET /trackers/search?q=<text>`
pub async fn search<I, F>(
  State(state): State<ApiState<I, F>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TrackerRecord>>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let trackers = state
    .pipeline
    .index()
    .search_trackers(&params.q)
    .await
    .map_err(ApiError::index)?;
  Ok(Json(trackers))
}

/// `?url=` for [`by_thing`].
#[derive(Debug, Deserialize)]
pub struct ThingUrlParams {
  pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TrackerOfThing {
  pub tracker: String,
}

/// `GET /trackers/by-thing?url=<thing url>`
pub async fn by_thing<I, F>(
  State(state): State<ApiState<I, F>>,
  Query(params): Query<ThingUrlParams>,
) -> Result<Json<TrackerOfThing>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let tracker = state
    .pipeline
    .index()
    .tracker_for_thing_url(&params.url)
    .await
    .map_err(ApiError::index)?
    .ok_or_else(|| ApiError::NotFound(format!("no tracker lists thing {}", params.url)))?;
  Ok(Json(TrackerOfThing { tracker }))
}
