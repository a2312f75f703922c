//! Handlers for things.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/things` | Every indexed thing |
//! | `GET`  | `/things/{id}` | 404 if not found |
//! | `GET`  | `/search` | `?q=`; best match first |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ttn_core::{index::TrackerIndex, record::ThingRecord};
use ttn_crawler::Fetch;

use crate::{ApiState, SearchParams, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /things`
pub async fn list<I, F>(
  State(state): State<ApiState<I, F>>,
) -> Result<Json<Vec<ThingRecord>>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let things = state
    .pipeline
    .index()
    .list_things()
    .await
    .map_err(ApiError::index)?;
  Ok(Json(things))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /things/{id}`
pub async fn get_one<I, F>(
  State(state): State<ApiState<I, F>>,
  Path(id): Path<String>,
) -> Result<Json<ThingRecord>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let thing = state
    .pipeline
    .index()
    .get_thing(&id)
    .await
    .map_err(ApiError::index)?
    .ok_or_else(|| ApiError::NotFound(format!("thing {id} not found")))?;
  Ok(Json(thing))
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// `GET /search?q=<text>`
pub async fn search<I, F>(
  State(state): State<ApiState<I, F>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ThingRecord>>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let things = state
    .pipeline
    .index()
    .search_things(&params.q)
    .await
    .map_err(ApiError::index)?;
  Ok(Json(things))
}
