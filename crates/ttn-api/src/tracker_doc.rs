//! Handler for `GET /tracker`: the collector published as a tracker whose
//! sub-trackers are everything it has indexed.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use ttn_core::index::TrackerIndex;
use ttn_crawler::Fetch;

use crate::{ApiState, error::ApiError};

/// Version of the tracker format this document is written in.
const TRACKER_FORMAT_VERSION: &str = "0.2.0";

/// Who runs this collector. Every field is optional; absent ones are left
/// out of the document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerIdentity {
  pub url:              Option<String>,
  pub uuid:             Option<String>,
  pub description:      Option<String>,
  pub maintainer_name:  Option<String>,
  pub maintainer_email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackerDoc {
  pub version:     String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id:          Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub maintainers: Vec<Maintainer>,
  pub trackers:    Vec<TrackerLink>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Maintainer {
  pub name:  String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackerLink {
  pub url:         String,
  #[serde(skip_serializing_if = "String::is_empty", default)]
  pub description: String,
}

/// `GET /tracker`
pub async fn handler<I, F>(State(state): State<ApiState<I, F>>) -> Result<Json<TrackerDoc>, ApiError>
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

  let identity = &state.identity;
  let maintainers = identity
    .maintainer_name
    .clone()
    .map(|name| Maintainer { name, email: identity.maintainer_email.clone() })
    .into_iter()
    .collect();

  Ok(Json(TrackerDoc {
    version: TRACKER_FORMAT_VERSION.to_owned(),
    url: identity.url.clone(),
    id: identity.uuid.clone(),
    description: identity.description.clone(),
    maintainers,
    trackers: trackers
      .into_iter()
      .map(|t| TrackerLink { url: t.url, description: t.description })
      .collect(),
  }))
}
