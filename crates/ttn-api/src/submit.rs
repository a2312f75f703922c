//! Handler for `POST /submit`.
//!
//! Body: `{"url":"https://example.org/tracker.json"}`. The response is the
//! submission outcome, `{"error": bool, "messages": [..]}`, with status 200
//! whether or not the tracker itself was acceptable; only a URL that cannot
//! be a tracker location at all is rejected with 400.

use axum::{Json, extract::State};
use serde::Deserialize;
use ttn_core::index::TrackerIndex;
use ttn_crawler::{Fetch, Submission};
use url::Url;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub url: String,
}

/// `POST /submit`
pub async fn handler<I, F>(
  State(state): State<ApiState<I, F>>,
  Json(body): Json<SubmitBody>,
) -> Result<Json<Submission>, ApiError>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  let url = check_url(&body.url)?;
  Ok(Json(state.pipeline.submit(url).await))
}

/// Accept absolute `http`/`https` URLs whose host has at least one dot.
///
/// The input is returned trimmed but otherwise as typed, so that the
/// "url inconsistent" check compares what the submitter actually entered.
pub fn check_url(raw: &str) -> Result<&str, ApiError> {
  let raw = raw.trim();
  let parsed =
    Url::parse(raw).map_err(|e| ApiError::BadRequest(format!("invalid URL {raw:?}: {e}")))?;

  if !matches!(parsed.scheme(), "http" | "https") {
    return Err(ApiError::BadRequest(format!(
      "unsupported scheme {:?}, expected http or https",
      parsed.scheme()
    )));
  }

  match parsed.host_str() {
    Some(host) if host.contains('.') && !host.ends_with('.') => Ok(raw),
    _ => Err(ApiError::BadRequest(format!(
      "URL {raw:?} needs a fully qualified host name"
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_http_and_https_with_dotted_host() {
    assert_eq!(check_url("http://a.example/t.json").unwrap(), "http://a.example/t.json");
    assert_eq!(check_url("  https://a.example/t.json\n").unwrap(), "https://a.example/t.json");
    assert!(check_url("http://10.0.0.1/t.json").is_ok());
  }

  #[test]
  fn rejects_everything_else() {
    for bad in [
      "",
      "a.example/t.json",
      "ftp://a.example/t.json",
      "file:///etc/passwd",
      "http://localhost/t.json",
      "http://example./t.json",
    ] {
      assert!(matches!(check_url(bad), Err(ApiError::BadRequest(_))), "{bad:?}");
    }
  }
}
