//! Router tests over an in-memory index.

use std::{collections::HashMap, sync::Arc};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use ttn_core::schema::SchemaValidator;
use ttn_crawler::{Crawler, Fetch, FetchError, Pipeline, Scheduler};
use ttn_index_sqlite::SqliteIndex;

use crate::{TrackerIdentity, api_router};

struct MapFetcher(HashMap<String, Value>);

impl Fetch for MapFetcher {
  async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
    self
      .0
      .get(url)
      .cloned()
      .ok_or_else(|| FetchError::unreachable(url, "HTTP 404 Not Found"))
  }
}

const A: &str = "http://a.example/tracker.json";

fn tracker_a() -> Value {
  json!({
    "url": A,
    "description": "Workshop tools",
    "things": [
      {
        "id": "hammer",
        "title": "Hammer",
        "description": "Drives nails",
        "url": "http://things.example/hammer",
      },
      { "id": "bench", "title": "Workbench", "description": "Sturdy enough to hammer on" },
    ],
  })
}

/// Router over a pipeline that has already crawled tracker A.
async fn app() -> Router {
  let schema = serde_json::from_str(include_str!("../../../schema/tracker.json")).unwrap();
  let validator = Arc::new(SchemaValidator::from_value(schema).unwrap());
  let index = Arc::new(SqliteIndex::open_in_memory().await.unwrap());
  let fetcher = Arc::new(MapFetcher(HashMap::from([(A.to_owned(), tracker_a())])));

  let crawler = Crawler::new(index, fetcher, validator);
  crawler.crawl(A).await;

  let pipeline = Pipeline::new(crawler, Arc::new(Scheduler::start()));
  let identity = TrackerIdentity {
    url: Some("http://collector.example/tracker".into()),
    uuid: Some("7e5b0c2e-5c1f-4c57-9f3e-2f1a8b9c0d11".into()),
    maintainer_name: Some("Ada".into()),
    ..Default::default()
  };
  api_router(pipeline, identity)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
  let resp = app.oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(uri: &str) -> (StatusCode, Value) {
  let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
  call(app().await, req).await
}

async fn submit(body: Value) -> (StatusCode, Value) {
  let req = Request::builder()
    .method("POST")
    .uri("/submit")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  call(app().await, req).await
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lists_trackers_and_things() {
  let (status, trackers) = get("/trackers").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(trackers[0]["url"], A);
  assert_eq!(trackers[0]["description"], "Workshop tools");

  let (status, things) = get("/things").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(things.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn get_thing_by_id_or_404() {
  let (status, thing) = get("/things/hammer").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(thing["title"], "Hammer");
  assert_eq!(thing["tracker"], A);

  let (status, body) = get("/things/anvil").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("anvil"));
}

#[tokio::test]
async fn tracker_of_thing_by_url_or_404() {
  let (status, body) = get("/trackers/by-thing?url=http://things.example/hammer").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["tracker"], A);

  let (status, body) = get("/trackers/by-thing?url=http://things.example/anvil").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("anvil"));
}

#[tokio::test]
async fn search_things_ranks_title_first() {
  let (status, hits) = get("/search?q=hammer").await;
  assert_eq!(status, StatusCode::OK);
  let ids: Vec<&str> = hits
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["id"].as_str().unwrap())
    .collect();
  assert_eq!(ids, vec!["hammer", "bench"]);

  let (_, none) = get("/search").await;
  assert_eq!(none, json!([]));
}

#[tokio::test]
async fn search_trackers_by_description() {
  let (_, hits) = get("/trackers/search?q=workshop").await;
  assert_eq!(hits.as_array().unwrap().len(), 1);

  let (_, none) = get("/trackers/search?q=electronics").await;
  assert_eq!(none, json!([]));
}

#[tokio::test]
async fn own_tracker_document_lists_indexed_trackers() {
  let (status, doc) = get("/tracker").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(doc["url"], "http://collector.example/tracker");
  assert_eq!(doc["maintainers"], json!([{ "name": "Ada" }]));
  assert_eq!(doc["trackers"], json!([{ "url": A, "description": "Workshop tools" }]));
  assert!(doc.get("description").is_none());
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_rejects_non_tracker_urls() {
  let (status, body) = submit(json!({ "url": "ftp://a.example/t.json" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn submit_reports_unreachable_tracker() {
  let (status, body) = submit(json!({ "url": "http://gone.example/t.json" })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    body,
    json!({ "error": true, "messages": ["Tracker unreachable http://gone.example/t.json"] })
  );
}

#[tokio::test]
async fn submit_known_tracker() {
  let (status, body) = submit(json!({ "url": A })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "error": false, "messages": [format!("Skipping known tracker {A}")] }));
}
