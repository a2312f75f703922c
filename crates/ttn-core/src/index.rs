//! The `TrackerIndex` trait and the outcome of opening an index.
//!
//! The trait is implemented by storage backends (e.g. `ttn-index-sqlite`).
//! The crawler and the HTTP surface depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use crate::record::{ThingRecord, TrackerRecord};

/// What happened when an index was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
  /// No index existed; an empty one was created.
  Created,
  /// An index with the expected version was opened as is.
  Opened,
  /// The stored version did not match. The index was discarded and recreated
  /// empty; these trackers were known before and must be crawled again.
  Rebuilt { previous_urls: Vec<String> },
}

/// A searchable store of trackers and things.
///
/// Trackers are keyed on `url` and things on `id`. Both upserts always write;
/// skip-on-duplicate for trackers is the crawler's decision, made by asking
/// [`find_tracker_by_url`](TrackerIndex::find_tracker_by_url) first.
///
/// Writes are serialised by the backend; reads observe committed data only.
pub trait TrackerIndex: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert or overwrite the tracker with `record.url`.
  fn upsert_tracker(
    &self,
    record: TrackerRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert or overwrite the thing with `record.id`.
  fn upsert_thing(
    &self,
    record: ThingRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert a batch of things in a single write.
  fn upsert_things(
    &self,
    records: Vec<ThingRecord>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Lookups ───────────────────────────────────────────────────────────

  /// Exact-match lookup of a tracker by URL.
  fn find_tracker_by_url<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<TrackerRecord>, Self::Error>> + Send + 'a;

  /// Exact-match lookup of a thing by id.
  fn get_thing<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<ThingRecord>, Self::Error>> + Send + 'a;

  /// URL of the tracker that last wrote a thing with the given thing URL.
  fn tracker_for_thing_url<'a>(
    &'a self,
    thing_url: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  // ── Search ────────────────────────────────────────────────────────────

  /// Free-text search over thing titles, descriptions, tags and licenses,
  /// best match first. Empty text yields nothing.
  fn search_things<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<ThingRecord>, Self::Error>> + Send + 'a;

  /// Free-text search over tracker descriptions, best match first.
  fn search_trackers<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<TrackerRecord>, Self::Error>> + Send + 'a;

  // ── Dumps ─────────────────────────────────────────────────────────────

  fn list_trackers(
    &self,
  ) -> impl Future<Output = Result<Vec<TrackerRecord>, Self::Error>> + Send + '_;

  fn list_things(
    &self,
  ) -> impl Future<Output = Result<Vec<ThingRecord>, Self::Error>> + Send + '_;
}
