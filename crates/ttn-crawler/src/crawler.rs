//! Walking the tracker graph into an index.
//!
//! A crawl is a breadth-first worklist seeded with one URL. Each tracker is
//! fetched, validated and, if the index does not know it yet, written along
//! with its things; its declared sub-trackers are then queued. Failures are
//! per-URL: they end up in the [`CrawlReport`] and never stop the walk.

use std::{
  collections::{HashSet, VecDeque},
  sync::Arc,
};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use ttn_core::{
  document::TrackerDocument,
  index::TrackerIndex,
  record::{ThingRecord, TrackerRecord},
  schema::{SchemaValidator, ValidationResult, Violation},
};
use url::Url;

use crate::fetch::{Fetch, FetchError};

/// Depth interval at which an unbounded crawl warns about itself.
const DEEP_CRAWL_WARNING: usize = 32;

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Why a single tracker could not be indexed.
#[derive(Debug, Error)]
pub enum CrawlFailure {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("document does not conform to the tracker schema ({} violations)", .0.len())]
  SchemaInvalid(Vec<Violation>),

  #[error("document cannot be decoded as a tracker: {0}")]
  Undecodable(#[from] serde_json::Error),

  #[error("index error: {0}")]
  Index(String),
}

impl CrawlFailure {
  fn index(e: impl std::error::Error) -> Self { Self::Index(e.to_string()) }
}

/// Outcome of one crawl, per URL.
#[derive(Debug, Default)]
pub struct CrawlReport {
  /// Trackers written by this crawl.
  pub indexed: Vec<String>,
  /// Trackers the index already knew; their sub-trackers were not followed.
  pub skipped: Vec<String>,
  pub failed:  Vec<(String, CrawlFailure)>,
}

impl CrawlReport {
  pub fn merge(&mut self, other: CrawlReport) {
    self.indexed.extend(other.indexed);
    self.skipped.extend(other.skipped);
    self.failed.extend(other.failed);
  }

  pub fn visited(&self) -> usize {
    self.indexed.len() + self.skipped.len() + self.failed.len()
  }
}

// ─── Limits ──────────────────────────────────────────────────────────────────

/// Optional bounds on a single crawl. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlLimits {
  /// Sub-trackers deeper than this are not queued. The root is depth 0.
  pub max_depth:    Option<usize>,
  /// Maximum number of distinct trackers one crawl will visit.
  pub max_trackers: Option<usize>,
}

// ─── Crawler ─────────────────────────────────────────────────────────────────

enum Visit {
  /// Written to the index.
  Indexed(Vec<String>),
  /// Known root of a sweep; only its sub-trackers are of interest.
  Revisited(Vec<String>),
  Known,
}

/// Crawls trackers into `I`, fetching through `F`.
pub struct Crawler<I, F> {
  index:     Arc<I>,
  fetcher:   Arc<F>,
  validator: Arc<SchemaValidator>,
  limits:    CrawlLimits,
}

impl<I, F> Clone for Crawler<I, F> {
  fn clone(&self) -> Self {
    Self {
      index:     Arc::clone(&self.index),
      fetcher:   Arc::clone(&self.fetcher),
      validator: Arc::clone(&self.validator),
      limits:    self.limits,
    }
  }
}

impl<I, F> Crawler<I, F>
where
  I: TrackerIndex,
  F: Fetch,
{
  pub fn new(index: Arc<I>, fetcher: Arc<F>, validator: Arc<SchemaValidator>) -> Self {
    Self { index, fetcher, validator, limits: CrawlLimits::default() }
  }

  pub fn with_limits(mut self, limits: CrawlLimits) -> Self {
    self.limits = limits;
    self
  }

  pub fn index(&self) -> &I { &self.index }

  pub fn fetcher(&self) -> &F { &self.fetcher }

  pub fn validator(&self) -> &SchemaValidator { &self.validator }

  /// Crawl `url` and everything reachable from it that is not yet indexed.
  pub async fn crawl(&self, url: &str) -> CrawlReport { self.walk(url, false).await }

  /// Like [`crawl`](Self::crawl), but a root the index already knows is not
  /// treated as a dead end: its sub-trackers are still followed. Its own
  /// record and things are left as they are.
  pub async fn revisit(&self, url: &str) -> CrawlReport { self.walk(url, true).await }

  /// Revisit every tracker in the index.
  pub async fn sweep(&self) -> Result<CrawlReport, I::Error> {
    let roots = self.index.list_trackers().await?;
    let mut report = CrawlReport::default();
    for root in &roots {
      report.merge(self.revisit(&root.url).await);
    }
    info!(
      roots = roots.len(),
      visited = report.visited(),
      indexed = report.indexed.len(),
      failed = report.failed.len(),
      "sweep finished"
    );
    Ok(report)
  }

  async fn walk(&self, root: &str, revisit_root: bool) -> CrawlReport {
    let mut report = CrawlReport::default();
    let mut visited = HashSet::from([visit_key(root)]);
    let mut queue = VecDeque::from([(root.to_owned(), 0usize)]);

    while let Some((url, depth)) = queue.pop_front() {
      let subtrackers = match self.visit(&url, revisit_root && depth == 0).await {
        Ok(Visit::Indexed(subs)) => {
          report.indexed.push(url);
          subs
        }
        Ok(Visit::Revisited(subs)) => subs,
        Ok(Visit::Known) => {
          debug!(%url, "skipping known tracker");
          report.skipped.push(url);
          continue;
        }
        Err(failure) => {
          warn!(%url, depth, error = %failure, "tracker not indexed");
          report.failed.push((url, failure));
          continue;
        }
      };

      let next = depth + 1;
      match self.limits.max_depth {
        Some(max) if next > max => {
          if !subtrackers.is_empty() {
            debug!(depth = next, max, "depth limit reached, not following sub-trackers");
          }
          continue;
        }
        None if next % DEEP_CRAWL_WARNING == 0 && !subtrackers.is_empty() => {
          warn!(%root, depth = next, "crawl is unusually deep");
        }
        _ => {}
      }

      for sub in subtrackers {
        let key = visit_key(&sub);
        if visited.contains(&key) {
          continue;
        }
        if let Some(max) = self.limits.max_trackers
          && visited.len() >= max
        {
          warn!(%root, max, "tracker limit reached, crawl truncated");
          break;
        }
        visited.insert(key);
        queue.push_back((sub, next));
      }
    }

    report
  }

  async fn visit(&self, url: &str, revisit: bool) -> Result<Visit, CrawlFailure> {
    let doc = self.fetch_tracker(url).await?;
    let subtrackers = doc.subtracker_urls().map(|s| resolve(url, s)).collect();

    if self.is_known(url, doc.url.as_deref()).await? {
      return Ok(if revisit { Visit::Revisited(subtrackers) } else { Visit::Known });
    }

    let record_url = self.write_tracker(&doc, url).await?;
    let things = self.index_things(&doc, url).await?;
    info!(url = %record_url, things, "indexed tracker");
    Ok(Visit::Indexed(subtrackers))
  }

  /// Fetch, validate and decode the tracker at `url`.
  pub async fn fetch_tracker(&self, url: &str) -> Result<TrackerDocument, CrawlFailure> {
    let value = self.fetcher.fetch_json(url).await?;
    if let ValidationResult::Invalid(violations) = self.validator.validate(&value) {
      for v in &violations {
        info!(%url, violation = %v, "tracker not conforming to schema");
      }
      return Err(CrawlFailure::SchemaInvalid(violations));
    }
    Ok(TrackerDocument::from_value(value)?)
  }

  /// Whether the index holds a tracker under the fetched URL or the
  /// document's declared one.
  pub async fn is_known(
    &self,
    fetched_url: &str,
    declared_url: Option<&str>,
  ) -> Result<bool, CrawlFailure> {
    if self.find(fetched_url).await? {
      return Ok(true);
    }
    match declared_url {
      Some(declared) if declared != fetched_url => self.find(declared).await,
      _ => Ok(false),
    }
  }

  async fn find(&self, url: &str) -> Result<bool, CrawlFailure> {
    let found = self
      .index
      .find_tracker_by_url(url)
      .await
      .map_err(CrawlFailure::index)?;
    Ok(found.is_some())
  }

  /// Write the tracker record unless the index already knows it. Returns
  /// whether anything was written.
  pub async fn index_tracker(
    &self,
    doc: &TrackerDocument,
    fetched_url: &str,
  ) -> Result<bool, CrawlFailure> {
    if self.is_known(fetched_url, doc.url.as_deref()).await? {
      debug!(url = %fetched_url, "tracker already known, record left as is");
      return Ok(false);
    }
    let url = self.write_tracker(doc, fetched_url).await?;
    info!(%url, "indexed tracker");
    Ok(true)
  }

  async fn write_tracker(
    &self,
    doc: &TrackerDocument,
    fetched_url: &str,
  ) -> Result<String, CrawlFailure> {
    let record = TrackerRecord::from_document(doc, fetched_url, Utc::now());
    let url = record.url.clone();
    self
      .index
      .upsert_tracker(record)
      .await
      .map_err(CrawlFailure::index)?;
    Ok(url)
  }

  /// Resolve and upsert the things a tracker declares. Returns how many
  /// were written.
  pub async fn index_things(
    &self,
    doc: &TrackerDocument,
    fetched_url: &str,
  ) -> Result<usize, CrawlFailure> {
    let things = self.resolve_things(doc, fetched_url).await;
    let n = things.len();
    if n > 0 {
      self
        .index
        .upsert_things(things)
        .await
        .map_err(CrawlFailure::index)?;
    }
    Ok(n)
  }

  /// Turn a document's thing entries into records. Stubs are merged over
  /// the document their `refUrl` points at; when that document cannot be
  /// fetched or decoded the stub is used on its own. Entries that end up without an id are dropped.
  pub async fn resolve_things(&self, doc: &TrackerDocument, fetched_url: &str) -> Vec<ThingRecord> {
    let tracker_url = doc.url.as_deref().unwrap_or(fetched_url);
    let mut records = Vec::with_capacity(doc.things.len());

    for stub in &doc.things {
      let merged = match stub.ref_url() {
        Some(ref_url) => {
          let target = resolve(fetched_url, ref_url);
          match self.fetcher.fetch_json(&target).await {
            Ok(fetched) => Some((target, stub.clone().merged_over(fetched))),
            Err(e) => {
              warn!(url = %target, error = %e, "thing unreachable, keeping stub fields");
              None
            }
          }
        }
        None => None,
      };

      let decoded = match merged {
        Some((target, merged)) => merged.to_partial().or_else(|e| {
          warn!(url = %target, error = %e, "fetched thing cannot be decoded, keeping stub fields");
          stub.to_partial()
        }),
        None => stub.to_partial(),
      };

      let partial = match decoded {
        Ok(partial) => partial,
        Err(e) => {
          warn!(tracker = %tracker_url, error = %e, "thing cannot be decoded, skipping");
          continue;
        }
      };

      match ThingRecord::from_partial(partial, tracker_url) {
        Some(record) => records.push(record),
        None => warn!(tracker = %tracker_url, "thing has no id, skipping"),
      }
    }

    records
  }
}

// ─── URLs ────────────────────────────────────────────────────────────────────

/// Resolve `href` against the document it was found in. Absolute URLs pass
/// through; anything unparsable is returned unchanged.
pub fn resolve(base: &str, href: &str) -> String {
  match Url::parse(base).and_then(|b| b.join(href)) {
    Ok(url) => url.into(),
    Err(_) => href.to_owned(),
  }
}

/// Key for the per-crawl visited set: the URL without its fragment.
fn visit_key(url: &str) -> String {
  match Url::parse(url) {
    Ok(mut parsed) => {
      parsed.set_fragment(None);
      parsed.into()
    }
    Err(_) => url.to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolve_relative_and_absolute() {
    assert_eq!(
      resolve("http://a.example/dir/tracker.json", "sub.json"),
      "http://a.example/dir/sub.json"
    );
    assert_eq!(
      resolve("http://a.example/tracker.json", "https://b.example/t.json"),
      "https://b.example/t.json"
    );
    assert_eq!(resolve("not a url", "sub.json"), "sub.json");
  }

  #[test]
  fn visit_key_ignores_fragment() {
    assert_eq!(
      visit_key("http://a.example/t.json#top"),
      visit_key("http://a.example/t.json")
    );
    assert_ne!(
      visit_key("http://a.example/t.json?page=2"),
      visit_key("http://a.example/t.json")
    );
  }

  #[test]
  fn report_merge_and_count() {
    let mut a = CrawlReport { indexed: vec!["x".into()], ..Default::default() };
    let b = CrawlReport {
      skipped: vec!["y".into()],
      failed: vec![("z".into(), CrawlFailure::Index("boom".into()))],
      ..Default::default()
    };
    a.merge(b);
    assert_eq!(a.visited(), 3);
  }
}
