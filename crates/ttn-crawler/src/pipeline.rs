//! The collector's application root: one crawler, one scheduler, and the
//! entry points the HTTP layer and the binary call into.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use ttn_core::{
  document::TrackerDocument,
  index::{OpenOutcome, TrackerIndex},
  schema::ValidationResult,
};

use crate::{
  crawler::{CrawlReport, Crawler, resolve},
  fetch::{Fetch, FetchError},
  scheduler::Scheduler,
};

/// What a submitter is told about their tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Submission {
  pub error:    bool,
  pub messages: Vec<String>,
}

impl Submission {
  fn failed(message: String) -> Self { Self { error: true, messages: vec![message] } }

  fn fail(&mut self, message: String) {
    self.error = true;
    self.messages.push(message);
  }
}

/// Result of the submission checks, before anything is scheduled.
struct Inspected {
  outcome:     Submission,
  /// Declared sub-tracker URLs, resolved against the submitted one.
  subtrackers: Vec<String>,
  /// `None` when the document cannot be decoded as a tracker.
  doc:         Option<TrackerDocument>,
}

impl Inspected {
  fn fetch_failed(message: String) -> Self {
    Self { outcome: Submission::failed(message), subtrackers: Vec::new(), doc: None }
  }
}

/// `trackers[*].url` of a raw tracker document. Entries without a string
/// `url` are ignored.
fn declared_subtrackers(value: &Value, base: &str) -> Vec<String> {
  value
    .get("trackers")
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(|t| t.get("url").and_then(Value::as_str))
    .map(|href| resolve(base, href))
    .collect()
}

pub struct Pipeline<I, F> {
  crawler:   Crawler<I, F>,
  scheduler: Arc<Scheduler>,
}

impl<I, F> Clone for Pipeline<I, F> {
  fn clone(&self) -> Self {
    Self { crawler: self.crawler.clone(), scheduler: Arc::clone(&self.scheduler) }
  }
}

impl<I, F> Pipeline<I, F>
where
  I: TrackerIndex + 'static,
  F: Fetch + 'static,
{
  pub fn new(crawler: Crawler<I, F>, scheduler: Arc<Scheduler>) -> Self {
    Self { crawler, scheduler }
  }

  /// The index, for read-only use by the presentation layer.
  pub fn index(&self) -> &I { self.crawler.index() }

  pub fn crawler(&self) -> &Crawler<I, F> { &self.crawler }

  pub fn scheduler(&self) -> &Scheduler { &self.scheduler }

  // ─── Submission ──────────────────────────────────────────────────────────

  /// Check a submitted tracker and queue it for indexing.
  ///
  /// Only fetch failures stop the flow early. A document that is merely
  /// inconsistent, invalid or already known is still queued; the indexing
  /// jobs apply the usual skip-on-duplicate rule when they run.
  pub async fn submit(&self, url: &str) -> Submission {
    let inspected = self.inspect(url).await;
    if let Some(doc) = inspected.doc {
      self.schedule_indexing(url, doc);
    }
    for sub in inspected.subtrackers {
      self.crawl_in_background(sub);
    }
    info!(%url, error = inspected.outcome.error, "tracker submitted");
    inspected.outcome
  }

  /// Run the submission checks without queueing anything.
  pub async fn check(&self, url: &str) -> Submission { self.inspect(url).await.outcome }

  async fn inspect(&self, url: &str) -> Inspected {
    let value = match self.crawler.fetcher().fetch_json(url).await {
      Ok(value) => value,
      Err(FetchError::Unreachable { .. }) => {
        return Inspected::fetch_failed(format!("Tracker unreachable {url}"));
      }
      Err(FetchError::Malformed { source, .. }) => {
        return Inspected::fetch_failed(format!("Tracker malformed {url}: {source}"));
      }
    };

    let mut out = Submission::default();
    let declared = value.get("url").and_then(Value::as_str).map(str::to_owned);

    if let Some(declared) = &declared
      && declared != url
    {
      out.messages.push(format!("Tracker url inconsistent: {url} vs. {declared}"));
    }

    if let ValidationResult::Invalid(violations) = self.crawler.validator().validate(&value) {
      out.fail(format!("Tracker invalid {}", declared.as_deref().unwrap_or(url)));
      out.messages.extend(
        violations
          .iter()
          .map(|v| format!("Tracker {url} not conforming to spec: {v}")),
      );
    }

    if !out.error {
      match self.crawler.is_known(url, declared.as_deref()).await {
        Ok(true) => out.messages.push(format!("Skipping known tracker {url}")),
        Ok(false) => {}
        Err(e) => warn!(%url, error = %e, "could not check whether tracker is known"),
      }
    }

    // Read from the raw value so that sub-trackers are followed even when
    // the document itself does not decode.
    let subtrackers = declared_subtrackers(&value, url);

    let doc = match TrackerDocument::from_value(value) {
      Ok(doc) => Some(doc),
      Err(e) => {
        out.fail(format!("Tracker {url} cannot be indexed: {e}"));
        None
      }
    };
    Inspected { outcome: out, subtrackers, doc }
  }

  fn schedule_indexing(&self, url: &str, doc: TrackerDocument) {
    let doc = Arc::new(doc);

    let (crawler, d, u) = (self.crawler.clone(), Arc::clone(&doc), url.to_owned());
    self.scheduler.schedule_once(format!("index tracker {url}"), async move {
      crawler.index_tracker(&d, &u).await?;
      Ok(())
    });

    let (crawler, d, u) = (self.crawler.clone(), doc, url.to_owned());
    self.scheduler.schedule_once(format!("index things {url}"), async move {
      crawler.index_things(&d, &u).await?;
      Ok(())
    });
  }

  // ─── Crawling ────────────────────────────────────────────────────────────

  /// Queue a crawl of `url`; the report is discarded.
  pub fn crawl_in_background(&self, url: String) {
    let crawler = self.crawler.clone();
    self.scheduler.schedule_once(format!("crawl {url}"), async move {
      crawler.crawl(&url).await;
      Ok(())
    });
  }

  /// Revisit every known tracker now.
  pub async fn sweep(&self) -> Result<CrawlReport, I::Error> { self.crawler.sweep().await }

  /// Sweep every `period`, starting immediately.
  pub fn start_sweep(&self, period: Duration) {
    let crawler = self.crawler.clone();
    self.scheduler.schedule_interval("sweep", period, move || {
      let crawler = crawler.clone();
      async move {
        crawler.sweep().await?;
        Ok(())
      }
    });
  }

  /// Re-crawl what an index knew before it was rebuilt. Nothing to do for
  /// any other outcome.
  pub async fn restore(&self, outcome: &OpenOutcome) -> CrawlReport {
    let mut report = CrawlReport::default();
    let OpenOutcome::Rebuilt { previous_urls } = outcome else {
      return report;
    };

    info!(trackers = previous_urls.len(), "re-crawling trackers after index rebuild");
    for url in previous_urls {
      report.merge(self.crawler.crawl(url).await);
    }
    info!(
      indexed = report.indexed.len(),
      failed = report.failed.len(),
      "index restored"
    );
    report
  }
}
