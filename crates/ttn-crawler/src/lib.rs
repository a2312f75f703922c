//! Crawling, submission and background scheduling for the tracker collector.
//!
//! [`Crawler`] walks a tracker graph into any
//! [`TrackerIndex`](ttn_core::index::TrackerIndex); [`Scheduler`] runs work
//! off the request path; [`Pipeline`] ties both together and is what an
//! application root owns.

pub mod crawler;
pub mod fetch;
pub mod pipeline;
pub mod scheduler;

pub use crawler::{CrawlFailure, CrawlLimits, CrawlReport, Crawler};
pub use fetch::{Fetch, FetchConfig, FetchError, HttpFetcher};
pub use pipeline::{Pipeline, Submission};
pub use scheduler::Scheduler;
