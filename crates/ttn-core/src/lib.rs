//! Core types and trait definitions for the Thing Tracker Network collector.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the wire shapes of tracker documents, the fully-defaulted records that get
//! indexed, the schema validator, and the [`index::TrackerIndex`] abstraction
//! that storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod document;
pub mod error;
pub mod index;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
