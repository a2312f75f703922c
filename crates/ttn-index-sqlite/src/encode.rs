//! Encoding and decoding helpers between records and SQLite rows.
//!
//! All timestamps are stored as RFC 3339 strings in UTC. Thing records are
//! plain text throughout and map onto rows directly.

use chrono::{DateTime, Utc};
use ttn_core::record::{ThingRecord, TrackerRecord};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Column lists ────────────────────────────────────────────────────────────

/// Tracker columns in the order [`RawTracker::from_row`] reads them. Queries
/// alias the table as `t`.
pub const TRACKER_COLUMNS: &str = "t.url, t.description, t.updated, t.accessed";

/// Thing columns in the order [`thing_from_row`] reads them.
pub const THING_COLUMNS: &str =
  "t.thing_id, t.url, t.title, t.description, t.authors, t.licenses, t.tags, t.tracker";

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A tracker row as it comes out of SQLite, timestamps still encoded.
pub struct RawTracker {
  pub url:         String,
  pub description: String,
  pub updated:     String,
  pub accessed:    String,
}

impl RawTracker {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      url:         row.get(0)?,
      description: row.get(1)?,
      updated:     row.get(2)?,
      accessed:    row.get(3)?,
    })
  }

  pub fn into_record(self) -> Result<TrackerRecord> {
    Ok(TrackerRecord {
      url:         self.url,
      description: self.description,
      updated:     decode_dt(&self.updated)?,
      accessed:    decode_dt(&self.accessed)?,
    })
  }
}

pub fn thing_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThingRecord> {
  Ok(ThingRecord {
    id:          row.get(0)?,
    url:         row.get(1)?,
    title:       row.get(2)?,
    description: row.get(3)?,
    authors:     row.get(4)?,
    licenses:    row.get(5)?,
    tags:        row.get(6)?,
    tracker:     row.get(7)?,
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn datetime_survives_storage() {
    let dt = Utc.with_ymd_and_hms(2014, 2, 3, 4, 5, 6).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
  }

  #[test]
  fn bad_datetime_is_reported() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
