//! Indexed records — the fully-populated form of trackers and things.
//!
//! Documents arrive with most fields optional. Before anything reaches an
//! index, the constructors here fill every gap, so backends never see a
//! partially-specified record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{PartialThing, TrackerDocument};

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// A tracker as stored in the index. Keyed on `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
  pub url:         String,
  pub description: String,
  /// When the author last changed the document.
  pub updated:     DateTime<Utc>,
  /// When the collector last wrote this record.
  pub accessed:    DateTime<Utc>,
}

impl TrackerRecord {
  /// Build a record from a decoded document.
  ///
  /// The document's own `url` is the key; `fallback_url` is used only when
  /// the document declares none. A missing or unreadable `updated` becomes
  /// `now`, and `accessed` is always `now`.
  pub fn from_document(
    doc: &TrackerDocument,
    fallback_url: &str,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      url:         doc.url.clone().unwrap_or_else(|| fallback_url.to_owned()),
      description: doc.description.clone().unwrap_or_default(),
      updated:     doc.updated.as_deref().and_then(parse_updated).unwrap_or(now),
      accessed:    now,
    }
  }
}

/// Parse an author-supplied modification time.
///
/// RFC 3339 is tried first. Failing that, a trailing zone suffix (`Z`,
/// `+HH:MM`, `-HHMM`) is dropped and the remainder read as a UTC
/// `YYYY-MM-DDTHH:MM:SS[.fff]` timestamp.
pub fn parse_updated(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(strip_zone(raw), "%Y-%m-%dT%H:%M:%S%.f")
    .ok()
    .map(|naive| naive.and_utc())
}

fn strip_zone(raw: &str) -> &str {
  if let Some(rest) = raw.strip_suffix('Z') {
    return rest;
  }
  for len in [6, 5] {
    let Some(split) = raw.len().checked_sub(len) else { continue };
    if !raw.is_char_boundary(split) {
      continue;
    }
    let (head, tail) = raw.split_at(split);
    let mut chars = tail.chars();
    let sign = chars.next();
    if matches!(sign, Some('+' | '-'))
      && chars.all(|c| c.is_ascii_digit() || c == ':')
      && head.contains('T')
    {
      return head;
    }
  }
  raw
}

// ─── Thing ───────────────────────────────────────────────────────────────────

/// A thing as stored in the index. Keyed on `id`.
///
/// List-valued document fields are flattened into single searchable strings:
/// author names and licenses are space-separated, tags comma-separated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingRecord {
  pub id:          String,
  pub url:         String,
  pub title:       String,
  pub description: String,
  pub authors:     String,
  pub licenses:    String,
  pub tags:        String,
  /// URL of the tracker that last wrote this thing.
  pub tracker:     String,
}

impl ThingRecord {
  /// Fill defaults for a partially-specified thing. Returns `None` when the
  /// thing has no `id`, since it cannot be keyed.
  pub fn from_partial(partial: PartialThing, tracker_url: &str) -> Option<Self> {
    let id = partial.id.filter(|id| !id.is_empty())?;
    Some(Self {
      id,
      url:         partial.url.unwrap_or_default(),
      title:       partial.title.unwrap_or_default(),
      description: partial.description.unwrap_or_default(),
      authors:     partial
        .authors
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(" "),
      licenses:    partial.licenses.join(" "),
      tags:        partial.tags.join(", "),
      tracker:     tracker_url.to_owned(),
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::document::Author;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() }

  #[test]
  fn tracker_defaults_fill_missing_fields() {
    let doc = TrackerDocument::default();
    let record = TrackerRecord::from_document(&doc, "http://a.example/t.json", now());
    assert_eq!(record.url, "http://a.example/t.json");
    assert_eq!(record.description, "");
    assert_eq!(record.updated, now());
    assert_eq!(record.accessed, now());
  }

  #[test]
  fn tracker_prefers_declared_url() {
    let doc = TrackerDocument {
      url: Some("http://declared.example/t.json".into()),
      description: Some("Parts".into()),
      updated: Some("2014-02-03T04:05:06+01:00".into()),
      ..Default::default()
    };
    let record = TrackerRecord::from_document(&doc, "http://fetched.example/t.json", now());
    assert_eq!(record.url, "http://declared.example/t.json");
    assert_eq!(record.description, "Parts");
    assert_eq!(record.updated, Utc.with_ymd_and_hms(2014, 2, 3, 3, 5, 6).unwrap());
  }

  #[test]
  fn updated_accepts_legacy_suffixes() {
    let expected = Utc.with_ymd_and_hms(2014, 2, 3, 4, 5, 6).unwrap();
    assert_eq!(parse_updated("2014-02-03T04:05:06Z"), Some(expected));
    assert_eq!(parse_updated("2014-02-03T04:05:06"), Some(expected));
    // Not RFC 3339 (no seconds separator in the offset), so the suffix is
    // stripped and the wall-clock time taken as UTC.
    assert_eq!(parse_updated("2014-02-03T04:05:06+0100"), Some(expected));
    assert!(parse_updated("2014-02-03T04:05:06.250Z").is_some());
  }

  #[test]
  fn updated_rejects_garbage() {
    assert_eq!(parse_updated("last tuesday"), None);
    assert_eq!(parse_updated(""), None);
    assert_eq!(parse_updated("2014-02-03"), None);
  }

  #[test]
  fn thing_defaults_and_joins() {
    let partial = PartialThing {
      id: Some("hammer-1".into()),
      title: Some("Hammer".into()),
      authors: vec![
        Author { name: "Ada".into(), ..Default::default() },
        Author { name: "Grace".into(), ..Default::default() },
      ],
      licenses: vec!["CC-BY".into(), "GPL".into()],
      tags: vec!["tool".into(), "metal".into()],
      ..Default::default()
    };
    let record = ThingRecord::from_partial(partial, "http://a.example/t.json").unwrap();
    assert_eq!(record.id, "hammer-1");
    assert_eq!(record.url, "");
    assert_eq!(record.description, "");
    assert_eq!(record.authors, "Ada Grace");
    assert_eq!(record.licenses, "CC-BY GPL");
    assert_eq!(record.tags, "tool, metal");
    assert_eq!(record.tracker, "http://a.example/t.json");
  }

  #[test]
  fn thing_without_id_is_rejected() {
    let partial = PartialThing { title: Some("Nameless".into()), ..Default::default() };
    assert!(ThingRecord::from_partial(partial, "http://a.example/t.json").is_none());
  }
}
