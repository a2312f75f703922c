//! Tracker documents as published on the network.
//!
//! These are the loosely-typed shapes read from JSON before defaults are
//! applied. Whether a document is acceptable at all is decided by the
//! [`schema`](crate::schema) validator; this module only decodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// A tracker document: a description, a list of things and a list of further
/// trackers to follow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerDocument {
  /// The location the author claims for this document.
  pub url:         Option<String>,
  pub description: Option<String>,
  /// Author-supplied modification time, ISO 8601 with a zone suffix.
  pub updated:     Option<String>,
  #[serde(default)]
  pub things:      Vec<ThingEntry>,
  #[serde(default)]
  pub trackers:    Vec<TrackerRef>,
}

impl TrackerDocument {
  /// Decode a document from an already-parsed JSON value.
  pub fn from_value(value: Value) -> serde_json::Result<Self> {
    serde_json::from_value(value)
  }

  /// URLs of the declared sub-trackers, in document order.
  pub fn subtracker_urls(&self) -> impl Iterator<Item = &str> {
    self.trackers.iter().map(|t| t.url.as_str())
  }
}

/// A reference to another tracker document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRef {
  pub url: String,
}

// ─── Things ──────────────────────────────────────────────────────────────────

/// One entry of a tracker's `things` array, kept as raw JSON so that a stub
/// can be merged over the document its `refUrl` points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingEntry(pub Map<String, Value>);

impl ThingEntry {
  /// The `refUrl` of a stub entry, if this entry is one.
  pub fn ref_url(&self) -> Option<&str> {
    self.0.get("refUrl").and_then(Value::as_str)
  }

  /// Merge this entry over a fetched thing document. Fields present on the
  /// entry win; a fetched value that is not an object is ignored.
  pub fn merged_over(self, fetched: Value) -> ThingEntry {
    let Value::Object(mut base) = fetched else {
      return self;
    };
    base.extend(self.0);
    ThingEntry(base)
  }

  /// Decode the entry into its typed, still-optional form.
  pub fn to_partial(&self) -> serde_json::Result<PartialThing> {
    serde_json::from_value(Value::Object(self.0.clone()))
  }
}

/// A thing with every field optional, as found in a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialThing {
  pub id:          Option<String>,
  pub url:         Option<String>,
  pub title:       Option<String>,
  pub description: Option<String>,
  #[serde(default)]
  pub authors:     Vec<Author>,
  #[serde(default)]
  pub licenses:    Vec<String>,
  #[serde(default)]
  pub tags:        Vec<String>,
  pub ref_url:     Option<String>,
}

/// An author of a thing. Only the name is indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub name:  String,
  pub url:   Option<String>,
  pub email: Option<String>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn decodes_minimal_tracker() {
    let doc = TrackerDocument::from_value(json!({ "url": "http://a.example/t.json" }))
      .unwrap();
    assert_eq!(doc.url.as_deref(), Some("http://a.example/t.json"));
    assert!(doc.things.is_empty());
    assert_eq!(doc.subtracker_urls().count(), 0);
  }

  #[test]
  fn stub_fields_take_precedence_over_fetched() {
    let stub: ThingEntry = serde_json::from_value(json!({
      "refUrl": "http://a.example/thing.json",
      "title":  "Local title",
    }))
    .unwrap();
    assert_eq!(stub.ref_url(), Some("http://a.example/thing.json"));

    let merged = stub.merged_over(json!({
      "id":          "t-1",
      "title":       "Remote title",
      "description": "Remote description",
    }));
    let partial = merged.to_partial().unwrap();
    assert_eq!(partial.id.as_deref(), Some("t-1"));
    assert_eq!(partial.title.as_deref(), Some("Local title"));
    assert_eq!(partial.description.as_deref(), Some("Remote description"));
  }

  #[test]
  fn merge_ignores_non_object_fetch() {
    let stub: ThingEntry =
      serde_json::from_value(json!({ "id": "t-1", "refUrl": "x" })).unwrap();
    let merged = stub.clone().merged_over(json!([1, 2, 3]));
    assert_eq!(merged, stub);
  }
}
