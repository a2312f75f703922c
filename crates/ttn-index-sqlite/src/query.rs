//! Translation of free user text into FTS5 `MATCH` expressions.

/// Build a `MATCH` expression from user text, or `None` when the text holds
/// nothing searchable.
///
/// Every whitespace-separated term becomes a quoted phrase, so FTS5 operators
/// and column filters typed by a user are matched literally instead of being
/// interpreted. Phrases are implicitly ANDed.
pub fn fts_query(text: &str) -> Option<String> {
  let terms: Vec<String> = text
    .split_whitespace()
    .filter(|term| term.chars().any(char::is_alphanumeric))
    .map(quote_term)
    .collect();

  if terms.is_empty() { None } else { Some(terms.join(" ")) }
}

fn quote_term(term: &str) -> String { format!("\"{}\"", term.replace('"', "\"\"")) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_and_punctuation_yield_nothing() {
    assert_eq!(fts_query(""), None);
    assert_eq!(fts_query("   "), None);
    assert_eq!(fts_query("* - \"\""), None);
  }

  #[test]
  fn terms_are_quoted() {
    assert_eq!(fts_query("hammer"), Some("\"hammer\"".into()));
    assert_eq!(fts_query("claw  hammer"), Some("\"claw\" \"hammer\"".into()));
    assert_eq!(
      fts_query("title:x OR \"y"),
      Some("\"title:x\" \"OR\" \"\"\"y\"".into()),
    );
  }
}
