//! Structural validation of tracker documents against a JSON Schema.
//!
//! The schema is data, not code: it is read once at startup and can be
//! replaced without rebuilding. The supported dialect is JSON Schema draft 3
//! (per-property `required: true`, union `type` arrays that may contain
//! schemas, `extends`), plus the draft-4 `required` array form.
//!
//! `format` and unrecognised keywords are accepted and ignored.

use std::{collections::HashMap, fmt, path::Path};

use regex::Regex;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Nesting limit for `$ref`/`extends` chains, guarding against self-referential
/// schemas such as `{"$ref": "#"}`.
const MAX_SCHEMA_DEPTH: usize = 64;

// ─── Results ─────────────────────────────────────────────────────────────────

/// One way in which a document fails its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
  /// JSON pointer to the offending value; empty for the document root.
  pub path:    String,
  pub message: String,
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let path = if self.path.is_empty() { "/" } else { &self.path };
    write!(f, "{path}: {}", self.message)
  }
}

/// Outcome of [`SchemaValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
  Valid,
  Invalid(Vec<Violation>),
}

impl ValidationResult {
  pub fn is_valid(&self) -> bool { matches!(self, ValidationResult::Valid) }

  pub fn violations(&self) -> &[Violation] {
    match self {
      ValidationResult::Valid => &[],
      ValidationResult::Invalid(v) => v,
    }
  }
}

// ─── Validator ───────────────────────────────────────────────────────────────

/// A compiled schema. Validation is pure and never fails on a parseable
/// document; every problem is reported as a [`Violation`].
#[derive(Debug, Clone)]
pub struct SchemaValidator {
  root:     Value,
  patterns: HashMap<String, Regex>,
}

impl SchemaValidator {
  /// Read and compile a schema file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let raw = std::fs::read_to_string(path)?;
    Self::from_value(serde_json::from_str(&raw)?)
  }

  /// Compile an already-parsed schema. All `pattern` and
  /// `patternProperties` regexes are compiled here so that a bad schema
  /// fails at startup rather than mid-crawl.
  pub fn from_value(schema: Value) -> Result<Self> {
    if !schema.is_object() {
      return Err(Error::InvalidSchema("root must be an object".into()));
    }
    let mut patterns = HashMap::new();
    collect_patterns(&schema, &mut patterns)?;
    Ok(Self { root: schema, patterns })
  }

  pub fn validate(&self, instance: &Value) -> ValidationResult {
    let mut violations = Vec::new();
    self.check(&self.root, instance, "", 0, &mut violations);
    if violations.is_empty() {
      ValidationResult::Valid
    } else {
      ValidationResult::Invalid(violations)
    }
  }

  fn check(
    &self,
    schema: &Value,
    instance: &Value,
    path: &str,
    depth: usize,
    out: &mut Vec<Violation>,
  ) {
    let Value::Object(schema) = schema else { return };

    if depth > MAX_SCHEMA_DEPTH {
      out.push(violation(path, "schema nesting too deep"));
      return;
    }

    // Draft 3: a `$ref` replaces every sibling keyword.
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
      match self.resolve(reference) {
        Some(target) => self.check(target, instance, path, depth + 1, out),
        None => out.push(violation(path, format!("unresolvable reference {reference:?}"))),
      }
      return;
    }

    match schema.get("extends") {
      Some(Value::Array(bases)) => {
        for base in bases {
          self.check(base, instance, path, depth + 1, out);
        }
      }
      Some(base @ Value::Object(_)) => self.check(base, instance, path, depth + 1, out),
      _ => {}
    }

    if let Some(expected) = schema.get("type")
      && !self.type_matches(expected, instance, path, depth)
    {
      out.push(violation(
        path,
        format!("{} is not of type {}", json_type(instance), describe_type(expected)),
      ));
      return;
    }

    if let Some(Value::Array(options)) = schema.get("enum")
      && !options.contains(instance)
    {
      out.push(violation(path, format!("{instance} is not one of {}", Value::Array(options.clone()))));
    }

    match instance {
      Value::Object(map) => self.check_object(schema, map, path, depth, out),
      Value::Array(items) => self.check_array(schema, items, path, depth, out),
      Value::String(s) => self.check_string(schema, s, path, out),
      Value::Number(n) => {
        if let Some(n) = n.as_f64() {
          check_number(schema, n, path, out);
        }
      }
      Value::Bool(_) | Value::Null => {}
    }
  }

  fn check_object(
    &self,
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
    depth: usize,
    out: &mut Vec<Violation>,
  ) {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(properties) = properties {
      for (name, sub) in properties {
        match map.get(name) {
          Some(value) => self.check(sub, value, &child(path, name), depth + 1, out),
          None => {
            if sub.get("required").and_then(Value::as_bool) == Some(true) {
              out.push(violation(path, format!("{name:?} is a required property")));
            }
          }
        }
      }
    }

    if let Some(Value::Array(required)) = schema.get("required") {
      for name in required.iter().filter_map(Value::as_str) {
        if !map.contains_key(name) {
          out.push(violation(path, format!("{name:?} is a required property")));
        }
      }
    }

    let pattern_properties = schema.get("patternProperties").and_then(Value::as_object);
    let additional = schema.get("additionalProperties");

    for (name, value) in map {
      let mut matched = properties.is_some_and(|p| p.contains_key(name));

      if let Some(pattern_properties) = pattern_properties {
        for (pattern, sub) in pattern_properties {
          if self.regex(pattern).is_some_and(|re| re.is_match(name)) {
            matched = true;
            self.check(sub, value, &child(path, name), depth + 1, out);
          }
        }
      }

      if matched {
        continue;
      }
      match additional {
        Some(Value::Bool(false)) => out.push(violation(
          path,
          format!("additional properties are not allowed ({name:?} was unexpected)"),
        )),
        Some(sub @ Value::Object(_)) => {
          self.check(sub, value, &child(path, name), depth + 1, out)
        }
        _ => {}
      }
    }
  }

  fn check_array(
    &self,
    schema: &Map<String, Value>,
    items: &[Value],
    path: &str,
    depth: usize,
    out: &mut Vec<Violation>,
  ) {
    match schema.get("items") {
      Some(sub @ Value::Object(_)) => {
        for (i, item) in items.iter().enumerate() {
          self.check(sub, item, &child(path, &i.to_string()), depth + 1, out);
        }
      }
      Some(Value::Array(tuple)) => {
        for (i, item) in items.iter().enumerate() {
          let item_path = child(path, &i.to_string());
          match (tuple.get(i), schema.get("additionalItems")) {
            (Some(sub), _) => self.check(sub, item, &item_path, depth + 1, out),
            (None, Some(Value::Bool(false))) => {
              out.push(violation(path, format!("additional items are not allowed (index {i})")));
              break;
            }
            (None, Some(sub @ Value::Object(_))) => {
              self.check(sub, item, &item_path, depth + 1, out)
            }
            (None, _) => {}
          }
        }
      }
      _ => {}
    }

    if let Some(min) = schema.get("minItems").and_then(Value::as_u64)
      && (items.len() as u64) < min
    {
      out.push(violation(path, format!("expected at least {min} items, found {}", items.len())));
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64)
      && (items.len() as u64) > max
    {
      out.push(violation(path, format!("expected at most {max} items, found {}", items.len())));
    }
    if schema.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
      let duplicate = items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].iter().any(|b| a == b));
      if duplicate {
        out.push(violation(path, "items are not unique"));
      }
    }
  }

  fn check_string(
    &self,
    schema: &Map<String, Value>,
    s: &str,
    path: &str,
    out: &mut Vec<Violation>,
  ) {
    let len = s.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
      && len < min
    {
      out.push(violation(path, format!("{s:?} is shorter than {min} characters")));
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
      && len > max
    {
      out.push(violation(path, format!("{s:?} is longer than {max} characters")));
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str)
      && let Some(re) = self.regex(pattern)
      && !re.is_match(s)
    {
      out.push(violation(path, format!("{s:?} does not match {pattern:?}")));
    }
  }

  /// Draft-3 `type`: a name, or a union of names and schemas.
  fn type_matches(&self, expected: &Value, instance: &Value, path: &str, depth: usize) -> bool {
    match expected {
      Value::String(name) => type_name_matches(name, instance),
      Value::Array(options) => options.iter().any(|option| match option {
        Value::String(name) => type_name_matches(name, instance),
        schema @ Value::Object(_) => {
          let mut scratch = Vec::new();
          self.check(schema, instance, path, depth + 1, &mut scratch);
          scratch.is_empty()
        }
        _ => false,
      }),
      _ => true,
    }
  }

  /// Resolve a local JSON-pointer reference such as `#/definitions/thing`.
  fn resolve(&self, reference: &str) -> Option<&Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
      return Some(&self.root);
    }
    self.root.pointer(pointer)
  }

  fn regex(&self, pattern: &str) -> Option<&Regex> { self.patterns.get(pattern) }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn collect_patterns(schema: &Value, patterns: &mut HashMap<String, Regex>) -> Result<()> {
  match schema {
    Value::Object(map) => {
      for (key, value) in map {
        match (key.as_str(), value) {
          ("pattern", Value::String(p)) => compile(p, patterns)?,
          ("patternProperties", Value::Object(props)) => {
            for p in props.keys() {
              compile(p, patterns)?;
            }
          }
          // Literal data, not subschemas.
          ("enum", _) => continue,
          _ => {}
        }
        collect_patterns(value, patterns)?;
      }
    }
    Value::Array(items) => {
      for item in items {
        collect_patterns(item, patterns)?;
      }
    }
    _ => {}
  }
  Ok(())
}

fn compile(pattern: &str, patterns: &mut HashMap<String, Regex>) -> Result<()> {
  if patterns.contains_key(pattern) {
    return Ok(());
  }
  let re = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
    pattern: pattern.to_owned(),
    source,
  })?;
  patterns.insert(pattern.to_owned(), re);
  Ok(())
}

fn check_number(schema: &Map<String, Value>, n: f64, path: &str, out: &mut Vec<Violation>) {
  let flag = |key: &str| schema.get(key).and_then(Value::as_bool) == Some(true);

  if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
    let exclusive = flag("exclusiveMinimum");
    if n < min || (exclusive && n == min) {
      out.push(violation(path, format!("{n} is less than the minimum of {min}")));
    }
  }
  if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
    let exclusive = flag("exclusiveMaximum");
    if n > max || (exclusive && n == max) {
      out.push(violation(path, format!("{n} is greater than the maximum of {max}")));
    }
  }
}

fn type_name_matches(name: &str, instance: &Value) -> bool {
  match name {
    "string" => instance.is_string(),
    "number" => instance.is_number(),
    "integer" => {
      instance.is_i64()
        || instance.is_u64()
        || instance.as_f64().is_some_and(|f| f.fract() == 0.0)
    }
    "boolean" => instance.is_boolean(),
    "object" => instance.is_object(),
    "array" => instance.is_array(),
    "null" => instance.is_null(),
    _ => true,
  }
}

fn describe_type(expected: &Value) -> String {
  match expected {
    Value::String(name) => format!("{name:?}"),
    Value::Array(options) => {
      let names: Vec<String> = options
        .iter()
        .map(|o| match o {
          Value::String(name) => format!("{name:?}"),
          _ => "<schema>".to_owned(),
        })
        .collect();
      format!("any of [{}]", names.join(", "))
    }
    other => other.to_string(),
  }
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn child(path: &str, segment: &str) -> String {
  let escaped = segment.replace('~', "~0").replace('/', "~1");
  format!("{path}/{escaped}")
}

fn violation(path: &str, message: impl Into<String>) -> Violation {
  Violation { path: path.to_owned(), message: message.into() }
}
