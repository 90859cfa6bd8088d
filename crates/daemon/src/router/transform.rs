// SPDX-License-Identifier: MIT

//! Declarative event-to-event transformer rules. A transformer matches a source pattern and derives a new
//! event at `target_event` via a pure `Mapping` interpreter; it never
//! consumes the source event.

use std::collections::BTreeMap;

use serde_json::Value;

use super::pattern::Pattern;

/// One field of a transformer's output object.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping {
    /// Copy a JSON-path-like projection from the source event's `data`
    /// (dot-separated field access, e.g. `"payload.id"`).
    CopyField(String),
    /// A literal JSON value, embedded verbatim.
    Literal(Value),
    /// A template string with `{field}` placeholders resolved against the
    /// source `data` (stringified).
    Template(String),
    /// A nested object built from further mappings.
    Object(BTreeMap<String, Mapping>),
}

impl Mapping {
    /// Interpret this mapping against the source event's `data`, producing
    /// one JSON value. Pure: no side effects, no dynamic code.
    pub fn resolve(&self, source_data: &Value) -> Value {
        match self {
            Mapping::CopyField(path) => lookup_path(source_data, path).cloned().unwrap_or(Value::Null),
            Mapping::Literal(v) => v.clone(),
            Mapping::Template(tpl) => Value::String(render_template(tpl, source_data)),
            Mapping::Object(fields) => {
                let mut obj = serde_json::Map::new();
                for (k, m) in fields {
                    obj.insert(k.clone(), m.resolve(source_data));
                }
                Value::Object(obj)
            }
        }
    }
}

fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn render_template(tpl: &str, data: &Value) -> String {
    let mut out = String::with_capacity(tpl.len());
    let mut rest = tpl;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        rest = &rest[open + 1..];
        let Some(close) = rest.find('}') else {
            out.push('{');
            break;
        };
        let field = &rest[..close];
        let value = lookup_path(data, field);
        out.push_str(&value_to_display(value));
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn value_to_display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// An optional guard on a transformer: fires only if `field` in the
/// source `data` equals `equals`. No general expression language: mapping
/// rules are a pure data transform, not arbitrary code.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub equals: Value,
}

impl Condition {
    pub fn matches(&self, source_data: &Value) -> bool {
        lookup_path(source_data, &self.field) == Some(&self.equals)
    }
}

/// `{source_pattern, target_event, mapping, condition?}`.
#[derive(Debug, Clone)]
pub struct TransformerRule {
    pub source_pattern: Pattern,
    pub target_event: String,
    pub mapping: Mapping,
    pub condition: Option<Condition>,
}

impl TransformerRule {
    pub fn new(
        source_pattern: impl Into<String>,
        target_event: impl Into<String>,
        mapping: Mapping,
    ) -> Self {
        Self {
            source_pattern: Pattern::new(source_pattern),
            target_event: target_event.into(),
            mapping,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Whether this rule fires for `name`/`data` (pattern match and, if
    /// present, condition).
    pub fn applies(&self, name: &str, data: &Value) -> bool {
        self.source_pattern.matches(name)
            && self.condition.as_ref().map(|c| c.matches(data)).unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
