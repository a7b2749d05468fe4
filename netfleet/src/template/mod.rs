//! Output template matcher.
//!
//! Converts raw vendor command output into ordered sequences of structured
//! records using declarative template definitions: named value patterns, a
//! state machine of anchored per-line rules, and explicit record boundaries.
//!
//! A template is compiled once and reused; matching the same text twice yields
//! field-identical records.

mod builtin;
mod definition;
mod matcher;
mod registry;

pub use builtin::names;
pub use definition::Template;
pub use registry::TemplateRegistry;

use indexmap::IndexMap;

/// A single matched value: scalar, or accumulated list for `List` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Single captured string; empty when the value never matched.
    Scalar(String),

    /// Accumulated captures for a `List` value; empty when never matched.
    List(Vec<String>),
}

impl TemplateValue {
    /// Scalar view: the string itself, or the first list element.
    pub fn as_str(&self) -> &str {
        match self {
            TemplateValue::Scalar(s) => s,
            TemplateValue::List(items) => items.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Whether the value never matched.
    pub fn is_empty(&self) -> bool {
        match self {
            TemplateValue::Scalar(s) => s.is_empty(),
            TemplateValue::List(items) => items.is_empty(),
        }
    }

    /// JSON view: string for scalars, array for lists.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TemplateValue::Scalar(s) => serde_json::Value::String(s.clone()),
            TemplateValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }
}

/// One flat record produced by a template match, in value declaration order.
pub type Record = IndexMap<String, TemplateValue>;
