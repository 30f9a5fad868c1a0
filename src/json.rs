//! Tagged body value for mock selectors and response templates (§9 design note).
//!
//! Mock bodies (both the request-selector `Body` field and the response
//! template body) are either a literal string or a structured JSON value.
//! We dispatch on this tag explicitly rather than on `serde_json::Value`'s
//! own shape, so that a YAML-authored mock can say "this is a literal byte
//! string" even when that string happens to parse as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyValue {
    Text(String),
    Json(Value),
}

impl BodyValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            BodyValue::Json(v) => Some(v),
            BodyValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BodyValue::Text(s) => Some(s),
            BodyValue::Json(_) => None,
        }
    }

    /// Structured bodies are serialized as JSON; text bodies pass through
    /// unmodified as raw bytes (§4.3).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            BodyValue::Text(s) => s.clone().into_bytes(),
            BodyValue::Json(v) => serde_json::to_vec(v).unwrap_or_default(),
        }
    }
}

/// Header / query-parameter selector value: either a single string or an
/// ordered sequence of strings (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Single(String),
    List(Vec<String>),
}

impl StringOrList {
    pub fn as_list(&self) -> Vec<&str> {
        match self {
            StringOrList::Single(s) => vec![s.as_str()],
            StringOrList::List(items) => items.iter().map(|s| s.as_str()).collect(),
        }
    }
}
