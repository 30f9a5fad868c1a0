//! Mock definition data model (§3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::json::{BodyValue, StringOrList};

/// Selector half of a [`MockDefinition`]. An absent field matches any value;
/// a present field must match by subset semantics (invariant M1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockRequest {
    #[serde(default)]
    pub host: Option<String>,
    pub method: String,
    #[serde(default, rename = "path")]
    pub url_path: Option<String>,
    #[serde(default)]
    pub header: BTreeMap<String, StringOrList>,
    #[serde(default)]
    pub query_params: BTreeMap<String, StringOrList>,
    #[serde(default)]
    pub body: Option<BodyValue>,
}

impl MockRequest {
    /// Canonicalizes the method to uppercase at ingestion, per §3.
    pub fn normalize(mut self) -> Self {
        self.method = self.method.to_uppercase();
        self
    }
}

/// Response template half of a [`MockDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<BodyValue>,
}

/// An immutable `{request, response}` pair loaded from a static mock
/// document (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockDefinition {
    pub request: MockRequest,
    pub response: MockResponse,
}

impl MockDefinition {
    pub fn normalize(mut self) -> Self {
        self.request = self.request.normalize();
        self
    }
}
