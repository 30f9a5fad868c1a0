//! Validator Adapter and Report Streamer (§4.6–§4.7): the boundary
//! between the pipeline and the external OpenAPI validator, and the
//! background process that turns validation outcomes into a rotating
//! on-disk report.

pub mod adapter;
pub mod report;

pub use adapter::{validate_request, validate_response, OpenApiValidator};
pub use report::ReportStreamer;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single contract violation as produced by the external validator.
/// Opaque to the core beyond the `path_missing` predicate (§4.6): every
/// other field the validator attaches is preserved verbatim through
/// `extra` and round-trips unchanged into the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(default)]
    pub path_missing: bool,
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path_missing: false,
            extra: Map::new(),
        }
    }

    pub fn path_missing(message: impl Into<String>) -> Self {
        Self {
            path_missing: true,
            ..Self::new(message)
        }
    }

    /// `IsPathMissing()` (§4.6): true when the violation is solely that
    /// the requested path has no entry in the contract.
    pub fn is_path_missing(&self) -> bool {
        self.path_missing
    }
}
