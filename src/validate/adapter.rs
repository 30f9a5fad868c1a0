//! Validator Adapter (§4.6): calls into the external OpenAPI validator
//! under `catch_unwind` so a panicking contract check degrades to a
//! synthetic violation instead of taking the proxy down, then routes the
//! outcome to the broadcast sink, transaction store, and report streamer.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bytes::Bytes;
use http::{Request, Response};

use crate::broadcast::BroadcastSink;
use crate::validate::ValidationError;

/// External collaborator that checks a request or response against an
/// OpenAPI contract. Implementations are expected to be cheap to call
/// repeatedly and safe to invoke from multiple tasks concurrently.
pub trait OpenApiValidator: Send + Sync {
    fn validate_request(&self, request: &Request<Bytes>) -> Vec<ValidationError>;
    fn validate_response(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> Vec<ValidationError>;
}

/// Runs request validation, broadcasts any resulting errors, and submits
/// the non-empty batch to the streamer. Returns the full (unfiltered)
/// error list to the caller (§4.6 — request validation has no
/// `IsPathMissing()` filter, only responses do).
pub fn validate_request(
    validator: &dyn OpenApiValidator,
    request_id: &str,
    request: &Request<Bytes>,
    sink: &dyn BroadcastSink,
    streamer: &crate::validate::ReportStreamer,
) -> Vec<ValidationError> {
    let errors = run_validator(|| validator.validate_request(request), "request");

    if !errors.is_empty() {
        sink.broadcast_request_validation_errors(request_id, &errors);
        streamer.submit(errors.clone());
    }

    errors
}

/// Runs response validation, filters out `IsPathMissing()` violations
/// before broadcasting and streaming them (§4.6), but returns the full
/// unfiltered list to the caller.
pub fn validate_response(
    validator: &dyn OpenApiValidator,
    request_id: &str,
    request: &Request<Bytes>,
    response: &Response<Bytes>,
    sink: &dyn BroadcastSink,
    streamer: &crate::validate::ReportStreamer,
) -> Vec<ValidationError> {
    let errors = run_validator(|| validator.validate_response(request, response), "response");

    let cleaned: Vec<ValidationError> = errors
        .iter()
        .filter(|e| !e.is_path_missing())
        .cloned()
        .collect();

    if !cleaned.is_empty() {
        sink.broadcast_response_validation_errors(request_id, &cleaned);
        streamer.submit(cleaned);
    }

    errors
}

/// Invokes `call` under `catch_unwind`; a panic becomes a single
/// synthetic [`ValidationError`] instead of propagating.
fn run_validator(
    call: impl FnOnce() -> Vec<ValidationError>,
    stage: &str,
) -> Vec<ValidationError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(errors) => errors,
        Err(panic) => {
            let message = panic_message(&panic);
            tracing::error!(stage, message, "openapi validator panicked");
            vec![ValidationError::new(format!(
                "Error validating {stage}: {message}"
            ))]
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    eprintln!(
        "TYPEID_PANIC={:?} TYPEID_STR={:?} TYPEID_STRING={:?}",
        panic.type_id(),
        std::any::TypeId::of::<&str>(),
        std::any::TypeId::of::<String>()
    );
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
