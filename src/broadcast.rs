//! Broadcast Sink (§4.8): an opaque collaborator that the pipeline notifies
//! of request/response capture and validation outcomes, e.g. to feed a
//! live subscriber UI. The core never inspects how a sink delivers these
//! events, only that it accepts them.

use bytes::Bytes;
use http::{Request, Response};

use crate::validate::ValidationError;

/// Implemented by whatever externally observes transactions as they pass
/// through the pipeline. A no-op implementation is valid.
pub trait BroadcastSink: Send + Sync {
    fn broadcast_request(&self, request_id: &str, request: &Request<Bytes>);
    fn broadcast_response(&self, request_id: &str, response: &Response<Bytes>);
    fn broadcast_request_validation_errors(&self, request_id: &str, errors: &[ValidationError]);
    fn broadcast_response_validation_errors(&self, request_id: &str, errors: &[ValidationError]);
}

/// A sink that discards every event. Useful when no subscriber is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BroadcastSink for NullSink {
    fn broadcast_request(&self, _request_id: &str, _request: &Request<Bytes>) {}
    fn broadcast_response(&self, _request_id: &str, _response: &Response<Bytes>) {}
    fn broadcast_request_validation_errors(&self, _request_id: &str, _errors: &[ValidationError]) {}
    fn broadcast_response_validation_errors(&self, _request_id: &str, _errors: &[ValidationError]) {}
}
