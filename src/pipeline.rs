//! Pipeline Root (§4.8): wires the Mock Handler, Request Rewriter,
//! Transport Wrapper, and Validator Adapter into the single path every
//! inbound request travels.

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::broadcast::BroadcastSink;
use crate::mock::handler::{handle as handle_mock, MockOutcome};
use crate::mock::store::MockStore;
use crate::transaction::{Transaction, TransactionStore};
use crate::transport::{self, TransportClient};
use crate::validate::{self, OpenApiValidator, ReportStreamer};
use crate::config::RedirectionConfig;

pub struct Pipeline {
    mocks: Arc<MockStore>,
    redirection: RedirectionConfig,
    transport: Arc<TransportClient>,
    validator: Arc<dyn OpenApiValidator>,
    sink: Arc<dyn BroadcastSink>,
    store: Arc<dyn TransactionStore>,
    streamer: ReportStreamer,
}

impl Pipeline {
    pub fn new(
        mocks: Arc<MockStore>,
        redirection: RedirectionConfig,
        transport: Arc<TransportClient>,
        validator: Arc<dyn OpenApiValidator>,
        sink: Arc<dyn BroadcastSink>,
        store: Arc<dyn TransactionStore>,
        streamer: ReportStreamer,
    ) -> Self {
        Self {
            mocks,
            redirection,
            transport,
            validator,
            sink,
            store,
            streamer,
        }
    }

    /// Runs a single inbound request through the full pipeline and
    /// produces the response the client sees.
    ///
    /// Ordering (§5): the transaction is registered before anything is
    /// broadcast. Request validation is dispatched as an independent task
    /// so it runs alongside mock lookup/forwarding rather than blocking
    /// either (§2, §4.8 step 4); the miss path awaits that task just
    /// before response validation starts, preserving "request validation
    /// events before response validation events" without serializing the
    /// upstream round trip behind it.
    pub async fn handle(&self, request_id: String, request: Request<Bytes>) -> Response<Bytes> {
        self.store.put(Transaction::new(request_id.clone(), request.clone()));
        self.sink.broadcast_request(&request_id, &request);

        let request_validation = self.spawn_request_validation(request_id.clone(), request.clone());

        let body = request.body().clone();

        match handle_mock(&self.mocks, &request, &body) {
            MockOutcome::Hit(response) => {
                // No response validation follows a mock hit, so nothing
                // downstream depends on request validation having finished.
                drop(request_validation);
                self.store.set_response(&request_id, response.clone());
                self.sink.broadcast_response(&request_id, &response);
                response
            }
            MockOutcome::Miss => self.forward(&request_id, request, request_validation).await,
        }
    }

    /// Spawns request validation as an independent task and returns a
    /// handle the caller can await to synchronize with it, or drop to let
    /// it run to completion unobserved.
    fn spawn_request_validation(&self, request_id: String, request: Request<Bytes>) -> JoinHandle<()> {
        let validator = self.validator.clone();
        let sink = self.sink.clone();
        let streamer = self.streamer.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            let errors = validate::validate_request(
                validator.as_ref(),
                &request_id,
                &request,
                sink.as_ref(),
                &streamer,
            );
            store.set_request_validation_errors(&request_id, errors);
        })
    }

    /// The mock-miss path (§4.4–§4.6): rewrite, forward upstream, validate
    /// the response against the *original* (pre-rewrite) request.
    async fn forward(
        &self,
        request_id: &str,
        request: Request<Bytes>,
        request_validation: JoinHandle<()>,
    ) -> Response<Bytes> {
        let rewritten = transport::rewrite(&request, &self.redirection);
        self.store.set_rewritten_request(request_id, rewritten.clone());

        match self.transport.send(rewritten).await {
            Ok(response) => {
                self.store.set_response(request_id, response.clone());
                self.sink.broadcast_response(request_id, &response);

                // Request validation's events must land before response
                // validation's; since it runs concurrently, wait for it here.
                if request_validation.await.is_err() {
                    tracing::error!(request_id, "request validation task panicked");
                }

                let response_errors = validate::validate_response(
                    self.validator.as_ref(),
                    request_id,
                    &request,
                    &response,
                    self.sink.as_ref(),
                    &self.streamer,
                );
                self.store
                    .set_response_validation_errors(request_id, response_errors);

                response
            }
            Err(err) => {
                tracing::error!(request_id, error = %err, "upstream request failed");
                upstream_error_response(&err)
            }
        }
    }
}

fn upstream_error_response(err: &transport::client::Error) -> Response<Bytes> {
    let body = json!({
        "message": "upstream request failed",
        "detail": err.to_string(),
    });
    let bytes = Bytes::from(serde_json::to_vec(&body).expect("error body always serializes"));

    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(bytes)
        .expect("well-formed error response")
}
