//! Mock handler (§4.3): orchestrates match, response synthesis, and
//! panic-safe error shaping.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use serde_json::json;

use crate::mock::model::MockResponse;
use crate::mock::store::MockStore;

/// Outcome of trying to satisfy a request from the mock store.
pub enum MockOutcome {
    /// A mock matched; this is the response to deliver. Response
    /// validation is skipped for hits (§4.3).
    Hit(Response<Bytes>),
    /// No mock matched; the pipeline should forward the request upstream.
    Miss,
}

/// Evaluates `store` against `req`/`body`, synthesizing a response on hit.
///
/// Any unexpected failure while matching or synthesizing (e.g. malformed
/// incoming JSON surfacing as a panic deep in a user-supplied extension) is
/// caught and converted into a synthetic 500 response; the process never
/// dies because of a single bad request (§4.3, §9).
pub fn handle(store: &MockStore, req: &Request<Bytes>, body: &Bytes) -> MockOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| store.first_match(req, body)));

    match result {
        Ok(Some(def)) => {
            tracing::info!(path = %req.uri().path(), method = %req.method(), "mock hit");
            match catch_unwind(AssertUnwindSafe(|| synthesize(&def.response))) {
                Ok(response) => MockOutcome::Hit(response),
                Err(payload) => MockOutcome::Hit(error_response(&panic_message(&payload))),
            }
        }
        Ok(None) => MockOutcome::Miss,
        Err(payload) => {
            tracing::error!(error = %panic_message(&payload), "mock matching panicked");
            MockOutcome::Hit(error_response(&panic_message(&payload)))
        }
    }
}

fn synthesize(template: &MockResponse) -> Response<Bytes> {
    let mut builder = Response::builder().status(
        StatusCode::from_u16(template.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );

    for (name, value) in &template.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            builder = builder.header(name, value);
        }
    }

    let body = template
        .body
        .as_ref()
        .map(|b| Bytes::from(b.to_bytes()))
        .unwrap_or_default();

    builder.body(body).expect("well-formed synthesized response")
}

/// A structured `{message, code, type, detail, cause}` error body, as
/// required by §4.3 for panic-isolated failures.
fn error_response(message: &str) -> Response<Bytes> {
    let payload = json!({
        "message": message,
        "code": 500,
        "type": "mock_handler_panic",
        "detail": "the mock matcher or response synthesizer failed unexpectedly",
        "cause": message,
    });

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Bytes::from(serde_json::to_vec(&payload).unwrap()))
        .expect("well-formed error response")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::model::{MockDefinition, MockRequest};
    use std::collections::BTreeMap;

    fn store_with_hit() -> MockStore {
        MockStore::new(vec![MockDefinition {
            request: MockRequest {
                host: None,
                method: "GET".into(),
                url_path: Some("/a".into()),
                header: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body: None,
            },
            response: MockResponse {
                status: 200,
                headers: BTreeMap::from([("Content-Type".to_string(), "text/plain".to_string())]),
                body: Some(crate::json::BodyValue::Text("ok".into())),
            },
        }])
    }

    #[test]
    fn hit_synthesizes_response() {
        let store = store_with_hit();
        let req = Request::builder().uri("/a").method("GET").body(Bytes::new()).unwrap();
        match handle(&store, &req, &Bytes::new()) {
            MockOutcome::Hit(resp) => {
                assert_eq!(resp.status(), StatusCode::OK);
                assert_eq!(resp.body().as_ref(), b"ok");
            }
            MockOutcome::Miss => panic!("expected a hit"),
        }
    }

    #[test]
    fn miss_forwards() {
        let store = store_with_hit();
        let req = Request::builder().uri("/b").method("GET").body(Bytes::new()).unwrap();
        assert!(matches!(handle(&store, &req, &Bytes::new()), MockOutcome::Miss));
    }

    #[test]
    fn invalid_status_code_does_not_panic_the_process() {
        let store = MockStore::new(vec![MockDefinition {
            request: MockRequest {
                host: None,
                method: "GET".into(),
                url_path: Some("/bad".into()),
                header: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body: None,
            },
            response: MockResponse {
                status: 0,
                headers: BTreeMap::new(),
                body: None,
            },
        }]);
        let req = Request::builder().uri("/bad").method("GET").body(Bytes::new()).unwrap();
        match handle(&store, &req, &Bytes::new()) {
            MockOutcome::Hit(resp) => assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR),
            MockOutcome::Miss => panic!("expected a hit"),
        }
    }
}
