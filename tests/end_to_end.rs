//! End-to-end scenarios (spec §8): each test drives the public
//! `Pipeline`/`TransportClient`/`ReportStreamer` surface the way a real
//! deployment would, rather than reaching into module internals.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use tokio::net::TcpListener;

use oapi_compliance_proxy::broadcast::NullSink;
use oapi_compliance_proxy::config::RedirectionConfig;
use oapi_compliance_proxy::json::BodyValue;
use oapi_compliance_proxy::mock::{MockDefinition, MockRequest, MockResponse, MockStore};
use oapi_compliance_proxy::pipeline::Pipeline;
use oapi_compliance_proxy::transaction::InMemoryTransactionStore;
use oapi_compliance_proxy::transport::TransportClient;
use oapi_compliance_proxy::validate::{OpenApiValidator, ReportStreamer, ValidationError};

struct NoopValidator;
impl OpenApiValidator for NoopValidator {
    fn validate_request(&self, _request: &Request<Bytes>) -> Vec<ValidationError> {
        Vec::new()
    }
    fn validate_response(&self, _request: &Request<Bytes>, _response: &Response<Bytes>) -> Vec<ValidationError> {
        Vec::new()
    }
}

fn temp_dir(label: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("oapi-proxy-e2e-{label}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn streamer(label: &str) -> ReportStreamer {
    let path = temp_dir(label).join("report.json");
    ReportStreamer::start(path.to_string_lossy().to_string()).unwrap()
}

fn json_subset_mock() -> MockDefinition {
    MockDefinition {
        request: MockRequest {
            host: None,
            method: "POST".into(),
            url_path: Some("/a".into()),
            header: BTreeMap::new(),
            query_params: BTreeMap::new(),
            body: Some(BodyValue::Json(serde_json::json!({"x": 1}))),
        },
        response: MockResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: Some(BodyValue::Text("mocked".into())),
        },
    }
}

fn pipeline_with_mocks(mocks: Vec<MockDefinition>) -> Pipeline {
    Pipeline::new(
        Arc::new(MockStore::new(mocks)),
        RedirectionConfig {
            protocol: "http".into(),
            host: "127.0.0.1".into(),
            port: 1, // unreachable; only the mock-miss cases exercise it
        },
        Arc::new(TransportClient::new()),
        Arc::new(NoopValidator),
        Arc::new(NullSink),
        Arc::new(InMemoryTransactionStore::new()),
        streamer("pipeline"),
    )
}

/// Scenario 1: mock hit on a JSON subset body short-circuits the request.
#[tokio::test]
async fn scenario_1_mock_hit_json_subset() {
    let pipeline = pipeline_with_mocks(vec![json_subset_mock()]);

    let request = Request::builder()
        .method("POST")
        .uri("http://inbound.local/a")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Bytes::from_static(br#"{"x":1,"y":2}"#))
        .unwrap();

    let response = pipeline.handle("req-1".into(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"mocked");
}

/// Scenario 2: the same mock misses on a non-JSON content type, so the
/// request is forwarded upstream instead (and fails to reach the
/// unreachable redirection target, proving it left the mock path).
#[tokio::test]
async fn scenario_2_mock_miss_by_content_type_forwards_upstream() {
    let pipeline = pipeline_with_mocks(vec![json_subset_mock()]);

    let request = Request::builder()
        .method("POST")
        .uri("http://inbound.local/a")
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(Bytes::from_static(br#"{"x":1}"#))
        .unwrap();

    let response = pipeline.handle("req-2".into(), request).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

/// Scenario 3: a header selector given as a list matches any incoming
/// request whose header values are a superset.
#[tokio::test]
async fn scenario_3_header_subset_array_matches() {
    let mut mock = json_subset_mock();
    mock.request.body = None;
    mock.request
        .header
        .insert("Accept".into(), oapi_compliance_proxy::json::StringOrList::List(vec!["application/json".into()]));

    let pipeline = pipeline_with_mocks(vec![mock]);

    let request = Request::builder()
        .method("POST")
        .uri("http://inbound.local/a")
        .header(http::header::ACCEPT, "text/html, application/json")
        .body(Bytes::new())
        .unwrap();

    let response = pipeline.handle("req-3".into(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Scenario 4: a `Set-Cookie` issued on an intermediate redirect hop is
/// promoted onto the final response when the final response has none.
#[tokio::test]
async fn scenario_4_set_cookie_promoted_across_redirect_chain() {
    let addr = spawn_redirecting_upstream().await;
    let client = TransportClient::new();

    let request = Request::builder()
        .method("GET")
        .uri(format!("http://{addr}/start"))
        .body(Bytes::new())
        .unwrap();

    let response = client.send(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(http::header::SET_COOKIE).unwrap(), "s=1");
}

/// Scenario 5: crossing a rotation boundary produces a second, distinct
/// report file, and the first remains a parseable closed JSON array.
#[tokio::test]
async fn scenario_5_rotation_produces_a_new_file_at_the_boundary() {
    let dir = temp_dir("rotation");
    let pattern = dir.join("report-{HH-mm-SS}.json").to_string_lossy().to_string();
    let streamer = ReportStreamer::start(pattern).unwrap();

    streamer.submit(vec![ValidationError::new("v1")]);
    tokio::time::sleep(Duration::from_millis(150)).await;

    // The per-second cadence rotates at least once within any window this
    // long, regardless of where in the current second the test started.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    streamer.submit(vec![ValidationError::new("v2")]);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut files: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    assert!(files.len() >= 2, "expected rotation to produce at least two report files, found {files:?}");
    for file in &files {
        let content = std::fs::read_to_string(file).unwrap();
        let parsed: Vec<ValidationError> = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("{} is not a well-formed JSON array: {e}", file.display()));
        assert!(!parsed.is_empty());
    }
}

/// Scenario 6: a mix of a path-missing error and a schema error on
/// response validation is filtered to just the schema error for
/// broadcasting/streaming, but the full list still reaches the caller.
#[tokio::test]
async fn scenario_6_path_missing_filtered_from_streamed_output() {
    use oapi_compliance_proxy::validate::validate_response;

    struct MixedValidator;
    impl OpenApiValidator for MixedValidator {
        fn validate_request(&self, _request: &Request<Bytes>) -> Vec<ValidationError> {
            Vec::new()
        }
        fn validate_response(&self, _request: &Request<Bytes>, _response: &Response<Bytes>) -> Vec<ValidationError> {
            vec![
                ValidationError::path_missing("no such path in contract"),
                ValidationError::new("response body missing required field"),
            ]
        }
    }

    let streamer = streamer("path-missing");
    let request = Request::builder().uri("http://x/a").body(Bytes::new()).unwrap();
    let response = Response::builder().status(200).body(Bytes::new()).unwrap();

    let full = validate_response(&MixedValidator, "req-6", &request, &response, &NullSink, &streamer);
    assert_eq!(full.len(), 2, "caller receives the unfiltered list");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let streamed = streamer.snapshot();
    assert_eq!(streamed.len(), 1);
    assert!(!streamed[0].is_path_missing());
}

async fn spawn_redirecting_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = hyper::service::service_fn(|req: Request<Incoming>| async move {
                    let response = match req.uri().path() {
                        "/start" => Response::builder()
                            .status(StatusCode::FOUND)
                            .header(http::header::LOCATION, "/next")
                            .header(http::header::SET_COOKIE, "s=1")
                            .body(Bytes::new())
                            .unwrap(),
                        _ => Response::builder().status(StatusCode::OK).body(Bytes::new()).unwrap(),
                    };
                    Ok::<_, hyper::Error>(response.map(Full::new))
                });
                let _ = ServerBuilder::new(TokioExecutor::new())
                    .http1()
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    addr
}
