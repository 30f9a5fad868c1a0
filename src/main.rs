//! Binary entry point (§4.9–§4.10): CLI, config loading, and a minimal
//! HTTP/1.1 listener that buffers each request and dispatches it into the
//! Pipeline Root. Grounded on the teacher's `standalone` binary and
//! `server/server.rs::run_accept_loop`/`serve_connection`/`buffer_request`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use tokio::net::TcpListener;

use oapi_compliance_proxy::broadcast::NullSink;
use oapi_compliance_proxy::config::ProxyConfig;
use oapi_compliance_proxy::mock::MockStore;
use oapi_compliance_proxy::pipeline::Pipeline;
use oapi_compliance_proxy::transaction::InMemoryTransactionStore;
use oapi_compliance_proxy::transport::TransportClient;
use oapi_compliance_proxy::validate::{OpenApiValidator, ReportStreamer, ValidationError};

#[derive(Parser, Debug)]
#[command(name = "oapi-compliance-proxy", about = "OpenAPI compliance HTTP proxy")]
struct Cli {
    /// Path to the YAML proxy configuration file.
    #[arg(short, long, env = "OAPI_PROXY_CONFIG")]
    config: PathBuf,
}

/// Stand-in for the real contract validator, which deployments supply by
/// implementing [`OpenApiValidator`] themselves; the binary defaults to
/// this no-op so the proxy is runnable without one wired up.
struct NoOpValidator;

impl OpenApiValidator for NoOpValidator {
    fn validate_request(&self, _request: &Request<Bytes>) -> Vec<ValidationError> {
        Vec::new()
    }

    fn validate_response(&self, _request: &Request<Bytes>, _response: &Response<Bytes>) -> Vec<ValidationError> {
        Vec::new()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match ProxyConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let mocks = match &config.mocks_path {
        Some(dir) => match MockStore::load_dir(dir) {
            Ok(store) => store,
            Err(err) => {
                tracing::error!(error = %err, "failed to load static mock definitions");
                std::process::exit(1);
            }
        },
        None => MockStore::empty(),
    };
    tracing::info!(count = mocks.len(), "loaded static mock definitions");

    let streamer = match ReportStreamer::start(config.report_path.clone()) {
        Ok(streamer) => streamer,
        Err(err) => {
            tracing::error!(error = %err, "failed to start report streamer");
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(mocks),
        config.redirection.clone(),
        Arc::new(TransportClient::new()),
        Arc::new(NoOpValidator),
        Arc::new(NullSink),
        Arc::new(InMemoryTransactionStore::new()),
        streamer,
    ));

    if let Err(err) = run_accept_loop(config.listen_addr, pipeline).await {
        tracing::error!(error = %err, "proxy listener terminated");
        std::process::exit(1);
    }
}

async fn run_accept_loop(addr: SocketAddr, pipeline: Arc<Pipeline>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    let next_request_id = Arc::new(AtomicU64::new(1));

    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::error!(error = %err, "tcp accept failed");
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                return Ok(());
            }
        };
        tracing::trace!(%remote, "accepted connection");

        let pipeline = pipeline.clone();
        let next_request_id = next_request_id.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                let pipeline = pipeline.clone();
                let request_id = next_request_id.fetch_add(1, Ordering::Relaxed).to_string();
                async move {
                    let response = handle_connection_request(pipeline, request_id, req).await;
                    Ok::<_, hyper::Error>(response.map(Full::new))
                }
            });

            let mut builder = ServerBuilder::new(TokioExecutor::new());
            builder.http1().preserve_header_case(true);

            if let Err(err) = builder.serve_connection(io, service).await {
                tracing::warn!(error = %err, "connection ended with an error");
            }
        });
    }
}

async fn handle_connection_request(
    pipeline: Arc<Pipeline>,
    request_id: String,
    req: Request<Incoming>,
) -> Response<Bytes> {
    match buffer_request(req).await {
        Ok(req) => pipeline.handle(request_id, req).await,
        Err(err) => {
            tracing::error!(error = %err, "failed to buffer inbound request body");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Bytes::new())
                .expect("well-formed error response")
        }
    }
}

async fn buffer_request(req: Request<Incoming>) -> Result<Request<Bytes>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(Request::from_parts(parts, body))
}
