//! Request Rewriter (§4.4): clones the incoming request with
//! protocol/host/port redirection and rewrites `Referer`.

use bytes::Bytes;
use http::{HeaderValue, Request, Uri};

use crate::config::RedirectionConfig;

pub const X_ORIGINAL_REFERER: &str = "X-Original-Referer";

/// Produces an independent clone of `req` whose URL scheme, host, and port
/// are replaced per `redirection`; path, query, method, and body are
/// preserved untouched. Mutating the returned request never affects `req`,
/// and `req`'s body is not consumed (the caller passes an already-buffered
/// `Bytes` body, so both the original and the clone can be read again).
pub fn rewrite(req: &Request<Bytes>, redirection: &RedirectionConfig) -> Request<Bytes> {
    let mut builder = Request::builder()
        .method(req.method().clone())
        .uri(redirected_uri(req.uri(), redirection));

    for (name, value) in req.headers() {
        if name == http::header::HOST {
            continue;
        }
        builder = builder.header(name, value.clone());
    }
    builder = builder.header(
        http::header::HOST,
        format!("{}:{}", redirection.host, redirection.port),
    );

    let mut clone = builder
        .body(req.body().clone())
        .expect("redirected request is well-formed");

    rewrite_referer(&mut clone, redirection);
    clone
}

fn redirected_uri(original: &Uri, redirection: &RedirectionConfig) -> Uri {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    format!(
        "{}://{}:{}{}",
        redirection.protocol, redirection.host, redirection.port, path_and_query
    )
    .parse()
    .expect("redirection target plus original path/query form a valid URI")
}

/// If the clone carries a `Referer` header, preserves the original under
/// `X-Original-Referer` and rewrites `Referer` to the redirected URL,
/// substituting protocol/host/port over the original Referer's path and
/// query (§4.4).
fn rewrite_referer(req: &mut Request<Bytes>, redirection: &RedirectionConfig) {
    let Some(referer) = req.headers().get(http::header::REFERER).cloned() else {
        return;
    };

    req.headers_mut()
        .insert(X_ORIGINAL_REFERER, referer.clone());

    let rewritten = referer
        .to_str()
        .ok()
        .and_then(|s| s.parse::<Uri>().ok())
        .map(|uri| redirected_uri(&uri, redirection))
        .and_then(|uri| HeaderValue::from_str(&uri.to_string()).ok());

    if let Some(rewritten) = rewritten {
        req.headers_mut().insert(http::header::REFERER, rewritten);
    }
}
