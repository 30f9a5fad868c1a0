//! Small helpers for reading host, query parameters, and multi-valued
//! headers off an `http::Request<Bytes>`, grounded on the host/query
//! extraction logic in the teacher's `common/data.rs::HttpMockRequest`.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::{HeaderMap, Request};

/// The `Host` header value, falling back to the URI authority, with any
/// port suffix stripped.
pub fn host_of(req: &Request<Bytes>) -> Option<String> {
    let raw = req
        .headers()
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))?;

    Some(strip_port(&raw).to_string())
}

/// Strips a trailing `:port` suffix, leaving IPv6 literals (`[::1]`) intact.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

/// All values for `name`, in wire order, as owned strings. A header may be
/// sent as several wire-level lines or as one comma-joined line (e.g.
/// `Accept: text/html, application/json`); both are split into the same
/// flat list of individual values.
pub fn header_values(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_string())
        .collect()
}

/// Query parameters as a multi-valued map, preserving declaration order
/// within each key.
pub fn query_params(req: &Request<Bytes>) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(query) = req.uri().query() {
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            map.entry(k.into_owned()).or_default().push(v.into_owned());
        }
    }
    map
}

pub fn content_type(req: &Request<Bytes>) -> Option<String> {
    req.headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
