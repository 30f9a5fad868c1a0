//! Mock matcher (§4.2): evaluates a request against a single
//! [`MockRequest`] selector across host, method, path, headers, query
//! parameters, and body.

use bytes::Bytes;
use http::Request;
use serde_json::Value;

use crate::http_ext::{content_type, header_values, host_of, query_params};
use crate::json::BodyValue;
use crate::mock::model::MockRequest;
use crate::subset::{is_subset, string_compare};

/// Returns `true` iff every present selector on `m` holds for `req`.
///
/// `req_body` is passed separately (rather than re-read from `req`) so the
/// caller controls buffering/restoration of the request body (§4.2.6).
pub fn matches(m: &MockRequest, req: &Request<Bytes>, req_body: &Bytes) -> bool {
    if let Some(host) = &m.host {
        if !host.is_empty() {
            match host_of(req) {
                Some(actual) if string_compare(host, &actual) => {}
                _ => return false,
            }
        }
    }

    if req.method().as_str() != m.method {
        return false;
    }

    if let Some(path) = &m.url_path {
        if !path.is_empty() && !string_compare(path, req.uri().path()) {
            return false;
        }
    }

    for (name, expected) in &m.header {
        let incoming = header_values(req.headers(), name);
        let incoming_json: Vec<Value> = incoming.iter().map(|s| Value::String(s.clone())).collect();
        let expected_json: Vec<Value> = expected
            .as_list()
            .into_iter()
            .map(|s| Value::String(s.to_string()))
            .collect();
        if !is_subset(&Value::Array(expected_json), &Value::Array(incoming_json)) {
            return false;
        }
    }

    let query = query_params(req);
    for (name, expected) in &m.query_params {
        let incoming = query.get(name).cloned().unwrap_or_default();
        let incoming_json: Vec<Value> = incoming.into_iter().map(Value::String).collect();
        let expected_json: Vec<Value> = expected
            .as_list()
            .into_iter()
            .map(|s| Value::String(s.to_string()))
            .collect();
        if !is_subset(&Value::Array(expected_json), &Value::Array(incoming_json)) {
            return false;
        }
    }

    if let Some(body) = &m.body {
        if !body_matches(body, req, req_body) {
            return false;
        }
    }

    true
}

fn body_matches(expected: &BodyValue, req: &Request<Bytes>, req_body: &Bytes) -> bool {
    match expected {
        BodyValue::Text(expected_text) => req_body.as_ref() == expected_text.as_bytes(),
        BodyValue::Json(expected_json) => {
            let is_json_content_type = content_type(req)
                .map(|ct| ct.eq_ignore_ascii_case("application/json") || ct.starts_with("application/json;"))
                .unwrap_or(false);
            if !is_json_content_type {
                return false;
            }
            match serde_json::from_slice::<Value>(req_body) {
                Ok(incoming) => is_subset(expected_json, &incoming),
                Err(_) => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::StringOrList;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn base_request(method: &str, path: &str) -> MockRequest {
        MockRequest {
            host: None,
            method: method.to_string(),
            url_path: Some(path.to_string()),
            header: BTreeMap::new(),
            query_params: BTreeMap::new(),
            body: None,
        }
    }

    fn http_req(uri: &str, method: &str) -> Request<Bytes> {
        Request::builder()
            .uri(uri)
            .method(method)
            .body(Bytes::new())
            .unwrap()
    }

    #[test]
    fn method_and_path_must_match() {
        let m = base_request("POST", "/a");
        assert!(matches(&m, &http_req("/a", "POST"), &Bytes::new()));
        assert!(!matches(&m, &http_req("/a", "GET"), &Bytes::new()));
        assert!(!matches(&m, &http_req("/b", "POST"), &Bytes::new()));
    }

    #[test]
    fn absent_path_matches_any() {
        let mut m = base_request("GET", "/ignored");
        m.url_path = None;
        assert!(matches(&m, &http_req("/anything", "GET"), &Bytes::new()));
    }

    #[test]
    fn header_array_subset_matches() {
        let mut m = base_request("GET", "/a");
        m.header.insert(
            "Accept".to_string(),
            StringOrList::List(vec!["application/json".to_string()]),
        );
        let mut req = http_req("/a", "GET");
        req.headers_mut().insert(
            "accept",
            "text/html, application/json".parse().unwrap(),
        );
        assert!(matches(&m, &req, &Bytes::new()));
    }

    #[test]
    fn json_body_subset_requires_content_type() {
        let mut m = base_request("POST", "/a");
        m.body = Some(BodyValue::Json(json!({"x": 1})));

        let mut req = http_req("/a", "POST");
        req.headers_mut()
            .insert(http::header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = Bytes::from_static(br#"{"x":1,"y":2}"#);
        assert!(matches(&m, &req, &body));

        let mut req_plain = http_req("/a", "POST");
        req_plain
            .headers_mut()
            .insert(http::header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(!matches(&m, &req_plain, &body));
    }

    #[test]
    fn text_body_requires_byte_exact_match() {
        let mut m = base_request("POST", "/a");
        m.body = Some(BodyValue::Text("hello".to_string()));
        let req = http_req("/a", "POST");
        assert!(matches(&m, &req, &Bytes::from_static(b"hello")));
        assert!(!matches(&m, &req, &Bytes::from_static(b"hellx")));
    }

    #[test]
    fn matcher_monotonicity_removing_selector_keeps_match() {
        let mut m = base_request("POST", "/a");
        m.body = Some(BodyValue::Json(json!({"x": 1})));
        let mut req = http_req("/a", "POST");
        req.headers_mut()
            .insert(http::header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = Bytes::from_static(br#"{"x":1}"#);
        assert!(matches(&m, &req, &body));

        m.body = None;
        assert!(matches(&m, &req, &body));
    }
}
