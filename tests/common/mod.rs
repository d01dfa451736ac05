#![allow(dead_code)]

use brrtcors::dispatcher::{HandlerRequest, HandlerResponse, HeaderVec};
use http::Method;
use std::sync::Arc;

pub const ORIGIN: &str = "https://app.example.com";
pub const OTHER_ORIGIN: &str = "https://evil.example.org";

/// Build a request from `(name, value)` header pairs
pub fn request(method: Method, headers: &[(&str, &str)]) -> HandlerRequest {
    let headers: HeaderVec = headers
        .iter()
        .map(|(name, value)| (Arc::from(*name), value.to_string()))
        .collect();
    HandlerRequest::new(method, "/pets", headers).with_handler_name("test_handler")
}

/// A simple cross-origin GET from `origin`
pub fn simple_request(origin: &str) -> HandlerRequest {
    request(Method::GET, &[("Origin", origin)])
}

/// A preflight from `origin` asking for `method` and optionally `headers`
pub fn preflight(origin: &str, method: &str, headers: Option<&str>) -> HandlerRequest {
    let mut pairs = vec![
        ("Origin", origin),
        ("Access-Control-Request-Method", method),
    ];
    if let Some(h) = headers {
        pairs.push(("Access-Control-Request-Headers", h));
    }
    request(Method::OPTIONS, &pairs)
}

/// Handler that marks the response so tests can tell it ran
pub fn ok_handler(_req: &HandlerRequest) -> HandlerResponse {
    HandlerResponse::json(200, serde_json::json!({ "handler": "reached" }))
}

pub fn reached_handler(resp: &HandlerResponse) -> bool {
    resp.body.get("handler").is_some()
}
