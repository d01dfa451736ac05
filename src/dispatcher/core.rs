//! Dispatcher core module - hot path for request dispatch.

use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::middleware::Middleware;

/// Maximum inline headers before heap allocation
/// Most requests have ≤16 headers
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the hot path
///
/// Header names use `Arc<str>` so repeated names (Content-Type, Origin, ...)
/// are cloned in O(1). Values remain `String` as they're per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Request data passed through the middleware chain to a handler
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path
    pub path: String,
    /// Name of the handler that should process this request (used in logs)
    pub handler_name: String,
    /// HTTP headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
}

impl HandlerRequest {
    /// Create a request with no body
    #[must_use]
    pub fn new(method: Method, path: &str, headers: HeaderVec) -> Self {
        Self {
            method,
            path: path.to_string(),
            handler_name: String::new(),
            headers,
            body: None,
        }
    }

    /// Build a request from an `http::Request`
    ///
    /// Header values that are not valid visible ASCII are dropped; the body is
    /// left to the caller.
    #[must_use]
    pub fn from_http<B>(req: &http::Request<B>) -> Self {
        let headers: HeaderVec = req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (Arc::from(name.as_str()), v.to_string()))
            })
            .collect();

        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            handler_name: String::new(),
            headers,
            body: None,
        }
    }

    /// Set the handler name reported in logs
    #[must_use]
    pub fn with_handler_name(mut self, name: &str) -> Self {
        self.handler_name = name.to_string();
        self
    }

    /// Get a header value by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response returned by a handler or by a short-circuiting middleware
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 403, 204, etc.)
    pub status: u16,
    /// HTTP response headers (stack-allocated for ≤16 headers)
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    /// Create a new response with the given status, headers, and body
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        // Remove existing header with same name (case-insensitive)
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Convert into an `http::Response` with the JSON body serialized
    ///
    /// A `Null` body becomes an empty body.
    ///
    /// # Errors
    ///
    /// Returns an error if the status code or a header is not valid HTTP.
    pub fn into_http(self) -> Result<http::Response<String>, http::Error> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_ref(), value.as_str());
        }
        let body = match self.body {
            Value::Null => String::new(),
            other => other.to_string(),
        };
        builder.body(body)
    }
}

/// Ordered middleware chain around a handler
///
/// Middleware is shared via `Arc` so a single dispatcher can be cloned into
/// every worker of the host server.
#[derive(Clone, Default)]
pub struct Dispatcher {
    /// Ordered list of middleware to apply to requests/responses
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Dispatcher {
            middlewares: Vec::new(),
        }
    }

    /// Add middleware to the processing pipeline
    ///
    /// Middleware is executed in the order it's added.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Run the middleware chain and, unless short-circuited, the handler
    ///
    /// Every middleware sees `before()` even after an earlier one produced a
    /// response, and every middleware sees `after()` on the final response.
    pub fn dispatch<H>(&self, request: &HandlerRequest, handler: H) -> HandlerResponse
    where
        H: FnOnce(&HandlerRequest) -> HandlerResponse,
    {
        let middleware_count = self.middlewares.len();
        debug!(
            method = %request.method,
            path = %request.path,
            middleware_count = middleware_count,
            "Middleware before execution"
        );

        let mut early_resp: Option<HandlerResponse> = None;
        for (idx, mw) in self.middlewares.iter().enumerate() {
            if early_resp.is_none() {
                early_resp = mw.before(request);
                if early_resp.is_some() {
                    debug!(
                        middleware_idx = idx,
                        middleware_name = std::any::type_name_of_val(mw.as_ref()),
                        "Middleware returned early response"
                    );
                }
            } else {
                mw.before(request);
            }
        }

        let (mut resp, latency) = match early_resp {
            Some(r) => (r, Duration::from_millis(0)),
            None => {
                let start = Instant::now();
                let r = handler(request);
                (r, start.elapsed())
            }
        };

        debug!(
            response_status = resp.status,
            latency_ms = latency.as_millis() as u64,
            "Middleware after execution"
        );

        for mw in &self.middlewares {
            mw.after(request, &mut resp, latency);
        }

        resp
    }
}
