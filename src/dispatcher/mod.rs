//! # Dispatcher Module
//!
//! The dispatcher module provides the request/response model the CORS middleware
//! operates on, and a small middleware chain that runs a handler closure.
//!
//! ## Overview
//!
//! The host framework owns the network side. It converts each incoming request into a
//! [`HandlerRequest`], hands it to a [`Dispatcher`] together with the handler that
//! should produce the response, and converts the resulting [`HandlerResponse`] back
//! into its own response type.
//!
//! ## Request Flow
//!
//! 1. Every middleware's `before()` runs in registration order
//! 2. The first middleware returning a response short-circuits the handler
//! 3. Otherwise the handler runs and its latency is measured
//! 4. Every middleware's `after()` runs on the response (early or not)
//!
//! ## Bridging to `http`
//!
//! ```rust
//! use brrtcors::dispatcher::{HandlerRequest, HandlerResponse};
//!
//! let req = http::Request::builder()
//!     .method("GET")
//!     .uri("/pets")
//!     .header("Origin", "https://app.example.com")
//!     .body(())
//!     .unwrap();
//! let handler_req = HandlerRequest::from_http(&req);
//! assert_eq!(handler_req.get_header("origin"), Some("https://app.example.com"));
//!
//! let resp = HandlerResponse::json(200, serde_json::json!({"ok": true}));
//! let http_resp = resp.into_http().unwrap();
//! assert_eq!(http_resp.status(), 200);
//! ```

mod core;

pub use core::{Dispatcher, HandlerRequest, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS};
