//! # brrtcors
//!
//! **brrtcors** provides CORS (Cross-Origin Resource Sharing) policy configuration,
//! a fluent policy builder, and the middleware that enforces a policy on every
//! request of a BRRTRouter-style middleware pipeline.
//!
//! ## Overview
//!
//! - **[`config`]** - Serializable [`CorsConf`](config::CorsConf) for `config.yaml` / JSON files
//! - **[`middleware`]** - [`CorsPolicy`](middleware::CorsPolicy), [`CorsBuilder`](middleware::CorsBuilder),
//!   and the [`CorsMiddleware`](middleware::CorsMiddleware) decision engine
//! - **[`dispatcher`]** - Request/response model and the middleware chain
//! - **[`logging`]** - `tracing-subscriber` initialization
//! - **[`cli`]** - The `brrtcors` command-line tool
//!
//! ## Request Handling Flow
//!
//! ```text
//! Client ── Origin? ──► CorsMiddleware::before
//!                         ├─ no Origin / same origin ──────────► handler
//!                         ├─ origin rejected ──────────────────► 403
//!                         ├─ preflight accepted ───────────────► 204 + Allow-* headers
//!                         ├─ preflight rejected ───────────────► 403
//!                         └─ allowed actual request ───────────► handler
//!                                                                   │
//!                         CorsMiddleware::after ◄───────────────────┘
//!                           Allow-Origin / Allow-Credentials / Expose-Headers / Vary
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtcors::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, HeaderVec};
//! use brrtcors::middleware::{cors_middleware, CorsBuilder};
//! use http::Method;
//! use std::sync::Arc;
//!
//! let policy = CorsBuilder::new()
//!     .with_origins(&["https://app.example.com"])
//!     .with_methods(&[Method::GET, Method::POST])
//!     .with_credentials(true)
//!     .build();
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_middleware(Arc::new(cors_middleware(policy)));
//!
//! let mut headers = HeaderVec::new();
//! headers.push((Arc::from("origin"), "https://app.example.com".to_string()));
//! let req = HandlerRequest::new(Method::GET, "/pets", headers);
//!
//! let resp = dispatcher.dispatch(&req, |_req| {
//!     HandlerResponse::json(200, serde_json::json!({ "pets": [] }))
//! });
//! assert_eq!(resp.status, 200);
//! assert_eq!(
//!     resp.get_header("access-control-allow-origin"),
//!     Some("https://app.example.com")
//! );
//! ```
//!
//! ## Default Policy
//!
//! [`CorsPolicy::default()`](middleware::CorsPolicy) allows every origin with
//! credentials, six common methods and a 12-hour preflight cache. It is meant for
//! development; review it before exposing a service publicly.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod middleware;

pub use config::{load_cors_conf, CorsConf};
pub use middleware::{
    cors_middleware, CorsBuilder, CorsConfigError, CorsMiddleware, CorsPolicy, CorsPolicySource,
};
