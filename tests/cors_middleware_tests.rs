use brrtcors::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, HeaderVec};
use brrtcors::middleware::{
    cors_middleware, CorsBuilder, CorsMiddleware, CorsPolicy, CorsPolicySource, Middleware,
};
use http::Method;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

mod common;
mod tracing_util;

use common::{ok_handler, preflight, reached_handler, request, simple_request, ORIGIN, OTHER_ORIGIN};
use tracing_util::TestTracing;

const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, Authorization, \
accept, origin, Cache-Control, X-Requested-With";

fn restricted_policy() -> CorsPolicy {
    CorsBuilder::new()
        .with_origins(&[ORIGIN])
        .with_methods(&[Method::GET, Method::POST])
        .with_headers(&["Content-Type", "Authorization"])
        .build()
}

fn dispatcher_with(policy: impl Into<CorsPolicySource>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(cors_middleware(policy)));
    dispatcher
}

fn assert_no_cors_headers(resp: &HandlerResponse) {
    for (name, _) in &resp.headers {
        assert!(
            !name.to_ascii_lowercase().starts_with("access-control-"),
            "unexpected CORS header {name}"
        );
    }
}

#[test]
fn test_cors_without_origin_passes_through() {
    let dispatcher = dispatcher_with(restricted_policy());
    let req = request(Method::GET, &[("Accept", "application/json")]);

    let resp = dispatcher.dispatch(&req, ok_handler);
    assert_eq!(resp.status, 200);
    assert!(reached_handler(&resp));
    assert_no_cors_headers(&resp);
    assert!(resp.get_header("vary").is_none());
}

#[test]
fn test_cors_allowed_origin_echoed_with_credentials() {
    let dispatcher = dispatcher_with(CorsPolicySource::Default);
    let resp = dispatcher.dispatch(&simple_request(ORIGIN), ok_handler);

    assert_eq!(resp.status, 200);
    assert!(reached_handler(&resp));
    // Credentials forbid a literal `*`, so the origin is echoed
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));
    assert_eq!(
        resp.get_header("access-control-allow-credentials"),
        Some("true")
    );
    assert_eq!(
        resp.get_header("access-control-expose-headers"),
        Some("Content-Length, Content-Type")
    );
    assert_eq!(resp.get_header("vary"), Some("Origin"));
    // Preflight-only headers stay off actual responses
    assert!(resp.get_header("access-control-allow-methods").is_none());
    assert!(resp.get_header("access-control-max-age").is_none());
}

#[test]
fn test_cors_wildcard_without_credentials_sends_star() {
    let policy = CorsBuilder::new().with_credentials(false).build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(&simple_request(OTHER_ORIGIN), ok_handler);

    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("access-control-allow-origin"), Some("*"));
    assert!(resp.get_header("access-control-allow-credentials").is_none());
    assert!(resp.get_header("vary").is_none());
}

#[test]
fn test_cors_allow_all_origins_flag() {
    let policy = CorsBuilder::new()
        .with_origins(&[])
        .with_all_origins(true)
        .with_credentials(false)
        .build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(&simple_request("https://anything.test"), ok_handler);

    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("access-control-allow-origin"), Some("*"));
}

#[test]
fn test_cors_rejected_origin_is_forbidden() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(&simple_request(OTHER_ORIGIN), ok_handler);

    assert_eq!(resp.status, 403);
    assert!(!reached_handler(&resp));
    assert_no_cors_headers(&resp);
}

#[test]
fn test_cors_rejected_origin_logs_warning() {
    let tracing = TestTracing::init();
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(&simple_request(OTHER_ORIGIN), ok_handler);
    assert_eq!(resp.status, 403);

    let logs = tracing.output();
    assert!(logs.contains("CORS: invalid origin"), "logs: {logs}");
    assert!(logs.contains(OTHER_ORIGIN), "logs: {logs}");
}

#[test]
fn test_cors_empty_origin_list_rejects_everything() {
    let policy = CorsBuilder::new().with_origins(&[]).build();
    let dispatcher = dispatcher_with(policy);

    let resp = dispatcher.dispatch(&simple_request(ORIGIN), ok_handler);
    assert_eq!(resp.status, 403);

    // Requests without an Origin are not CORS and still succeed
    let resp = dispatcher.dispatch(&request(Method::GET, &[]), ok_handler);
    assert_eq!(resp.status, 200);
}

#[test]
fn test_cors_preflight_response() {
    let dispatcher = dispatcher_with(CorsPolicySource::Default);
    let req = preflight(ORIGIN, "PUT", Some("Content-Type, Authorization"));

    let resp = dispatcher.dispatch(&req, ok_handler);
    assert_eq!(resp.status, 204);
    assert!(!reached_handler(&resp));
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));
    assert_eq!(
        resp.get_header("access-control-allow-methods"),
        Some("GET, POST, PUT, DELETE, OPTIONS, HEAD")
    );
    assert_eq!(
        resp.get_header("access-control-allow-headers"),
        Some(DEFAULT_ALLOW_HEADERS)
    );
    assert_eq!(
        resp.get_header("access-control-allow-credentials"),
        Some("true")
    );
    assert_eq!(resp.get_header("access-control-max-age"), Some("43200"));
    assert_eq!(resp.get_header("vary"), Some("Origin"));
}

#[test]
fn test_cors_preflight_method_not_allowed() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(&preflight(ORIGIN, "DELETE", None), ok_handler);

    assert_eq!(resp.status, 403);
    assert!(!reached_handler(&resp));
    assert_no_cors_headers(&resp);
}

#[test]
fn test_cors_preflight_method_is_case_insensitive() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(&preflight(ORIGIN, " post ", None), ok_handler);

    assert_eq!(resp.status, 204);
    assert_eq!(
        resp.get_header("access-control-allow-methods"),
        Some("GET, POST")
    );
}

#[test]
fn test_cors_preflight_invalid_method_token() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(&preflight(ORIGIN, "NOT VALID", None), ok_handler);
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_preflight_header_not_allowed() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(
        &preflight(ORIGIN, "POST", Some("Content-Type, X-Secret")),
        ok_handler,
    );

    assert_eq!(resp.status, 403);
    assert_no_cors_headers(&resp);
}

#[test]
fn test_cors_preflight_headers_case_insensitive() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(
        &preflight(ORIGIN, "POST", Some("content-type,AUTHORIZATION, ,")),
        ok_handler,
    );

    assert_eq!(resp.status, 204);
    assert_eq!(
        resp.get_header("access-control-allow-headers"),
        Some("Content-Type, Authorization")
    );
}

#[test]
fn test_cors_preflight_any_header() {
    let policy = CorsBuilder::new()
        .with_origins(&[ORIGIN])
        .with_headers(&["*"])
        .build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(
        &preflight(ORIGIN, "GET", Some("X-Anything, X-Else")),
        ok_handler,
    );

    assert_eq!(resp.status, 204);
    assert_eq!(resp.get_header("access-control-allow-headers"), Some("*"));
}

#[test]
fn test_cors_preflight_empty_methods_rejected() {
    let policy = CorsBuilder::new().with_methods(&[]).build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(&preflight(ORIGIN, "GET", None), ok_handler);
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_preflight_rejected_origin() {
    let dispatcher = dispatcher_with(restricted_policy());
    let resp = dispatcher.dispatch(&preflight(OTHER_ORIGIN, "GET", None), ok_handler);
    assert_eq!(resp.status, 403);
    assert_no_cors_headers(&resp);
}

#[test]
fn test_cors_preflight_custom_status_and_no_max_age() {
    let policy = CorsBuilder::new()
        .with_origins(&[ORIGIN])
        .with_options_status(200)
        .with_max_age(Duration::ZERO)
        .with_credentials(false)
        .build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(&preflight(ORIGIN, "GET", None), ok_handler);

    assert_eq!(resp.status, 200);
    assert!(!reached_handler(&resp));
    assert!(resp.get_header("access-control-max-age").is_none());
    assert!(resp.get_header("access-control-allow-credentials").is_none());
    // A listed origin is always echoed
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));
}

#[test]
fn test_cors_wildcard_preflight_without_credentials() {
    let policy = CorsBuilder::new().with_credentials(false).build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(&preflight(ORIGIN, "GET", None), ok_handler);

    assert_eq!(resp.status, 204);
    assert_eq!(resp.get_header("access-control-allow-origin"), Some("*"));
    assert!(resp.get_header("vary").is_none());
}

#[test]
fn test_cors_options_without_request_method_is_not_preflight() {
    let dispatcher = dispatcher_with(restricted_policy());
    let req = request(Method::OPTIONS, &[("Origin", ORIGIN)]);

    let resp = dispatcher.dispatch(&req, ok_handler);
    assert_eq!(resp.status, 200);
    assert!(reached_handler(&resp));
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));
    assert!(resp.get_header("access-control-allow-methods").is_none());
}

#[test]
fn test_cors_same_origin_skips_cors() {
    let dispatcher = dispatcher_with(restricted_policy());
    let req = request(
        Method::POST,
        &[("Origin", "http://localhost:8080"), ("Host", "LOCALHOST:8080")],
    );

    let resp = dispatcher.dispatch(&req, ok_handler);
    assert_eq!(resp.status, 200);
    assert!(reached_handler(&resp));
    assert_no_cors_headers(&resp);
}

#[test]
fn test_cors_host_mismatch_is_cross_origin() {
    let dispatcher = dispatcher_with(restricted_policy());
    let req = request(
        Method::GET,
        &[("Origin", "http://localhost:8080"), ("Host", "localhost:9090")],
    );
    let resp = dispatcher.dispatch(&req, ok_handler);
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_multiple_origins() {
    let policy = CorsBuilder::new()
        .with_origins(&["https://a.example.com", "https://b.example.com"])
        .build();
    let dispatcher = dispatcher_with(policy);

    for origin in ["https://a.example.com", "https://b.example.com"] {
        let resp = dispatcher.dispatch(&simple_request(origin), ok_handler);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.get_header("access-control-allow-origin"), Some(origin));
    }

    // Origins are compared exactly
    for origin in ["https://c.example.com", "https://A.example.com", "http://a.example.com"] {
        let resp = dispatcher.dispatch(&simple_request(origin), ok_handler);
        assert_eq!(resp.status, 403, "origin {origin} should be rejected");
    }
}

#[test]
fn test_cors_configured_origins_are_normalized() {
    let policy = CorsBuilder::new()
        .with_origins(&[" https://App.Example.com ", "https://*.Example.ORG"])
        .with_wildcard(true)
        .build();
    let dispatcher = dispatcher_with(policy);

    for origin in [ORIGIN, "https://api.example.org"] {
        let resp = dispatcher.dispatch(&simple_request(origin), ok_handler);
        assert_eq!(resp.status, 200, "origin {origin} should be allowed");
        assert_eq!(resp.get_header("access-control-allow-origin"), Some(origin));
    }

    let resp = dispatcher.dispatch(&simple_request(OTHER_ORIGIN), ok_handler);
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_subdomain_wildcard_pattern() {
    let policy = CorsBuilder::new()
        .with_origins(&["https://*.example.com"])
        .with_wildcard(true)
        .build();
    let dispatcher = dispatcher_with(policy);

    let resp = dispatcher.dispatch(&simple_request("https://api.example.com"), ok_handler);
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.get_header("access-control-allow-origin"),
        Some("https://api.example.com")
    );

    for origin in [
        "https://example.com",
        "http://api.example.com",
        "https://evil.com/.example.com",
        "https://api.example.com.evil.org",
    ] {
        let resp = dispatcher.dispatch(&simple_request(origin), ok_handler);
        assert_eq!(resp.status, 403, "origin {origin} should be rejected");
    }
}

#[test]
fn test_cors_pattern_is_literal_without_wildcard_flag() {
    let policy = CorsBuilder::new()
        .with_origins(&["https://*.example.com"])
        .build();
    let dispatcher = dispatcher_with(policy);

    let resp = dispatcher.dispatch(&simple_request("https://api.example.com"), ok_handler);
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_origin_func() {
    let policy = CorsBuilder::new()
        .with_origins(&[ORIGIN])
        .with_origin_func(|origin| origin.ends_with(".internal"))
        .build();
    let dispatcher = dispatcher_with(policy);

    let resp = dispatcher.dispatch(&simple_request("http://billing.internal"), ok_handler);
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.get_header("access-control-allow-origin"),
        Some("http://billing.internal")
    );

    let resp = dispatcher.dispatch(&simple_request(ORIGIN), ok_handler);
    assert_eq!(resp.status, 200);

    let resp = dispatcher.dispatch(&simple_request("http://billing.external"), ok_handler);
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_vary_merges_with_handler_value() {
    let dispatcher = dispatcher_with(CorsPolicySource::Default);
    let resp = dispatcher.dispatch(&simple_request(ORIGIN), |_req: &HandlerRequest| {
        let mut resp = HandlerResponse::json(200, serde_json::json!({ "handler": "reached" }));
        resp.set_header("Vary", "Accept-Encoding".to_string());
        resp
    });
    assert_eq!(resp.get_header("vary"), Some("Accept-Encoding, Origin"));

    let resp = dispatcher.dispatch(&simple_request(ORIGIN), |_req: &HandlerRequest| {
        let mut resp = HandlerResponse::json(200, serde_json::json!({}));
        resp.set_header("vary", "origin".to_string());
        resp
    });
    assert_eq!(resp.get_header("vary"), Some("origin"));
}

#[test]
fn test_cors_headers_added_to_error_responses() {
    let dispatcher = dispatcher_with(CorsPolicySource::Default);
    let resp = dispatcher.dispatch(&simple_request(ORIGIN), |_req: &HandlerRequest| {
        HandlerResponse::error(500, "boom")
    });

    assert_eq!(resp.status, 500);
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));
}

#[test]
fn test_cors_no_expose_headers_when_empty() {
    let policy = CorsBuilder::new().with_expose_headers(&[]).build();
    let dispatcher = dispatcher_with(policy);
    let resp = dispatcher.dispatch(&simple_request(ORIGIN), ok_handler);

    assert_eq!(resp.status, 200);
    assert!(resp.get_header("access-control-expose-headers").is_none());
}

#[test]
fn test_cors_middleware_from_none_uses_default() {
    let cors = cors_middleware(None::<CorsPolicy>);
    assert_eq!(cors.policy(), &CorsPolicy::default());

    let builder = CorsBuilder::new().with_origins(&[ORIGIN]);
    let cors = cors_middleware(&builder);
    assert_eq!(cors.policy().allow_origins, vec![ORIGIN.to_string()]);
}

#[test]
fn test_cors_policy_is_snapshot() {
    let builder = CorsBuilder::new().with_origins(&[ORIGIN]);
    let mut policy = builder.build();
    let cors = cors_middleware(policy.clone());

    // Later edits to the caller's copy do not reach the middleware
    policy.allow_origins.push(OTHER_ORIGIN.to_string());
    let resp = cors.wrap(ok_handler)(&simple_request(OTHER_ORIGIN));
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_before_and_after_directly() {
    let cors = CorsMiddleware::new(restricted_policy());

    let req = simple_request(ORIGIN);
    assert!(cors.before(&req).is_none());
    let mut resp = HandlerResponse::new(200, HeaderVec::new(), serde_json::Value::Null);
    cors.after(&req, &mut resp, Duration::from_millis(1));
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));

    // after() leaves rejected origins untouched
    let req = simple_request(OTHER_ORIGIN);
    let early = cors.before(&req).unwrap();
    assert_eq!(early.status, 403);
    let mut resp = HandlerResponse::new(200, HeaderVec::new(), serde_json::Value::Null);
    cors.after(&req, &mut resp, Duration::ZERO);
    assert_no_cors_headers(&resp);
}

#[test]
fn test_cors_wrap_short_circuits_handler() {
    let handler = cors_middleware(restricted_policy()).wrap(|_req: &HandlerRequest| {
        panic!("handler must not run for a rejected preflight")
    });
    let resp = handler(&preflight(ORIGIN, "PATCH", None));
    assert_eq!(resp.status, 403);
}

#[test]
fn test_cors_wrap_adds_headers() {
    let handler = cors_middleware(restricted_policy()).wrap(ok_handler);
    let resp = handler(&simple_request(ORIGIN));
    assert_eq!(resp.status, 200);
    assert!(reached_handler(&resp));
    assert_eq!(resp.get_header("access-control-allow-origin"), Some(ORIGIN));
    assert_eq!(resp.get_header("vary"), Some("Origin"));
}

#[test]
fn test_cors_concurrent_requests() {
    let cors = Arc::new(cors_middleware(restricted_policy()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cors = Arc::clone(&cors);
            thread::spawn(move || {
                let mut dispatcher = Dispatcher::new();
                dispatcher.add_middleware(cors);
                for _ in 0..100 {
                    let (origin, expected) = if i % 2 == 0 {
                        (ORIGIN, 200)
                    } else {
                        (OTHER_ORIGIN, 403)
                    };
                    let resp = dispatcher.dispatch(&simple_request(origin), ok_handler);
                    assert_eq!(resp.status, expected);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
