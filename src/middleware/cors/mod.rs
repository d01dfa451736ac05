mod builder;
mod error;
mod origin;
mod policy;

pub use builder::CorsBuilder;
pub use error::CorsConfigError;
pub use policy::{default_policy, CorsPolicy, OriginValidator, DEFAULT_MAX_AGE};

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatcher::{HandlerRequest, HandlerResponse, HeaderVec};
use crate::middleware::Middleware;
use origin::OriginValidation;

/// Where the middleware gets its policy from
///
/// `Default` selects [`CorsPolicy::default()`]; there is no implicit
/// "missing means default" beyond the `From<Option<CorsPolicy>>` conversion.
#[derive(Debug, Clone, Default)]
pub enum CorsPolicySource {
    /// Use the built-in permissive default policy
    #[default]
    Default,
    /// Use the supplied policy
    Policy(CorsPolicy),
}

impl CorsPolicySource {
    /// Resolve to a concrete policy
    #[must_use]
    pub fn resolve(self) -> CorsPolicy {
        match self {
            CorsPolicySource::Default => CorsPolicy::default(),
            CorsPolicySource::Policy(policy) => policy,
        }
    }
}

impl From<CorsPolicy> for CorsPolicySource {
    fn from(policy: CorsPolicy) -> Self {
        CorsPolicySource::Policy(policy)
    }
}

impl From<Option<CorsPolicy>> for CorsPolicySource {
    fn from(policy: Option<CorsPolicy>) -> Self {
        policy.map_or(CorsPolicySource::Default, CorsPolicySource::Policy)
    }
}

impl From<&CorsBuilder> for CorsPolicySource {
    fn from(builder: &CorsBuilder) -> Self {
        CorsPolicySource::Policy(builder.build())
    }
}

/// Build a CORS middleware bound to the resolved policy
///
/// The policy is fixed for the lifetime of the returned middleware.
///
/// # Example
///
/// ```rust
/// use brrtcors::middleware::{cors_middleware, CorsPolicySource};
///
/// // Permissive default policy
/// let cors = cors_middleware(CorsPolicySource::Default);
/// assert!(cors.policy().allow_credentials);
/// ```
#[must_use]
pub fn cors_middleware(source: impl Into<CorsPolicySource>) -> CorsMiddleware {
    CorsMiddleware::new(source.into().resolve())
}

/// CORS (Cross-Origin Resource Sharing) middleware
///
/// Handles preflight OPTIONS requests and adds CORS headers to responses.
///
/// # CORS Flow
///
/// 1. **No `Origin` / same origin**: passed through untouched
/// 2. **Rejected origin**: 403 Forbidden, no CORS headers, handler not invoked
/// 3. **Preflight** (`OPTIONS` + `Access-Control-Request-Method`): answered in
///    `before()`; 403 if the method or a requested header is not allowed
/// 4. **Actual request**: handler executes, CORS headers added in `after()`
///
/// # Credentials
///
/// With `allow_credentials` the requesting origin is echoed even when all
/// origins are allowed, since browsers refuse `*` on credentialed responses.
pub struct CorsMiddleware {
    policy: Arc<CorsPolicy>,
    origin_validation: OriginValidation,
    allow_any_header: bool,
    allow_methods_value: String,
    allow_headers_value: String,
    expose_headers_value: Option<String>,
    max_age_value: Option<String>,
}

impl CorsMiddleware {
    /// Create a CORS middleware for `policy`
    ///
    /// Header values are pre-joined here so the request path only compares
    /// and copies strings.
    #[must_use]
    pub fn new(policy: CorsPolicy) -> Self {
        let origin_validation = OriginValidation::from_policy(&policy);
        debug!(origin_validation = ?origin_validation, "CORS: policy compiled");

        let allow_any_header = policy.allow_headers.iter().any(|h| h == "*");
        let allow_methods_value = policy
            .allow_methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let allow_headers_value = policy.allow_headers.join(", ");
        let expose_headers_value =
            (!policy.expose_headers.is_empty()).then(|| policy.expose_headers.join(", "));
        let max_age_secs = policy.max_age.as_secs();
        let max_age_value = (max_age_secs > 0).then(|| max_age_secs.to_string());

        Self {
            policy: Arc::new(policy),
            origin_validation,
            allow_any_header,
            allow_methods_value,
            allow_headers_value,
            expose_headers_value,
            max_age_value,
        }
    }

    /// The policy this middleware is bound to
    #[must_use]
    pub fn policy(&self) -> &CorsPolicy {
        &self.policy
    }

    /// Shared handle to the bound policy
    #[must_use]
    pub fn shared_policy(&self) -> Arc<CorsPolicy> {
        Arc::clone(&self.policy)
    }

    /// Wrap a handler so every call goes through this middleware
    ///
    /// The returned closure is `Send + Sync` and can be invoked concurrently.
    ///
    /// # Example
    ///
    /// ```rust
    /// use brrtcors::dispatcher::{HandlerRequest, HandlerResponse, HeaderVec};
    /// use brrtcors::middleware::{cors_middleware, CorsPolicySource};
    /// use http::Method;
    ///
    /// let handler = cors_middleware(CorsPolicySource::Default)
    ///     .wrap(|_req: &HandlerRequest| HandlerResponse::json(200, serde_json::json!({})));
    ///
    /// let resp = handler(&HandlerRequest::new(Method::GET, "/", HeaderVec::new()));
    /// assert_eq!(resp.status, 200);
    /// ```
    pub fn wrap<H>(self, handler: H) -> impl Fn(&HandlerRequest) -> HandlerResponse + Send + Sync
    where
        H: Fn(&HandlerRequest) -> HandlerResponse + Send + Sync,
    {
        move |req: &HandlerRequest| {
            if let Some(early) = self.before(req) {
                return early;
            }
            let start = Instant::now();
            let mut resp = handler(req);
            self.after(req, &mut resp, start.elapsed());
            resp
        }
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` if the origin is rejected
    ///
    /// `*` is only returned for allow-all policies without credentials.
    fn allowed_origin_value(&self, origin: &str) -> Option<String> {
        if !self.origin_validation.is_allowed(origin) {
            return None;
        }
        if self.origin_validation.is_wildcard() && !self.policy.allow_credentials {
            Some("*".to_string())
        } else {
            Some(origin.to_string())
        }
    }

    /// Check if a request is same-origin (no CORS headers needed)
    ///
    /// Compares the Origin header against `http://<Host>` and `https://<Host>`.
    fn is_same_origin(req: &HandlerRequest, origin: &str) -> bool {
        let host = match req.get_header("host") {
            Some(h) => h,
            None => return false,
        };

        let origin_host = origin
            .strip_prefix("http://")
            .or_else(|| origin.strip_prefix("https://"));
        match origin_host {
            Some(origin_host) => origin_host.eq_ignore_ascii_case(host),
            None => false,
        }
    }

    fn is_preflight(req: &HandlerRequest) -> bool {
        req.method == Method::OPTIONS && req.get_header("access-control-request-method").is_some()
    }

    /// Validate a preflight request
    ///
    /// Checks that the requested method and headers are in the allowed lists.
    ///
    /// # Returns
    ///
    /// * `Some(response)` - Valid preflight request with CORS headers
    /// * `None` - Invalid preflight request (should return 403)
    fn handle_preflight(
        &self,
        req: &HandlerRequest,
        allowed_origin: String,
    ) -> Option<HandlerResponse> {
        let requested_method = req.get_header("access-control-request-method")?;
        let normalized = requested_method.trim().to_ascii_uppercase();
        let requested_method = match normalized.parse::<Method>() {
            Ok(m) => m,
            Err(_) => {
                warn!(
                    requested_method = %requested_method,
                    "CORS preflight: invalid Access-Control-Request-Method"
                );
                return None;
            }
        };

        if !self.policy.allow_methods.contains(&requested_method) {
            warn!(
                requested_method = %requested_method,
                "CORS preflight: method not in allowed methods"
            );
            return None;
        }

        if let Some(headers_str) = req.get_header("access-control-request-headers") {
            if !self.allow_any_header {
                let rejected = headers_str
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .find(|requested| {
                        !self
                            .policy
                            .allow_headers
                            .iter()
                            .any(|h| h.eq_ignore_ascii_case(requested))
                    });
                if let Some(header) = rejected {
                    warn!(header = %header, "CORS preflight: header not in allowed headers");
                    return None;
                }
            }
        }

        let echoed = allowed_origin != "*";
        let mut resp = HandlerResponse::new(
            self.policy.options_response_status,
            HeaderVec::new(),
            Value::Null,
        );
        resp.set_header("access-control-allow-origin", allowed_origin);
        resp.set_header("access-control-allow-methods", self.allow_methods_value.clone());
        resp.set_header("access-control-allow-headers", self.allow_headers_value.clone());
        if self.policy.allow_credentials {
            resp.set_header("access-control-allow-credentials", "true".to_string());
        }
        if let Some(age) = &self.max_age_value {
            resp.set_header("access-control-max-age", age.clone());
        }
        if echoed {
            add_vary_origin(&mut resp);
        }
        Some(resp)
    }
}

impl std::fmt::Debug for CorsMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsMiddleware")
            .field("policy", &self.policy)
            .field("origin_validation", &self.origin_validation)
            .finish()
    }
}

fn forbidden() -> HandlerResponse {
    HandlerResponse::new(403, HeaderVec::new(), Value::Null)
}

/// Add `Origin` to `Vary` without clobbering values set by the handler
fn add_vary_origin(res: &mut HandlerResponse) {
    let vary = match res.get_header("vary") {
        Some(existing)
            if existing
                .split(',')
                .any(|v| v.trim().eq_ignore_ascii_case("origin") || v.trim() == "*") =>
        {
            return;
        }
        Some(existing) if !existing.trim().is_empty() => format!("{}, Origin", existing),
        _ => "Origin".to_string(),
    };
    res.set_header("vary", vary);
}

impl Middleware for CorsMiddleware {
    /// Reject disallowed origins and answer preflight requests
    ///
    /// # Returns
    ///
    /// - `Some(response)` - 403 for a rejected origin or preflight, or the
    ///   accepted preflight response
    /// - `None` - proceed to the handler
    fn before(&self, req: &HandlerRequest) -> Option<HandlerResponse> {
        let origin = req.get_header("origin")?;

        if Self::is_same_origin(req, origin) {
            debug!(origin = %origin, "CORS: same-origin request, skipping CORS");
            return None;
        }

        let allowed_origin = match self.allowed_origin_value(origin) {
            Some(o) => o,
            None => {
                warn!(
                    origin = %origin,
                    method = %req.method,
                    path = %req.path,
                    "CORS: invalid origin"
                );
                return Some(forbidden());
            }
        };

        if Self::is_preflight(req) {
            return Some(self.handle_preflight(req, allowed_origin).unwrap_or_else(forbidden));
        }

        None
    }

    /// Add CORS headers to the response after handler execution
    ///
    /// # Headers Added
    ///
    /// - `Access-Control-Allow-Origin`: `*` or the echoed origin
    /// - `Access-Control-Allow-Credentials`: `true` when enabled
    /// - `Access-Control-Expose-Headers`: when configured
    /// - `Vary: Origin`: when the origin is echoed
    fn after(&self, req: &HandlerRequest, res: &mut HandlerResponse, _latency: Duration) {
        let origin = match req.get_header("origin") {
            Some(o) => o,
            None => return,
        };

        // Preflights were answered in before(); same-origin preflights are not CORS.
        if Self::is_preflight(req) || Self::is_same_origin(req, origin) {
            return;
        }

        let allowed_origin = match self.allowed_origin_value(origin) {
            Some(o) => o,
            None => return,
        };

        let echoed = allowed_origin != "*";
        res.set_header("access-control-allow-origin", allowed_origin);

        if self.policy.allow_credentials {
            res.set_header("access-control-allow-credentials", "true".to_string());
        }

        if let Some(exposed) = &self.expose_headers_value {
            res.set_header("access-control-expose-headers", exposed.clone());
        }

        if echoed {
            add_vary_origin(res);
        }
    }
}
