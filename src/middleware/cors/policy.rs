use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use url::Url;

use super::CorsConfigError;

/// Custom origin predicate consulted when no configured origin matches
pub type OriginValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Default preflight cache duration (12 hours)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// Resolved CORS policy applied by [`CorsMiddleware`](super::CorsMiddleware)
///
/// A policy is plain data. It is not validated on construction: an empty
/// method list or an unparseable origin simply denies that dimension at
/// request time. Call [`CorsPolicy::validate()`] to catch such mistakes early.
///
/// # Origins
///
/// - `"*"` in `allow_origins` (or `allow_all_origins = true`) allows every origin
/// - With `allow_wildcard = true`, an entry such as `https://*.example.com`
///   matches any subdomain
/// - `allow_origin_func` is consulted when no list entry matches
///
/// When `allow_credentials` is `true` the response never carries a literal `*`;
/// the requesting origin is echoed back instead.
#[derive(Clone)]
pub struct CorsPolicy {
    /// Allowed origins; `"*"` allows all
    pub allow_origins: Vec<String>,
    /// Allow every origin regardless of `allow_origins`
    pub allow_all_origins: bool,
    /// Treat `*` inside an origin entry as a pattern segment
    pub allow_wildcard: bool,
    /// Custom origin predicate
    pub allow_origin_func: Option<OriginValidator>,
    /// Methods a preflight may request
    pub allow_methods: Vec<Method>,
    /// Request headers a preflight may ask for; `"*"` allows all
    pub allow_headers: Vec<String>,
    /// Response headers exposed to browser scripts
    pub expose_headers: Vec<String>,
    /// Send `Access-Control-Allow-Credentials: true`
    pub allow_credentials: bool,
    /// Preflight cache duration sent as `Access-Control-Max-Age`
    pub max_age: Duration,
    /// Status code of an accepted preflight response
    pub options_response_status: u16,
}

impl CorsPolicy {
    /// Whether every origin is allowed, either by flag or by a `"*"` entry
    #[must_use]
    pub fn allows_all_origins(&self) -> bool {
        self.allow_all_origins || self.allow_origins.iter().any(|o| o.trim() == "*")
    }

    /// Check the policy for configuration mistakes
    ///
    /// # Errors
    ///
    /// - [`CorsConfigError::AllOriginsConflict`] if `allow_all_origins` is set
    ///   together with specific origins
    /// - [`CorsConfigError::EmptyOrigins`] if no origin rule exists at all
    /// - [`CorsConfigError::InvalidOriginFormat`] for an origin that is not
    ///   `scheme://host[:port]` (patterns are accepted only with `allow_wildcard`)
    /// - [`CorsConfigError::InvalidOptionsStatus`] for a non-2xx preflight status
    pub fn validate(&self) -> Result<(), CorsConfigError> {
        if !(200..300).contains(&self.options_response_status) {
            return Err(CorsConfigError::InvalidOptionsStatus {
                status: self.options_response_status,
            });
        }

        if self.allow_all_origins {
            if self.allow_origins.iter().any(|o| o.trim() != "*") {
                return Err(CorsConfigError::AllOriginsConflict);
            }
            return Ok(());
        }

        if self.allow_origins.iter().any(|o| o.trim() == "*") {
            return Ok(());
        }

        if self.allow_origins.is_empty() && self.allow_origin_func.is_none() {
            return Err(CorsConfigError::EmptyOrigins);
        }

        for origin in &self.allow_origins {
            validate_origin_format(origin.trim(), self.allow_wildcard)?;
        }
        Ok(())
    }
}

fn validate_origin_format(origin: &str, allow_wildcard: bool) -> Result<(), CorsConfigError> {
    let invalid = || CorsConfigError::InvalidOriginFormat {
        origin: origin.to_string(),
    };

    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        return Err(invalid());
    }
    if origin.ends_with('/') {
        return Err(invalid());
    }

    if origin.contains('*') {
        // Patterns cannot be parsed as URLs; the scheme prefix is all we can check.
        return if allow_wildcard { Ok(()) } else { Err(invalid()) };
    }

    let url = Url::parse(origin).map_err(|_| invalid())?;
    if url.host_str().is_none()
        || url.path() != "/"
        || url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
    {
        return Err(invalid());
    }
    Ok(())
}

/// The permissive default policy
///
/// - `allow_origins`: `["*"]`
/// - `allow_methods`: `GET, POST, PUT, DELETE, OPTIONS, HEAD`
/// - `allow_headers`: `Content-Type, Content-Length, Accept-Encoding, Authorization,
///   accept, origin, Cache-Control, X-Requested-With`
/// - `expose_headers`: `Content-Length, Content-Type`
/// - `allow_credentials`: `true`
/// - `max_age`: 12 hours
///
/// **Do not ship this to production unreviewed.** Any origin may send
/// credentialed requests; the middleware echoes the caller's origin rather
/// than `*`, so browsers will accept it.
impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".into()],
            allow_all_origins: false,
            allow_wildcard: false,
            allow_origin_func: None,
            allow_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
                Method::HEAD,
            ],
            allow_headers: vec![
                "Content-Type".into(),
                "Content-Length".into(),
                "Accept-Encoding".into(),
                "Authorization".into(),
                "accept".into(),
                "origin".into(),
                "Cache-Control".into(),
                "X-Requested-With".into(),
            ],
            expose_headers: vec!["Content-Length".into(), "Content-Type".into()],
            allow_credentials: true,
            max_age: DEFAULT_MAX_AGE,
            options_response_status: 204,
        }
    }
}

/// Shorthand for [`CorsPolicy::default()`]
#[must_use]
pub fn default_policy() -> CorsPolicy {
    CorsPolicy::default()
}

impl fmt::Debug for CorsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsPolicy")
            .field("allow_origins", &self.allow_origins)
            .field("allow_all_origins", &self.allow_all_origins)
            .field("allow_wildcard", &self.allow_wildcard)
            .field(
                "allow_origin_func",
                &self.allow_origin_func.as_ref().map(|_| "<function>"),
            )
            .field("allow_methods", &self.allow_methods)
            .field("allow_headers", &self.allow_headers)
            .field("expose_headers", &self.expose_headers)
            .field("allow_credentials", &self.allow_credentials)
            .field("max_age", &self.max_age)
            .field("options_response_status", &self.options_response_status)
            .finish()
    }
}

/// Origin validators compare by identity: two policies are equal only if they
/// share the same validator instance (or neither has one).
impl PartialEq for CorsPolicy {
    fn eq(&self, other: &Self) -> bool {
        let same_func = match (&self.allow_origin_func, &other.allow_origin_func) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_func
            && self.allow_origins == other.allow_origins
            && self.allow_all_origins == other.allow_all_origins
            && self.allow_wildcard == other.allow_wildcard
            && self.allow_methods == other.allow_methods
            && self.allow_headers == other.allow_headers
            && self.expose_headers == other.expose_headers
            && self.allow_credentials == other.allow_credentials
            && self.max_age == other.max_age
            && self.options_response_status == other.options_response_status
    }
}
