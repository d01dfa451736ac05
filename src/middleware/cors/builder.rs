use std::sync::Arc;
use std::time::Duration;

use http::Method;

use super::{CorsConfigError, CorsPolicy};
use crate::config::CorsConf;

/// Builder for creating a [`CorsPolicy`] with a fluent API
///
/// Every setter takes the builder by value and hands it back, so a builder is
/// owned by exactly one caller while it is configured. `build()` borrows and
/// returns a fresh snapshot each time.
///
/// # Example
///
/// ```rust
/// use brrtcors::middleware::{cors_middleware, CorsBuilder};
/// use http::Method;
///
/// let policy = CorsBuilder::new()
///     .with_origins(&["https://example.com", "https://api.example.com"])
///     .with_methods(&[Method::GET, Method::POST, Method::PUT])
///     .with_headers(&["Content-Type", "Authorization", "X-Custom-Header"])
///     .with_credentials(true)
///     .build();
///
/// let cors = cors_middleware(policy);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    policy: CorsPolicy,
}

impl CorsBuilder {
    /// Create a new builder seeded with the default policy
    ///
    /// See [`CorsPolicy::default()`] for the values, and its warning about
    /// production use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: CorsPolicy::default(),
        }
    }

    /// Create a builder starting from a copy of `policy`
    #[must_use]
    pub fn from_policy(policy: CorsPolicy) -> Self {
        Self { policy }
    }

    /// Create a builder from a deserialized configuration
    ///
    /// # Errors
    ///
    /// Returns [`CorsConfigError::InvalidMethod`] if a configured method is not
    /// a valid HTTP method token.
    pub fn from_conf(conf: &CorsConf) -> Result<Self, CorsConfigError> {
        Ok(Self {
            policy: CorsPolicy::try_from(conf)?,
        })
    }

    /// Set allowed origins, replacing the current list
    ///
    /// Use `&["*"]` to allow all origins. With credentials enabled the
    /// middleware echoes the request origin instead of sending `*`.
    #[must_use]
    pub fn with_origins(mut self, origins: &[&str]) -> Self {
        self.policy.allow_origins = origins.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set allowed HTTP methods, replacing the current list
    #[must_use]
    pub fn with_methods(mut self, methods: &[Method]) -> Self {
        self.policy.allow_methods = methods.to_vec();
        self
    }

    /// Set allowed request headers, replacing the current list
    ///
    /// Use `&["*"]` to allow all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: &[&str]) -> Self {
        self.policy.allow_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Enable or disable credentials
    ///
    /// When enabled, sets `Access-Control-Allow-Credentials: true` header.
    #[must_use]
    pub fn with_credentials(mut self, allow: bool) -> Self {
        self.policy.allow_credentials = allow;
        self
    }

    /// Set headers to expose to JavaScript, replacing the current list
    #[must_use]
    pub fn with_expose_headers(mut self, headers: &[&str]) -> Self {
        self.policy.expose_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set preflight cache duration
    ///
    /// Sent in whole seconds; a zero duration omits `Access-Control-Max-Age`.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.policy.max_age = max_age;
        self
    }

    /// Allow every origin regardless of the origin list
    #[must_use]
    pub fn with_all_origins(mut self, allow: bool) -> Self {
        self.policy.allow_all_origins = allow;
        self
    }

    /// Enable `*` patterns inside origin entries (e.g. `https://*.example.com`)
    #[must_use]
    pub fn with_wildcard(mut self, allow: bool) -> Self {
        self.policy.allow_wildcard = allow;
        self
    }

    /// Set a custom predicate consulted when no configured origin matches
    #[must_use]
    pub fn with_origin_func<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.policy.allow_origin_func = Some(Arc::new(validator));
        self
    }

    /// Set the status code of an accepted preflight response (default 204)
    #[must_use]
    pub fn with_options_status(mut self, status: u16) -> Self {
        self.policy.options_response_status = status;
        self
    }

    /// Return the finalized policy
    ///
    /// No validation is performed; use [`CorsBuilder::try_build()`] to reject
    /// malformed configurations.
    #[must_use]
    pub fn build(&self) -> CorsPolicy {
        self.policy.clone()
    }

    /// Return the finalized policy after [`CorsPolicy::validate()`]
    ///
    /// # Errors
    ///
    /// Returns the first [`CorsConfigError`] found by validation.
    pub fn try_build(&self) -> Result<CorsPolicy, CorsConfigError> {
        self.policy.validate()?;
        Ok(self.policy.clone())
    }
}
