use std::fmt;

/// CORS configuration error
///
/// Returned by [`CorsPolicy::validate()`](super::CorsPolicy::validate),
/// [`CorsBuilder::try_build()`](super::CorsBuilder::try_build) and the
/// conversion from a [`CorsConf`](crate::config::CorsConf). The middleware
/// itself never fails; a policy that is not validated is applied as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// A configured method is not a valid HTTP method token
    InvalidMethod {
        /// The rejected method string
        method: String,
    },
    /// Invalid origin format
    ///
    /// The origin string does not match the expected format (scheme://host:port).
    InvalidOriginFormat {
        /// The invalid origin string
        origin: String,
    },
    /// `allow_all_origins` is set while specific origins are also listed
    AllOriginsConflict,
    /// No origin rule is configured, so every cross-origin request is rejected
    EmptyOrigins,
    /// The preflight response status is not a 2xx code
    InvalidOptionsStatus {
        /// The rejected status code
        status: u16,
    },
}

impl fmt::Display for CorsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsConfigError::InvalidMethod { method } => {
                write!(
                    f,
                    "CORS configuration error: '{}' is not a valid HTTP method.",
                    method
                )
            }
            CorsConfigError::InvalidOriginFormat { origin } => {
                write!(
                    f,
                    "CORS configuration error: Invalid origin format '{}'. \
                    Expected format: scheme://host:port (e.g., https://example.com)",
                    origin
                )
            }
            CorsConfigError::AllOriginsConflict => {
                write!(
                    f,
                    "CORS configuration error: all origins are allowed, \
                    the explicit origin list is not needed."
                )
            }
            CorsConfigError::EmptyOrigins => {
                write!(
                    f,
                    "CORS configuration error: no allowed origins configured. \
                    Specify at least one origin, '*', or an origin validator."
                )
            }
            CorsConfigError::InvalidOptionsStatus { status } => {
                write!(
                    f,
                    "CORS configuration error: preflight response status {} is not a 2xx code.",
                    status
                )
            }
        }
    }
}

impl std::error::Error for CorsConfigError {}
