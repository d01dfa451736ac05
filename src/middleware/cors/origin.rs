use regex::Regex;
use tracing::warn;

use super::{CorsPolicy, OriginValidator};

/// Origin validation strategy compiled once from a [`CorsPolicy`]
#[derive(Clone)]
pub(crate) enum OriginValidation {
    /// Wildcard (allow all origins)
    Wildcard,
    /// Exact matches, then subdomain patterns, then the custom validator
    Rules {
        exact: Vec<String>,
        patterns: Vec<Regex>,
        custom: Option<OriginValidator>,
    },
}

impl std::fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Rules {
                exact,
                patterns,
                custom,
            } => f
                .debug_struct("Rules")
                .field("exact", exact)
                .field(
                    "patterns",
                    &patterns.iter().map(|re| re.as_str()).collect::<Vec<_>>(),
                )
                .field("custom", &custom.as_ref().map(|_| "<function>"))
                .finish(),
        }
    }
}

impl OriginValidation {
    pub(crate) fn from_policy(policy: &CorsPolicy) -> Self {
        if policy.allows_all_origins() {
            return OriginValidation::Wildcard;
        }

        let mut exact = Vec::new();
        let mut patterns = Vec::new();
        for origin in policy.allow_origins.iter().map(|o| normalize_origin(o)) {
            if policy.allow_wildcard && origin.contains('*') {
                match compile_pattern(&origin) {
                    Ok(re) => patterns.push(re),
                    Err(e) => warn!(origin = %origin, error = %e, "CORS: skipping origin pattern"),
                }
            } else {
                exact.push(origin);
            }
        }

        OriginValidation::Rules {
            exact,
            patterns,
            custom: policy.allow_origin_func.clone(),
        }
    }

    /// Check if an origin is allowed
    pub(crate) fn is_allowed(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Wildcard => true,
            OriginValidation::Rules {
                exact,
                patterns,
                custom,
            } => {
                exact.iter().any(|o| o == origin)
                    || patterns.iter().any(|re| re.is_match(origin))
                    || custom.as_ref().is_some_and(|validator| validator(origin))
            }
        }
    }

    pub(crate) fn is_wildcard(&self) -> bool {
        matches!(self, OriginValidation::Wildcard)
    }
}

/// Configured origins are matched trimmed and lower-cased, the form browsers send
fn normalize_origin(origin: &str) -> String {
    origin.trim().to_ascii_lowercase()
}

/// `https://*.example.com` → `^https://[^/]*\.example\.com$`
fn compile_pattern(origin: &str) -> Result<Regex, regex::Error> {
    let body = origin
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^/]*");
    Regex::new(&format!("^{}$", body))
}
