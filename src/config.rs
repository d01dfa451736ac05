//! # Configuration Module
//!
//! Serializable CORS configuration, mirroring [`CorsPolicy`] with plain types so it
//! can live in a service's `config.yaml`.
//!
//! ## Format
//!
//! ```yaml
//! cors:
//!   allow_origins: ["https://app.example.com"]
//!   allow_methods: ["GET", "POST"]
//!   allow_headers: ["Content-Type", "Authorization"]
//!   expose_headers: ["X-Total-Count"]
//!   allow_credentials: true
//!   max_age: 12h        # or integer seconds, e.g. 43200
//! ```
//!
//! A file holds the fields under a `cors:` key. A document without that key is
//! read as the section itself only when every top-level key is a CORS setting;
//! anything else is an error. Unknown keys inside the section are rejected.
//!
//! ## Defaults
//!
//! An omitted `allow_origins` is empty and an omitted `allow_credentials` is
//! `false`, so a missing or incomplete section denies cross-origin requests.
//! The remaining fields default to the values of [`CorsPolicy::default()`].
//!
//! ## `max_age`
//!
//! Either an integer or a duration string. Integers are whole **seconds**, not
//! nanoseconds as a Go `time.Duration` would read them. Strings follow Go's
//! duration syntax: `12h`, `1h30m`, `1.5h`, `90s`, `300ms` (units `h`, `m`,
//! `s`, `ms`, `us`/`µs`, `ns`). `Access-Control-Max-Age` is sent in whole
//! seconds, so sub-second values omit the header.
//!
//! ## Usage
//!
//! ```rust
//! use brrtcors::config::CorsConf;
//! use brrtcors::middleware::{cors_middleware, CorsPolicy};
//!
//! let conf = CorsConf::from_yaml_str("cors:\n  allow_origins: [\"https://example.com\"]\n  max_age: 1h").unwrap();
//! let policy = CorsPolicy::try_from(&conf).unwrap();
//! assert_eq!(policy.max_age.as_secs(), 3600);
//! assert!(!policy.allow_credentials);
//! let cors = cors_middleware(policy);
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::middleware::{CorsConfigError, CorsPolicy, DEFAULT_MAX_AGE};

/// CORS settings as they appear in a configuration file
///
/// [`CorsConf::default()`] is what an empty section means: no origins and no
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConf {
    /// Allowed origins; `"*"` allows all. Empty when omitted.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    /// Allowed HTTP methods
    #[serde(default = "default_allow_methods")]
    pub allow_methods: Vec<String>,
    /// Allowed request headers
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Vec<String>,
    /// Headers exposed to the browser
    #[serde(default = "default_expose_headers")]
    pub expose_headers: Vec<String>,
    /// Whether credentials can be included; `false` when omitted
    #[serde(default)]
    pub allow_credentials: bool,
    /// Preflight cache duration
    #[serde(default = "default_max_age", with = "max_age_serde")]
    pub max_age: Duration,
    /// Treat `*` inside origins as a subdomain pattern
    #[serde(default)]
    pub allow_wildcard: bool,
    /// Status code of an accepted preflight response
    #[serde(default = "default_options_response_status")]
    pub options_response_status: u16,
}

impl Default for CorsConf {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            expose_headers: default_expose_headers(),
            allow_credentials: false,
            max_age: default_max_age(),
            allow_wildcard: false,
            options_response_status: default_options_response_status(),
        }
    }
}

fn default_allow_methods() -> Vec<String> {
    CorsPolicy::default()
        .allow_methods
        .iter()
        .map(|m| m.as_str().to_string())
        .collect()
}

fn default_allow_headers() -> Vec<String> {
    CorsPolicy::default().allow_headers
}

fn default_expose_headers() -> Vec<String> {
    CorsPolicy::default().expose_headers
}

fn default_max_age() -> Duration {
    DEFAULT_MAX_AGE
}

fn default_options_response_status() -> u16 {
    204
}

/// Key under which a service config file nests the CORS section
const SECTION_KEY: &str = "cors";

/// Keys accepted at the top level of a document without a `cors:` section
const CONF_FIELDS: &[&str] = &[
    "allow_origins",
    "allow_methods",
    "allow_headers",
    "expose_headers",
    "allow_credentials",
    "max_age",
    "allow_wildcard",
    "options_response_status",
];

/// Fail unless every top-level key is a CORS setting
fn ensure_flat_section<'a>(keys: impl IntoIterator<Item = Option<&'a str>>) -> Result<()> {
    for key in keys {
        match key {
            Some(key) if CONF_FIELDS.contains(&key) => {}
            Some(key) => bail!(
                "no '{}' section found and '{}' is not a CORS setting",
                SECTION_KEY,
                key
            ),
            None => bail!("no '{}' section found", SECTION_KEY),
        }
    }
    Ok(())
}

impl CorsConf {
    /// Parse a YAML document
    ///
    /// The fields sit under a `cors:` key, or at the top level when the document
    /// holds nothing else. An empty `cors:` section yields [`CorsConf::default()`].
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML, has no CORS section,
    /// contains an unknown key, or a field has the wrong type.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(content).context("Failed to parse CORS YAML configuration")?;
        let nested = doc.get(SECTION_KEY).cloned();
        let section = match nested {
            Some(section) => section,
            None => {
                let mapping = doc
                    .as_mapping()
                    .ok_or_else(|| anyhow!("no '{}' section found", SECTION_KEY))?;
                ensure_flat_section(mapping.keys().map(serde_yaml::Value::as_str))?;
                doc
            }
        };
        if section.is_null() {
            return Ok(Self::default().warn_if_permissive());
        }
        let conf: Self =
            serde_yaml::from_value(section).context("Invalid CORS configuration section")?;
        Ok(conf.warn_if_permissive())
    }

    /// Parse a JSON document
    ///
    /// Same layout rules as [`CorsConf::from_yaml_str`].
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON, has no CORS section,
    /// contains an unknown key, or a field has the wrong type.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let doc: serde_json::Value =
            serde_json::from_str(content).context("Failed to parse CORS JSON configuration")?;
        let nested = doc.get(SECTION_KEY).cloned();
        let section = match nested {
            Some(section) => section,
            None => {
                let object = doc
                    .as_object()
                    .ok_or_else(|| anyhow!("no '{}' section found", SECTION_KEY))?;
                ensure_flat_section(object.keys().map(|k| Some(k.as_str())))?;
                doc
            }
        };
        if section.is_null() {
            return Ok(Self::default().warn_if_permissive());
        }
        let conf: Self =
            serde_json::from_value(section).context("Invalid CORS configuration section")?;
        Ok(conf.warn_if_permissive())
    }

    fn warn_if_permissive(self) -> Self {
        if self.allow_credentials && self.allow_origins.iter().any(|o| o.trim() == "*") {
            warn!("CORS configuration allows every origin with credentials");
        } else if self.allow_origins.is_empty() {
            warn!("CORS configuration has no allowed origins; cross-origin requests are rejected");
        }
        self
    }
}

/// Load a CORS configuration file
///
/// `.json` files are parsed as JSON; everything else as YAML.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_cors_conf(path: impl AsRef<Path>) -> Result<CorsConf> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CORS configuration '{}'", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let conf = if is_json {
        CorsConf::from_json_str(&content)
    } else {
        CorsConf::from_yaml_str(&content)
    };
    conf.with_context(|| format!("Invalid CORS configuration '{}'", path.display()))
}

impl TryFrom<&CorsConf> for CorsPolicy {
    type Error = CorsConfigError;

    fn try_from(conf: &CorsConf) -> Result<Self, Self::Error> {
        let allow_methods = conf
            .allow_methods
            .iter()
            .map(|m| {
                m.trim()
                    .to_ascii_uppercase()
                    .parse::<Method>()
                    .map_err(|_| CorsConfigError::InvalidMethod { method: m.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsPolicy {
            allow_origins: conf.allow_origins.clone(),
            allow_all_origins: false,
            allow_wildcard: conf.allow_wildcard,
            allow_origin_func: None,
            allow_methods,
            allow_headers: conf.allow_headers.clone(),
            expose_headers: conf.expose_headers.clone(),
            allow_credentials: conf.allow_credentials,
            max_age: conf.max_age,
            options_response_status: conf.options_response_status,
        })
    }
}

impl TryFrom<CorsConf> for CorsPolicy {
    type Error = CorsConfigError;

    fn try_from(conf: CorsConf) -> Result<Self, Self::Error> {
        CorsPolicy::try_from(&conf)
    }
}

/// `allow_all_origins` has no file field; it is written back as a `"*"` origin.
/// Custom origin validators cannot be serialized and are dropped.
impl From<&CorsPolicy> for CorsConf {
    fn from(policy: &CorsPolicy) -> Self {
        let allow_origins = if policy.allow_all_origins {
            vec!["*".to_string()]
        } else {
            policy.allow_origins.clone()
        };
        Self {
            allow_origins,
            allow_methods: policy
                .allow_methods
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            allow_headers: policy.allow_headers.clone(),
            expose_headers: policy.expose_headers.clone(),
            allow_credentials: policy.allow_credentials,
            max_age: policy.max_age,
            allow_wildcard: policy.allow_wildcard,
            options_response_status: policy.options_response_status,
        }
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a `max_age` value
///
/// Bare integers are seconds (`3600`). Anything else uses Go duration syntax:
/// one or more `<number><unit>` pairs such as `12h`, `1h30m`, `1.5h` or `300ms`.
///
/// # Errors
///
/// Returns an error for an empty string, a missing number or unit, an unknown
/// unit, or a value that does not fit in `u64` nanoseconds.
pub fn parse_max_age(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        bail!("invalid duration: empty value");
    }
    let overflow = || anyhow!("invalid duration '{}': overflow", value);

    if value.bytes().all(|b| b.is_ascii_digit()) {
        let secs: u64 = value.parse().map_err(|_| overflow())?;
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u128 = 0;
    let mut rest = value;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        if number.is_empty() || number == "." {
            bail!("invalid duration '{}': missing number before '{}'", value, unit);
        }
        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            "" => bail!("invalid duration '{}': missing unit after '{}'", value, number),
            other => bail!("invalid duration '{}': unknown unit '{}'", value, other),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            bail!("invalid duration '{}': malformed number '{}'", value, number);
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(unit_nanos).ok_or_else(overflow)?;
        if !fraction.is_empty() {
            // Digits past the 18th are below nanosecond resolution for every unit.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits.parse().map_err(|_| overflow())?;
            let scale = 10u128.pow(digits.len() as u32);
            nanos = nanos
                .checked_add(numerator * unit_nanos / scale)
                .ok_or_else(overflow)?;
        }
        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| overflow())?;
    Ok(Duration::from_nanos(nanos))
}

mod max_age_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_max_age(&text)
                .map_err(|e| serde::de::Error::custom(format!("{:#}", e))),
        }
    }
}
