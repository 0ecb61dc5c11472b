use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::insurance::DEFAULT_VERIFY_DELAY;
use crate::location::DEFAULT_GEOCODER_URL;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    #[default]
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub booking_api_url: String,
    pub booking_api_token: Option<String>,
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub http_timeout: Duration,
    pub insurance_verify_delay: Duration,
    pub geocoder_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let booking_api_url = var("BOOKING_API_URL").ok_or(ConfigError::Missing("BOOKING_API_URL"))?;
        if !booking_api_url.starts_with("http://") && !booking_api_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "BOOKING_API_URL",
                value: booking_api_url,
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: "BIND_ADDR",
                value: bind_addr.clone(),
                reason: e.to_string(),
            }
        })?;

        let log_format = match var("LOG_FORMAT").as_deref() {
            None => LogFormat::default(),
            Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected 'pretty' or 'json'".to_string(),
                });
            }
        };

        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("HTTP_TIMEOUT_SECS", &raw)?),
            None => DEFAULT_HTTP_TIMEOUT,
        };
        let insurance_verify_delay = match var("INSURANCE_VERIFY_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_number("INSURANCE_VERIFY_DELAY_MS", &raw)?),
            None => DEFAULT_VERIFY_DELAY,
        };

        Ok(Self {
            booking_api_url,
            booking_api_token: var("BOOKING_API_TOKEN"),
            bind_addr,
            log_format,
            http_timeout,
            insurance_verify_delay,
            geocoder_url: var("GEOCODER_URL").unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
        })
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
