// src/config.rs
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub ami: AmiServer,
    pub survey_extension: String,
    pub receiver_base_url: String,
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
    pub fail_fast_on_auth: bool,
    pub conversation_ttl: Duration,
    pub sweep_interval: Duration,
    pub delivery_timeout: Duration,
    pub block_queue_capacity: usize,
    pub delivery_queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct AmiServer {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
}

impl AmiServer {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Config {
            ami: AmiServer {
                host: lookup("AMI_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                port: parse_or(&lookup, "AMI_PORT", 5038)?,
                username: required("AMI_USERNAME")?,
                secret: required("AMI_SECRET")?,
            },
            survey_extension: required("SURVEY_EXTENSION")?,
            receiver_base_url: required("RECEIVER_BASE_URL")?,
            reconnect_delay: Duration::from_secs(parse_or(&lookup, "RECONNECT_DELAY_SECS", 5)?),
            handshake_timeout: Duration::from_secs(parse_or(&lookup, "HANDSHAKE_TIMEOUT_SECS", 10)?),
            fail_fast_on_auth: parse_or(&lookup, "AMI_FAIL_FAST_ON_AUTH", false)?,
            conversation_ttl: Duration::from_secs(parse_or(&lookup, "CONVERSATION_TTL_SECS", 3600)?),
            sweep_interval: Duration::from_secs(parse_or(&lookup, "SWEEP_INTERVAL_SECS", 60)?),
            delivery_timeout: Duration::from_millis(parse_or(&lookup, "DELIVERY_TIMEOUT_MS", 2000)?),
            block_queue_capacity: parse_or(&lookup, "BLOCK_QUEUE_CAPACITY", 1024)?,
            delivery_queue_capacity: parse_or(&lookup, "DELIVERY_QUEUE_CAPACITY", 1024)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("AMI_USERNAME", "survey"),
        ("AMI_SECRET", "s3cret"),
        ("SURVEY_EXTENSION", "3459"),
        ("RECEIVER_BASE_URL", "http://127.0.0.1:8000"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(REQUIRED)).unwrap();

        assert_eq!(config.ami.endpoint(), "127.0.0.1:5038");
        assert_eq!(config.survey_extension, "3459");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.delivery_timeout, Duration::from_millis(2000));
        assert_eq!(config.conversation_ttl, Duration::from_secs(3600));
        assert!(!config.fail_fast_on_auth);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("AMI_HOST", "pbx.local"),
            ("AMI_PORT", "5039"),
            ("RECONNECT_DELAY_SECS", "1"),
            ("AMI_FAIL_FAST_ON_AUTH", "true"),
        ]);

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.ami.endpoint(), "pbx.local:5039");
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert!(config.fail_fast_on_auth);
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("AMI_USERNAME")));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("AMI_PORT", "not-a-port"));

        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AMI_PORT", .. }));
    }
}
