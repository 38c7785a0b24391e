// SPDX-License-Identifier: MIT

//! Runtime settings read from the process environment

use std::env;
use std::time::Duration;

use crate::error::FilterError;
use crate::store::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};

pub const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SIGNATURE_HEADER: &str = "nv-hmac-256";

const TIMEOUT_VAR: &str = "STEPFILTER_WEBHOOK_TIMEOUT_MS";
const HEADER_VAR: &str = "STEPFILTER_SIGNATURE_HEADER";
const CACHE_TTL_VAR: &str = "STEPFILTER_SUBSCRIBER_CACHE_TTL_MS";
const CACHE_CAPACITY_VAR: &str = "STEPFILTER_SUBSCRIBER_CACHE_CAPACITY";

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Upper bound for a single webhook filter call
    pub webhook_timeout: Duration,
    /// Header carrying the request signature
    pub signature_header: String,
    /// How long a cached subscriber is served before it is fetched again
    pub subscriber_cache_ttl: Duration,
    pub subscriber_cache_capacity: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            webhook_timeout: Duration::from_millis(DEFAULT_WEBHOOK_TIMEOUT_MS),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            subscriber_cache_ttl: DEFAULT_CACHE_TTL,
            subscriber_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl FilterConfig {
    pub fn from_env() -> Result<Self, FilterError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, FilterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                FilterError::config(format!("{} must be a number of milliseconds, got '{}'", TIMEOUT_VAR, raw))
            })?;
            if millis == 0 {
                return Err(FilterError::config(format!("{} must be greater than zero", TIMEOUT_VAR)));
            }
            config.webhook_timeout = Duration::from_millis(millis);
        }

        if let Some(header) = lookup(HEADER_VAR) {
            let header = header.trim();
            if header.is_empty() {
                return Err(FilterError::config(format!("{} must not be empty", HEADER_VAR)));
            }
            config.signature_header = header.to_string();
        }

        if let Some(raw) = lookup(CACHE_TTL_VAR) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                FilterError::config(format!("{} must be a number of milliseconds, got '{}'", CACHE_TTL_VAR, raw))
            })?;
            config.subscriber_cache_ttl = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(CACHE_CAPACITY_VAR) {
            let capacity: usize = raw.trim().parse().map_err(|_| {
                FilterError::config(format!("{} must be a positive integer, got '{}'", CACHE_CAPACITY_VAR, raw))
            })?;
            if capacity == 0 {
                return Err(FilterError::config(format!("{} must be greater than zero", CACHE_CAPACITY_VAR)));
            }
            config.subscriber_cache_capacity = capacity;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FilterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, FilterConfig::default());
        assert_eq!(config.webhook_timeout, Duration::from_millis(5_000));
        assert_eq!(config.signature_header, "nv-hmac-256");
        assert_eq!(config.subscriber_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.subscriber_cache_capacity, 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = FilterConfig::from_lookup(lookup(&[
            (TIMEOUT_VAR, "1500"),
            (HEADER_VAR, "x-signature"),
        ]))
        .unwrap();
        assert_eq!(config.webhook_timeout, Duration::from_millis(1500));
        assert_eq!(config.signature_header, "x-signature");
    }

    #[test]
    fn test_invalid_timeout() {
        let err = FilterConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "soon")])).unwrap_err();
        assert!(err.is_configuration_error());

        let err = FilterConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "0")])).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_empty_header() {
        assert!(FilterConfig::from_lookup(lookup(&[(HEADER_VAR, "  ")])).is_err());
    }

    #[test]
    fn test_subscriber_cache_settings() {
        let config = FilterConfig::from_lookup(lookup(&[
            (CACHE_TTL_VAR, "0"),
            (CACHE_CAPACITY_VAR, "250"),
        ]))
        .unwrap();
        assert_eq!(config.subscriber_cache_ttl, Duration::ZERO);
        assert_eq!(config.subscriber_cache_capacity, 250);

        let err = FilterConfig::from_lookup(lookup(&[(CACHE_CAPACITY_VAR, "0")])).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(FilterConfig::from_lookup(lookup(&[(CACHE_TTL_VAR, "-5")])).is_err());
    }
}
