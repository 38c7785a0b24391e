// SPDX-License-Identifier: MIT

//! Typed error handling for stepfilter
//!
//! Lookup misses and undefined fields are not errors; they resolve to a
//! verdict. Only configuration, collaborator and webhook failures surface here.

use thiserror::Error;

/// Fixed prefix carried by every webhook failure
pub const WEBHOOK_FAILURE_MESSAGE: &str = "Webhook filter failed";

/// Top-level error type for stepfilter
#[derive(Debug, Error)]
pub enum FilterError {
    /// The environment referenced by the evaluation does not exist
    #[error("Environment is not found: {environment_id}")]
    EnvironmentNotFound { environment_id: String },

    /// The environment has no API key to sign webhook requests with
    #[error("Environment {environment_id} has no API key to sign webhook requests")]
    MissingApiKey { environment_id: String },

    /// Configuration errors (invalid env vars, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Webhook transport error, timeout, non-2xx status or undecodable body
    #[error("Webhook filter failed: {url}: {reason}")]
    Webhook { url: String, reason: String },

    /// A repository collaborator failed (not a miss)
    #[error("Repository error: {0}")]
    Repository(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

impl FilterError {
    /// Create a webhook failure
    pub fn webhook(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Webhook {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a repository error
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository(message.into())
    }

    /// True when the evaluation was aborted by a failing webhook call
    pub fn is_webhook_failure(&self) -> bool {
        matches!(self, Self::Webhook { .. })
    }

    /// True for errors caused by missing or invalid configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::EnvironmentNotFound { .. } | Self::MissingApiKey { .. } | Self::Config(_)
        )
    }
}

impl From<&str> for FilterError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for FilterError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_error_carries_fixed_message() {
        let err = FilterError::webhook("https://example.com/hook", "status 500");
        assert!(err.is_webhook_failure());
        assert!(!err.is_configuration_error());
        assert!(err.to_string().starts_with(WEBHOOK_FAILURE_MESSAGE));
        assert_eq!(
            err.to_string(),
            "Webhook filter failed: https://example.com/hook: status 500"
        );
    }

    #[test]
    fn test_configuration_errors() {
        let err = FilterError::EnvironmentNotFound {
            environment_id: "env-1".to_string(),
        };
        assert!(err.is_configuration_error());
        assert!(!err.is_webhook_failure());
        assert!(FilterError::config("bad timeout").is_configuration_error());
    }

    #[test]
    fn test_from_string() {
        let err: FilterError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
