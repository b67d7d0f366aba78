//! Configuration for tracing behavior.

use std::time::Duration;

use crate::error::{Error, Result};

/// Environment key for [`TracingConfig::trace_sql_parameters`].
pub const ENV_TRACE_SQL_PARAMETERS: &str = "SW_JDBC_TRACE_SQL_PARAMETERS";

/// Environment key for [`TracingConfig::sql_parameters_max_length`].
pub const ENV_SQL_PARAMETERS_MAX_LENGTH: &str = "SW_JDBC_SQL_PARAMETERS_MAX_LENGTH";

/// Configuration options for statement tracing.
///
/// # Example
///
/// ```rust
/// use statement_tracing::TracingConfig;
/// use std::time::Duration;
///
/// let config = TracingConfig::default()
///     .with_parameter_tracing(true)
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether to attach bound parameter values to spans.
    /// Default: `false` (parameters may contain sensitive data)
    pub trace_sql_parameters: bool,

    /// Maximum length of the rendered parameter string. `0` disables truncation.
    /// Default: 512
    pub sql_parameters_max_length: usize,

    /// Threshold for logging slow calls at WARN level.
    /// Default: 500ms
    pub slow_query_threshold: Duration,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            trace_sql_parameters: false,
            sql_parameters_max_length: 512,
            slow_query_threshold: Duration::from_millis(500),
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parameter capture in spans.
    ///
    /// **Security Warning**: Bound parameters often contain user input and
    /// potentially sensitive data. Only enable in development or controlled environments.
    pub fn with_parameter_tracing(mut self, enabled: bool) -> Self {
        self.trace_sql_parameters = enabled;
        self
    }

    /// Set the maximum length of the rendered parameter string.
    pub fn with_parameters_max_length(mut self, max_length: usize) -> Self {
        self.sql_parameters_max_length = max_length;
        self
    }

    /// Set the threshold for slow call warnings.
    ///
    /// Calls taking longer than this duration will be logged at WARN level
    /// with the `slow_query` field set to `true`.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Create a development-friendly configuration with parameter capture enabled.
    ///
    /// **Warning**: Do not use in production as it logs all bound parameters.
    pub fn development() -> Self {
        Self {
            trace_sql_parameters: true,
            sql_parameters_max_length: 0,
            slow_query_threshold: Duration::from_millis(100),
        }
    }

    /// Create a production-safe configuration with minimal overhead.
    pub fn production() -> Self {
        Self {
            trace_sql_parameters: false,
            sql_parameters_max_length: 512,
            slow_query_threshold: Duration::from_secs(1),
        }
    }

    /// Load the configuration from process environment variables.
    ///
    /// Unset variables keep their default values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_TRACE_SQL_PARAMETERS) {
            config.trace_sql_parameters = parse_bool(ENV_TRACE_SQL_PARAMETERS, &value)?;
        }

        if let Some(value) = lookup(ENV_SQL_PARAMETERS_MAX_LENGTH) {
            config.sql_parameters_max_length =
                value.trim().parse().map_err(|_| Error::InvalidConfig {
                    key: ENV_SQL_PARAMETERS_MAX_LENGTH,
                    value: value.clone(),
                })?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}
