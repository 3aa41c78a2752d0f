//! Main configuration struct.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LogFormat, LoggingConfig, RouteDefaults};

/// Root configuration for the Daedalus dispatch core.
///
/// Unknown fields are rejected at every level, so a typo in a configuration
/// file fails loudly instead of being ignored.
///
/// # Example
///
/// ```
/// use daedalus_config::DaedalusConfig;
/// use daedalus_route::OutputBuffering;
///
/// let config: DaedalusConfig = toml::from_str(r#"
///     [routes]
///     output_buffering = "prepend"
///
///     [logging]
///     level = "debug"
/// "#).unwrap();
///
/// assert_eq!(config.routes.output_buffering, OutputBuffering::Prepend);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DaedalusConfig {
    /// Defaults applied to every route.
    #[serde(default)]
    pub routes: RouteDefaults,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DaedalusConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the log level or a directive does not parse as a filter
    /// - the service name is empty
    /// - a default argument has an empty name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "logging.service_name",
                "must not be empty",
            ));
        }

        let filter = self.logging.to_log_config().filter_string();
        daedalus_telemetry::create_env_filter(&filter)
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;

        if self.routes.arguments.keys().any(|name| name.is_empty()) {
            return Err(ConfigError::validation_error(
                "routes.arguments contains an empty argument name",
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty logs at debug level with source locations and span events.
    ///
    /// ```
    /// use daedalus_config::{DaedalusConfig, LogFormat};
    ///
    /// let config = DaedalusConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.span_events = true;
        config.logging.file_line_info = true;

        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON logs at info level.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.span_events = false;
        config.logging.file_line_info = false;

        config
    }
}
