//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use daedalus_core::{Arguments, DispatchResult};
use daedalus_route::{OutputBuffering, Route};
use daedalus_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

/// Defaults applied to every route a dispatcher creates.
///
/// # Example
///
/// ```
/// use daedalus_config::RouteDefaults;
/// use daedalus_route::OutputBuffering;
///
/// let defaults: RouteDefaults = toml::from_str(r#"
///     output_buffering = false
///
///     [arguments]
///     lang = "en"
/// "#).unwrap();
///
/// assert_eq!(defaults.output_buffering, OutputBuffering::Disabled);
/// assert_eq!(defaults.arguments["lang"], "en");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteDefaults {
    /// Output buffering mode: `false`, `"prepend"` or `"append"`.
    #[serde(default)]
    pub output_buffering: OutputBuffering,

    /// Saved arguments every route starts from. A route's own saved
    /// arguments take precedence.
    #[serde(default)]
    pub arguments: Arguments,
}

impl RouteDefaults {
    /// Applies these defaults to a route.
    pub fn apply_to(&self, route: &mut Route) -> DispatchResult<()> {
        route.set_output_buffering(self.output_buffering)?;

        for (name, value) in &self.arguments {
            if !route.saved_arguments().contains_key(name) {
                route.set_argument(name.clone(), value.clone(), true);
            }
        }

        tracing::debug!(
            route = %route.identifier(),
            mode = %self.output_buffering,
            arguments = self.arguments.len(),
            "route defaults applied"
        );
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Extra per-target directives such as `daedalus_route=trace`.
    #[serde(default)]
    pub directives: Vec<String>,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Log span open and close events.
    #[serde(default)]
    pub span_events: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_line_info: bool,

    /// Include thread IDs.
    #[serde(default)]
    pub thread_ids: bool,

    /// Service name reported when logging starts.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            directives: Vec::new(),
            format: LogFormat::default(),
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            service_name: default_service_name(),
        }
    }
}

impl LoggingConfig {
    /// Converts this section into the telemetry crate's [`LogConfig`].
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_config::{LogFormat, LoggingConfig};
    ///
    /// let section = LoggingConfig {
    ///     format: LogFormat::Pretty,
    ///     directives: vec!["daedalus_route=debug".to_string()],
    ///     ..LoggingConfig::default()
    /// };
    ///
    /// let log = section.to_log_config();
    /// assert!(!log.json_format);
    /// assert_eq!(log.filter_string(), "info,daedalus_route=debug");
    /// ```
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            directives: self.directives.clone(),
            json_format: self.format == LogFormat::Json,
            span_events: self.span_events,
            file_line_info: self.file_line_info,
            thread_ids: self.thread_ids,
            include_target: true,
            service_name: self.service_name.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "daedalus".to_string()
}
