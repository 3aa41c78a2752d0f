//! # Daedalus Config
//!
//! Typed, layered configuration for the Daedalus route dispatch core.
//!
//! Configuration is loaded in layers, later ones overriding earlier ones:
//!
//! 1. defaults or a preset ([`DaedalusConfig::development`],
//!    [`DaedalusConfig::production`])
//! 2. a TOML or JSON file, or an in-memory string
//! 3. environment variables named `PREFIX__SECTION__KEY`
//!
//! The result is validated before it is returned.
//!
//! ## Example
//!
//! ```toml
//! [routes]
//! output_buffering = "prepend"   # false, "prepend" or "append"
//!
//! [routes.arguments]
//! lang = "en"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! directives = ["daedalus_route=debug"]
//! ```
//!
//! ```no_run
//! use daedalus_config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("daedalus.toml")?
//!     .with_env_prefix("DAEDALUS")
//!     .load()?;
//!
//! daedalus_telemetry::init_logging(&config.logging.to_log_config())?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::DaedalusConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingConfig, RouteDefaults};
