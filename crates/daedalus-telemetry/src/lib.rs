//! Structured logging for the Daedalus route dispatch core.
//!
//! The dispatch crates emit `tracing` events:
//!
//! | Level | Event | Fields |
//! |-------|-------|--------|
//! | `debug` | route prepared | `route`, `method`, `uri`, `arguments` |
//! | `debug` | route finalized | `route`, `chain` |
//! | `debug` | callable resolved | `callable`, `pattern` |
//! | `debug` | building middleware chain | `layers` |
//! | `trace` | entering middleware | `middleware` |
//! | `trace` | applying captured output | `route`, `mode`, `bytes` |
//! | `warn` | route group dropped before finalize | `route` |
//!
//! This crate installs a `tracing-subscriber` registry that writes them as
//! JSON (production) or pretty text (development).

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
