//! Error types for Daedalus.
//!
//! This module provides the [`DispatchError`] type, which is the standard error
//! type used throughout the dispatch core. Every failure raised by a handler,
//! a middleware layer, a callable resolver or a response body surfaces as a
//! `DispatchError` and propagates unchanged to the caller of `Route::run`.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use thiserror::Error;

/// Result type alias using [`DispatchError`].
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A caller passed a value outside the accepted domain.
    InvalidArgument,
    /// A callable identifier could not be turned into a handler.
    Resolution,
    /// The route handler failed.
    Handler,
    /// A middleware layer failed.
    Middleware,
    /// A middleware or handler refused the request with an explicit status.
    Rejected,
    /// A response body operation failed.
    Stream,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Rejected => StatusCode::BAD_REQUEST,
            Self::InvalidArgument
            | Self::Resolution
            | Self::Handler
            | Self::Middleware
            | Self::Stream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard error type for Daedalus.
///
/// # Example
///
/// ```
/// use daedalus_core::{DispatchError, ErrorCategory};
///
/// fn check_mode(mode: &str) -> Result<(), DispatchError> {
///     if mode != "append" {
///         return Err(DispatchError::invalid_argument("Unknown output buffering mode"));
///     }
///     Ok(())
/// }
///
/// let err = check_mode("bogus").unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::InvalidArgument);
/// ```
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A value outside the accepted domain was supplied.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable error message.
        message: String,
    },

    /// A callable identifier could not be resolved.
    #[error("Cannot resolve callable '{identifier}': {message}")]
    Resolution {
        /// The identifier that failed to resolve.
        identifier: String,
        /// Why resolution failed.
        message: String,
    },

    /// The route handler failed.
    #[error("Handler error: {message}")]
    Handler {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A middleware layer failed.
    #[error("Middleware '{name}' failed: {message}")]
    Middleware {
        /// Name of the failing middleware.
        name: String,
        /// Human-readable error message.
        message: String,
    },

    /// The request was refused with an explicit status.
    #[error("Rejected ({status}): {message}")]
    Rejected {
        /// Status code to answer with.
        status: StatusCode,
        /// Human-readable error message.
        message: String,
    },

    /// A response body operation failed.
    #[error("Stream error: {message}")]
    Stream {
        /// Human-readable error message.
        message: String,
    },

    /// Writing to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a resolution error for the given identifier.
    #[must_use]
    pub fn resolution(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Creates a handler error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler error with a source error.
    pub fn handler_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Handler {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a middleware error.
    #[must_use]
    pub fn middleware(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a rejection with an explicit status code.
    #[must_use]
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Creates a stream error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } => ErrorCategory::InvalidArgument,
            Self::Resolution { .. } => ErrorCategory::Resolution,
            Self::Handler { .. } => ErrorCategory::Handler,
            Self::Middleware { .. } => ErrorCategory::Middleware,
            Self::Rejected { .. } => ErrorCategory::Rejected,
            Self::Stream { .. } | Self::Io(_) => ErrorCategory::Stream,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected { status, .. } => *status,
            _ => self.category().default_status_code(),
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, route: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
            },
            route: route.map(ToString::to_string),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Resolution { .. } => "RESOLUTION_FAILED",
            Self::Handler { .. } => "HANDLER_ERROR",
            Self::Middleware { .. } => "MIDDLEWARE_ERROR",
            Self::Rejected { .. } => "REJECTED",
            Self::Stream { .. } | Self::Io(_) => "STREAM_ERROR",
        }
    }
}

impl From<Infallible> for DispatchError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// Identifier of the route that failed, for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
}
