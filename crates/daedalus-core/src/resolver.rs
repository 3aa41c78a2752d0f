//! Callable references and their resolution.
//!
//! A route may be registered with a handler instance or with an identifier
//! that names one. Identifiers are resolved through a [`CallableResolver`]
//! the first time the route is invoked, so handlers that are never dispatched
//! are never looked up.
//!
//! # Example
//!
//! ```rust
//! use daedalus_core::resolver::{CallableRef, CallableResolver, HandlerRegistry};
//! use daedalus_core::{FnHandler, HandlerOutput};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(
//!     "users:show",
//!     FnHandler::new(|_req, _res, _args| Box::pin(async { Ok(HandlerOutput::Ignored) })),
//! );
//!
//! let reference = CallableRef::from("users:show");
//! assert!(registry.resolve(&reference).is_ok());
//! assert!(registry.resolve(&CallableRef::from("users:delete")).is_err());
//! ```

use crate::error::{DispatchError, DispatchResult};
use crate::handler::Handler;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A route callable: a handler, or an identifier naming one.
#[derive(Clone)]
pub enum CallableRef {
    /// An invocable handler.
    Handler(Arc<dyn Handler>),
    /// A plain handler name, e.g. `"home"`.
    Named(String),
    /// A `service:method` pair, e.g. `"users:show"`.
    Method {
        /// Service part of the identifier.
        service: String,
        /// Method part of the identifier.
        method: String,
    },
}

impl CallableRef {
    /// Parses an identifier; `service:method` becomes [`CallableRef::Method`].
    #[must_use]
    pub fn parse(identifier: &str) -> Self {
        match identifier.split_once(':') {
            Some((service, method)) if !service.is_empty() && !method.is_empty() => {
                Self::Method {
                    service: service.to_string(),
                    method: method.to_string(),
                }
            }
            _ => Self::Named(identifier.to_string()),
        }
    }

    /// Wraps a handler instance.
    pub fn handler(handler: impl Handler) -> Self {
        Self::Handler(Arc::new(handler))
    }

    /// Returns the identifier text, or `None` for a handler instance.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        match self {
            Self::Handler(_) => None,
            Self::Named(name) => Some(name.clone()),
            Self::Method { service, method } => Some(format!("{service}:{method}")),
        }
    }

    /// Returns whether this already is an invocable handler.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}

impl fmt::Debug for CallableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Method { service, method } => f
                .debug_struct("Method")
                .field("service", service)
                .field("method", method)
                .finish(),
        }
    }
}

impl From<&str> for CallableRef {
    fn from(identifier: &str) -> Self {
        Self::parse(identifier)
    }
}

impl From<String> for CallableRef {
    fn from(identifier: String) -> Self {
        Self::parse(&identifier)
    }
}

impl From<Arc<dyn Handler>> for CallableRef {
    fn from(handler: Arc<dyn Handler>) -> Self {
        Self::Handler(handler)
    }
}

/// Turns callable identifiers into invocable handlers.
pub trait CallableResolver: Send + Sync + 'static {
    /// Resolves `reference`.
    ///
    /// Handler instances resolve to themselves.
    fn resolve(&self, reference: &CallableRef) -> DispatchResult<Arc<dyn Handler>>;
}

/// A name-keyed handler registry.
///
/// Handlers are registered once at startup and looked up by identifier when
/// a route first needs them. `service:method` identifiers use the full
/// `"service:method"` text as key.
///
/// # Thread Safety
///
/// The registry is `Send + Sync` and can be shared across routes behind an
/// `Arc`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under `identifier`, replacing any previous one.
    pub fn register(&mut self, identifier: impl Into<String>, handler: impl Handler) {
        self.handlers.insert(identifier.into(), Arc::new(handler));
    }

    /// Registers a shared handler under `identifier`.
    pub fn register_arc(&mut self, identifier: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(identifier.into(), handler);
    }

    /// Returns whether a handler is registered under `identifier`.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.handlers.contains_key(identifier)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CallableResolver for HandlerRegistry {
    fn resolve(&self, reference: &CallableRef) -> DispatchResult<Arc<dyn Handler>> {
        let identifier = match reference {
            CallableRef::Handler(handler) => return Ok(Arc::clone(handler)),
            other => other.identifier().unwrap_or_default(),
        };

        self.handlers
            .get(&identifier)
            .cloned()
            .ok_or_else(|| DispatchError::resolution(identifier, "callable does not exist"))
    }
}
