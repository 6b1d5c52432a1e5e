//! Error types for Biphase operations.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A failure reported by a vendor driver or another external collaborator.
///
/// Carries a human-readable message and, optionally, the underlying error.
/// The inner error is wrapped in `Arc` so the type stays `Clone`.
#[derive(Debug, Clone)]
pub struct DriverError {
    message: String,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl DriverError {
    /// Creates a driver error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a driver error wrapping an underlying error.
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for DriverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| &**e as &(dyn StdError + 'static))
    }
}

/// The main error type for Biphase operations.
///
/// Covers the resource-pooling error kinds (dead connections, delist and
/// requeue failures, state machine rejections) as well as untranslated
/// driver and configuration errors. Translated kinds keep the error that
/// triggered them as their `source`.
#[derive(Debug, Error, Clone)]
pub enum BiphaseError {
    /// The physical connection is unusable and must be discarded.
    #[error("{message}")]
    ConnectionDead {
        /// Description of how the connection was found dead.
        message: String,
        /// The failure that revealed the dead connection, if any.
        #[source]
        cause: Option<Box<BiphaseError>>,
    },

    /// The transaction manager already rolled the work back during delist.
    ///
    /// The enclosing transaction must be treated as rolled back.
    #[error("unilateral rollback of {connection}")]
    UnilateralRollback {
        /// Description of the affected pooled connection.
        connection: String,
        /// The delist failure reported by the transaction manager.
        #[source]
        cause: Option<Box<BiphaseError>>,
    },

    /// Delisting from the current transaction failed.
    #[error("error delisting {connection}")]
    DelistFailed {
        /// Description of the affected pooled connection.
        connection: String,
        /// The underlying system error.
        #[source]
        cause: Option<Box<BiphaseError>>,
    },

    /// The pool rejected the connection on requeue.
    ///
    /// The usage count has been restored to its pre-release value before
    /// this error propagates: a connection that failed to return to the
    /// pool remains owned by its caller.
    #[error("error requeuing {connection}")]
    RequeueFailed {
        /// Description of the affected pooled connection.
        connection: String,
        /// The rejection reported by the pool.
        #[source]
        cause: Option<Box<BiphaseError>>,
    },

    /// The state machine rejected a transition request.
    ///
    /// This is a programming error, not a runtime condition.
    #[error("cannot change state from {from} to {to}")]
    InvalidTransition {
        /// Name of the current state.
        from: String,
        /// Name of the requested state.
        to: String,
    },

    /// An untranslated vendor driver error.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation not valid in the current state.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl BiphaseError {
    /// Returns `true` if this error means the physical connection is dead.
    pub fn is_connection_dead(&self) -> bool {
        matches!(self, Self::ConnectionDead { .. })
    }

    /// Returns `true` if this error reports a unilateral rollback.
    ///
    /// A caller observing this on release must treat the enclosing
    /// transaction as rolled back.
    pub fn is_unilateral_rollback(&self) -> bool {
        matches!(self, Self::UnilateralRollback { .. })
    }
}

/// A specialized `Result` type for Biphase operations.
pub type Result<T> = std::result::Result<T, BiphaseError>;
