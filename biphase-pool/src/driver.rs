//! Vendor driver seams.
//!
//! The pool never talks to a database directly; it drives these traits,
//! which a vendor integration implements over its blocking client. All
//! calls may block on synchronous driver I/O.

use std::sync::Arc;
use std::time::Duration;

use biphase_core::{DriverError, XaResource};

/// A set of rows produced by a query.
pub trait ResultSet: Send {
    /// Releases the result set.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// A prepared statement bound to one logical connection.
pub trait PreparedStatement: Send {
    /// Sets the timeout applied when the statement executes.
    fn set_query_timeout(&mut self, timeout: Duration) -> Result<(), DriverError>;

    /// Executes the statement and returns its result set.
    fn execute_query(&mut self) -> Result<Box<dyn ResultSet>, DriverError>;

    /// Releases the statement and its driver-side resources.
    ///
    /// Closing an already-closed statement is a driver-defined no-op.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// The logical connection used by callers.
///
/// Obtained from an [`XaConnection`]; the physical link stays open when a
/// logical connection is closed.
pub trait Connection: Send + Sync {
    /// Prepares `sql` for execution.
    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement>, DriverError>;

    /// Sets the transaction isolation level to one of the
    /// `TRANSACTION_*` constants.
    fn set_transaction_isolation(&self, level: i32) -> Result<(), DriverError>;

    /// Sets the cursor holdability to one of the `*_CURSORS_*` constants.
    fn set_holdability(&self, holdability: i32) -> Result<(), DriverError>;

    /// Enables or disables auto-commit.
    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DriverError>;

    /// Clears the warnings accumulated on this connection.
    fn clear_warnings(&self) -> Result<(), DriverError>;

    /// Native validity probe.
    ///
    /// Only meaningful on drivers whose [`api_version`](Self::api_version)
    /// is at least 4; older drivers may return an error, which makes the
    /// pool fall back to the configured test query for the rest of the
    /// connection's life.
    fn is_valid(&self, timeout: Duration) -> Result<bool, DriverError>;

    /// The driver API generation this connection implements (3 or 4).
    ///
    /// Version 4 advertises the native validity probe.
    fn api_version(&self) -> u8 {
        3
    }

    /// Releases the logical connection.
    fn close(&self) -> Result<(), DriverError>;
}

/// A physical connection capable of participating in XA transactions.
pub trait XaConnection: Send + Sync {
    /// Returns the logical connection backed by this physical connection.
    fn connection(&self) -> Result<Arc<dyn Connection>, DriverError>;

    /// Returns the XA resource handed to the transaction manager.
    fn xa_resource(&self) -> Arc<dyn XaResource>;

    /// Closes the physical connection.
    fn close(&self) -> Result<(), DriverError>;
}
