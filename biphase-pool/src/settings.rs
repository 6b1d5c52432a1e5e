//! Application of configured connection settings.
//!
//! Isolation level, cursor holdability, and auto-commit are configured as
//! strings; each is applied independently when a connection is first
//! acquired from the pool, and an unknown value warns and keeps the driver
//! default rather than failing the acquisition.

use biphase_core::DriverError;

use crate::driver::Connection;

/// Dirty reads, non-repeatable reads and phantom reads can occur.
pub const TRANSACTION_READ_UNCOMMITTED: i32 = 1;

/// Dirty reads are prevented.
pub const TRANSACTION_READ_COMMITTED: i32 = 2;

/// Dirty reads and non-repeatable reads are prevented.
pub const TRANSACTION_REPEATABLE_READ: i32 = 4;

/// Dirty reads, non-repeatable reads and phantom reads are prevented.
pub const TRANSACTION_SERIALIZABLE: i32 = 8;

/// Cursors stay open across commit.
pub const HOLD_CURSORS_OVER_COMMIT: i32 = 1;

/// Cursors are closed at commit.
pub const CLOSE_CURSORS_AT_COMMIT: i32 = 2;

/// Translates a configured isolation level to its numeric constant.
///
/// Accepts the symbolic names or a numeric value; returns `None` for
/// anything else.
pub fn translate_isolation_level(isolation_level: &str) -> Option<i32> {
    match isolation_level {
        "READ_UNCOMMITTED" => Some(TRANSACTION_READ_UNCOMMITTED),
        "READ_COMMITTED" => Some(TRANSACTION_READ_COMMITTED),
        "REPEATABLE_READ" => Some(TRANSACTION_REPEATABLE_READ),
        "SERIALIZABLE" => Some(TRANSACTION_SERIALIZABLE),
        other => other.parse::<i32>().ok(),
    }
}

/// Translates a configured cursor holdability to its numeric constant.
///
/// Symbolic names only; returns `None` for anything else.
pub fn translate_cursor_holdability(cursor_holdability: &str) -> Option<i32> {
    match cursor_holdability {
        "HOLD_CURSORS_OVER_COMMIT" => Some(HOLD_CURSORS_OVER_COMMIT),
        "CLOSE_CURSORS_AT_COMMIT" => Some(CLOSE_CURSORS_AT_COMMIT),
        _ => None,
    }
}

pub(crate) fn apply_isolation_level(
    connection: &dyn Connection,
    configured: Option<&str>,
) -> Result<(), DriverError> {
    let Some(isolation_level) = configured else {
        return Ok(());
    };
    match translate_isolation_level(isolation_level) {
        Some(level) => {
            tracing::debug!(isolation_level, "setting connection's isolation level");
            connection.set_transaction_isolation(level)
        }
        None => {
            tracing::warn!(
                isolation_level,
                "invalid transaction isolation level configured, keeping the default isolation level"
            );
            Ok(())
        }
    }
}

pub(crate) fn apply_cursor_holdability(
    connection: &dyn Connection,
    configured: Option<&str>,
) -> Result<(), DriverError> {
    let Some(cursor_holdability) = configured else {
        return Ok(());
    };
    match translate_cursor_holdability(cursor_holdability) {
        Some(holdability) => {
            tracing::debug!(cursor_holdability, "setting connection's cursor holdability");
            connection.set_holdability(holdability)
        }
        None => {
            tracing::warn!(
                cursor_holdability,
                "invalid cursor holdability configured, keeping the default cursor holdability"
            );
            Ok(())
        }
    }
}

pub(crate) fn apply_local_auto_commit(
    connection: &dyn Connection,
    configured: Option<&str>,
) -> Result<(), DriverError> {
    let Some(local_auto_commit) = configured else {
        return Ok(());
    };
    if local_auto_commit.eq_ignore_ascii_case("true") {
        tracing::debug!("setting connection's auto commit to true");
        connection.set_auto_commit(true)
    } else if local_auto_commit.eq_ignore_ascii_case("false") {
        tracing::debug!("setting connection's auto commit to false");
        connection.set_auto_commit(false)
    } else {
        tracing::warn!(
            local_auto_commit,
            "invalid auto commit configured, keeping default auto commit"
        );
        Ok(())
    }
}
