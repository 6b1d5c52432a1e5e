//! XA resource pooling for the Biphase distributed transaction manager.
//!
//! This crate implements the pooled connection holder: the object wrapping
//! one physical XA connection together with the metadata the pool and the
//! transaction manager need to coordinate two-phase commit around it.
//!
//! A [`PooledConnection`] owns the vendor connection, a bounded
//! [`LruStatementCache`] of reusable prepared statements, and a registry of
//! statements created outside the cache. Its lifecycle is governed by a
//! four-state machine (`IN_POOL`, `ACCESSIBLE`, `NOT_ACCESSIBLE`,
//! `CLOSED`); the holder listens to its own transitions to flush dangling
//! statements, clear connection warnings, refresh observability
//! timestamps, and re-enlist in the caller's global transaction when a
//! suspended connection resumes.
//!
//! # Example
//!
//! ```ignore
//! use biphase_pool::{PoolConfig, PooledConnection};
//!
//! let config = PoolConfig::builder("orders-db")
//!     .test_query("SELECT 1")
//!     .prepared_statement_cache_size(16)
//!     .build()?;
//!
//! let holder = PooledConnection::new(pool, transactions, management, xa_connection)?;
//! let handle = holder.lease()?;
//! let stmt = handle.prepare_statement(StatementKey::new("SELECT * FROM orders"))?;
//! // ... execute ...
//! handle.close()?; // delists and returns the connection to the pool
//! ```
//!
//! The pool allocator, the two-phase-commit engine, the transaction
//! journal, and the vendor wire protocol are external collaborators,
//! reached through the [`ConnectionPool`], [`TransactionContext`],
//! [`ManagementRegistry`], and [`driver`] trait seams.

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod holder;
pub mod management;
pub mod pool;
pub mod state;
pub mod statement;
pub mod transaction;
mod settings;
mod validator;

pub use config::{PoolConfig, PoolConfigBuilder, RequeueFailurePolicy};
pub use holder::{ConnectionHandle, PooledConnection};
pub use management::{make_valid_name, ManagementRegistry, NoopManagementRegistry};
pub use pool::{
    ConnectionPool, ALWAYS_FIRST_POSITION, ALWAYS_LAST_POSITION, DEFAULT_POSITION,
};
pub use settings::{
    translate_cursor_holdability, translate_isolation_level, CLOSE_CURSORS_AT_COMMIT,
    HOLD_CURSORS_OVER_COMMIT, TRANSACTION_READ_COMMITTED, TRANSACTION_READ_UNCOMMITTED,
    TRANSACTION_REPEATABLE_READ, TRANSACTION_SERIALIZABLE,
};
pub use state::{ConnectionState, StateListener, StateMachine};
pub use statement::{
    LruStatementCache, SharedStatement, StatementKey, UncachedStatementRegistry,
};
pub use transaction::{DelistError, NoTransactionContext, TransactionContext};
