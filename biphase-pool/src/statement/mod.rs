//! Prepared statement caching and tracking.

mod cache;
mod registry;

pub use cache::LruStatementCache;
pub use registry::UncachedStatementRegistry;

use std::sync::{Arc, Mutex};

use crate::driver::PreparedStatement;

/// A prepared statement shared between the cache and its current user.
///
/// The same physical statement may be held by the statement cache and by
/// the caller that prepared it; the mutex serializes driver access.
pub type SharedStatement = Arc<Mutex<Box<dyn PreparedStatement>>>;

/// Wraps a driver statement for shared use.
pub fn share_statement(statement: Box<dyn PreparedStatement>) -> SharedStatement {
    Arc::new(Mutex::new(statement))
}

/// Closes a shared statement, returning the driver error on failure.
pub(crate) fn close_shared(
    statement: &SharedStatement,
) -> Result<(), biphase_core::DriverError> {
    let mut guard = match statement.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.close()
}

/// Identity of a reusable prepared statement.
///
/// Two prepared statements are interchangeable when their SQL text and
/// every statement-creation parameter match; the key is the tuple of all
/// of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
    sql: String,
    result_set_type: Option<i32>,
    result_set_concurrency: Option<i32>,
    result_set_holdability: Option<i32>,
    auto_generated_keys: Option<i32>,
}

impl StatementKey {
    /// Creates a key for a statement prepared with driver defaults.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            result_set_type: None,
            result_set_concurrency: None,
            result_set_holdability: None,
            auto_generated_keys: None,
        }
    }

    /// Sets the result set type and concurrency the statement was created
    /// with.
    pub fn with_result_set(mut self, result_set_type: i32, result_set_concurrency: i32) -> Self {
        self.result_set_type = Some(result_set_type);
        self.result_set_concurrency = Some(result_set_concurrency);
        self
    }

    /// Sets the result set holdability the statement was created with.
    pub fn with_holdability(mut self, holdability: i32) -> Self {
        self.result_set_holdability = Some(holdability);
        self
    }

    /// Sets the auto-generated-keys request the statement was created with.
    pub fn with_auto_generated_keys(mut self, auto_generated_keys: i32) -> Self {
        self.auto_generated_keys = Some(auto_generated_keys);
        self
    }

    /// Returns the SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}
