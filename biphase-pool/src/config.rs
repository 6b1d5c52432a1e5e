//! Pool configuration.

use std::time::Duration;

use biphase_core::{BiphaseError, Result};

/// Default prepared statement cache size (caching disabled).
const DEFAULT_STATEMENT_CACHE_SIZE: usize = 0;
/// Default connection test timeout.
const DEFAULT_CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with a connection whose requeue failed after a successful
/// delist.
///
/// The connection has already been delisted from its transaction but could
/// not go back to the pool, so the caller keeps owning it with its usage
/// count restored. Whether it may be used again is a policy choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequeueFailurePolicy {
    /// Keep the connection accessible; the next acquisition creates a
    /// fresh enlistment.
    #[default]
    RemainAccessible,
    /// Poison the connection; further lease attempts fail and the holder
    /// can only be closed.
    Poison,
}

/// Configuration of one connection pool, read by its pooled connections.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    unique_name: String,
    isolation_level: Option<String>,
    cursor_holdability: Option<String>,
    local_auto_commit: Option<String>,
    test_query: Option<String>,
    prepared_statement_cache_size: usize,
    connection_test_timeout: Duration,
    enable_native_connection_test: bool,
    emulate_xa_with_last_resource: bool,
    requeue_failure_policy: RequeueFailurePolicy,
}

impl PoolConfig {
    /// Creates a configuration builder for the pool named `unique_name`.
    pub fn builder(unique_name: impl Into<String>) -> PoolConfigBuilder {
        PoolConfigBuilder::new(unique_name)
    }

    /// Returns the unique name of the pool.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// Returns the configured transaction isolation level, if any.
    ///
    /// Symbolic (`READ_COMMITTED`, ...) or numeric.
    pub fn isolation_level(&self) -> Option<&str> {
        self.isolation_level.as_deref()
    }

    /// Returns the configured cursor holdability, if any.
    pub fn cursor_holdability(&self) -> Option<&str> {
        self.cursor_holdability.as_deref()
    }

    /// Returns the auto-commit setting applied outside global
    /// transactions, if any.
    pub fn local_auto_commit(&self) -> Option<&str> {
        self.local_auto_commit.as_deref()
    }

    /// Returns the connection test query, if any.
    pub fn test_query(&self) -> Option<&str> {
        self.test_query.as_deref()
    }

    /// Returns the prepared statement cache capacity. `0` disables
    /// caching.
    pub fn prepared_statement_cache_size(&self) -> usize {
        self.prepared_statement_cache_size
    }

    /// Returns the timeout applied to connection liveness tests.
    pub fn connection_test_timeout(&self) -> Duration {
        self.connection_test_timeout
    }

    /// Returns whether the native validity probe may be used on drivers
    /// that advertise it.
    pub fn enable_native_connection_test(&self) -> bool {
        self.enable_native_connection_test
    }

    /// Returns whether the underlying data source emulates XA with
    /// last-resource commit.
    pub fn emulate_xa_with_last_resource(&self) -> bool {
        self.emulate_xa_with_last_resource
    }

    /// Returns the policy applied when a requeue fails.
    pub fn requeue_failure_policy(&self) -> RequeueFailurePolicy {
        self.requeue_failure_policy
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    unique_name: String,
    isolation_level: Option<String>,
    cursor_holdability: Option<String>,
    local_auto_commit: Option<String>,
    test_query: Option<String>,
    prepared_statement_cache_size: usize,
    connection_test_timeout: Duration,
    enable_native_connection_test: bool,
    emulate_xa_with_last_resource: bool,
    requeue_failure_policy: RequeueFailurePolicy,
}

impl PoolConfigBuilder {
    /// Creates a builder for the pool named `unique_name`.
    pub fn new(unique_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            isolation_level: None,
            cursor_holdability: None,
            local_auto_commit: None,
            test_query: None,
            prepared_statement_cache_size: DEFAULT_STATEMENT_CACHE_SIZE,
            connection_test_timeout: DEFAULT_CONNECTION_TEST_TIMEOUT,
            enable_native_connection_test: false,
            emulate_xa_with_last_resource: false,
            requeue_failure_policy: RequeueFailurePolicy::default(),
        }
    }

    /// Sets the transaction isolation level applied on first acquisition.
    pub fn isolation_level(mut self, level: impl Into<String>) -> Self {
        self.isolation_level = Some(level.into());
        self
    }

    /// Sets the cursor holdability applied on first acquisition.
    pub fn cursor_holdability(mut self, holdability: impl Into<String>) -> Self {
        self.cursor_holdability = Some(holdability.into());
        self
    }

    /// Sets the auto-commit flag applied outside global transactions.
    pub fn local_auto_commit(mut self, auto_commit: impl Into<String>) -> Self {
        self.local_auto_commit = Some(auto_commit.into());
        self
    }

    /// Sets the query used to test connections coming out of the pool.
    pub fn test_query(mut self, query: impl Into<String>) -> Self {
        self.test_query = Some(query.into());
        self
    }

    /// Sets the prepared statement cache capacity. `0` disables caching.
    pub fn prepared_statement_cache_size(mut self, size: usize) -> Self {
        self.prepared_statement_cache_size = size;
        self
    }

    /// Sets the timeout applied to connection liveness tests.
    pub fn connection_test_timeout(mut self, timeout: Duration) -> Self {
        self.connection_test_timeout = timeout;
        self
    }

    /// Enables the native validity probe on drivers that advertise it.
    pub fn enable_native_connection_test(mut self, enabled: bool) -> Self {
        self.enable_native_connection_test = enabled;
        self
    }

    /// Marks the data source as a last-resource-commit emulator.
    pub fn emulate_xa_with_last_resource(mut self, enabled: bool) -> Self {
        self.emulate_xa_with_last_resource = enabled;
        self
    }

    /// Sets the policy applied when a requeue fails.
    pub fn requeue_failure_policy(mut self, policy: RequeueFailurePolicy) -> Self {
        self.requeue_failure_policy = policy;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<PoolConfig> {
        if self.unique_name.is_empty() {
            return Err(BiphaseError::Configuration(
                "pool unique name must not be empty".to_string(),
            ));
        }
        if self.connection_test_timeout.is_zero() {
            return Err(BiphaseError::Configuration(
                "connection test timeout must be positive".to_string(),
            ));
        }

        Ok(PoolConfig {
            unique_name: self.unique_name,
            isolation_level: self.isolation_level,
            cursor_holdability: self.cursor_holdability,
            local_auto_commit: self.local_auto_commit,
            test_query: self.test_query,
            prepared_statement_cache_size: self.prepared_statement_cache_size,
            connection_test_timeout: self.connection_test_timeout,
            enable_native_connection_test: self.enable_native_connection_test,
            emulate_xa_with_last_resource: self.emulate_xa_with_last_resource,
            requeue_failure_policy: self.requeue_failure_policy,
        })
    }
}
