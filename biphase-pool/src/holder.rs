//! The pooled XA connection holder.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use biphase_core::{BiphaseError, MonotonicClock, Result, XaResource};

use crate::config::RequeueFailurePolicy;
use crate::driver::{Connection, XaConnection};
use crate::management::{make_valid_name, ManagementRegistry};
use crate::pool::{ConnectionPool, ALWAYS_LAST_POSITION};
use crate::settings;
use crate::state::{ConnectionState, StateListener, StateMachine};
use crate::statement::{
    self, LruStatementCache, SharedStatement, StatementKey, UncachedStatementRegistry,
};
use crate::transaction::{DelistError, TransactionContext};
use crate::validator::ConnectionValidator;

/// One pooled physical XA connection and the metadata the pool and the
/// transaction manager need around it.
///
/// A holder starts in `IN_POOL`, becomes `ACCESSIBLE` while leased, may be
/// suspended to `NOT_ACCESSIBLE` together with its enclosing transaction,
/// and ends `CLOSED` when the pool evicts it. Several logical handles may
/// share one holder inside the same global transaction; the usage count
/// tracks the outstanding acquisitions and the holder only returns to the
/// pool when it drops to zero.
///
/// The holder listens to its own state machine: before a transition into
/// `IN_POOL` or `NOT_ACCESSIBLE` it force-closes the statements created
/// outside the cache and clears connection warnings, and after a
/// `NOT_ACCESSIBLE` to `ACCESSIBLE` transition it re-enlists in the
/// caller's current global transaction.
pub struct PooledConnection {
    pool: Arc<dyn ConnectionPool>,
    transactions: Arc<dyn TransactionContext>,
    management: Arc<dyn ManagementRegistry>,
    xa_connection: Box<dyn XaConnection>,
    connection: Arc<dyn Connection>,
    xa_resource: Arc<dyn XaResource>,
    statement_cache: Mutex<LruStatementCache>,
    uncached_statements: UncachedStatementRegistry,
    state: StateMachine,
    usage_count: AtomicU32,
    acquisition_date: AtomicU64,
    last_release_date: AtomicU64,
    driver_version: AtomicU8,
    poisoned: AtomicBool,
    validator: ConnectionValidator,
    management_id: String,
}

impl PooledConnection {
    /// Creates a holder around a freshly obtained vendor XA connection.
    ///
    /// The holder starts in `IN_POOL` with its release date set to now,
    /// registers itself with the management registry, and emits the
    /// pool's acquire event. When the data source emulates XA with
    /// last-resource commit, the pool's two-phase-commit knobs are forced
    /// accordingly: such a resource has no real prepare phase, so it must
    /// be committed last and must not be released while enlisted.
    pub fn new(
        pool: Arc<dyn ConnectionPool>,
        transactions: Arc<dyn TransactionContext>,
        management: Arc<dyn ManagementRegistry>,
        xa_connection: Box<dyn XaConnection>,
    ) -> Result<Arc<Self>> {
        let connection = xa_connection.connection()?;
        let xa_resource = xa_connection.xa_resource();
        let driver_version = connection.api_version();

        let config = pool.config();
        let mut statement_cache =
            LruStatementCache::new(config.prepared_statement_cache_size());
        statement_cache.set_eviction_listener(|evicted| {
            if let Err(error) = statement::close_shared(evicted) {
                tracing::warn!(error = %error, "error closing evicted statement");
            }
        });

        if config.emulate_xa_with_last_resource() {
            let unique_name = config.unique_name();
            tracing::debug!(
                unique_name,
                "emulating XA for resource - changing two-phase-commit ordering position to always last"
            );
            pool.set_two_pc_ordering_position(ALWAYS_LAST_POSITION);
            tracing::debug!(
                unique_name,
                "emulating XA for resource - changing defer connection release to true"
            );
            pool.set_defer_connection_release(true);
            tracing::debug!(
                unique_name,
                "emulating XA for resource - changing use TM join to true"
            );
            pool.set_use_tm_join(true);
        }

        let management_id = format!(
            "biphase:type=XaConnection,unique_name={},id={}",
            make_valid_name(config.unique_name()),
            pool.next_resource_id()
        );
        let validator = ConnectionValidator::from_config(config);

        let holder = Arc::new(Self {
            pool,
            transactions,
            management,
            xa_connection,
            connection,
            xa_resource,
            statement_cache: Mutex::new(statement_cache),
            uncached_statements: UncachedStatementRegistry::new(),
            state: StateMachine::new(),
            usage_count: AtomicU32::new(0),
            acquisition_date: AtomicU64::new(0),
            last_release_date: AtomicU64::new(MonotonicClock::now_millis()),
            driver_version: AtomicU8::new(driver_version),
            poisoned: AtomicBool::new(false),
            validator,
            management_id,
        });

        holder.management.register(&holder.management_id);
        holder.pool.fire_on_acquire(holder.connection.as_ref());
        Ok(holder)
    }

    fn cache(&self) -> MutexGuard<'_, LruStatementCache> {
        match self.statement_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Leases a connection handle to a caller.
    ///
    /// The first acquisition of a pooled connection validates it and
    /// applies the configured isolation level, cursor holdability, and,
    /// when no global transaction is ambient, the auto-commit flag.
    /// Re-entrant acquisitions of a shared connection skip both the state
    /// transition and the test.
    ///
    /// Any failure after the usage count has been incremented decrements
    /// it again before propagating.
    pub fn lease(self: &Arc<Self>) -> Result<ConnectionHandle> {
        tracing::debug!(connection = %self, "getting connection handle");
        if self.poisoned.load(Ordering::Acquire) {
            return Err(BiphaseError::IllegalState(format!(
                "{self} was poisoned by an earlier requeue failure"
            )));
        }

        let old_state = self.state.get();
        let usage_count = self.usage_count.fetch_add(1, Ordering::AcqRel) + 1;

        if let Err(error) = self.prepare_for_use(old_state, usage_count) {
            self.usage_count.fetch_sub(1, Ordering::AcqRel);
            return Err(error);
        }

        self.pool.fire_on_lease(self.connection.as_ref());
        tracing::debug!(connection = %self, "got connection handle");
        Ok(ConnectionHandle {
            holder: Arc::clone(self),
        })
    }

    fn prepare_for_use(&self, old_state: ConnectionState, usage_count: u32) -> Result<()> {
        // Only transition on the first usage. A shared connection leased
        // again while ACCESSIBLE must not re-request its current state,
        // but a suspended one always transitions back.
        if usage_count == 1 || old_state == ConnectionState::NotAccessible {
            self.set_state(ConnectionState::Accessible)?;
        }

        if old_state == ConnectionState::InPool {
            tracing::debug!(connection = %self, "connection was in state IN_POOL, testing it");
            self.validator
                .validate(self.connection.as_ref(), &self.driver_version)?;
            let config = self.pool.config();
            settings::apply_isolation_level(self.connection.as_ref(), config.isolation_level())?;
            settings::apply_cursor_holdability(
                self.connection.as_ref(),
                config.cursor_holdability(),
            )?;
            if self.transactions.current_transaction().is_none() {
                // Only safe to touch auto-commit outside of a global
                // transaction.
                settings::apply_local_auto_commit(
                    self.connection.as_ref(),
                    config.local_auto_commit(),
                )?;
            }
        } else {
            tracing::debug!(
                connection = %self,
                old_state = %old_state,
                "no need to test connection"
            );
        }
        Ok(())
    }

    /// Releases one acquisition, delisting from the current transaction
    /// and requeuing the connection once no caller shares it any more.
    ///
    /// Returns `true` when the connection went back to the pool.
    ///
    /// A requeue failure restores the usage count to its pre-release
    /// value and propagates as
    /// [`RequeueFailed`](BiphaseError::RequeueFailed), taking precedence
    /// over a delist failure: a connection that could not return to its
    /// pool is a leak and is the more severe report.
    pub fn release(&self) -> Result<bool> {
        tracing::debug!(connection = %self, "releasing to pool");
        let previous = match self.usage_count.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |count| Some(count.saturating_sub(1)),
        ) {
            Ok(count) | Err(count) => count,
        };
        if previous == 0 {
            tracing::warn!(connection = %self, "releasing a connection that is not leased");
        }

        let delist_result = self.transactions.delist_from_current(self);

        // Only requeue once the connection is no longer in use; a delist
        // failure does not skip the requeue.
        if self.usage_count.load(Ordering::Acquire) == 0 {
            self.pool.fire_on_release(self.connection.as_ref());
            if let Err(requeue_error) = self.pool.requeue(self) {
                // The connection failed to return to the pool, so the
                // caller keeps owning it: restore the count.
                self.usage_count.fetch_add(1, Ordering::AcqRel);
                if self.pool.config().requeue_failure_policy() == RequeueFailurePolicy::Poison {
                    tracing::warn!(connection = %self, "poisoning connection after requeue failure");
                    self.poisoned.store(true, Ordering::Release);
                }
                if let Err(delist_error) = delist_result {
                    let (DelistError::RolledBack(masked) | DelistError::System(masked)) =
                        delist_error;
                    tracing::warn!(
                        connection = %self,
                        error = %masked,
                        "delist failure masked by requeue failure"
                    );
                }
                return Err(BiphaseError::RequeueFailed {
                    connection: self.to_string(),
                    cause: Some(Box::new(requeue_error)),
                });
            }
            self.set_state(ConnectionState::InPool)?;
            tracing::debug!(connection = %self, "released to pool");
        } else {
            tracing::debug!(connection = %self, "not releasing to pool yet, connection is still shared");
        }

        match delist_result {
            Ok(()) => Ok(self.usage_count.load(Ordering::Acquire) == 0),
            Err(DelistError::RolledBack(cause)) => Err(BiphaseError::UnilateralRollback {
                connection: self.to_string(),
                cause: Some(Box::new(cause)),
            }),
            Err(DelistError::System(cause)) => Err(BiphaseError::DelistFailed {
                connection: self.to_string(),
                cause: Some(Box::new(cause)),
            }),
        }
    }

    /// Destroys the holder.
    ///
    /// The statement cache is cleared (closing every cached statement),
    /// the holder is unregistered from management and from the pool, and
    /// the logical connection is closed before the physical one. The
    /// second close runs even when the first fails; the first failure is
    /// the one that propagates. The destroy event fires in every case.
    pub fn close(&self) -> Result<()> {
        let usage_count = self.usage_count.load(Ordering::Acquire);
        if usage_count > 0 {
            tracing::warn!(connection = %self, usage_count, "closing connection with usage count > 0");
        }

        self.set_state(ConnectionState::Closed)?;

        self.cache().clear();
        self.management.unregister(&self.management_id);
        self.pool.unregister(self);

        let connection_closed = self.connection.close();
        let xa_closed = self.xa_connection.close();
        self.pool.fire_on_destroy(self.connection.as_ref());

        match (connection_closed, xa_closed) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(first), second) => {
                if let Err(error) = second {
                    tracing::warn!(error = %error, "error closing physical connection");
                }
                Err(first.into())
            }
            (Ok(()), Err(second)) => Err(second.into()),
        }
    }

    /// Requests a state transition, notifying the holder's own listener
    /// hooks.
    ///
    /// The pool and the transaction manager use this to suspend
    /// (`NOT_ACCESSIBLE`) and resume a checked-out connection along with
    /// its enclosing transaction.
    pub fn set_state(&self, new_state: ConnectionState) -> Result<ConnectionState> {
        self.state.transition(new_state, self)
    }

    /// Returns the statement cached under `key`, marking it most recently
    /// used.
    pub fn get_cached_statement(&self, key: &StatementKey) -> Option<SharedStatement> {
        self.cache().get(key)
    }

    /// Caches `statement` under `key` and returns it.
    pub fn put_cached_statement(
        &self,
        key: StatementKey,
        statement: SharedStatement,
    ) -> SharedStatement {
        self.cache().put(key, statement)
    }

    /// Registers a statement created outside the cache so it can be
    /// closed when the connection is put back in the pool.
    pub fn register_uncached_statement(&self, statement: SharedStatement) -> SharedStatement {
        self.uncached_statements.register(statement)
    }

    /// Removes a statement from the uncached registry, typically because
    /// its caller closed it.
    pub fn unregister_uncached_statement(&self, statement: &SharedStatement) {
        self.uncached_statements.unregister(statement)
    }

    /// Returns the number of statements awaiting forced close.
    pub fn uncached_statement_count(&self) -> usize {
        self.uncached_statements.len()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Returns the number of outstanding acquisitions sharing this
    /// connection.
    pub fn usage_count(&self) -> u32 {
        self.usage_count.load(Ordering::Acquire)
    }

    /// Returns when the connection was last acquired from the pool, in
    /// milliseconds since the Unix epoch, or `None` if it never was.
    pub fn acquisition_date(&self) -> Option<u64> {
        match self.acquisition_date.load(Ordering::Acquire) {
            0 => None,
            millis => Some(millis),
        }
    }

    /// Returns when the connection last entered the pool, in milliseconds
    /// since the Unix epoch.
    pub fn last_release_date(&self) -> u64 {
        self.last_release_date.load(Ordering::Acquire)
    }

    /// Returns the detected driver API version, accounting for any
    /// downgrade after a dysfunctional native validity probe.
    pub fn driver_version(&self) -> u8 {
        self.driver_version.load(Ordering::Acquire)
    }

    /// Returns the identifier under which this holder is registered for
    /// operational inspection.
    pub fn management_id(&self) -> &str {
        &self.management_id
    }

    /// Returns `true` when the holder was poisoned by a requeue failure
    /// under [`RequeueFailurePolicy::Poison`].
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Returns the logical connection backing the handles.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Returns the XA resource handed to the transaction manager.
    pub fn xa_resource(&self) -> Arc<dyn XaResource> {
        Arc::clone(&self.xa_resource)
    }

    /// Returns the GTRIDs of the global transactions currently holding
    /// this connection.
    pub fn transaction_ids_holding_this(&self) -> Vec<String> {
        self.transactions.gtrids_holding(self)
    }
}

impl StateListener for PooledConnection {
    fn state_changing(&self, _old_state: ConnectionState, new_state: ConnectionState) {
        let usage_count = self.usage_count.load(Ordering::Acquire);
        if new_state == ConnectionState::InPool && usage_count > 0 {
            tracing::warn!(
                connection = self.management_id.as_str(),
                usage_count,
                "usage count too high on connection returned to pool"
            );
        }

        if new_state == ConnectionState::InPool || new_state == ConnectionState::NotAccessible {
            let dangling = self.uncached_statements.drain();
            tracing::debug!(
                count = dangling.len(),
                "closing dangling uncached statement(s)"
            );
            for statement in dangling {
                if let Err(error) = statement::close_shared(&statement) {
                    tracing::debug!(error = %error, "error trying to close uncached statement");
                }
            }

            if let Err(error) = self.connection.clear_warnings() {
                tracing::debug!(error = %error, "error cleaning warnings of connection");
            }
        }
    }

    fn state_changed(&self, old_state: ConnectionState, new_state: ConnectionState) {
        if new_state == ConnectionState::InPool {
            self.last_release_date
                .store(MonotonicClock::now_millis(), Ordering::Release);
        } else if old_state == ConnectionState::InPool
            && new_state == ConnectionState::Accessible
        {
            self.acquisition_date
                .store(MonotonicClock::now_millis(), Ordering::Release);
        } else if old_state == ConnectionState::NotAccessible
            && new_state == ConnectionState::Accessible
        {
            // The connection resumed along with its transaction; enlist it
            // in the caller's current global transaction again.
            if let Err(error) = self.transactions.recycle(self) {
                tracing::warn!(connection = %self, error = %error, "error recycling connection");
            }
        }
    }
}

impl fmt::Display for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a pooled XA connection from datasource {} in state {} with usage count {}",
            self.pool.config().unique_name(),
            self.state.get(),
            self.usage_count.load(Ordering::Acquire)
        )
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("management_id", &self.management_id)
            .field("state", &self.state.get())
            .field("usage_count", &self.usage_count.load(Ordering::Acquire))
            .finish()
    }
}

/// A caller-facing handle onto a leased pooled connection.
///
/// Statements prepared through the handle go through the holder's
/// statement cache when caching is enabled, and through the uncached
/// registry otherwise, so they can never leak past the connection's
/// return to the pool. Closing the handle releases one acquisition.
#[derive(Debug)]
pub struct ConnectionHandle {
    holder: Arc<PooledConnection>,
}

impl ConnectionHandle {
    /// Returns the holder backing this handle.
    pub fn pooled_connection(&self) -> &Arc<PooledConnection> {
        &self.holder
    }

    /// Returns the logical connection.
    pub fn connection(&self) -> &dyn Connection {
        self.holder.connection.as_ref()
    }

    /// Prepares a statement, reusing a cached one when the fingerprint
    /// matches.
    pub fn prepare_statement(&self, key: StatementKey) -> Result<SharedStatement> {
        if self.holder.pool.config().prepared_statement_cache_size() > 0 {
            if let Some(cached) = self.holder.get_cached_statement(&key) {
                tracing::debug!(sql = key.sql(), "reusing cached statement");
                return Ok(cached);
            }
            let statement = self.holder.connection.prepare_statement(key.sql())?;
            Ok(self
                .holder
                .put_cached_statement(key, statement::share_statement(statement)))
        } else {
            let statement = self.holder.connection.prepare_statement(key.sql())?;
            Ok(self
                .holder
                .register_uncached_statement(statement::share_statement(statement)))
        }
    }

    /// Releases the underlying acquisition.
    ///
    /// Returns `true` when the connection went back to the pool.
    pub fn close(self) -> Result<bool> {
        self.holder.release()
    }
}
