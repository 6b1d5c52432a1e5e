//! The contract between a pooled connection and its enclosing pool.

use biphase_core::Result;

use crate::config::PoolConfig;
use crate::driver::Connection;
use crate::holder::PooledConnection;

/// Two-phase-commit ordering position of resources committed first.
pub const ALWAYS_FIRST_POSITION: i32 = i32::MIN;

/// Default two-phase-commit ordering position.
pub const DEFAULT_POSITION: i32 = 0;

/// Two-phase-commit ordering position of resources committed last.
///
/// Required by last-resource-commit emulation: a resource without a real
/// prepare phase must be committed after every prepared resource voted.
pub const ALWAYS_LAST_POSITION: i32 = i32::MAX;

/// The pool as seen by the connections it owns.
///
/// The pool allocator itself (sizing, shrinking, fairness between
/// acquirers) is an external collaborator; a pooled connection only needs
/// to read configuration, return itself to the free list, mint management
/// ids, adjust the two-phase-commit knobs forced by last-resource
/// emulation, and emit lifecycle events. Event hooks default to no-ops.
pub trait ConnectionPool: Send + Sync {
    /// Returns the pool configuration.
    fn config(&self) -> &PoolConfig;

    /// Returns the next value of the per-pool resource counter, used to
    /// mint management ids.
    fn next_resource_id(&self) -> u64;

    /// Returns `connection` to the pool's free list.
    ///
    /// Fails when the connection cannot be requeued, for example because
    /// it is still participating in a global transaction with deferred
    /// release disabled.
    fn requeue(&self, connection: &PooledConnection) -> Result<()>;

    /// Removes a destroyed connection from the pool's bookkeeping.
    fn unregister(&self, connection: &PooledConnection);

    /// Forces the two-phase-commit ordering position of this pool's
    /// resources.
    fn set_two_pc_ordering_position(&self, position: i32);

    /// Forces connections to stay checked out while enlisted.
    fn set_defer_connection_release(&self, defer: bool);

    /// Forces joining of transaction branches on shared resources.
    fn set_use_tm_join(&self, use_tm_join: bool);

    /// Invoked when a physical connection has been created.
    fn fire_on_acquire(&self, _connection: &dyn Connection) {}

    /// Invoked when a connection handle is leased to a caller.
    fn fire_on_lease(&self, _connection: &dyn Connection) {}

    /// Invoked when a connection is released back to the pool.
    fn fire_on_release(&self, _connection: &dyn Connection) {}

    /// Invoked when a physical connection has been destroyed.
    fn fire_on_destroy(&self, _connection: &dyn Connection) {}
}
