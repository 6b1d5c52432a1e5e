//! Mock pool, transaction manager, and driver fixtures shared by the
//! integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use biphase_core::{BiphaseError, DriverError, Result, XaResource, Xid, XA_OK};
use biphase_pool::driver::{Connection, PreparedStatement, ResultSet, XaConnection};
use biphase_pool::{
    ConnectionPool, DelistError, ManagementRegistry, PoolConfig, PooledConnection,
    TransactionContext,
};

// ============================================================================
// Driver mocks
// ============================================================================

pub struct MockResultSet {
    closes: Arc<AtomicUsize>,
}

impl ResultSet for MockResultSet {
    fn close(&mut self) -> std::result::Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockStatement {
    pub id: usize,
    fail_execute: bool,
    close_log: Arc<Mutex<Vec<usize>>>,
    result_set_closes: Arc<AtomicUsize>,
}

impl PreparedStatement for MockStatement {
    fn set_query_timeout(&mut self, _timeout: Duration) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn execute_query(&mut self) -> std::result::Result<Box<dyn ResultSet>, DriverError> {
        if self.fail_execute {
            Err(DriverError::new("connection reset"))
        } else {
            Ok(Box::new(MockResultSet {
                closes: self.result_set_closes.clone(),
            }))
        }
    }

    fn close(&mut self) -> std::result::Result<(), DriverError> {
        self.close_log.lock().unwrap().push(self.id);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior {
    Valid,
    Invalid,
    Broken,
}

pub struct MockConnection {
    pub api_version: u8,
    pub probe: Mutex<ProbeBehavior>,
    pub probe_calls: AtomicUsize,
    pub prepared_sql: Mutex<Vec<String>>,
    pub fail_execute: AtomicBool,
    pub isolation: Mutex<Option<i32>>,
    pub holdability: Mutex<Option<i32>>,
    pub auto_commit: Mutex<Option<bool>>,
    pub warnings_cleared: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub fail_close: AtomicBool,
    pub statement_close_log: Arc<Mutex<Vec<usize>>>,
    pub result_set_closes: Arc<AtomicUsize>,
    next_statement_id: AtomicUsize,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_version(4)
    }

    pub fn with_version(api_version: u8) -> Self {
        Self {
            api_version,
            probe: Mutex::new(ProbeBehavior::Valid),
            probe_calls: AtomicUsize::new(0),
            prepared_sql: Mutex::new(Vec::new()),
            fail_execute: AtomicBool::new(false),
            isolation: Mutex::new(None),
            holdability: Mutex::new(None),
            auto_commit: Mutex::new(None),
            warnings_cleared: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
            statement_close_log: Arc::new(Mutex::new(Vec::new())),
            result_set_closes: Arc::new(AtomicUsize::new(0)),
            next_statement_id: AtomicUsize::new(1),
        }
    }

    pub fn set_probe(&self, behavior: ProbeBehavior) {
        *self.probe.lock().unwrap() = behavior;
    }

    pub fn prepared_count(&self) -> usize {
        self.prepared_sql.lock().unwrap().len()
    }

    pub fn closed_statement_ids(&self) -> Vec<usize> {
        self.statement_close_log.lock().unwrap().clone()
    }
}

impl Connection for MockConnection {
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> std::result::Result<Box<dyn PreparedStatement>, DriverError> {
        self.prepared_sql.lock().unwrap().push(sql.to_string());
        Ok(Box::new(MockStatement {
            id: self.next_statement_id.fetch_add(1, Ordering::SeqCst),
            fail_execute: self.fail_execute.load(Ordering::SeqCst),
            close_log: self.statement_close_log.clone(),
            result_set_closes: self.result_set_closes.clone(),
        }))
    }

    fn set_transaction_isolation(&self, level: i32) -> std::result::Result<(), DriverError> {
        *self.isolation.lock().unwrap() = Some(level);
        Ok(())
    }

    fn set_holdability(&self, holdability: i32) -> std::result::Result<(), DriverError> {
        *self.holdability.lock().unwrap() = Some(holdability);
        Ok(())
    }

    fn set_auto_commit(&self, auto_commit: bool) -> std::result::Result<(), DriverError> {
        *self.auto_commit.lock().unwrap() = Some(auto_commit);
        Ok(())
    }

    fn clear_warnings(&self) -> std::result::Result<(), DriverError> {
        self.warnings_cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_valid(&self, _timeout: Duration) -> std::result::Result<bool, DriverError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match *self.probe.lock().unwrap() {
            ProbeBehavior::Valid => Ok(true),
            ProbeBehavior::Invalid => Ok(false),
            ProbeBehavior::Broken => Err(DriverError::new("probe not supported by driver")),
        }
    }

    fn api_version(&self) -> u8 {
        self.api_version
    }

    fn close(&self) -> std::result::Result<(), DriverError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            Err(DriverError::new("logical close failed"))
        } else {
            Ok(())
        }
    }
}

pub struct MockXaResource;

impl XaResource for MockXaResource {
    fn start(&self, _xid: &Xid, _flags: i32) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn end(&self, _xid: &Xid, _flags: i32) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn prepare(&self, _xid: &Xid) -> std::result::Result<i32, DriverError> {
        Ok(XA_OK)
    }

    fn commit(&self, _xid: &Xid, _one_phase: bool) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn rollback(&self, _xid: &Xid) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn forget(&self, _xid: &Xid) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn recover(&self, _flags: i32) -> std::result::Result<Vec<Xid>, DriverError> {
        Ok(Vec::new())
    }
}

pub struct MockXaConnection {
    connection: Arc<MockConnection>,
    xa_resource: Arc<MockXaResource>,
    pub close_calls: Arc<AtomicUsize>,
    pub fail_close: Arc<AtomicBool>,
}

impl MockXaConnection {
    pub fn new(connection: Arc<MockConnection>) -> Self {
        Self {
            connection,
            xa_resource: Arc::new(MockXaResource),
            close_calls: Arc::new(AtomicUsize::new(0)),
            fail_close: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl XaConnection for MockXaConnection {
    fn connection(&self) -> std::result::Result<Arc<dyn Connection>, DriverError> {
        Ok(self.connection.clone())
    }

    fn xa_resource(&self) -> Arc<dyn XaResource> {
        self.xa_resource.clone()
    }

    fn close(&self) -> std::result::Result<(), DriverError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            Err(DriverError::new("physical close failed"))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Pool mock
// ============================================================================

pub struct MockPool {
    config: PoolConfig,
    pub resource_counter: AtomicU64,
    pub requeue_calls: AtomicUsize,
    pub fail_requeue: AtomicBool,
    pub unregister_calls: AtomicUsize,
    pub two_pc_ordering_position: AtomicI32,
    pub defer_connection_release: AtomicBool,
    pub use_tm_join: AtomicBool,
    pub on_acquire_events: AtomicUsize,
    pub on_lease_events: AtomicUsize,
    pub on_release_events: AtomicUsize,
    pub on_destroy_events: AtomicUsize,
}

impl MockPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            resource_counter: AtomicU64::new(0),
            requeue_calls: AtomicUsize::new(0),
            fail_requeue: AtomicBool::new(false),
            unregister_calls: AtomicUsize::new(0),
            two_pc_ordering_position: AtomicI32::new(biphase_pool::DEFAULT_POSITION),
            defer_connection_release: AtomicBool::new(false),
            use_tm_join: AtomicBool::new(false),
            on_acquire_events: AtomicUsize::new(0),
            on_lease_events: AtomicUsize::new(0),
            on_release_events: AtomicUsize::new(0),
            on_destroy_events: AtomicUsize::new(0),
        }
    }
}

impl ConnectionPool for MockPool {
    fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn next_resource_id(&self) -> u64 {
        self.resource_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn requeue(&self, _connection: &PooledConnection) -> Result<()> {
        self.requeue_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_requeue.load(Ordering::SeqCst) {
            Err(BiphaseError::IllegalState(
                "connection is still participating in a global transaction".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn unregister(&self, _connection: &PooledConnection) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_two_pc_ordering_position(&self, position: i32) {
        self.two_pc_ordering_position.store(position, Ordering::SeqCst);
    }

    fn set_defer_connection_release(&self, defer: bool) {
        self.defer_connection_release.store(defer, Ordering::SeqCst);
    }

    fn set_use_tm_join(&self, use_tm_join: bool) {
        self.use_tm_join.store(use_tm_join, Ordering::SeqCst);
    }

    fn fire_on_acquire(&self, _connection: &dyn Connection) {
        self.on_acquire_events.fetch_add(1, Ordering::SeqCst);
    }

    fn fire_on_lease(&self, _connection: &dyn Connection) {
        self.on_lease_events.fetch_add(1, Ordering::SeqCst);
    }

    fn fire_on_release(&self, _connection: &dyn Connection) {
        self.on_release_events.fetch_add(1, Ordering::SeqCst);
    }

    fn fire_on_destroy(&self, _connection: &dyn Connection) {
        self.on_destroy_events.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Transaction manager mock
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum DelistBehavior {
    Succeed,
    RollBack,
    Fail,
}

pub struct MockTransactionContext {
    pub ambient_gtrid: Mutex<Option<String>>,
    pub delist_behavior: Mutex<DelistBehavior>,
    pub delist_calls: AtomicUsize,
    pub recycle_calls: AtomicUsize,
    pub holding_gtrids: Mutex<Vec<String>>,
}

impl MockTransactionContext {
    pub fn new() -> Self {
        Self {
            ambient_gtrid: Mutex::new(None),
            delist_behavior: Mutex::new(DelistBehavior::Succeed),
            delist_calls: AtomicUsize::new(0),
            recycle_calls: AtomicUsize::new(0),
            holding_gtrids: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ambient(&self, gtrid: Option<&str>) {
        *self.ambient_gtrid.lock().unwrap() = gtrid.map(str::to_string);
    }

    pub fn set_delist_behavior(&self, behavior: DelistBehavior) {
        *self.delist_behavior.lock().unwrap() = behavior;
    }
}

impl TransactionContext for MockTransactionContext {
    fn current_transaction(&self) -> Option<String> {
        self.ambient_gtrid.lock().unwrap().clone()
    }

    fn delist_from_current(
        &self,
        _connection: &PooledConnection,
    ) -> std::result::Result<(), DelistError> {
        self.delist_calls.fetch_add(1, Ordering::SeqCst);
        match *self.delist_behavior.lock().unwrap() {
            DelistBehavior::Succeed => Ok(()),
            DelistBehavior::RollBack => Err(DelistError::RolledBack(BiphaseError::Driver(
                DriverError::new("resource reported XA_RBROLLBACK"),
            ))),
            DelistBehavior::Fail => Err(DelistError::System(BiphaseError::Driver(
                DriverError::new("transaction manager unavailable"),
            ))),
        }
    }

    fn recycle(&self, _connection: &PooledConnection) -> Result<()> {
        self.recycle_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn gtrids_holding(&self, _connection: &PooledConnection) -> Vec<String> {
        self.holding_gtrids.lock().unwrap().clone()
    }
}

// ============================================================================
// Management mock
// ============================================================================

#[derive(Default)]
pub struct RecordingManagement {
    pub registered: Mutex<Vec<String>>,
    pub unregistered: Mutex<Vec<String>>,
}

impl ManagementRegistry for RecordingManagement {
    fn register(&self, id: &str) {
        self.registered.lock().unwrap().push(id.to_string());
    }

    fn unregister(&self, id: &str) {
        self.unregistered.lock().unwrap().push(id.to_string());
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub struct Fixture {
    pub pool: Arc<MockPool>,
    pub transactions: Arc<MockTransactionContext>,
    pub management: Arc<RecordingManagement>,
    pub connection: Arc<MockConnection>,
    pub xa_close_calls: Arc<AtomicUsize>,
    pub xa_fail_close: Arc<AtomicBool>,
    pub holder: Arc<PooledConnection>,
}

pub fn default_config() -> PoolConfig {
    PoolConfig::builder("ds1")
        .test_query("SELECT 1")
        .build()
        .unwrap()
}

pub fn fixture(config: PoolConfig) -> Fixture {
    fixture_with_connection(config, MockConnection::new())
}

pub fn fixture_with_connection(config: PoolConfig, connection: MockConnection) -> Fixture {
    let connection = Arc::new(connection);
    let pool = Arc::new(MockPool::new(config));
    let transactions = Arc::new(MockTransactionContext::new());
    let management = Arc::new(RecordingManagement::default());
    let xa_connection = MockXaConnection::new(connection.clone());
    let xa_close_calls = xa_connection.close_calls.clone();
    let xa_fail_close = xa_connection.fail_close.clone();
    let holder = PooledConnection::new(
        pool.clone(),
        transactions.clone(),
        management.clone(),
        Box::new(xa_connection),
    )
    .unwrap();
    Fixture {
        pool,
        transactions,
        management,
        connection,
        xa_close_calls,
        xa_fail_close,
        holder,
    }
}
