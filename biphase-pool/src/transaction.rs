//! The contract between a pooled connection and the transaction manager.

use biphase_core::{BiphaseError, Result};

use crate::holder::PooledConnection;

/// Failure shapes of delisting a resource from its global transaction.
#[derive(Debug, Clone)]
pub enum DelistError {
    /// The transaction manager already rolled the resource's work back.
    RolledBack(BiphaseError),
    /// Any other system error raised during delist.
    System(BiphaseError),
}

/// The transaction manager as seen by a pooled connection.
///
/// Enlistment bookkeeping, the two-phase-commit engine, and the journal
/// live behind this seam; the holder only needs to know whether a global
/// transaction is ambient, to delist itself on release, and to re-enlist
/// when a suspended connection resumes.
pub trait TransactionContext: Send + Sync {
    /// Returns the GTRID of the transaction ambient on the calling thread,
    /// if any.
    fn current_transaction(&self) -> Option<String>;

    /// Delists `connection` from the transaction it is enlisted in.
    ///
    /// A connection that is not enlisted delists trivially.
    fn delist_from_current(
        &self,
        connection: &PooledConnection,
    ) -> std::result::Result<(), DelistError>;

    /// Re-enlists `connection` in the transaction ambient on the calling
    /// thread; invoked when a suspended connection becomes accessible
    /// again.
    fn recycle(&self, connection: &PooledConnection) -> Result<()>;

    /// Returns the GTRIDs of the transactions currently holding
    /// `connection`.
    fn gtrids_holding(&self, _connection: &PooledConnection) -> Vec<String> {
        Vec::new()
    }
}

/// A transaction context with no ambient transactions.
///
/// Useful for pools operated outside any transaction manager, and as a
/// base for tests.
#[derive(Debug, Default)]
pub struct NoTransactionContext;

impl TransactionContext for NoTransactionContext {
    fn current_transaction(&self) -> Option<String> {
        None
    }

    fn delist_from_current(
        &self,
        _connection: &PooledConnection,
    ) -> std::result::Result<(), DelistError> {
        Ok(())
    }

    fn recycle(&self, _connection: &PooledConnection) -> Result<()> {
        Ok(())
    }
}
