//! Registry of statements created outside the cache.

use std::sync::{Arc, Mutex, MutexGuard};

use super::SharedStatement;

/// Tracks open statements not managed by the statement cache so they can
/// be force-closed when the connection returns to the pool.
///
/// Caller threads insert and remove concurrently with the owner thread.
/// Iteration never holds the lock: [`drain`](Self::drain) swaps the
/// contents out and leaves the registry empty.
#[derive(Default)]
pub struct UncachedStatementRegistry {
    statements: Mutex<Vec<SharedStatement>>,
}

impl std::fmt::Debug for UncachedStatementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UncachedStatementRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl UncachedStatementRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SharedStatement>> {
        match self.statements.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a statement for forced close at pool return.
    pub fn register(&self, statement: SharedStatement) -> SharedStatement {
        self.lock().push(statement.clone());
        statement
    }

    /// Removes a statement, typically because its caller closed it.
    ///
    /// Statements are matched by handle identity; an unknown handle is
    /// ignored.
    pub fn unregister(&self, statement: &SharedStatement) {
        self.lock().retain(|tracked| !Arc::ptr_eq(tracked, statement));
    }

    /// Swaps out and returns every tracked statement, leaving the registry
    /// empty.
    pub fn drain(&self) -> Vec<SharedStatement> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns the number of tracked statements.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no statements are tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::share_statement;
    use super::*;
    use crate::driver::{PreparedStatement, ResultSet};
    use biphase_core::DriverError;
    use std::time::Duration;

    struct StubStatement;

    impl PreparedStatement for StubStatement {
        fn set_query_timeout(&mut self, _timeout: Duration) -> Result<(), DriverError> {
            Ok(())
        }

        fn execute_query(&mut self) -> Result<Box<dyn ResultSet>, DriverError> {
            Err(DriverError::new("not implemented"))
        }

        fn close(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn statement() -> SharedStatement {
        share_statement(Box::new(StubStatement))
    }

    #[test]
    fn test_register_and_len() {
        let registry = UncachedStatementRegistry::new();
        assert!(registry.is_empty());
        registry.register(statement());
        registry.register(statement());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_returns_statement() {
        let registry = UncachedStatementRegistry::new();
        let tracked = statement();
        let returned = registry.register(tracked.clone());
        assert!(Arc::ptr_eq(&returned, &tracked));
    }

    #[test]
    fn test_unregister_matches_by_identity() {
        let registry = UncachedStatementRegistry::new();
        let first = registry.register(statement());
        let second = registry.register(statement());
        registry.unregister(&first);
        assert_eq!(registry.len(), 1);
        let remaining = registry.drain();
        assert!(Arc::ptr_eq(&remaining[0], &second));
    }

    #[test]
    fn test_unregister_unknown_is_ignored() {
        let registry = UncachedStatementRegistry::new();
        registry.register(statement());
        registry.unregister(&statement());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = UncachedStatementRegistry::new();
        registry.register(statement());
        registry.register(statement());
        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.drain().is_empty());
    }

    #[test]
    fn test_duplicate_registration_is_a_multiset() {
        let registry = UncachedStatementRegistry::new();
        let tracked = statement();
        registry.register(tracked.clone());
        registry.register(tracked.clone());
        assert_eq!(registry.len(), 2);
        // Identity-based removal drops every occurrence.
        registry.unregister(&tracked);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = std::sync::Arc::new(UncachedStatementRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let tracked = registry.register(statement());
                        registry.unregister(&tracked);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
