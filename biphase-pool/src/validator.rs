//! Liveness validation of connections coming out of the pool.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use biphase_core::{BiphaseError, Result};

use crate::config::PoolConfig;
use crate::driver::Connection;

/// Probes connection liveness on first acquisition from the pool.
///
/// Drivers advertising API version 4 are probed natively; drivers that
/// advertise it but fail the probe are downgraded to the query path for
/// the rest of the connection's life. The query path is skipped entirely
/// when no test query is configured.
#[derive(Debug)]
pub(crate) struct ConnectionValidator {
    enable_native_test: bool,
    test_query: Option<String>,
    test_timeout: Duration,
}

impl ConnectionValidator {
    pub(crate) fn from_config(config: &PoolConfig) -> Self {
        Self {
            enable_native_test: config.enable_native_connection_test(),
            test_query: config.test_query().map(str::to_string),
            test_timeout: config.connection_test_timeout(),
        }
    }

    /// Validates `connection`, downgrading `driver_version` to 3 when the
    /// native probe proves dysfunctional.
    pub(crate) fn validate(
        &self,
        connection: &dyn Connection,
        driver_version: &AtomicU8,
    ) -> Result<()> {
        if self.enable_native_test && driver_version.load(Ordering::Acquire) >= 4 {
            tracing::debug!("testing connection with native validity probe");
            match connection.is_valid(self.test_timeout) {
                Ok(true) => {
                    tracing::debug!("native validity probe successfully tested connection");
                    return Ok(());
                }
                Ok(false) => {
                    return Err(BiphaseError::ConnectionDead {
                        message: "connection is no longer valid".to_string(),
                        cause: None,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "dysfunctional native validity probe, falling back to test query"
                    );
                    driver_version.store(3, Ordering::Release);
                }
            }
        }

        let Some(query) = &self.test_query else {
            tracing::debug!("no query to test connection, skipping test");
            return Ok(());
        };

        tracing::debug!(query = %query, "testing connection with query");
        self.run_test_query(connection, query).map_err(|error| {
            BiphaseError::ConnectionDead {
                message: "connection failed its test query".to_string(),
                cause: Some(Box::new(error)),
            }
        })?;
        tracing::debug!(query = %query, "test query successfully tested connection");
        Ok(())
    }

    fn run_test_query(&self, connection: &dyn Connection, query: &str) -> Result<()> {
        let mut statement = connection.prepare_statement(query)?;
        let executed = statement
            .set_query_timeout(self.test_timeout)
            .and_then(|()| statement.execute_query())
            .and_then(|mut result_set| result_set.close());
        // The close failure takes precedence; a query failure it hides is
        // still reported.
        if let Err(error) = statement.close() {
            if let Err(masked) = executed {
                tracing::warn!(error = %masked, "test query failure masked by statement close failure");
            }
            return Err(error.into());
        }
        executed?;
        Ok(())
    }
}
