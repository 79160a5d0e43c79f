//! PostgreSQL implementation of the user store.
//!
//! Correctness rests on the schema: `UNIQUE (login, auth_user_type)` on
//! `user_ids`, the primary key on `tokens.token`, and the row lock taken by
//! `DELETE ... RETURNING` for single-use token consumption.

mod identity;
mod token;

use crate::user::{StoreError, StoreResult};
use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::warn;

/// Default deadline for a single store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub operation_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

/// Open a bounded connection pool.
///
/// # Errors
/// Returns an error if the database cannot be reached.
pub async fn connect(dsn: &str, config: &PoolConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(config.operation_timeout)
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Store backed by a shared `PgPool`. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    operation_timeout: Duration,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool, operation_timeout: Duration) -> Self {
        Self {
            pool,
            operation_timeout,
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `fut` under the operation deadline. Dropping the inner future on
    /// expiry cancels the in-flight query and rolls back any open transaction.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        if let Ok(result) = timeout(self.operation_timeout, fut).await {
            result
        } else {
            warn!(operation, "store operation timed out");
            Err(StoreError::Timeout { operation })
        }
    }
}

/// Classify a sqlx error for `operation`. Pool acquire timeouts are deadline
/// expiries, not database faults.
fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout { operation },
        other => StoreError::database(operation, other),
    }
}
