//! Database handle.
//!
//! [`Db`] owns the SQLite pool; the engine modules (`catalog`,
//! `circulation`, `membership`, ...) each attach their operations to it in
//! their own `impl Db` block. Schema changes live under `migrations/` and run
//! on every init.

pub mod types;

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Shared handle to the library store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Db {
    pub(crate) pool: SqlitePool,
}

impl Db {
    /// Opens the database at `path`, creating the file if missing, and runs
    /// any pending migrations.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at start of program"
    )]
    pub async fn init(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    /// Fully migrated in-memory database. Pinned to a single connection, as
    /// each new in-memory connection would otherwise see its own empty store.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per test database"
    )]
    pub async fn init_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    /// Closes the pool. Pending operations complete first.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at end of program"
    )]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Raw pool access for maintenance jobs and test fixtures.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// True when `error` is SQLite reporting a UNIQUE constraint violation.
#[allow(
    clippy::pattern_type_mismatch,
    reason = "False positive, this is the idiomatic pattern"
)]
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_error) = error {
        db_error.message().contains("UNIQUE constraint failed")
    } else {
        false
    }
}
