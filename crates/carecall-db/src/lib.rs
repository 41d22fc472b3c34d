//! # carecall-db
//!
//! Reminder persistence for carecall.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgReminderStore`], the PostgreSQL [`ReminderStore`]
//! - [`MemoryReminderStore`], a locked in-process store for tests and
//!   single-node deployments
//!
//! ## Example
//!
//! ```rust,ignore
//! use carecall_db::{Database, ReminderStore, NewReminder, ReminderKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/carecall").await?;
//!     db.migrate().await?;
//!
//!     let reminder = db.reminders.create(NewReminder::new(
//!         "user-1",
//!         ReminderKind::Medication,
//!         chrono::Utc::now(),
//!     )).await?;
//!
//!     println!("Created reminder: {}", reminder.id);
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod pool;
pub mod reminders;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use carecall_core::*;

pub use memory::MemoryReminderStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use reminders::PgReminderStore;

/// Database handle bundling the pool with its repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Reminder store.
    pub reminders: PgReminderStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            reminders: PgReminderStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
