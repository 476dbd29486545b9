//! Database connection manager
//!
//! Owns the SQLite pool and the schema; queries live next to the data they
//! touch in the `machines` and `notifications` modules.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::query;
use std::str::FromStr;
use tracing::{debug, info};

/// Database connection manager
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    /// Create a new database manager with the given connection URL
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        // every connection to an in-memory database is a separate database
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

        debug!("Successfully connected to SQLite database");

        Ok(Self { pool })
    }

    /// Fresh in-memory database with the schema applied
    pub async fn in_memory() -> Result<Self> {
        let manager = Self::new("sqlite::memory:").await?;
        manager.migrate().await?;
        Ok(manager)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        self.create_tables().await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Create database tables
    async fn create_tables(&self) -> Result<()> {
        // Rooms that have been loaded at least once
        query(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY,
                loaded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Latest reading of every machine
        query(
            r#"
            CREATE TABLE IF NOT EXISTS machines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                number INTEGER NOT NULL,
                machine_type INTEGER NOT NULL,
                esuds_id INTEGER NOT NULL DEFAULT -1,
                status INTEGER NOT NULL,
                time_remaining INTEGER NOT NULL DEFAULT -1,
                last_updated INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Armed notifications
        query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                extended INTEGER NOT NULL DEFAULT 0,
                room_id INTEGER NOT NULL,
                machine_num INTEGER NOT NULL,
                machine_type INTEGER NOT NULL,
                desired_status INTEGER NOT NULL,
                estimated_completion INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Notifications that fired
        query(
            r#"
            CREATE TABLE IF NOT EXISTS completed_notifications (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                extended INTEGER NOT NULL DEFAULT 0,
                room_id INTEGER NOT NULL,
                machine_num INTEGER NOT NULL,
                machine_type INTEGER NOT NULL,
                desired_status INTEGER NOT NULL,
                estimated_completion INTEGER,
                completed_at INTEGER NOT NULL,
                final_status INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // providers may repeat a machine number (unparsable numbers all read as -1)
        query("CREATE INDEX IF NOT EXISTS idx_machines_room ON machines (room_id)")
            .execute(&self.pool)
            .await?;

        query("CREATE INDEX IF NOT EXISTS idx_pending_room ON pending_notifications (room_id)")
            .execute(&self.pool)
            .await?;

        debug!("SQLite tables created successfully");
        Ok(())
    }

    /// Get connection pool statistics
    pub fn pool_size(&self) -> u32 {
        self.pool.size()
    }

    /// Test database connection
    pub async fn test_connection(&self) -> Result<()> {
        query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database connection test failed: {}", e))?;

        debug!("Database connection test successful");
        Ok(())
    }
}
