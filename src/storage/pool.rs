//! Connection provider backed by an r2d2 pool of SQLite connections

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Transaction, TransactionBehavior};
use crate::Result;
use super::schema;

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

static MEMORY_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Sizing and timeouts for the connection pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum number of simultaneously open connections
    pub max_size: u32,
    /// How long a checkout may block before failing
    pub connection_timeout: Duration,
    /// How long SQLite waits on a locked database before returning BUSY
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Owns the pool; every mapper checks connections out of it.
///
/// Dropping the provider closes the pool.
pub struct ConnectionProvider {
    pool: SqlitePool,
    location: String,
}

impl ConnectionProvider {
    /// Open a database file (creates it and the schema if missing)
    pub fn open(path: &Path, settings: &PoolSettings) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = r2d2::Pool::builder()
            .max_size(settings.max_size)
            .connection_timeout(settings.connection_timeout)
            .build(with_pragmas(manager, settings.busy_timeout))?;

        Self::initialize(pool, path.display().to_string())
    }

    /// Open a private in-memory database (for testing and demos).
    ///
    /// The pool holds a single connection that is never recycled, since
    /// the database disappears with its last connection.
    pub fn open_in_memory() -> Result<Self> {
        let n = MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!(
            "file:restodir-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            n
        );
        let settings = PoolSettings::default();
        let manager = SqliteConnectionManager::file(&uri);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(settings.connection_timeout)
            .build(with_pragmas(manager, settings.busy_timeout))?;

        Self::initialize(pool, uri)
    }

    fn initialize(pool: SqlitePool, location: String) -> Result<Self> {
        let provider = Self { pool, location };
        provider.initialize_schema()?;
        tracing::info!(
            "Connection pool ready on {} (max {} connections)",
            provider.location,
            provider.pool.max_size()
        );
        Ok(provider)
    }

    /// Initialize the database schema and seed the sequences
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        for name in schema::SEQUENCES {
            conn.execute(
                "INSERT OR IGNORE INTO SEQUENCES (name, next_value) VALUES (?1, 0)",
                params![name],
            )?;
        }
        Ok(())
    }

    /// Where the database lives (file path or memory URI)
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Check a connection out of the pool, blocking up to the pool timeout
    pub fn connection(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Run `body` inside one transaction on one pooled connection.
    ///
    /// Commits when `body` returns `Ok`, rolls back otherwise. A panic
    /// inside `body` also rolls back, through the transaction's drop.
    pub fn in_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match body(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Rollback failed after {}: {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Open and idle connection counts
    pub fn pool_state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }

    /// Row counts of every table
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.connection()?;
        let mut tables = Vec::with_capacity(schema::TABLES.len());
        for table in schema::TABLES.iter().rev() {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            tables.push((*table, count as usize));
        }
        Ok(DbStats { tables })
    }
}

fn with_pragmas(manager: SqliteConnectionManager, busy_timeout: Duration) -> SqliteConnectionManager {
    manager.with_init(move |conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(busy_timeout)
    })
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub tables: Vec<(&'static str, usize)>,
}

impl DbStats {
    pub fn count(&self, table: &str) -> usize {
        self.tables
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for (table, count) in &self.tables {
            writeln!(f, "  {}: {}", table, count)?;
        }
        Ok(())
    }
}
