//! Persistence layer.
//!
//! SQLite through sqlx: a read pool for snapshots, a single-connection write
//! pool for `BEGIN IMMEDIATE` transactions, the schema models and the
//! transactional row operations used by export, import and deletion.

pub mod models;
pub mod repositories;
pub mod time;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

/// Serialized write pool type alias (max_connections=1).
pub type WritePool = Pool<Sqlite>;

/// Upper bound for the read pool.
const MAX_READ_POOL_SIZE: u32 = 10;

const BUSY_TIMEOUT_MS: u64 = 30_000;

/// Roughly 4MB with 4KB pages.
const WAL_AUTOCHECKPOINT_PAGES: i32 = 1000;

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        // debts and activities reference contacts
        .foreign_keys(true)
        .create_if_missing(true))
}

async fn apply_per_connection_pragmas(
    conn: &mut sqlx::SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "PRAGMA wal_autocheckpoint = {}",
        WAL_AUTOCHECKPOINT_PAGES
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query("PRAGMA temp_store = MEMORY")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn build_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .after_connect(|conn, _meta| {
            Box::pin(async move { apply_per_connection_pragmas(&mut *conn).await })
        })
        .connect_with(connect_options(database_url)?)
        .await
}

async fn log_journal_mode(pool: &DbPool, pool_name: &str) -> Result<(), sqlx::Error> {
    let row = sqlx::query("PRAGMA journal_mode").fetch_one(pool).await?;
    let mode: String = row.get(0);
    if mode != "wal" && mode != "memory" {
        tracing::warn!(pool = pool_name, mode = %mode, "SQLite is not running in WAL mode");
    }
    Ok(())
}

/// Read pool size derived from the available cores.
pub fn default_read_pool_size() -> u32 {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(2);
    (cores * 2).min(MAX_READ_POOL_SIZE)
}

/// Initialize the read pool.
///
/// Export snapshots run here; with WAL they never block the writer.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let size = default_read_pool_size();
    let pool = build_pool(database_url, size, Duration::from_secs(30)).await?;
    log_journal_mode(&pool, "read_pool").await?;

    tracing::info!(max_connections = size, "Database read pool initialized");

    Ok(pool)
}

/// Initialize the serialized write pool (`max_connections = 1`).
///
/// Imports and deletions take the SQLite write lock up front through
/// [`begin_immediate`]; funnelling them through one connection keeps
/// concurrent requests queueing on the pool instead of failing with
/// `SQLITE_BUSY` halfway through a transaction.
pub async fn init_write_pool(database_url: &str) -> Result<WritePool, sqlx::Error> {
    let pool = build_pool(database_url, 1, Duration::from_secs(60)).await?;
    log_journal_mode(&pool, "write_pool").await?;

    tracing::info!("Database write pool initialized (serialized writes)");

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Start a write transaction holding the SQLite write lock.
pub async fn begin_immediate(pool: &WritePool) -> Result<ImmediateTransaction, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(ImmediateTransaction::new(conn))
}

/// A manual `BEGIN IMMEDIATE` transaction.
///
/// Exactly one of [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// finishes it. Dropping an unfinished transaction (an early `?` return or a
/// cancelled request future) closes the connection instead of returning it
/// to the pool, and SQLite discards the uncommitted changes.
pub struct ImmediateTransaction {
    conn: sqlx::pool::PoolConnection<Sqlite>,
    finished: bool,
}

impl ImmediateTransaction {
    fn new(conn: sqlx::pool::PoolConnection<Sqlite>) -> Self {
        Self {
            conn,
            finished: false,
        }
    }

    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("COMMIT").execute(&mut *self.conn).await?;
        self.finished = true;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("ROLLBACK").execute(&mut *self.conn).await?;
        self.finished = true;
        Ok(())
    }
}

impl std::ops::Deref for ImmediateTransaction {
    type Target = sqlx::SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for ImmediateTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Dropping unfinished write transaction; changes are discarded");
            self.conn.close_on_drop();
        }
    }
}
