//! SQLite connection pooling.
//!
//! Chat turns run their store calls on the blocking thread pool, so several
//! connections can be live at once: WAL keeps readers unblocked while a turn
//! writes, and the busy timeout lets concurrent appends to the same
//! conversation queue instead of failing fast.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// A pool of SQLite connections, shared across request handlers.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pool sizing and contention tunables, surfaced through server config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database before giving up,
    /// in milliseconds.
    pub busy_timeout_ms: u64,

    /// Upper bound on simultaneously open connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Applies the per-connection pragmas every pooled connection needs.
///
/// WAL must actually take effect, not just be requested: the pragma returns
/// the resulting mode, and anything other than `wal` (or `memory`, which
/// in-memory databases report) is treated as a connection failure. Foreign
/// keys are enforced so conversation items cannot outlive their
/// conversation.
fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> Result<(), rusqlite::Error> {
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    match mode.as_str() {
        "wal" | "memory" => {}
        other => {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("journal_mode pragma returned {other}, expected wal")),
            ));
        }
    }

    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}

/// Opens (creating if absent) the database at `db_path` and wraps it in a
/// configured pool. `:memory:` works for single-connection test setups;
/// anything that needs the data visible across pooled connections should use
/// a file path.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| configure_connection(conn, settings.busy_timeout_ms));

    Ok(Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?)
}
