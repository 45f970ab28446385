//! Open document store connections.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Open or create the store DB, ensure schema + WAL, and enforce collection foreign keys.
/// `busy_timeout` bounds how long a write waits on another connection's lock.
pub fn open_db(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path).context("open database")?;
    conn.busy_timeout(busy_timeout)
        .context("set busy timeout")?;
    conn.pragma_update(None, "foreign_keys", true)
        .context("enable foreign keys")?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// Open an in-memory DB with the same schema (no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", true)
        .context("enable foreign keys")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}
