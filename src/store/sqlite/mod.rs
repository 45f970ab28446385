//! SQLite-backed partitioned document collection.

mod connection;

pub use connection::{open_db, open_db_in_memory};

use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::DocumentStore;
use crate::engine::record::IngestDocument;
use crate::error::{IngestError, WriteError};
use crate::types::{CollectionId, ThroughputBudget};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Schema for collections (with their provisioned throughput) and documents.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    database TEXT NOT NULL,
    name TEXT NOT NULL,
    partition_key_path TEXT NOT NULL,
    throughput INTEGER,
    PRIMARY KEY (database, name)
);

CREATE TABLE IF NOT EXISTS documents (
    database TEXT NOT NULL,
    collection TEXT NOT NULL,
    partition_key TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (database, collection, partition_key, id),
    FOREIGN KEY (database, collection) REFERENCES collections (database, name)
);
"#;

/// Insert-or-replace for one document.
pub(crate) const UPSERT_DOCUMENT_SQL: &str = r#"
INSERT INTO documents (database, collection, partition_key, id, body)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (database, collection, partition_key, id) DO UPDATE SET body = excluded.body
"#;

const THROUGHPUT_SQL: &str =
    "SELECT throughput FROM collections WHERE database = ?1 AND name = ?2";

/// Document store over a pool of SQLite connections.
///
/// Lock contention between connections surfaces as [`WriteError::Throttled`].
pub struct SqliteDocumentStore {
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl SqliteDocumentStore {
    /// Open (or create) the store at `path` with `pool_size` connections.
    pub fn open(path: &Path, pool_size: usize, busy_timeout: Duration) -> Result<Self> {
        let pool = (0..pool_size.max(1))
            .map(|_| open_db(path, busy_timeout).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
        })
    }

    /// Single-connection in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            pool: vec![Mutex::new(open_db_in_memory()?)],
            next: AtomicUsize::new(0),
        })
    }

    fn conn(&self) -> Option<MutexGuard<'_, Connection>> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        self.pool[i].lock().ok()
    }

    fn conn_or_err(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn()
            .ok_or_else(|| anyhow::anyhow!("connection mutex poisoned"))
    }

    /// Create or update a collection row. Used by provisioning tools and tests; ingestion never creates collections.
    pub fn create_collection(
        &self,
        id: &CollectionId,
        partition_key_path: &str,
        throughput: Option<u32>,
    ) -> Result<()> {
        let conn = self.conn_or_err()?;
        conn.execute(
            "INSERT INTO collections (database, name, partition_key_path, throughput)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (database, name) DO UPDATE
             SET partition_key_path = excluded.partition_key_path, throughput = excluded.throughput",
            rusqlite::params![id.database, id.collection, partition_key_path, throughput],
        )
        .context("create collection")?;
        Ok(())
    }

    /// Number of documents in `id`.
    pub fn document_count(&self, id: &CollectionId) -> Result<usize> {
        let conn = self.conn_or_err()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE database = ?1 AND collection = ?2",
                [&id.database, &id.collection],
                |row| row.get(0),
            )
            .context("count documents")?;
        Ok(n.max(0) as usize)
    }

    /// Stored body of one document, if present.
    pub fn get_document(
        &self,
        id: &CollectionId,
        partition_key: &str,
        doc_id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        let conn = self.conn_or_err()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents
                 WHERE database = ?1 AND collection = ?2 AND partition_key = ?3 AND id = ?4",
                rusqlite::params![id.database, id.collection, partition_key, doc_id],
                |row| row.get(0),
            )
            .optional()
            .context("load document")?;
        body.map(|b| serde_json::from_str(&b).context("decode stored document"))
            .transpose()
    }
}

fn to_write_error(e: rusqlite::Error) -> WriteError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            WriteError::Throttled { retry_after: None }
        }
        _ => WriteError::Rejected(e.to_string()),
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn provisioned_throughput(
        &self,
        collection: &CollectionId,
    ) -> Result<ThroughputBudget, IngestError> {
        let conn = self
            .conn()
            .ok_or_else(|| IngestError::Configuration("connection mutex poisoned".into()))?;
        let row: Option<Option<i64>> = conn
            .query_row(
                THROUGHPUT_SQL,
                [&collection.database, &collection.collection],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| IngestError::Configuration(format!("read collection {collection}: {e}")))?;
        match row {
            None => Err(IngestError::Configuration(format!(
                "collection {collection} not found"
            ))),
            Some(None) => Err(IngestError::Configuration(format!(
                "collection {collection} has no throughput offer"
            ))),
            Some(Some(units)) if units > 0 => Ok(ThroughputBudget(
                u32::try_from(units).unwrap_or(u32::MAX),
            )),
            Some(Some(units)) => Err(IngestError::Configuration(format!(
                "collection {collection} has non-positive throughput {units}"
            ))),
        }
    }

    fn upsert(&self, collection: &CollectionId, doc: &IngestDocument) -> Result<(), WriteError> {
        let conn = self
            .conn()
            .ok_or_else(|| WriteError::Rejected("connection mutex poisoned".into()))?;
        conn.execute(
            UPSERT_DOCUMENT_SQL,
            rusqlite::params![
                collection.database,
                collection.collection,
                doc.partition_key,
                doc.id,
                doc.to_json()
            ],
        )
        .map_err(to_write_error)?;
        Ok(())
    }
}
