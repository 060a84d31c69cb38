//! DuckDB over the snapshot files, for ad-hoc SQL exploration of cached tables.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use tracing::info;

use crate::StoreError;

/// In-memory DuckDB with one view per registered Parquet snapshot.
///
/// Views read the file on every query, so nothing is copied into the database
/// and the snapshot on disk stays the single source of truth.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Expose a Parquet snapshot as view `name`.
    pub fn register_parquet(&self, name: &str, path: &Path) -> Result<(), StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let sql = format!(
            "CREATE OR REPLACE VIEW {name} AS SELECT * FROM read_parquet('{}')",
            path.display().to_string().replace('\'', "''")
        );
        self.conn.execute_batch(&sql)?;
        info!(view = name, path = %path.display(), "registered parquet view");
        Ok(())
    }

    /// Number of rows in a table or view.
    pub fn count(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let batches = self.query_arrow(&sql)?;
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}
