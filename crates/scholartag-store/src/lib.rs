//! Storage layer: whole-table snapshot caches on disk, DuckDB (optional) for ad-hoc SQL over them.

mod error;
pub use error::StoreError;

pub mod cache;
pub use cache::{JsonSnapshot, ParquetSnapshot, SnapshotCache, SnapshotFormat};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
