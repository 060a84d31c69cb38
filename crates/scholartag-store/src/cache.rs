//! Key-less snapshot cache: one file holds one complete result set.
//!
//! [`SnapshotCache::load_or_compute`] returns the file's contents when the file
//! exists and only runs the (expensive) compute step when it does not. There is
//! no expiry and no staleness check: delete the file, or call
//! [`SnapshotCache::invalidate`], to force a recompute.

use std::fs::File;
use std::future::Future;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::StoreError;

/// Serialisation strategy for a snapshot file.
pub trait SnapshotFormat {
    type Value;

    fn read(&self, path: &Path) -> Result<Self::Value, StoreError>;
    fn write(&self, path: &Path, value: &Self::Value) -> Result<(), StoreError>;
}

/// A whole Arrow table stored as a single Parquet file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSnapshot;

impl SnapshotFormat for ParquetSnapshot {
    type Value = RecordBatch;

    fn read(&self, path: &Path) -> Result<RecordBatch, StoreError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches: Result<Vec<RecordBatch>, _> = builder.build()?.collect();
        Ok(concat_batches(&schema, &batches?)?)
    }

    fn write(&self, path: &Path, value: &RecordBatch) -> Result<(), StoreError> {
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, value.schema(), None)?;
        writer.write(value)?;
        writer.close()?;
        Ok(())
    }
}

/// Any serde value stored as pretty-printed JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonSnapshot<T>(PhantomData<T>);

impl<T> JsonSnapshot<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonSnapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> SnapshotFormat for JsonSnapshot<T> {
    type Value = T;

    fn read(&self, path: &Path) -> Result<T, StoreError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }
}

/// A snapshot file plus the format used to read and write it.
#[derive(Debug, Clone)]
pub struct SnapshotCache<F> {
    path: PathBuf,
    format: F,
}

impl<F: SnapshotFormat> SnapshotCache<F> {
    pub fn new(path: impl Into<PathBuf>, format: F) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot is present. Presence alone makes it authoritative.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the snapshot. Errors with [`StoreError::NotFound`] if absent.
    pub fn load(&self) -> Result<F::Value, StoreError> {
        if !self.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }
        self.format.read(&self.path)
    }

    /// Write the snapshot, creating parent directories as needed.
    ///
    /// The value goes to a sibling temp file first and is renamed into place,
    /// so an interrupted write never leaves a partial snapshot behind.
    pub fn store(&self, value: &F::Value) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        self.format.write(&tmp, value)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove the snapshot. Returns whether a file was deleted.
    pub fn invalidate(&self) -> Result<bool, StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "removed cache snapshot");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the snapshot if present, otherwise run `compute`, persist, and return its result.
    pub async fn load_or_compute<C, Fut, E>(&self, compute: C) -> Result<F::Value, E>
    where
        C: FnOnce() -> Fut,
        Fut: Future<Output = Result<F::Value, E>>,
        E: From<StoreError>,
    {
        if self.exists() {
            info!(path = %self.path.display(), "loading cached snapshot");
            return Ok(self.load()?);
        }

        info!(path = %self.path.display(), "no snapshot, computing");
        let value = compute().await?;
        self.store(&value)?;
        info!(path = %self.path.display(), "wrote snapshot");
        Ok(value)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
