//! Publication records and their Arrow table form.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, LargeStringArray, StringArray};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::SchemaError;
use crate::schema::tables;

/// Separator between tags in a label string.
pub const TAG_DELIMITER: char = '|';

/// Label meaning "could not classify"; matched case-insensitively.
pub const UNCERTAIN: &str = "NA";

/// A publication pulled from the researcher's scholarly profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub title: String,
    /// Paragraphs joined with `\n`. Empty when the service has none.
    pub r#abstract: String,
}

/// A publication with the raw label string returned by the language model.
///
/// `label` is stored exactly as generated; `None` only appears after a cached
/// table with a null label is read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedPublication {
    #[serde(flatten)]
    pub publication: Publication,
    pub label: Option<String>,
}

/// Build a `publications` RecordBatch.
pub fn publications_to_batch(publications: &[Publication]) -> Result<RecordBatch, SchemaError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            publications.iter().map(|p| p.id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            publications.iter().map(|p| p.title.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            publications.iter().map(|p| p.r#abstract.as_str()),
        )),
    ];
    Ok(RecordBatch::try_new(
        Arc::new(tables::publications_schema()),
        columns,
    )?)
}

/// Read publications back from `publications` (or `classifications`) batches.
pub fn publications_from_batches(batches: &[RecordBatch]) -> Result<Vec<Publication>, SchemaError> {
    let mut out = Vec::new();
    for batch in batches {
        let ids = string_values(batch, tables::ID)?;
        let titles = string_values(batch, tables::TITLE)?;
        let abstracts = string_values(batch, tables::ABSTRACT)?;

        for (row, ((id, title), abs)) in ids.into_iter().zip(titles).zip(abstracts).enumerate() {
            out.push(Publication {
                id: require(id, tables::ID, row)?,
                title: require(title, tables::TITLE, row)?,
                r#abstract: abs.unwrap_or_default(),
            });
        }
    }
    Ok(out)
}

/// Build a `classifications` RecordBatch.
pub fn classifications_to_batch(
    classified: &[ClassifiedPublication],
) -> Result<RecordBatch, SchemaError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            classified.iter().map(|c| c.publication.id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            classified.iter().map(|c| c.publication.title.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            classified.iter().map(|c| c.publication.r#abstract.as_str()),
        )),
        Arc::new(StringArray::from_iter(
            classified.iter().map(|c| c.label.as_deref()),
        )),
    ];
    Ok(RecordBatch::try_new(
        Arc::new(tables::classifications_schema()),
        columns,
    )?)
}

/// Read classification results back from `classifications` batches.
pub fn classifications_from_batches(
    batches: &[RecordBatch],
) -> Result<Vec<ClassifiedPublication>, SchemaError> {
    let mut out = Vec::new();
    for batch in batches {
        let publications = publications_from_batches(std::slice::from_ref(batch))?;
        let labels = string_values(batch, tables::LABEL)?;
        out.extend(
            publications
                .into_iter()
                .zip(labels)
                .map(|(publication, label)| ClassifiedPublication { publication, label }),
        );
    }
    Ok(out)
}

// ── Arrow extraction helpers ──

/// All values of a string column (handles Utf8 and LargeUtf8). Nulls become `None`.
pub fn string_values(batch: &RecordBatch, column: &str) -> Result<Vec<Option<String>>, SchemaError> {
    let col = batch
        .column_by_name(column)
        .ok_or_else(|| SchemaError::MissingColumn(column.to_string()))?;

    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        return Ok(arr.iter().map(|v| v.map(str::to_string)).collect());
    }
    if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
        return Ok(arr.iter().map(|v| v.map(str::to_string)).collect());
    }

    Err(SchemaError::NotUtf8 {
        column: column.to_string(),
        found: col.data_type().to_string(),
    })
}

fn require(value: Option<String>, column: &str, row: usize) -> Result<String, SchemaError> {
    value.ok_or_else(|| SchemaError::NullValue {
        column: column.to_string(),
        row,
    })
}
