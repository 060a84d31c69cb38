//! Wide-to-long reshaping of model label strings.
//!
//! Every step is a pure function from one `RecordBatch` to another:
//!
//! 1. [`mark_missing`]: `na` labels become null.
//! 2. [`split_labels`]: `label` → `tag_1 … tag_n`, right-padded with `""`,
//!    where `n` is the largest segment count in the batch.
//! 3. [`unpivot`]: one `(title, tag_index, tag)` row per cell, row-major.
//! 4. [`drop_empty`]: remove rows whose tag is `""`.
//! 5. [`recode`]: rewrite tags through a [`SynonymMap`].
//!
//! [`tidy_tags`] runs the whole chain.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, StringArray, UInt32Array};
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use scholartag_core::publication::string_values;
use scholartag_core::schema::tables;
use scholartag_core::{SchemaError, SynonymMap, TAG_DELIMITER, UNCERTAIN};
use tracing::debug;

/// How much clean-up is applied to model output before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPolicy {
    /// Trim and lowercase the label and every segment.
    #[default]
    Sanitise,
    /// Keep segments exactly as generated; only the `na` check is case-insensitive.
    Raw,
}

impl LabelPolicy {
    fn clean(self, s: &str) -> String {
        match self {
            Self::Sanitise => s.trim().to_lowercase(),
            Self::Raw => s.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TidyOptions {
    pub delimiter: char,
    pub policy: LabelPolicy,
    pub synonyms: SynonymMap,
}

impl Default for TidyOptions {
    fn default() -> Self {
        Self {
            delimiter: TAG_DELIMITER,
            policy: LabelPolicy::default(),
            synonyms: SynonymMap::default(),
        }
    }
}

/// Full chain: `classifications` batch → canonical `tag_assignments` batch.
pub fn tidy_tags(classifications: &RecordBatch, options: &TidyOptions) -> Result<RecordBatch, SchemaError> {
    let marked = mark_missing(classifications, options.policy)?;
    let wide = split_labels(&marked, options.delimiter, options.policy)?;
    let long = unpivot(&wide)?;
    let tags = drop_empty(&long)?;
    let canonical = recode(&tags, &options.synonyms)?;
    debug!(
        papers = classifications.num_rows(),
        columns = wide.num_columns() - 1,
        assignments = canonical.num_rows(),
        "tidied tag labels"
    );
    Ok(canonical)
}

/// Replace `na` labels (any case) with null. Under [`LabelPolicy::Sanitise`]
/// the label is trimmed first, so `" NA\n"` also counts.
pub fn mark_missing(batch: &RecordBatch, policy: LabelPolicy) -> Result<RecordBatch, SchemaError> {
    let labels = string_values(batch, tables::LABEL)?;
    let marked: StringArray = labels
        .iter()
        .map(|label| {
            label.as_deref().filter(|l| {
                let candidate = match policy {
                    LabelPolicy::Sanitise => l.trim(),
                    LabelPolicy::Raw => l,
                };
                !candidate.eq_ignore_ascii_case(UNCERTAIN)
            })
        })
        .collect();
    replace_column(batch, tables::LABEL, Arc::new(marked))
}

/// Split `label` on `delimiter` into `tag_1 … tag_n`, padding short rows with `""`.
///
/// Null labels contribute no segments, so a row of all `""`.
pub fn split_labels(
    batch: &RecordBatch,
    delimiter: char,
    policy: LabelPolicy,
) -> Result<RecordBatch, SchemaError> {
    let titles = string_values(batch, tables::TITLE)?;
    let labels = string_values(batch, tables::LABEL)?;

    let segments: Vec<Vec<String>> = labels
        .iter()
        .map(|label| match label {
            Some(l) => l.split(delimiter).map(|s| policy.clean(s)).collect(),
            None => Vec::new(),
        })
        .collect();
    let width = segments.iter().map(Vec::len).max().unwrap_or(0);

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(width + 1);
    columns.push(Arc::new(StringArray::from_iter_values(
        titles.iter().map(|t| t.as_deref().unwrap_or_default()),
    )));
    for n in 0..width {
        columns.push(Arc::new(StringArray::from_iter_values(
            segments
                .iter()
                .map(|row| row.get(n).map(String::as_str).unwrap_or_default()),
        )));
    }

    Ok(RecordBatch::try_new(
        Arc::new(tables::tag_wide_schema(width)),
        columns,
    )?)
}

/// Wide `tag_<n>` columns → long `(title, tag_index, tag)` rows, keeping empties.
pub fn unpivot(wide: &RecordBatch) -> Result<RecordBatch, SchemaError> {
    let titles = string_values(wide, tables::TITLE)?;

    let schema = wide.schema();
    let mut tag_columns: Vec<(u32, Vec<Option<String>>)> = Vec::new();
    for field in schema.fields() {
        let Some(n) = field
            .name()
            .strip_prefix(tables::TAG_COLUMN_PREFIX)
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        tag_columns.push((n, string_values(wide, field.name())?));
    }
    tag_columns.sort_by_key(|(n, _)| *n);

    let capacity = titles.len() * tag_columns.len();
    let mut out_titles = Vec::with_capacity(capacity);
    let mut out_index = Vec::with_capacity(capacity);
    let mut out_tags = Vec::with_capacity(capacity);

    for (row, title) in titles.iter().enumerate() {
        for (n, values) in &tag_columns {
            out_titles.push(title.clone().unwrap_or_default());
            out_index.push(*n);
            out_tags.push(values[row].clone().unwrap_or_default());
        }
    }

    Ok(RecordBatch::try_new(
        Arc::new(tables::tag_assignments_schema()),
        vec![
            Arc::new(StringArray::from(out_titles)),
            Arc::new(UInt32Array::from(out_index)),
            Arc::new(StringArray::from(out_tags)),
        ],
    )?)
}

/// Remove assignments whose tag is the empty string.
pub fn drop_empty(long: &RecordBatch) -> Result<RecordBatch, SchemaError> {
    let tags = string_values(long, tables::TAG)?;
    let keep: BooleanArray = tags
        .iter()
        .map(|t| Some(t.as_deref().is_some_and(|t| !t.is_empty())))
        .collect();
    Ok(filter_record_batch(long, &keep)?)
}

/// Rewrite every tag to its canonical spelling.
pub fn recode(long: &RecordBatch, synonyms: &SynonymMap) -> Result<RecordBatch, SchemaError> {
    let tags = string_values(long, tables::TAG)?;
    let recoded: StringArray = tags
        .iter()
        .map(|t| t.as_deref().map(|t| synonyms.canonical(t)))
        .collect();
    replace_column(long, tables::TAG, Arc::new(recoded))
}

fn replace_column(batch: &RecordBatch, name: &str, column: ArrayRef) -> Result<RecordBatch, SchemaError> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| SchemaError::MissingColumn(name.to_string()))?;
    let mut columns = batch.columns().to_vec();
    columns[idx] = column;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}
