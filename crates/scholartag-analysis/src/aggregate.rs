//! Tag frequencies and the paper × tag incidence matrix.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use scholartag_core::SchemaError;
use scholartag_core::publication::string_values;
use scholartag_core::schema::tables;

/// Number of assignments carrying one canonical tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Count assignments per tag, most frequent first; ties in tag order.
pub fn tag_frequencies(assignments: &RecordBatch) -> Result<Vec<TagCount>, SchemaError> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for tag in string_values(assignments, tables::TAG)?.into_iter().flatten() {
        *counts.entry(tag).or_default() += 1;
    }

    let mut out: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    Ok(out)
}

/// Frequency table as a `(tag, n)` RecordBatch, for printing.
pub fn frequencies_to_batch(counts: &[TagCount]) -> Result<RecordBatch, SchemaError> {
    let schema = Schema::new(vec![
        Field::new(tables::TAG, DataType::Utf8, false),
        Field::new("n", DataType::UInt64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(counts.iter().map(|c| c.tag.as_str()))),
        Arc::new(UInt64Array::from_iter_values(counts.iter().map(|c| c.count as u64))),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Boolean paper × tag presence matrix.
///
/// Rows are distinct titles in first-appearance order; columns are distinct
/// tags in sorted order. Papers without any assignment do not appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidenceMatrix {
    papers: Vec<String>,
    tags: Vec<String>,
    cells: Vec<Vec<bool>>,
}

impl IncidenceMatrix {
    /// Build from a `tag_assignments` batch.
    pub fn from_assignments(assignments: &RecordBatch) -> Result<Self, SchemaError> {
        let titles = string_values(assignments, tables::TITLE)?;
        let tags = string_values(assignments, tables::TAG)?;

        let pairs: Vec<(String, String)> = titles
            .into_iter()
            .zip(tags)
            .filter_map(|(title, tag)| Some((title?, tag?)))
            .collect();

        let mut papers: Vec<String> = Vec::new();
        let mut paper_index: HashMap<&str, usize> = HashMap::new();
        for (title, _) in &pairs {
            if !paper_index.contains_key(title.as_str()) {
                paper_index.insert(title, papers.len());
                papers.push(title.clone());
            }
        }

        let tag_set: BTreeSet<&str> = pairs.iter().map(|(_, tag)| tag.as_str()).collect();
        let tag_index: HashMap<&str, usize> =
            tag_set.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let mut cells = vec![vec![false; tag_set.len()]; papers.len()];
        for (title, tag) in &pairs {
            cells[paper_index[title.as_str()]][tag_index[tag.as_str()]] = true;
        }

        let tags = tag_set.into_iter().map(str::to_string).collect();
        Ok(Self {
            papers,
            tags,
            cells,
        })
    }

    pub fn papers(&self) -> &[String] {
        &self.papers
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn n_papers(&self) -> usize {
        self.papers.len()
    }

    pub fn n_tags(&self) -> usize {
        self.tags.len()
    }

    /// Presence vector for one paper, aligned with [`tags`](Self::tags).
    pub fn row(&self, paper: usize) -> &[bool] {
        &self.cells[paper]
    }
}
