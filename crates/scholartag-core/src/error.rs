use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing '{0}' column")]
    MissingColumn(String),

    #[error("column '{column}' is {found}, expected a string column")]
    NotUtf8 { column: String, found: String },

    #[error("null {column} at row {row}")]
    NullValue { column: String, row: usize },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
