/// Arrow schema definitions for the publication tables.
///
/// Every table that flows through the pipeline is a `RecordBatch` with one of
/// these schemas. The two cached tables (`publications`, `classifications`)
/// are what the snapshot cache writes to disk.
pub mod tables {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const ABSTRACT: &str = "abstract";
    pub const LABEL: &str = "label";
    pub const TAG_INDEX: &str = "tag_index";
    pub const TAG: &str = "tag";

    /// Prefix of the wide split columns: `tag_1`, `tag_2`, ...
    pub const TAG_COLUMN_PREFIX: &str = "tag_";

    /// Fetched publication metadata.
    pub fn publications_schema() -> Schema {
        Schema::new(vec![
            Field::new(ID, DataType::Utf8, false),
            Field::new(TITLE, DataType::Utf8, false),
            Field::new(ABSTRACT, DataType::Utf8, false),
        ])
    }

    /// Publications plus the raw model label. A null label means "missing".
    pub fn classifications_schema() -> Schema {
        Schema::new(vec![
            Field::new(ID, DataType::Utf8, false),
            Field::new(TITLE, DataType::Utf8, false),
            Field::new(ABSTRACT, DataType::Utf8, false),
            Field::new(LABEL, DataType::Utf8, true),
        ])
    }

    /// Wide split of the label column: one `tag_<n>` column per segment position.
    pub fn tag_wide_schema(columns: usize) -> Schema {
        let mut fields = Vec::with_capacity(columns + 1);
        fields.push(Field::new(TITLE, DataType::Utf8, false));
        for n in 1..=columns {
            fields.push(Field::new(tag_column_name(n), DataType::Utf8, false));
        }
        Schema::new(fields)
    }

    /// Long (tidy) tag assignments.
    pub fn tag_assignments_schema() -> Schema {
        Schema::new(vec![
            Field::new(TITLE, DataType::Utf8, false),
            Field::new(TAG_INDEX, DataType::UInt32, false),
            Field::new(TAG, DataType::Utf8, false),
        ])
    }

    pub fn tag_column_name(n: usize) -> String {
        format!("{TAG_COLUMN_PREFIX}{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::tables;

    #[test]
    fn classifications_schema_has_nullable_label() {
        let schema = tables::classifications_schema();
        assert_eq!(schema.fields().len(), 4);
        let label = schema.field_with_name("label").unwrap();
        assert!(label.is_nullable());
        assert!(!schema.field_with_name("title").unwrap().is_nullable());
    }

    #[test]
    fn tag_wide_schema_numbers_columns_from_one() {
        let schema = tables::tag_wide_schema(3);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["title", "tag_1", "tag_2", "tag_3"]);
    }

    #[test]
    fn tag_wide_schema_zero_columns() {
        let schema = tables::tag_wide_schema(0);
        assert_eq!(schema.fields().len(), 1);
    }
}
