//! Category lists from CSV files

use crate::common::error::{PivotError, PivotResult};
use crate::invalid_spec_err;
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

/// Read the distinct non-empty values of `column` from a CSV file with a
/// header row, in first-occurrence order.
pub fn read_categories(path: &Path, column: &str) -> PivotResult<Vec<String>> {
    let file = std::fs::File::open(path)?;
    read_categories_from(file, column).map_err(|e| match e {
        PivotError::InvalidSpec(msg) => {
            PivotError::InvalidSpec(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Same as `read_categories`, from any reader
pub fn read_categories_from<R: Read>(reader: R, column: &str) -> PivotResult<Vec<String>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column_idx = headers.iter().position(|h| h == column).ok_or_else(|| {
        invalid_spec_err!(
            "CSV has no column '{}' (columns: {})",
            column,
            headers.iter().collect::<Vec<_>>().join(", ")
        )
    })?;

    let mut categories: Vec<String> = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        match record.get(column_idx) {
            Some(field) if !field.is_empty() => {
                if !categories.iter().any(|c| c == field) {
                    categories.push(field.to_string());
                }
            }
            _ => {}
        }
    }

    tracing::debug!(column, count = categories.len(), "read categories from CSV");
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_distinct_in_order() {
        let data = "user_id,event_type\n1,view\n2,click\n3,view\n4,\n";
        let categories = read_categories_from(Cursor::new(data), "event_type").unwrap();
        assert_eq!(categories, vec!["view", "click"]);
    }

    #[test]
    fn test_missing_column() {
        let data = "a,b\n1,2\n";
        let err = read_categories_from(Cursor::new(data), "event_type").unwrap_err();
        assert!(matches!(err, PivotError::InvalidSpec(_)));
        assert!(err.to_string().contains("columns: a, b"));
    }

    #[test]
    fn test_quoted_fields() {
        let data = "event_type\n\"it's, quoted\"\nplain\n";
        let categories = read_categories_from(Cursor::new(data), "event_type").unwrap();
        assert_eq!(categories, vec!["it's, quoted", "plain"]);
    }
}
