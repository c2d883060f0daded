//! In-memory query results
//!
//! A `ResultSet` holds the fully loaded output of a query run through a
//! warehouse, together with the column names and types the warehouse
//! reported.

use crate::common::error::{PivotError, PivotResult};
use crate::types::value::{Value, ValueType};
use serde_json::{Map, Value as JsonValue};

/// Column metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: ValueType,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: ValueType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Tabular query result loaded fully into memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Get the number of rows in the result
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns in the result
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values of one column by name, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    /// Convert result to a formatted table string
    pub fn to_table_string(&self) -> String {
        let mut output = String::new();
        let column_count = self.columns.len();
        if column_count == 0 {
            return output;
        }

        // Widths account for the name, the type line and every cell
        let mut column_widths: Vec<usize> = self
            .columns
            .iter()
            .map(|col| col.name.chars().count().max(col.data_type.name().chars().count()))
            .collect();
        for row in &self.rows {
            for (col_idx, value) in row.iter().enumerate().take(column_count) {
                column_widths[col_idx] = column_widths[col_idx].max(value.to_string().chars().count());
            }
        }

        push_border(&mut output, &column_widths, '┌', '┬', '┐');

        let names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        push_line(&mut output, &names, &column_widths);
        let types: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.data_type.name().to_string())
            .collect();
        push_line(&mut output, &types, &column_widths);

        push_border(&mut output, &column_widths, '├', '┼', '┤');

        for row in &self.rows {
            let cells: Vec<String> = (0..column_count)
                .map(|idx| row.get(idx).map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string()))
                .collect();
            push_line(&mut output, &cells, &column_widths);
        }

        push_border(&mut output, &column_widths, '└', '┴', '┘');
        output
    }

    /// Render as CSV with a header row. NULL cells are written empty.
    pub fn to_csv_string(&self) -> PivotResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| match v {
                Value::Null => String::new(),
                other => other.to_string(),
            }))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PivotError::Serialization(format!("Failed to flush CSV output: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| PivotError::Serialization(format!("CSV output is not UTF-8: {}", e)))
    }

    /// Render as a JSON array of row objects keyed by column name
    pub fn to_json_string(&self) -> PivotResult<String> {
        let mut records = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut record = Map::new();
            for (column, value) in self.columns.iter().zip(row) {
                record.insert(column.name.clone(), serde_json::to_value(value)?);
            }
            records.push(JsonValue::Object(record));
        }
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

fn push_border(output: &mut String, widths: &[usize], left: char, mid: char, right: char) {
    output.push(left);
    for (i, width) in widths.iter().enumerate() {
        output.push_str(&"─".repeat(width + 2));
        if i < widths.len() - 1 {
            output.push(mid);
        }
    }
    output.push(right);
    output.push('\n');
}

fn push_line(output: &mut String, cells: &[String], widths: &[usize]) {
    output.push('│');
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        output.push_str(&format!(" {:width$} ", cell, width = width));
        if i < cells.len() - 1 {
            output.push('│');
        }
    }
    output.push_str("│\n");
}
