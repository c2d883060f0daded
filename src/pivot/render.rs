//! SQL rendering for pivot and discovery queries.
//!
//! Rendering is a pure function of its inputs: the same spec and categories
//! always yield byte-identical SQL. Generated columns are ordered with value
//! columns as the outer loop and categories as the inner loop.

use crate::common::error::PivotResult;
use crate::common::helper::quote_identifier;
use crate::invalid_spec_err;
use crate::pivot::category::CategorySet;
use crate::pivot::spec::{PivotSpec, TableRef};
use std::collections::HashSet;

/// One generated output column
#[derive(Debug, Clone, PartialEq)]
pub struct PivotColumn {
    pub name: String,
    pub expression: String,
}

/// Compute the generated columns of a pivot, in output order.
///
/// Fails if two (value column, category) pairs map to the same name, or if
/// a generated name clashes with an index column.
pub fn pivot_columns(spec: &PivotSpec, categories: &CategorySet) -> PivotResult<Vec<PivotColumn>> {
    let pivot = quote_identifier(spec.pivot_column());
    let mut names: HashSet<String> = spec
        .index_columns()
        .iter()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let mut columns = Vec::with_capacity(spec.value_columns().len() * categories.len());

    for value_column in spec.value_columns() {
        let value = quote_identifier(value_column);
        for category in categories {
            let name = spec.output_column_name(value_column, category.label());
            // Column names are case-insensitive in the warehouse
            if !names.insert(name.to_ascii_lowercase()) {
                return Err(invalid_spec_err!(
                    "generated column name '{}' is not unique; adjust the prefix/suffix or category values",
                    name
                ));
            }
            let condition = format!("IF({} = {}, {}, NULL)", pivot, category.literal(), value);
            columns.push(PivotColumn {
                expression: spec.aggregate().apply(&condition),
                name,
            });
        }
    }

    Ok(columns)
}

/// Render the single-scan conditional aggregation query
pub fn pivot_query(spec: &PivotSpec, categories: &CategorySet) -> PivotResult<String> {
    let columns = pivot_columns(spec, categories)?;
    let index_list = spec
        .index_columns()
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut select_items = Vec::with_capacity(columns.len() + 1);
    select_items.push(index_list.clone());
    for column in &columns {
        select_items.push(format!("{} AS {}", column.expression, quote_identifier(&column.name)));
    }

    Ok(format!(
        "SELECT {}\nFROM {}\nGROUP BY {}",
        select_items.join(",\n  "),
        spec.table().to_sql(),
        index_list
    ))
}

/// Render the query listing the distinct values of a column
pub fn distinct_query(table: &TableRef, column: &str) -> String {
    let column = quote_identifier(column);
    format!(
        "SELECT DISTINCT {} FROM {} ORDER BY {}",
        column,
        table.to_sql(),
        column
    )
}
