//! Warehouse collaborator
//!
//! The pivot builder never talks to a warehouse directly; it goes through
//! the `Warehouse` trait so the same builder drives BigQuery in production
//! and an in-memory fake in tests.

pub mod bigquery;

pub use bigquery::BigQueryClient;

use crate::common::error::PivotResult;
use crate::pivot::spec::TableRef;
use crate::types::{ResultSet, Value};
use std::fmt;
use std::str::FromStr;

/// What to do when a destination table already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    /// Refuse to touch an existing table
    #[default]
    Fail,
    /// Replace the existing table's contents
    Overwrite,
}

impl WriteDisposition {
    pub fn overwrite(self) -> bool {
        matches!(self, WriteDisposition::Overwrite)
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteDisposition::Fail => write!(f, "fail"),
            WriteDisposition::Overwrite => write!(f, "replace"),
        }
    }
}

impl FromStr for WriteDisposition {
    type Err = crate::common::error::PivotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(WriteDisposition::Fail),
            "replace" | "overwrite" => Ok(WriteDisposition::Overwrite),
            other => Err(crate::invalid_spec_err!(
                "unknown write disposition '{}' (expected fail or replace)",
                other
            )),
        }
    }
}

/// Operations the pivot builder needs from a SQL warehouse.
///
/// Every method is one blocking round trip from the caller's point of view.
/// Failures are reported as `PivotError::Execution` carrying the warehouse's
/// own message.
pub trait Warehouse {
    /// Distinct values of `column` in `table`, in the order returned
    fn list_distinct(&self, table: &TableRef, column: &str) -> PivotResult<Vec<Value>>;

    /// Run a query and load the whole result into memory
    fn execute(&self, sql: &str) -> PivotResult<ResultSet>;

    /// Run a query and materialize its result as `destination`
    fn execute_to_table(&self, sql: &str, destination: &TableRef, overwrite: bool) -> PivotResult<()>;

    fn table_exists(&self, table: &TableRef) -> PivotResult<bool>;
}

impl<W: Warehouse + ?Sized> Warehouse for &W {
    fn list_distinct(&self, table: &TableRef, column: &str) -> PivotResult<Vec<Value>> {
        (**self).list_distinct(table, column)
    }

    fn execute(&self, sql: &str) -> PivotResult<ResultSet> {
        (**self).execute(sql)
    }

    fn execute_to_table(&self, sql: &str, destination: &TableRef, overwrite: bool) -> PivotResult<()> {
        (**self).execute_to_table(sql, destination, overwrite)
    }

    fn table_exists(&self, table: &TableRef) -> PivotResult<bool> {
        (**self).table_exists(table)
    }
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn list_distinct(&self, table: &TableRef, column: &str) -> PivotResult<Vec<Value>> {
        (**self).list_distinct(table, column)
    }

    fn execute(&self, sql: &str) -> PivotResult<ResultSet> {
        (**self).execute(sql)
    }

    fn execute_to_table(&self, sql: &str, destination: &TableRef, overwrite: bool) -> PivotResult<()> {
        (**self).execute_to_table(sql, destination, overwrite)
    }

    fn table_exists(&self, table: &TableRef) -> PivotResult<bool> {
        (**self).table_exists(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_disposition_parse() {
        assert_eq!("fail".parse::<WriteDisposition>().unwrap(), WriteDisposition::Fail);
        assert_eq!("REPLACE".parse::<WriteDisposition>().unwrap(), WriteDisposition::Overwrite);
        assert!("append".parse::<WriteDisposition>().is_err());
        assert!(!WriteDisposition::default().overwrite());
    }
}
