//! Shared test fixtures: an in-memory warehouse that records every call

#![allow(dead_code)]

use bqpivot::{PivotError, PivotResult, ResultSet, TableRef, Value, Warehouse};
use std::cell::RefCell;
use std::collections::HashSet;

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListDistinct { table: String, column: String },
    Execute { sql: String },
    ExecuteToTable { sql: String, destination: String, overwrite: bool },
    TableExists { table: String },
}

/// Warehouse fake with canned answers
#[derive(Default)]
pub struct RecordingWarehouse {
    pub distinct_values: Vec<Value>,
    pub result: ResultSet,
    pub existing_tables: HashSet<String>,
    /// When set, every execute call fails with this message
    pub execute_error: Option<String>,
    /// When set, discovery fails with this message
    pub discovery_error: Option<String>,
    pub calls: RefCell<Vec<Call>>,
}

impl RecordingWarehouse {
    pub fn with_categories(values: &[&str]) -> Self {
        Self {
            distinct_values: values.iter().map(|v| Value::from(*v)).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Warehouse for RecordingWarehouse {
    fn list_distinct(&self, table: &TableRef, column: &str) -> PivotResult<Vec<Value>> {
        self.record(Call::ListDistinct {
            table: table.to_string(),
            column: column.to_string(),
        });
        match &self.discovery_error {
            Some(msg) => Err(PivotError::Execution(msg.clone())),
            None => Ok(self.distinct_values.clone()),
        }
    }

    fn execute(&self, sql: &str) -> PivotResult<ResultSet> {
        self.record(Call::Execute { sql: sql.to_string() });
        match &self.execute_error {
            Some(msg) => Err(PivotError::Execution(msg.clone())),
            None => Ok(self.result.clone()),
        }
    }

    fn execute_to_table(&self, sql: &str, destination: &TableRef, overwrite: bool) -> PivotResult<()> {
        self.record(Call::ExecuteToTable {
            sql: sql.to_string(),
            destination: destination.to_string(),
            overwrite,
        });
        match &self.execute_error {
            Some(msg) => Err(PivotError::Execution(msg.clone())),
            None => Ok(()),
        }
    }

    fn table_exists(&self, table: &TableRef) -> PivotResult<bool> {
        self.record(Call::TableExists {
            table: table.to_string(),
        });
        Ok(self.existing_tables.contains(&table.to_string()))
    }
}

/// Replace the contents of every single-quoted literal with `?`, honouring
/// backslash escapes. Two queries with the same skeleton differ only in
/// literal contents.
pub fn sql_skeleton(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars();
    while let Some(c) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        out.push_str("'?'");
        loop {
            match chars.next() {
                Some('\\') => {
                    chars.next();
                }
                Some('\'') | None => break,
                Some(_) => {}
            }
        }
    }
    out
}
