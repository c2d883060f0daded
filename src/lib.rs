//! bqpivot - pivot query generator for BigQuery
//!
//! bqpivot reshapes a long-format warehouse table into a wide one by
//! generating a single-scan conditional aggregation query, one output
//! column per (value column, category) pair. The query can be written to a
//! file, fetched into memory, or materialized as a warehouse table.
//!
pub mod common;
pub mod config;
pub mod io;
pub mod pivot;
pub mod types;
pub mod warehouse;

// Re-export common types for convenience
pub use common::{PivotError, PivotResult};

pub use config::WarehouseConfig;

pub use pivot::{
    AggregateFunction, Category, CategorySet, CategorySource, PivotQueryBuilder, PivotSpec,
    TableRef,
};

pub use types::{ColumnMetadata, ResultSet, Value, ValueType};

pub use warehouse::{BigQueryClient, Warehouse, WriteDisposition};
