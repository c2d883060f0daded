//! Scalar values and in-memory result tables exchanged with the warehouse

pub mod result_set;
pub mod value;

pub use result_set::{ColumnMetadata, ResultSet};
pub use value::{Value, ValueType};
