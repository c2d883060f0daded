//! Pivot query generation
//!
//! A pivot turns long-format rows (index, category, value) into one row per
//! index with one column per (value column, category) pair. The query is a
//! single scan with conditional aggregation:
//!
//! ```sql
//! SELECT user_id,
//!   SUM(IF(event_type = 'click', count, NULL)) AS count_click,
//!   SUM(IF(event_type = 'view', count, NULL)) AS count_view
//! FROM `ds.events`
//! GROUP BY user_id
//! ```

pub mod builder;
pub mod category;
pub mod render;
pub mod spec;

pub use builder::PivotQueryBuilder;
pub use category::{Category, CategorySet, CategorySource};
pub use render::{distinct_query, pivot_columns, pivot_query, PivotColumn};
pub use spec::{AggregateFunction, PivotSpec, TableRef};
