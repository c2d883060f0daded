//! Pivot query builder
//!
//! Ties a `PivotSpec` to a warehouse: resolves categories (supplied or
//! discovered once and cached), renders the query, and hands it to the
//! warehouse for fetching or materializing.

use crate::common::error::{PivotError, PivotResult};
use crate::io::query_writer::write_atomically;
use crate::pivot::category::{CategorySet, CategorySource};
use crate::pivot::render;
use crate::pivot::spec::{PivotSpec, TableRef};
use crate::types::ResultSet;
use crate::warehouse::{Warehouse, WriteDisposition};
use std::path::Path;
use tracing::{debug, info};

/// Builds and runs the pivot query described by a `PivotSpec`
#[derive(Debug)]
pub struct PivotQueryBuilder<W> {
    spec: PivotSpec,
    warehouse: W,
    /// Resolved categories. Starts as the supplied set, if any.
    categories: Option<CategorySet>,
}

impl<W: Warehouse> PivotQueryBuilder<W> {
    pub fn new(spec: PivotSpec, warehouse: W) -> Self {
        let categories = spec.categories().cloned();
        Self {
            spec,
            warehouse,
            categories,
        }
    }

    pub fn spec(&self) -> &PivotSpec {
        &self.spec
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Categories resolved so far, without triggering discovery
    pub fn categories(&self) -> Option<&CategorySet> {
        self.categories.as_ref()
    }

    /// Resolve categories, querying the warehouse at most once.
    ///
    /// Supplied categories are returned as-is. Otherwise the pivot column's
    /// distinct values are fetched and cached until `invalidate_categories`.
    pub fn discover_categories(&mut self) -> PivotResult<&CategorySet> {
        if self.categories.is_none() {
            let table = self.spec.table();
            let column = self.spec.pivot_column();
            debug!(%table, column, "discovering pivot categories");

            let values = self
                .warehouse
                .list_distinct(table, column)
                .map_err(|e| match e {
                    PivotError::Discovery(msg) => PivotError::Discovery(msg),
                    other => PivotError::Discovery(format!(
                        "listing distinct values of {} in {} failed: {}",
                        column, table, other
                    )),
                })?;

            let set = CategorySet::discovered(values)?;
            info!(count = set.len(), column, "discovered pivot categories");
            self.categories = Some(set);
        }

        self.categories
            .as_ref()
            .ok_or_else(|| PivotError::Discovery("categories unresolved after discovery".to_string()))
    }

    /// Drop discovered categories so the next use queries again.
    /// Supplied categories stay in effect.
    pub fn invalidate_categories(&mut self) {
        if matches!(
            self.categories.as_ref().map(CategorySet::source),
            Some(CategorySource::Discovered)
        ) {
            debug!("invalidating discovered categories");
            self.categories = self.spec.categories().cloned();
        }
    }

    /// Render the pivot query, discovering categories first if needed
    pub fn render_query(&mut self) -> PivotResult<String> {
        self.discover_categories()?;
        let categories = self
            .categories
            .as_ref()
            .ok_or_else(|| PivotError::Discovery("categories unresolved".to_string()))?;
        render::pivot_query(&self.spec, categories)
    }

    /// Render the query, optionally write it to `destination` (replacing
    /// any existing file) and optionally echo it to stdout.
    pub fn write_query(&mut self, destination: Option<&Path>, echo: bool) -> PivotResult<String> {
        let sql = self.render_query()?;
        if let Some(path) = destination {
            write_atomically(path, &sql)?;
            info!(path = %path.display(), bytes = sql.len(), "wrote pivot query");
        }
        if echo {
            println!("{}", sql);
        }
        Ok(sql)
    }

    /// Run the pivot query and load the result into memory
    pub fn run_and_fetch(&mut self) -> PivotResult<ResultSet> {
        let sql = self.render_query()?;
        debug!(sql = %sql, "running pivot query");
        let result = self.warehouse.execute(&sql)?;
        info!(
            rows = result.row_count(),
            columns = result.column_count(),
            "fetched pivot result"
        );
        Ok(result)
    }

    /// Run the pivot query and materialize it as `destination`.
    ///
    /// With `WriteDisposition::Fail` an existing destination is reported as
    /// `DestinationConflict` before anything is submitted.
    pub fn run_and_persist(
        &mut self,
        destination: &TableRef,
        disposition: WriteDisposition,
    ) -> PivotResult<()> {
        let sql = self.render_query()?;

        if !disposition.overwrite() && self.warehouse.table_exists(destination)? {
            return Err(PivotError::DestinationConflict(destination.to_string()));
        }

        debug!(%destination, %disposition, "materializing pivot query");
        self.warehouse
            .execute_to_table(&sql, destination, disposition.overwrite())?;
        info!(%destination, "materialized pivot result");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use std::cell::Cell;

    /// Answers discovery with a fixed list and counts calls
    struct FixedWarehouse {
        values: Vec<Value>,
        calls: Cell<usize>,
    }

    impl Warehouse for FixedWarehouse {
        fn list_distinct(&self, _table: &TableRef, _column: &str) -> PivotResult<Vec<Value>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.values.clone())
        }

        fn execute(&self, _sql: &str) -> PivotResult<ResultSet> {
            Ok(ResultSet::default())
        }

        fn execute_to_table(&self, _sql: &str, _destination: &TableRef, _overwrite: bool) -> PivotResult<()> {
            Ok(())
        }

        fn table_exists(&self, _table: &TableRef) -> PivotResult<bool> {
            Ok(false)
        }
    }

    fn builder(values: &[&str]) -> PivotQueryBuilder<FixedWarehouse> {
        let spec = PivotSpec::new("ds.events", "user_id", "event_type", ["count"]).unwrap();
        PivotQueryBuilder::new(
            spec,
            FixedWarehouse {
                values: values.iter().map(|v| Value::from(*v)).collect(),
                calls: Cell::new(0),
            },
        )
    }

    #[test]
    fn test_discovery_is_cached() {
        let mut b = builder(&["click", "view"]);
        let first = b.discover_categories().unwrap().clone();
        let second = b.discover_categories().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(b.warehouse().calls.get(), 1);
    }

    #[test]
    fn test_invalidate_forces_rediscovery() {
        let mut b = builder(&["click"]);
        b.render_query().unwrap();
        b.invalidate_categories();
        assert!(b.categories().is_none());
        b.render_query().unwrap();
        assert_eq!(b.warehouse().calls.get(), 2);
    }

    #[test]
    fn test_empty_discovery_is_an_error() {
        let mut b = builder(&[]);
        let err = b.render_query().unwrap_err();
        assert!(matches!(err, PivotError::Discovery(_)));
    }
}
