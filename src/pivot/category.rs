//! Categories: the distinct pivot-column values that become output columns

use crate::common::error::{PivotError, PivotResult};
use crate::common::helper::normalize_label;
use crate::invalid_spec_err;
use crate::types::Value;
use std::collections::HashSet;

/// One distinct value of the pivot column.
///
/// `value` is what the generated query compares against; `label` is the
/// identifier-safe form used inside the generated column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    value: Value,
    label: String,
}

impl Category {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// SQL literal for the comparison against the pivot column
    pub fn literal(&self) -> String {
        // NULLs are filtered out before a Category is ever built
        self.value.to_sql_literal().unwrap_or_else(|| "NULL".to_string())
    }
}

/// Where a category set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySource {
    Supplied,
    Discovered,
}

/// Ordered, duplicate-free list of categories with unique labels
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySet {
    categories: Vec<Category>,
    source: CategorySource,
}

impl CategorySet {
    /// Build from caller-supplied values. Duplicates and NULLs are caller bugs.
    pub fn supplied<I>(values: I) -> PivotResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut seen = Vec::new();
        for value in values {
            if value.is_null() {
                return Err(invalid_spec_err!("categories must not contain NULL"));
            }
            if seen.contains(&value) {
                return Err(invalid_spec_err!("category '{}' is listed twice", value));
            }
            seen.push(value);
        }
        if seen.is_empty() {
            return Err(invalid_spec_err!("category list must not be empty"));
        }
        Ok(Self::build(seen, CategorySource::Supplied))
    }

    /// Build from values returned by a discovery query. NULLs and repeats
    /// are dropped, first occurrence wins.
    pub fn discovered<I>(values: I) -> PivotResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut kept: Vec<Value> = Vec::new();
        let mut nulls = 0usize;
        for value in values {
            if value.is_null() {
                nulls += 1;
                continue;
            }
            if !kept.contains(&value) {
                kept.push(value);
            }
        }
        if nulls > 0 {
            tracing::warn!(nulls, "skipping NULL pivot values; they never match an equality test");
        }
        if kept.is_empty() {
            return Err(PivotError::Discovery(
                "pivot column has no non-NULL values; nothing to pivot".to_string(),
            ));
        }
        Ok(Self::build(kept, CategorySource::Discovered))
    }

    fn build(values: Vec<Value>, source: CategorySource) -> Self {
        let mut used: HashSet<String> = HashSet::new();
        let categories = values
            .into_iter()
            .map(|value| {
                let base = normalize_label(&value.to_string());
                let mut label = base.clone();
                let mut n = 1;
                while used.contains(&label) {
                    n += 1;
                    label = format!("{}_{}", base, n);
                }
                used.insert(label.clone());
                Category { value, label }
            })
            .collect();
        Self { categories, source }
    }

    pub fn source(&self) -> CategorySource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> + '_ {
        self.categories.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.label.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a CategorySet {
    type Item = &'a Category;
    type IntoIter = std::slice::Iter<'a, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplied_keeps_order() {
        let set = CategorySet::supplied(["view", "click"].map(Value::from)).unwrap();
        assert_eq!(set.labels(), vec!["view", "click"]);
        assert_eq!(set.source(), CategorySource::Supplied);
    }

    #[test]
    fn test_supplied_rejects_duplicates_and_empty() {
        let err = CategorySet::supplied(["a", "a"].map(Value::from)).unwrap_err();
        assert!(matches!(err, PivotError::InvalidSpec(_)));
        let err = CategorySet::supplied(Vec::<Value>::new()).unwrap_err();
        assert!(matches!(err, PivotError::InvalidSpec(_)));
        assert!(CategorySet::supplied(vec![Value::Null]).is_err());
    }

    #[test]
    fn test_discovered_dedups_and_skips_nulls() {
        let set = CategorySet::discovered(vec![
            Value::from("b"),
            Value::Null,
            Value::from("a"),
            Value::from("b"),
        ])
        .unwrap();
        assert_eq!(set.labels(), vec!["b", "a"]);
        assert_eq!(set.source(), CategorySource::Discovered);
    }

    #[test]
    fn test_discovered_empty_is_discovery_error() {
        let err = CategorySet::discovered(vec![Value::Null]).unwrap_err();
        assert!(matches!(err, PivotError::Discovery(_)));
    }

    #[test]
    fn test_label_collisions_are_disambiguated() {
        let set = CategorySet::supplied(["Page View", "page-view", "page_view"].map(Value::from)).unwrap();
        assert_eq!(set.labels(), vec!["page_view", "page_view_2", "page_view_3"]);
    }

    #[test]
    fn test_literal_keeps_raw_value() {
        let set = CategorySet::supplied(["it's here"].map(Value::from)).unwrap();
        let category = set.iter().next().unwrap();
        assert_eq!(category.label(), "it_s_here");
        assert_eq!(category.literal(), r"'it\'s here'");
        assert_eq!(category.value(), &Value::from("it's here"));
    }

    #[test]
    fn test_typed_values() {
        let set = CategorySet::discovered(vec![Value::Int64(2024), Value::Boolean(true)]).unwrap();
        let literals: Vec<String> = set.iter().map(Category::literal).collect();
        assert_eq!(literals, vec!["2024", "TRUE"]);
        assert_eq!(set.labels(), vec!["2024", "true"]);
    }
}
