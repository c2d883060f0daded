//! Pivot specification: the validated, immutable description of one pivot

use crate::common::error::PivotResult;
use crate::common::helper::{validate_affix, validate_identifier};
use crate::invalid_spec_err;
use crate::pivot::category::CategorySet;
use crate::types::Value;
use std::fmt;
use std::str::FromStr;

/// A warehouse table identifier: `[project.][dataset.]table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub table: String,
}

impl TableRef {
    /// Parse `project.dataset.table`, `project:dataset.table`,
    /// `dataset.table` or `table`. Surrounding backticks are ignored.
    pub fn parse(input: &str) -> PivotResult<Self> {
        let trimmed = input.trim().trim_matches('`').trim();
        if trimmed.is_empty() {
            return Err(invalid_spec_err!("table name must not be blank"));
        }

        let (project, rest) = match trimmed.split_once(':') {
            Some((project, rest)) => (Some(project), rest),
            None => (None, trimmed),
        };

        let parts: Vec<&str> = rest.split('.').collect();
        let (project, dataset, table) = match (project, parts.as_slice()) {
            (None, [table]) => (None, None, *table),
            (None, [dataset, table]) => (None, Some(*dataset), *table),
            (None, [project, dataset, table]) => (Some(*project), Some(*dataset), *table),
            (Some(project), [dataset, table]) => (Some(project), Some(*dataset), *table),
            _ => return Err(invalid_spec_err!("'{}' is not a valid table name", input.trim())),
        };

        for part in project.iter().chain(dataset.iter()).chain(std::iter::once(&table)) {
            if part.is_empty()
                || !part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(invalid_spec_err!(
                    "'{}' is not a valid table name (bad component '{}')",
                    input.trim(),
                    part
                ));
            }
        }

        Ok(Self {
            project: project.map(str::to_string),
            dataset: dataset.map(str::to_string),
            table: table.to_string(),
        })
    }

    /// Fill in a missing project
    pub fn with_default_project(mut self, project: Option<&str>) -> Self {
        if self.project.is_none() {
            self.project = project.map(str::to_string);
        }
        self
    }

    /// The backtick-quoted form used in SQL text
    pub fn to_sql(&self) -> String {
        format!("`{}`", self)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(project) = &self.project {
            write!(f, "{}.", project)?;
        }
        if let Some(dataset) = &self.dataset {
            write!(f, "{}.", dataset)?;
        }
        write!(f, "{}", self.table)
    }
}

impl FromStr for TableRef {
    type Err = crate::common::error::PivotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableRef::parse(s)
    }
}

/// Reduction applied to every generated column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AggregateFunction {
    #[default]
    Sum,
    Max,
    Min,
    Avg,
    Count,
    AnyValue,
    /// Caller-authored SQL with exactly one `{}` placeholder, which is
    /// replaced by the conditional expression, e.g. `ROUND(SUM({}), 2)`.
    Custom(String),
}

impl AggregateFunction {
    /// Build a custom aggregation from a template
    pub fn custom(template: &str) -> PivotResult<Self> {
        let placeholders = template.matches("{}").count();
        if placeholders != 1 {
            return Err(invalid_spec_err!(
                "aggregation template '{}' must contain exactly one '{{}}' placeholder, found {}",
                template,
                placeholders
            ));
        }
        Ok(AggregateFunction::Custom(template.to_string()))
    }

    /// Wrap an expression in this aggregation
    pub fn apply(&self, expr: &str) -> String {
        match self {
            AggregateFunction::Sum => format!("SUM({})", expr),
            AggregateFunction::Max => format!("MAX({})", expr),
            AggregateFunction::Min => format!("MIN({})", expr),
            AggregateFunction::Avg => format!("AVG({})", expr),
            AggregateFunction::Count => format!("COUNT({})", expr),
            AggregateFunction::AnyValue => format!("ANY_VALUE({})", expr),
            AggregateFunction::Custom(template) => template.replacen("{}", expr, 1),
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = crate::common::error::PivotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sum" => Ok(AggregateFunction::Sum),
            "max" => Ok(AggregateFunction::Max),
            "min" => Ok(AggregateFunction::Min),
            "avg" | "mean" => Ok(AggregateFunction::Avg),
            "count" => Ok(AggregateFunction::Count),
            "any_value" => Ok(AggregateFunction::AnyValue),
            _ => Err(invalid_spec_err!("unknown aggregation function '{}'", s)),
        }
    }
}

/// Everything needed to render one pivot query.
///
/// Constructed once per invocation and not mutated afterwards; the
/// `with_*` methods consume and return the spec while it is being built.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotSpec {
    table: TableRef,
    index_columns: Vec<String>,
    pivot_column: String,
    value_columns: Vec<String>,
    categories: Option<CategorySet>,
    aggregate: AggregateFunction,
    prefix: String,
    suffix: String,
}

impl PivotSpec {
    /// Validate and build a spec with categories left for discovery
    pub fn new<I, S>(
        table_name: &str,
        index_column: &str,
        pivot_column: &str,
        value_columns: I,
    ) -> PivotResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = TableRef::parse(table_name)?;
        let index_column = validate_identifier("index column", index_column)?;
        let pivot_column = validate_identifier("pivot column", pivot_column)?;

        let mut values = Vec::new();
        for value in value_columns {
            let value = validate_identifier("value column", value.as_ref())?;
            if values.contains(&value) {
                return Err(invalid_spec_err!("value column '{}' is listed twice", value));
            }
            values.push(value);
        }
        if values.is_empty() {
            return Err(invalid_spec_err!("at least one value column is required"));
        }

        if index_column == pivot_column {
            return Err(invalid_spec_err!(
                "index column and pivot column must differ (both '{}')",
                index_column
            ));
        }

        Ok(Self {
            table,
            index_columns: vec![index_column],
            pivot_column,
            value_columns: values,
            categories: None,
            aggregate: AggregateFunction::default(),
            prefix: String::new(),
            suffix: String::new(),
        })
    }

    /// Supply the categories up front, skipping discovery
    pub fn with_categories<I, S>(mut self, categories: I) -> PivotResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Value>,
    {
        self.categories = Some(CategorySet::supplied(categories.into_iter().map(Into::into))?);
        Ok(self)
    }

    /// Group by an additional index column
    pub fn with_index_column(mut self, column: &str) -> PivotResult<Self> {
        let column = validate_identifier("index column", column)?;
        if self.index_columns.contains(&column) {
            return Err(invalid_spec_err!("index column '{}' is listed twice", column));
        }
        if column == self.pivot_column {
            return Err(invalid_spec_err!(
                "index column and pivot column must differ (both '{}')",
                column
            ));
        }
        self.index_columns.push(column);
        Ok(self)
    }

    pub fn with_aggregate(mut self, aggregate: AggregateFunction) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Wrap every generated column name in a prefix and suffix
    pub fn with_affixes(mut self, prefix: Option<&str>, suffix: Option<&str>) -> PivotResult<Self> {
        self.prefix = validate_affix("prefix", prefix.unwrap_or_default())?;
        self.suffix = validate_affix("suffix", suffix.unwrap_or_default())?;
        Ok(self)
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// The primary index column
    pub fn index_column(&self) -> &str {
        &self.index_columns[0]
    }

    pub fn index_columns(&self) -> &[String] {
        &self.index_columns
    }

    pub fn pivot_column(&self) -> &str {
        &self.pivot_column
    }

    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    /// Caller-supplied categories, if any
    pub fn categories(&self) -> Option<&CategorySet> {
        self.categories.as_ref()
    }

    pub fn aggregate(&self) -> &AggregateFunction {
        &self.aggregate
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Name of the generated column for one (value column, category label) pair
    pub fn output_column_name(&self, value_column: &str, label: &str) -> String {
        format!("{}{}_{}{}", self.prefix, value_column, label, self.suffix)
    }
}
