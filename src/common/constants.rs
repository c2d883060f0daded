//! Constants used throughout bqpivot

/// Default BigQuery v2 REST endpoint (trailing slash required for URL joins)
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2/";

/// Default HTTP timeout for a single warehouse request, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default delay between job status polls, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of rows requested per result page
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// Directory under the platform config dir holding the config file
pub const CONFIG_DIR_NAME: &str = "bqpivot";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_PROJECT: &str = "BQPIVOT_PROJECT";
pub const ENV_PROJECT_FALLBACK: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_LOCATION: &str = "BQPIVOT_LOCATION";
pub const ENV_ENDPOINT: &str = "BQPIVOT_ENDPOINT";
pub const ENV_ACCESS_TOKEN: &str = "BQPIVOT_ACCESS_TOKEN";
pub const ENV_ACCESS_TOKEN_FALLBACK: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Prefix for generated job and request ids
pub const JOB_ID_PREFIX: &str = "bqpivot_";

/// Label used for a category whose normalized form is empty
pub const BLANK_CATEGORY_LABEL: &str = "blank";

/// GoogleSQL reserved keywords. Column identifiers matching one of these
/// (case-insensitively) must be backtick-quoted.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "ARRAY", "AS", "ASC", "ASSERT_ROWS_MODIFIED", "AT", "BETWEEN", "BY",
    "CASE", "CAST", "COLLATE", "CONTAINS", "CREATE", "CROSS", "CUBE", "CURRENT", "DEFAULT",
    "DEFINE", "DESC", "DISTINCT", "ELSE", "END", "ENUM", "ESCAPE", "EXCEPT", "EXCLUDE", "EXISTS",
    "EXTRACT", "FALSE", "FETCH", "FOLLOWING", "FOR", "FROM", "FULL", "GROUP", "GROUPING", "GROUPS",
    "HASH", "HAVING", "IF", "IGNORE", "IN", "INNER", "INTERSECT", "INTERVAL", "INTO", "IS", "JOIN",
    "LATERAL", "LEFT", "LIKE", "LIMIT", "LOOKUP", "MERGE", "NATURAL", "NEW", "NO", "NOT", "NULL",
    "NULLS", "OF", "ON", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "PRECEDING", "PROTO",
    "QUALIFY", "RANGE", "RECURSIVE", "RESPECT", "RIGHT", "ROLLUP", "ROWS", "SELECT", "SET", "SOME",
    "STRUCT", "TABLESAMPLE", "THEN", "TO", "TREAT", "TRUE", "UNBOUNDED", "UNION", "UNNEST",
    "USING", "WHEN", "WHERE", "WINDOW", "WITH", "WITHIN",
];
