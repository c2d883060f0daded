//! BigQuery REST collaborator
//!
//! Implements `Warehouse` over the BigQuery v2 REST API using a blocking
//! HTTP client. Queries go through `jobs.query` (polling
//! `jobs.getQueryResults` until complete and following page tokens);
//! materialization goes through `jobs.insert` with a destination table.

use crate::common::constants::JOB_ID_PREFIX;
use crate::common::error::{PivotError, PivotResult};
use crate::config::WarehouseConfig;
use crate::execution_err;
use crate::invalid_spec_err;
use crate::pivot::render::distinct_query;
use crate::pivot::spec::TableRef;
use crate::types::{ColumnMetadata, ResultSet, Value, ValueType};
use crate::warehouse::Warehouse;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    request_id: String,
    max_results: u32,
    timeout_ms: u64,
    format_options: FormatOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatOptions {
    use_int64_timestamp: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QueryResponse {
    job_reference: Option<JobReference>,
    job_complete: bool,
    schema: Option<TableSchema>,
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableSchema {
    fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableFieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableCell {
    v: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DestinationTable<'a> {
    project_id: &'a str,
    dataset_id: &'a str,
    table_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryJobConfig<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    destination_table: DestinationTable<'a>,
    write_disposition: &'static str,
    create_disposition: &'static str,
}

#[derive(Debug, Serialize)]
struct JobConfiguration<'a> {
    query: QueryJobConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobInsertRequest<'a> {
    job_reference: JobReference,
    configuration: JobConfiguration<'a>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Job {
    job_reference: Option<JobReference>,
    status: JobStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiError {
    code: u16,
    message: String,
    errors: Vec<ErrorProto>,
}

/// Blocking BigQuery client
#[derive(Debug)]
pub struct BigQueryClient {
    client: Client,
    base: Url,
    config: WarehouseConfig,
}

impl BigQueryClient {
    /// Create a client from resolved configuration
    pub fn new(config: WarehouseConfig) -> PivotResult<Self> {
        config.validate()?;
        let base = Url::parse(&config.endpoint)
            .map_err(|e| PivotError::Config(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(PivotError::Config(format!(
                "endpoint '{}' cannot be used as a base URL",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PivotError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base, config })
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Build an API URL from path segments under the endpoint root
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> PivotResult<Response> {
        self.authorized(request)
            .send()
            .map_err(|e| execution_err!("BigQuery request failed: {}", e))
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PivotResult<T> {
        let response = self.send(request)?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| execution_err!("Failed to read BigQuery response body: {}", e))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs(self.config.timeout_secs)
    }

    fn get_query_results(&self, job: &JobReference, page_token: Option<&str>) -> PivotResult<QueryResponse> {
        let mut url = self.url(&["projects", &job.project_id, "queries", &job.job_id]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &self.config.page_size.to_string());
            query.append_pair("timeoutMs", &self.poll_interval().as_millis().to_string());
            query.append_pair("formatOptions.useInt64Timestamp", "true");
            if let Some(location) = &job.location {
                query.append_pair("location", location);
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        self.send_json(self.client.get(url))
    }

    /// Run a query to completion and load every page of its result
    fn run_query(&self, sql: &str) -> PivotResult<ResultSet> {
        let project = self.config.require_project()?;
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            location: self.config.location.as_deref(),
            request_id: new_request_id(),
            max_results: self.config.page_size,
            timeout_ms: self.poll_interval().as_millis() as u64,
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };

        debug!(project, request_id = %request.request_id, "submitting query");
        let url = self.url(&["projects", project, "queries"]);
        let mut response: QueryResponse = self.send_json(self.client.post(url).json(&request))?;

        let deadline = self.deadline();
        while !response.job_complete {
            let job = response
                .job_reference
                .clone()
                .ok_or_else(|| execution_err!("BigQuery returned an incomplete query without a job reference"))?;
            if Instant::now() >= deadline {
                return Err(execution_err!(
                    "query job {} did not finish within {}s",
                    job.job_id,
                    self.config.timeout_secs
                ));
            }
            debug!(job_id = %job.job_id, "waiting for query job");
            std::thread::sleep(self.poll_interval());
            response = self.get_query_results(&job, None)?;
            if response.job_reference.is_none() {
                response.job_reference = Some(job);
            }
        }

        let columns = schema_columns(response.schema.as_ref());
        let mut rows = convert_rows(&columns, std::mem::take(&mut response.rows));

        while let Some(token) = response.page_token.take() {
            let job = response
                .job_reference
                .clone()
                .ok_or_else(|| execution_err!("BigQuery returned a page token without a job reference"))?;
            debug!(job_id = %job.job_id, fetched = rows.len(), "fetching next result page");
            response = self.get_query_results(&job, Some(&token))?;
            if response.job_reference.is_none() {
                response.job_reference = Some(job);
            }
            rows.extend(convert_rows(&columns, std::mem::take(&mut response.rows)));
        }

        info!(rows = rows.len(), columns = columns.len(), "query complete");
        Ok(ResultSet::new(columns, rows))
    }

    fn wait_for_job(&self, job: &JobReference) -> PivotResult<()> {
        let deadline = self.deadline();
        loop {
            let mut url = self.url(&["projects", &job.project_id, "jobs", &job.job_id]);
            if let Some(location) = &job.location {
                url.query_pairs_mut().append_pair("location", location);
            }
            let current: Job = self.send_json(self.client.get(url))?;
            if current.status.state == "DONE" {
                return match current.status.error_result {
                    Some(err) => Err(job_error(err)),
                    None => Ok(()),
                };
            }
            if Instant::now() >= deadline {
                return Err(execution_err!(
                    "job {} did not finish within {}s",
                    job.job_id,
                    self.config.timeout_secs
                ));
            }
            debug!(job_id = %job.job_id, state = %current.status.state, "waiting for job");
            std::thread::sleep(self.poll_interval());
        }
    }

    /// Fully qualify a table against the configured project
    fn qualify<'a>(&'a self, table: &'a TableRef) -> PivotResult<(&'a str, &'a str, &'a str)> {
        let project = match table.project.as_deref() {
            Some(project) => project,
            None => self.config.require_project()?,
        };
        let dataset = table
            .dataset
            .as_deref()
            .ok_or_else(|| invalid_spec_err!("table '{}' must name a dataset", table))?;
        Ok((project, dataset, &table.table))
    }
}

impl Warehouse for BigQueryClient {
    fn list_distinct(&self, table: &TableRef, column: &str) -> PivotResult<Vec<Value>> {
        let result = self.run_query(&distinct_query(table, column))?;
        check_pivot_type(column, &result.columns)?;
        Ok(result
            .rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or(Value::Null))
            .collect())
    }

    fn execute(&self, sql: &str) -> PivotResult<ResultSet> {
        self.run_query(sql)
    }

    fn execute_to_table(&self, sql: &str, destination: &TableRef, overwrite: bool) -> PivotResult<()> {
        let run_project = self.config.require_project()?;
        let (project_id, dataset_id, table_id) = self.qualify(destination)?;

        let request = JobInsertRequest {
            job_reference: JobReference {
                project_id: run_project.to_string(),
                job_id: new_job_id(),
                location: self.config.location.clone(),
            },
            configuration: JobConfiguration {
                query: QueryJobConfig {
                    query: sql,
                    use_legacy_sql: false,
                    destination_table: DestinationTable {
                        project_id,
                        dataset_id,
                        table_id,
                    },
                    write_disposition: if overwrite { "WRITE_TRUNCATE" } else { "WRITE_EMPTY" },
                    create_disposition: "CREATE_IF_NEEDED",
                },
            },
        };

        info!(job_id = %request.job_reference.job_id, %destination, overwrite, "submitting materialization job");
        let url = self.url(&["projects", run_project, "jobs"]);
        let job: Job = self.send_json(self.client.post(url).json(&request))?;
        let reference = job.job_reference.unwrap_or(request.job_reference);

        if job.status.state == "DONE" {
            if let Some(err) = job.status.error_result {
                return Err(job_error(err));
            }
            return Ok(());
        }
        self.wait_for_job(&reference)
    }

    fn table_exists(&self, table: &TableRef) -> PivotResult<bool> {
        let (project, dataset, table_id) = self.qualify(table)?;
        let url = self.url(&["projects", project, "datasets", dataset, "tables", table_id]);
        let response = self.send(self.client.get(url))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => {
                let body = response.text().unwrap_or_default();
                Err(api_error(status, &body))
            }
        }
    }
}

fn new_job_id() -> String {
    format!("{}{}", JOB_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

/// `jobs.query` caps `requestId` at 36 characters, so no prefix here
fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn schema_columns(schema: Option<&TableSchema>) -> Vec<ColumnMetadata> {
    schema
        .map(|s| {
            s.fields
                .iter()
                .map(|f| ColumnMetadata::new(f.name.clone(), ValueType::from_bigquery(&f.field_type)))
                .collect()
        })
        .unwrap_or_default()
}

fn convert_rows(columns: &[ColumnMetadata], rows: Vec<TableRow>) -> Vec<Vec<Value>> {
    rows.into_iter()
        .map(|row| {
            row.f
                .into_iter()
                .enumerate()
                .map(|(idx, cell)| {
                    let value_type = columns
                        .get(idx)
                        .map(|c| c.data_type.clone())
                        .unwrap_or(ValueType::String);
                    convert_cell(cell.v, &value_type)
                })
                .collect()
        })
        .collect()
}

fn convert_cell(cell: serde_json::Value, value_type: &ValueType) -> Value {
    match cell {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::String(raw) => Value::parse_typed(&raw, value_type),
        // REPEATED and RECORD cells arrive as nested JSON
        other => Value::String(other.to_string()),
    }
}

/// Categories are compared with `=` against literals, so the pivot column
/// needs a type with a literal form
fn check_pivot_type(column: &str, columns: &[ColumnMetadata]) -> PivotResult<()> {
    match columns.first() {
        Some(meta) if !meta.data_type.has_literal_form() => Err(PivotError::Discovery(format!(
            "pivot column {} has type {}, which cannot be compared against a literal",
            column,
            meta.data_type.name()
        ))),
        _ => Ok(()),
    }
}

/// Map an HTTP error response to a pivot error, keeping the API's message
fn api_error(status: StatusCode, body: &str) -> PivotError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => {
            let duplicate = parsed
                .error
                .errors
                .iter()
                .any(|e| e.reason.as_deref() == Some("duplicate"));
            if duplicate && parsed.error.code == StatusCode::CONFLICT.as_u16() {
                PivotError::DestinationConflict(parsed.error.message)
            } else {
                PivotError::Execution(parsed.error.message)
            }
        }
        _ => execution_err!("BigQuery returned {}: {}", status, body.trim()),
    }
}

fn job_error(err: ErrorProto) -> PivotError {
    let message = err.message.unwrap_or_else(|| "job failed without a message".to_string());
    if err.reason.as_deref() == Some("duplicate") {
        PivotError::DestinationConflict(message)
    } else {
        PivotError::Execution(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BigQueryClient {
        BigQueryClient::new(WarehouseConfig {
            project: Some("proj".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_building_escapes_segments() {
        let c = client();
        assert_eq!(
            c.url(&["projects", "proj", "queries"]).as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/proj/queries"
        );
        assert_eq!(
            c.url(&["projects", "example.com:proj", "jobs"]).as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/example.com:proj/jobs"
        );
        assert!(c.url(&["projects", "a/b"]).as_str().ends_with("/projects/a%2Fb"));
    }

    #[test]
    fn test_query_request_shape() {
        let request = QueryRequest {
            query: "SELECT 1",
            use_legacy_sql: false,
            location: None,
            request_id: "r1".to_string(),
            max_results: 10,
            timeout_ms: 1000,
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["useLegacySql"], false);
        assert_eq!(json["formatOptions"]["useInt64Timestamp"], true);
        assert_eq!(json["requestId"], "r1");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_convert_response_rows() {
        let body = r#"{
            "jobComplete": true,
            "jobReference": {"projectId": "proj", "jobId": "j1", "location": "US"},
            "schema": {"fields": [
                {"name": "user_id", "type": "INTEGER"},
                {"name": "count_click", "type": "FLOAT"},
                {"name": "tag", "type": "STRING"}
            ]},
            "rows": [
                {"f": [{"v": "1"}, {"v": "2.5"}, {"v": "a"}]},
                {"f": [{"v": "2"}, {"v": null}, {"v": "b"}]}
            ]
        }"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        assert!(response.job_complete);
        let columns = schema_columns(response.schema.as_ref());
        let rows = convert_rows(&columns, response.rows);
        assert_eq!(columns[0].data_type, ValueType::Int64);
        assert_eq!(
            rows,
            vec![
                vec![Value::Int64(1), Value::Float64(2.5), Value::from("a")],
                vec![Value::Int64(2), Value::Null, Value::from("b")],
            ]
        );
    }

    #[test]
    fn test_typed_pivot_cells() {
        let body = r#"{
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "ts", "type": "TIMESTAMP"},
                {"name": "amount", "type": "NUMERIC"}
            ]},
            "rows": [
                {"f": [{"v": "1704067200000000"}, {"v": "123456789012345678.5"}]}
            ]
        }"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        let columns = schema_columns(response.schema.as_ref());
        let rows = convert_rows(&columns, response.rows);
        assert_eq!(
            rows[0],
            vec![
                Value::Timestamp(1_704_067_200_000_000),
                Value::Numeric("123456789012345678.5".to_string()),
            ]
        );
        assert!(check_pivot_type("ts", &columns).is_ok());
    }

    #[test]
    fn test_pivot_type_without_literal_is_rejected() {
        let columns = vec![ColumnMetadata::new("doc", ValueType::from_bigquery("JSON"))];
        assert!(matches!(
            check_pivot_type("doc", &columns),
            Err(PivotError::Discovery(_))
        ));
    }

    #[test]
    fn test_api_error_is_verbatim() {
        let body = r#"{"error": {"code": 400, "message": "Syntax error: Unexpected keyword FROM at [3:1]", "errors": [{"reason": "invalidQuery"}]}}"#;
        match api_error(StatusCode::BAD_REQUEST, body) {
            PivotError::Execution(msg) => assert_eq!(msg, "Syntax error: Unexpected keyword FROM at [3:1]"),
            other => panic!("unexpected error: {:?}", other),
        }

        match api_error(StatusCode::BAD_GATEWAY, "upstream down") {
            PivotError::Execution(msg) => assert!(msg.contains("upstream down")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let body = r#"{"error": {"code": 409, "message": "Already Exists: Table proj:ds.out", "errors": [{"reason": "duplicate"}]}}"#;
        assert!(matches!(
            api_error(StatusCode::CONFLICT, body),
            PivotError::DestinationConflict(_)
        ));
        assert!(matches!(
            job_error(ErrorProto {
                reason: Some("duplicate".to_string()),
                message: Some("Already Exists".to_string()),
            }),
            PivotError::DestinationConflict(_)
        ));
        assert!(matches!(
            job_error(ErrorProto {
                reason: Some("quotaExceeded".to_string()),
                message: None,
            }),
            PivotError::Execution(_)
        ));
    }

    #[test]
    fn test_qualify_requires_dataset() {
        let c = client();
        let table = TableRef::parse("events").unwrap();
        assert!(matches!(c.qualify(&table), Err(PivotError::InvalidSpec(_))));
        let table = TableRef::parse("ds.events").unwrap();
        assert_eq!(c.qualify(&table).unwrap(), ("proj", "ds", "events"));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = new_job_id();
        let b = new_job_id();
        assert!(a.starts_with(JOB_ID_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_fits_query_limit() {
        let id = new_request_id();
        assert!(id.len() <= 36, "request id '{}' is {} chars", id, id.len());
        assert!(id.is_ascii());
        assert_ne!(id, new_request_id());
    }
}
