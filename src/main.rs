//! bqpivot - Main Entry Point
//!
//! Command-line surface over the pivot query builder: render the query to
//! stdout or a file, fetch its result, or materialize it as a table.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::cell::OnceCell;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use bqpivot::io::read_categories;
use bqpivot::{
    invalid_spec_err, AggregateFunction, BigQueryClient, PivotError, PivotQueryBuilder,
    PivotResult, PivotSpec, ResultSet, TableRef, Value, Warehouse, WarehouseConfig,
    WriteDisposition,
};

#[derive(Parser)]
#[command(name = "bqpivot")]
#[command(about = "Generate single-scan pivot queries for BigQuery and run them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(flatten)]
    pivot: PivotArgs,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PivotArgs {
    /// Source table, e.g. project.dataset.events
    #[arg(short, long)]
    table: String,

    /// Index (group by) column; repeat for a composite index
    #[arg(short, long = "index", required = true)]
    index: Vec<String>,

    /// Column whose distinct values become output columns
    #[arg(short, long)]
    pivot: String,

    /// Column to aggregate per category; repeatable
    #[arg(long = "value", required = true)]
    values: Vec<String>,

    /// Category to pivot on; repeatable. Skips discovery.
    #[arg(short, long = "category", conflicts_with = "categories_csv")]
    categories: Vec<String>,

    /// Read categories from a column of this CSV file. Skips discovery.
    #[arg(long, value_name = "PATH")]
    categories_csv: Option<PathBuf>,

    /// CSV column holding the categories (defaults to the pivot column name)
    #[arg(long, requires = "categories_csv")]
    categories_column: Option<String>,

    /// Aggregation applied to every generated column
    #[arg(long, value_enum, default_value_t = AggArg::Sum, conflicts_with = "agg_template")]
    agg: AggArg,

    /// Custom aggregation with one {} placeholder, e.g. 'ROUND(SUM({}), 2)'
    #[arg(long)]
    agg_template: Option<String>,

    /// Prefix for generated column names
    #[arg(long)]
    prefix: Option<String>,

    /// Suffix for generated column names
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Args)]
struct ConnectionArgs {
    /// JSON config file (defaults to the platform config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Project that runs the jobs
    #[arg(long)]
    project: Option<String>,

    /// Job location, e.g. US
    #[arg(long)]
    location: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the pivot query, optionally saving it to a file
    Render {
        /// File to write the query to (replaced if it exists)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not print the query to stdout
        #[arg(short, long)]
        quiet: bool,
    },
    /// Run the pivot query and print the result
    Fetch {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Run the pivot query and save the result as a table
    Persist {
        /// Destination table, e.g. dataset.events_wide
        #[arg(short, long)]
        destination: String,

        /// What to do if the destination exists
        #[arg(long, value_enum, default_value_t = IfExists::Fail)]
        if_exists: IfExists,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggArg {
    Sum,
    Max,
    Min,
    Avg,
    Count,
    AnyValue,
}

impl From<AggArg> for AggregateFunction {
    fn from(arg: AggArg) -> Self {
        match arg {
            AggArg::Sum => AggregateFunction::Sum,
            AggArg::Max => AggregateFunction::Max,
            AggArg::Min => AggregateFunction::Min,
            AggArg::Avg => AggregateFunction::Avg,
            AggArg::Count => AggregateFunction::Count,
            AggArg::AnyValue => AggregateFunction::AnyValue,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IfExists {
    Fail,
    Replace,
}

impl From<IfExists> for WriteDisposition {
    fn from(arg: IfExists) -> Self {
        match arg {
            IfExists::Fail => WriteDisposition::Fail,
            IfExists::Replace => WriteDisposition::Overwrite,
        }
    }
}

fn build_spec(args: &PivotArgs) -> PivotResult<PivotSpec> {
    let (first, rest) = args
        .index
        .split_first()
        .ok_or_else(|| invalid_spec_err!("at least one --index is required"))?;

    let mut spec = PivotSpec::new(&args.table, first, &args.pivot, &args.values)?;
    for extra in rest {
        spec = spec.with_index_column(extra)?;
    }

    let aggregate = match &args.agg_template {
        Some(template) => AggregateFunction::custom(template)?,
        None => args.agg.into(),
    };
    spec = spec
        .with_aggregate(aggregate)
        .with_affixes(args.prefix.as_deref(), args.suffix.as_deref())?;

    if !args.categories.is_empty() {
        spec = spec.with_categories(args.categories.iter().map(String::as_str))?;
    } else if let Some(path) = &args.categories_csv {
        let column = args.categories_column.as_deref().unwrap_or(args.pivot.as_str());
        let categories = read_categories(path, column)?;
        if categories.is_empty() {
            return Err(invalid_spec_err!(
                "{} has no values in column '{}'",
                path.display(),
                column
            ));
        }
        spec = spec.with_categories(categories)?;
    }

    Ok(spec)
}

/// BigQuery client built on first use, so rendering with supplied
/// categories never reads the config or touches the network
struct LazyBigQuery {
    connection: ConnectionArgs,
    client: OnceCell<BigQueryClient>,
}

impl LazyBigQuery {
    fn new(connection: ConnectionArgs) -> Self {
        Self {
            connection,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> PivotResult<&BigQueryClient> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let config = WarehouseConfig::load(self.connection.config.as_deref())?.with_overrides(
            self.connection.project.clone(),
            self.connection.location.clone(),
        );
        tracing::debug!(?config, "resolved warehouse config");
        let client = BigQueryClient::new(config)?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl Warehouse for LazyBigQuery {
    fn list_distinct(&self, table: &TableRef, column: &str) -> PivotResult<Vec<Value>> {
        self.client()?.list_distinct(table, column)
    }

    fn execute(&self, sql: &str) -> PivotResult<ResultSet> {
        self.client()?.execute(sql)
    }

    fn execute_to_table(&self, sql: &str, destination: &TableRef, overwrite: bool) -> PivotResult<()> {
        self.client()?.execute_to_table(sql, destination, overwrite)
    }

    fn table_exists(&self, table: &TableRef) -> PivotResult<bool> {
        self.client()?.table_exists(table)
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let spec = build_spec(&cli.pivot)?;
    let mut builder = PivotQueryBuilder::new(spec, LazyBigQuery::new(cli.connection));

    match cli.command {
        Command::Render { output, quiet } => {
            builder
                .write_query(output.as_deref(), !quiet)
                .with_context(|| match &output {
                    Some(path) => format!("rendering query to {}", path.display()),
                    None => "rendering query".to_string(),
                })?;
        }
        Command::Fetch { format } => {
            let start = std::time::Instant::now();
            let result = builder.run_and_fetch()?;
            match format {
                OutputFormat::Table => {
                    println!("{}", result.to_table_string());
                    println!(
                        "Query executed successfully ({} row{} in {:.3}s)",
                        result.row_count(),
                        if result.row_count() == 1 { "" } else { "s" },
                        start.elapsed().as_secs_f64()
                    );
                }
                OutputFormat::Csv => print!("{}", result.to_csv_string()?),
                OutputFormat::Json => println!("{}", result.to_json_string()?),
            }
        }
        Command::Persist {
            destination,
            if_exists,
        } => {
            let default_project = builder.warehouse().client()?.config().project.clone();
            let destination =
                TableRef::parse(&destination)?.with_default_project(default_project.as_deref());
            builder.run_and_persist(&destination, if_exists.into())?;
            eprintln!("Pivot written to {}", destination);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "bqpivot=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PivotError>()
        .map(PivotError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bqpivot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_blank_value_column_exits_with_invalid_spec() {
        let cli = parse(&[
            "-t", "ds.events", "-i", "user_id", "-p", "event_type", "--value", " ", "render",
        ]);
        let err = run(cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PivotError>(),
            Some(PivotError::InvalidSpec(_))
        ));
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_exit_codes_survive_context() {
        let cases = [
            (PivotError::Discovery("no rows".into()), 3),
            (PivotError::Execution("Syntax error".into()), 4),
            (PivotError::DestinationConflict("ds.t".into()), 5),
            (PivotError::Config("no project".into()), 1),
        ];
        for (error, code) in cases {
            let err = anyhow::Error::new(error).context("running pivot");
            assert_eq!(exit_code(&err), code);
        }
    }

    #[test]
    fn test_supplied_categories_render_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("config.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let output = dir.path().join("pivot.sql");

        let cli = parse(&[
            "-t", "ds.events", "-i", "user_id", "-p", "event_type", "--value", "count",
            "-c", "click", "--config", broken.to_str().unwrap(),
            "render", "-q", "-o", output.to_str().unwrap(),
        ]);
        run(cli).unwrap();
        assert!(std::fs::read_to_string(&output)
            .unwrap()
            .contains("AS count_click"));
    }

    #[test]
    fn test_broken_config_fails_when_warehouse_is_needed() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("config.json");
        std::fs::write(&broken, "{ not json").unwrap();

        let cli = parse(&[
            "-t", "ds.events", "-i", "user_id", "-p", "event_type", "--value", "count",
            "--config", broken.to_str().unwrap(), "render", "-q",
        ]);
        let err = run(cli).unwrap_err();
        // Config errors surface through discovery
        assert_eq!(exit_code(&err), 3);
        assert!(format!("{:#}", err).contains("invalid config"));
    }
}
