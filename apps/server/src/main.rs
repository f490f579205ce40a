//! soundshelf command line
//!
//! Runs `?`-templated SQL against the configured backend and prints JSON.
//!
//! Usage:
//!   soundshelf query "SELECT * FROM audios WHERE category = ?" --param science
//!   soundshelf page "SELECT id, title FROM audios ORDER BY created_at DESC" --page 2 --limit 10

use anyhow::Context;
use clap::{Parser, Subcommand};
use soundshelf::db::SqlValue;
use soundshelf::query::QueryOptions;
use soundshelf::{logging, metrics, AppState, Config};

#[derive(Parser, Debug)]
#[clap(name = "soundshelf")]
#[clap(about = "Run catalog queries through the soundshelf query layer")]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Print Prometheus metrics to stderr before exiting
    #[clap(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a single statement
    Query {
        sql: String,
        /// Positional parameter; repeat for each `?` (null, true/false and numbers are typed)
        #[clap(short, long = "param", value_parser = parse_param)]
        params: Vec<SqlValue>,
    },
    /// Fetch one page of a SELECT with its total row count
    Page {
        sql: String,
        #[clap(short, long = "param", value_parser = parse_param)]
        params: Vec<SqlValue>,
        #[clap(long, default_value_t = 1)]
        page: u32,
        #[clap(long, default_value_t = soundshelf::query::DEFAULT_PAGE_LIMIT)]
        limit: u32,
        /// Bypass the result cache
        #[clap(long)]
        no_cache: bool,
    },
}

fn parse_param(raw: &str) -> Result<SqlValue, String> {
    Ok(match raw {
        "null" | "NULL" => SqlValue::Null,
        "true" => SqlValue::Bool(true),
        "false" => SqlValue::Bool(false),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                SqlValue::Int(i)
            } else if let Ok(f) = raw.parse::<f64>() {
                SqlValue::Float(f)
            } else {
                SqlValue::Text(raw.to_string())
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dialect = %config.database.dialect,
        "Starting soundshelf"
    );

    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;

    let output = match args.command {
        Command::Query { sql, params } => {
            let result = state
                .executor
                .execute(&sql, &params)
                .await
                .context("Query failed")?;
            serde_json::to_string_pretty(&result)?
        }
        Command::Page {
            sql,
            params,
            page,
            limit,
            no_cache,
        } => {
            let mut options = state.default_options().with_page(page).with_limit(limit);
            if no_cache {
                options = options.without_cache();
            }
            let options: QueryOptions = options.validated()?;
            let envelope = state
                .paginator
                .paginate(&sql, &params, &options)
                .await
                .context("Pagination failed")?;
            serde_json::to_string_pretty(&envelope)?
        }
    };
    println!("{output}");

    if args.metrics {
        eprintln!("{}", metrics::gather());
    }

    state.shutdown().await;
    Ok(())
}
