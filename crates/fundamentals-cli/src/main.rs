//! `fundamentals`: ingest per-ticker financial statement dumps and query them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fundamentals::{
    FundamentalsError, Ingestor, ObservationQuery, PeriodType, QueryEngine, SqliteStore,
    StatementBlock, Ticker,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, parse_chunk_size};

/// Message printed when a query matches nothing for a ticker.
const NOT_FOUND_MESSAGE: &str = "No data found for this ticker";

#[derive(Parser)]
#[command(
    name = "fundamentals",
    version,
    about = "Ingest and query per-ticker financial statement data",
    long_about = "Loads a folder of per-ticker JSON dumps into a SQLite store, then serves the \
                  metric catalog, observations, tickers and fiscal period availability."
)]
struct Cli {
    /// SQLite database file [env: FUNDAMENTALS_DATABASE]
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every .json file in a folder
    Ingest {
        /// Folder of per-ticker documents [env: FUNDAMENTALS_DATA_DIR]
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Rows written per atomic chunk [env: FUNDAMENTALS_CHUNK_SIZE]
        #[arg(long, value_parser = parse_chunk_size)]
        chunk_size: Option<usize>,
    },

    /// List the metric catalog
    DataTypes,

    /// Show a ticker's observations
    Query {
        /// Ticker, matched exactly
        ticker: String,

        /// Reporting granularity: annuals or quarterly
        #[arg(long)]
        period: Option<PeriodType>,

        /// Fiscal year
        #[arg(long)]
        year: Option<String>,

        /// Fiscal month
        #[arg(long)]
        month: Option<String>,

        /// Statement block, e.g. income_statement
        #[arg(long)]
        statement_type: Option<StatementBlock>,

        /// Metric name, matched exactly
        #[arg(long)]
        name: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// List every ticker with data
    Tickers,

    /// Show the fiscal periods held for a ticker
    Availability {
        /// Ticker, matched exactly
        ticker: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Table,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e
                .downcast_ref::<FundamentalsError>()
                .is_some_and(FundamentalsError::is_not_found)
            {
                eprintln!("{NOT_FOUND_MESSAGE}");
                return ExitCode::from(2);
            }
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    // Only ingestion may create the database
    let store = if matches!(cli.command, Command::Ingest { .. }) {
        SqliteStore::new(&config.database_path)
    } else {
        SqliteStore::open_existing(&config.database_path)
    };
    let store = Arc::new(
        store.with_context(|| format!("opening {}", config.database_path.display()))?,
    );

    match cli.command {
        Command::Ingest {
            data_dir,
            chunk_size,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }

            info!(
                data_dir = %config.data_dir.display(),
                database = %config.database_path.display(),
                chunk_size = config.chunk_size,
                "Ingesting"
            );
            let report = Ingestor::new(store)
                .with_config(config.ingest_config())
                .ingest_dir(&config.data_dir)
                .await
                .with_context(|| format!("ingesting {}", config.data_dir.display()))?;
            print_json(&report)
        }
        Command::DataTypes => {
            let types = QueryEngine::new(store).list_data_types().await?;
            print_json(&types)
        }
        Command::Query {
            ticker,
            period,
            year,
            month,
            statement_type,
            name,
            format,
        } => {
            let query = ObservationQuery {
                ticker: Ticker::new(ticker),
                period,
                year,
                month,
                statement_block: statement_type,
                metric_name: name,
            };
            let engine = QueryEngine::new(store);
            match format {
                Format::Json => print_json(&engine.query_observations(&query).await?),
                Format::Table => {
                    let df = engine.observations_frame(&query).await?;
                    println!("{df}");
                    Ok(())
                }
            }
        }
        Command::Tickers => {
            let tickers = QueryEngine::new(store).list_tickers().await?;
            print_json(&tickers)
        }
        Command::Availability { ticker } => {
            let availability = QueryEngine::new(store)
                .availability(&Ticker::new(ticker))
                .await?;
            print_json(&availability)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
