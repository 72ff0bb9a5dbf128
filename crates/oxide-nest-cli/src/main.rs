//! oxide-nest CLI
//!
//! Compiles nested requests into SQL, replays canned rows through the
//! reconstructor, or runs requests against MySQL.

mod input;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oxide_nest::{Execution, Nest, Query};
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Nested declarative requests compiled to MySQL.
#[derive(Parser)]
#[command(name = "oxide-nest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with options and models.
    #[arg(short, long, env = "OXIDE_NEST_CONFIG")]
    config: Option<PathBuf>,

    /// MySQL connection string. Without it statements are only printed.
    #[arg(short, long, env = "DATABASE_URL")]
    database: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read nested records.
    Get {
        /// Request as JSON, or @file.
        #[arg(short, long)]
        request: String,

        /// Result rows to reconstruct instead of querying, as JSON or @file.
        #[arg(long)]
        rows: Option<String>,
    },

    /// Count matching records.
    Count {
        /// Request as JSON, or @file.
        #[arg(short, long)]
        request: String,
    },

    /// Update matching records with the request body.
    Patch {
        /// Request as JSON, or @file.
        #[arg(short, long)]
        request: String,
    },

    /// Insert the request body.
    Post {
        /// Request as JSON, or @file.
        #[arg(short, long)]
        request: String,
    },

    /// Delete matching records.
    Del {
        /// Request as JSON, or @file.
        #[arg(short, long)]
        request: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = input::load_options(cli.config.as_deref())?;
    info!(models = options.models.len(), "Loaded options");
    let nest = Nest::new(options);

    match cli.database {
        Some(url) => run(nest, &url, cli.command).await,
        None => dry_run(&nest, cli.command).await,
    }
}

/// Prints compiled statements, or reconstructs replayed rows.
async fn dry_run(nest: &Nest, command: Commands) -> anyhow::Result<()> {
    let query = match command {
        Commands::Get {
            request,
            rows: Some(rows),
        } => {
            let rows = input::rows(&rows)?;
            let nest = nest.clone().with_executor(move |_: &Query| -> oxide_nest::Result<Execution> {
                Ok(Execution::Rows(rows.clone()))
            });
            let result = nest.get(input::request(&request)?).await?;
            return print(&result);
        }
        Commands::Get { request, rows: None } => nest.build_get(input::request(&request)?).await?,
        Commands::Count { request } => nest.build_count(input::request(&request)?).await?,
        Commands::Patch { request } => nest.build_patch(input::request(&request)?).await?,
        Commands::Post { request } => nest.build_post(input::request(&request)?).await?,
        Commands::Del { request } => nest.build_del(input::request(&request)?).await?,
    };
    print(&describe(&query))
}

/// Runs the command against MySQL.
#[cfg(feature = "mysql")]
async fn run(nest: Nest, url: &str, command: Commands) -> anyhow::Result<()> {
    let nest = nest.with_executor(oxide_nest::MySqlExecutor::connect(url).await?);
    let result = match command {
        Commands::Get { request, .. } => nest.get(input::request(&request)?).await?,
        Commands::Count { request } => json!(nest.get_count(input::request(&request)?).await?),
        Commands::Patch { request } => nest.patch(input::request(&request)?).await?,
        Commands::Post { request } => nest.post(input::request(&request)?).await?,
        Commands::Del { request } => nest.del(input::request(&request)?).await?,
    };
    print(&result)
}

#[cfg(not(feature = "mysql"))]
async fn run(_nest: Nest, _url: &str, _command: Commands) -> anyhow::Result<()> {
    anyhow::bail!("oxide-nest was built without the mysql feature")
}

fn describe(query: &Query) -> Value {
    let values: Vec<Value> = query
        .values
        .iter()
        .map(oxide_nest::value::to_json_value)
        .collect();
    json!({
        "sql": query.sql,
        "values": values,
        "inline": query.to_inline_sql(),
    })
}

fn print(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
