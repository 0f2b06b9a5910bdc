//! figparse CLI tool
//!
//! Command-line interface for extracting design documents into the local SQLite store.
//!
//! ## Commands
//!
//! - `parse <url>`: Fetch, extract and persist one document
//! - `show <file-id>`: Print a persisted file with its components and instances
//! - `serve`: Run the HTTP API
//!
//! The access token is read from `--token` or the `FIGMA_TOKEN` environment variable. It is
//! never written to the config file.

use clap::{Parser, Subcommand};
use figparse_core::{
    client::{ApiCredential, HttpDocumentClient},
    config::{ConfigProvider, ParserConfig, TomlConfigProvider},
    db::{db_init, DbConnection},
    service::ParserService,
};
use std::{path::PathBuf, sync::Arc};

mod server;

pub type AppService = ParserService<HttpDocumentClient, DbConnection>;

#[derive(Parser)]
#[command(name = "figparse")]
#[command(author, version, about = "Extract components and instances from design documents", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "figparse.toml")]
    config: PathBuf,

    /// SQLite database file (overrides `storage.db_path`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a document by URL or file key and persist it
    Parse {
        /// Share URL (`.../file/<key>/...` or `.../design/<key>/...`) or bare file key
        url: String,

        /// Personal access token
        #[arg(long, env = "FIGMA_TOKEN", hide_env_values = true)]
        token: String,

        /// Print the full summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a persisted file
    Show {
        /// Id of the file record
        file_id: i64,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides `server.bind`)
        #[arg(long)]
        bind: Option<String>,
    },
}

async fn open_service(config: &ParserConfig) -> Result<AppService, Box<dyn std::error::Error>> {
    let db = db_init(&config.storage.db_path).await?;
    let client = HttpDocumentClient::new(&config.api)?;
    Ok(ParserService::new(client, db, config.extraction.clone()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = TomlConfigProvider::new(cli.config.clone()).load()?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let service = open_service(&config).await?;
        match cli.command {
            Commands::Parse { url, token, json } => {
                let credential = ApiCredential::new(token)?;
                let persisted = service.parse_and_persist(&url, &credential).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&persisted)?);
                } else {
                    println!("{}", persisted.file);
                    println!("{}", persisted.summary);
                    for diagnostic in &persisted.summary.diagnostics {
                        println!("  {diagnostic}");
                    }
                }
            }
            Commands::Show { file_id } => {
                let details = service.get_details(file_id).await?;
                println!("{}", serde_json::to_string_pretty(&details)?);
            }
            Commands::Serve { bind } => {
                let bind = bind.unwrap_or_else(|| config.server.bind.clone());
                server::serve(Arc::new(service), &bind, async {
                    tokio::signal::ctrl_c().await.ok();
                })
                .await?;
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
