//! InsightBlast: thinking-model recommendations and analyses.
//!
//! `insightblast serve` exposes the HTTP API; the other subcommands run
//! the same flow from the terminal against local storage.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use common::{AppConfig, LocalStorage, ModelCatalog};

mod commands;
mod routes;
mod state;

use commands::Services;
use state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; missing file means defaults
    #[arg(long, default_value = "insightblast.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Ask a question and analyze it with the suggested models
    Ask {
        question: String,
        /// Model ids to analyze with instead of the first suggestions
        #[arg(long = "model", short = 'm')]
        models: Vec<String>,
        /// Directory to write a Markdown report into
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show the last session if it has not expired
    Resume {
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List catalog models
    Models {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// List saved analyses, or show one
    History {
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        show: Option<String>,
        #[arg(long)]
        remove: Option<String>,
    },
    /// Toggle the favorite flag of a saved analysis
    Favorite { id: String },
    /// Show how many analyses have been used
    Usage,
    /// Write all saved data as JSON
    Export { path: Option<PathBuf> },
    /// Replace saved data with an export file
    Import { path: PathBuf },
    /// Delete all saved data
    Clear,
}

fn load_catalog(config: &AppConfig) -> Result<ModelCatalog> {
    match &config.catalog_path {
        Some(path) => {
            ModelCatalog::load(path).with_context(|| format!("Failed to load catalog from {}", path.display()))
        }
        None => ModelCatalog::builtin().context("Built-in catalog is invalid"),
    }
}

fn storage_path(config: &AppConfig) -> PathBuf {
    config.storage_path.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("insightblast")
            .join("storage.json")
    })
}

fn open_storage(path: &Path) -> Arc<LocalStorage> {
    let storage = LocalStorage::open(path);
    if storage.is_degraded() {
        warn!(path = %path.display(), "Storage unavailable, data will not persist");
    }
    Arc::new(storage)
}

async fn serve(config: AppConfig, catalog: Arc<ModelCatalog>, host: &str, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or_else(|| config.port());
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let provider = agent::provider_from_config(&config).context("Failed to create completion provider")?;
    info!(
        provider = provider.name(),
        mode = %provider.mode(),
        models = catalog.len(),
        "Completion provider ready"
    );
    let app = routes::create_router(AppState::new(config, catalog, provider));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("InsightBlast listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insightblast=info,agent=info,common=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config).apply_env(|key| std::env::var(key).ok());
    let catalog = Arc::new(load_catalog(&config)?);

    if let Command::Serve { port, host } = &args.command {
        return serve(config, catalog, host, *port).await;
    }

    let storage = open_storage(&storage_path(&config));
    let mut out = std::io::stdout().lock();

    match args.command {
        Command::Serve { .. } => Ok(()),
        Command::Ask {
            question,
            models,
            report,
        } => {
            let provider = agent::provider_from_config(&config).context("Failed to create completion provider")?;
            let services = Services {
                config,
                catalog,
                provider,
                storage,
            };
            commands::ask(&services, &mut out, &question, &models, report.as_deref()).await
        }
        Command::Resume { report } => {
            let provider = agent::provider_from_config(&config).context("Failed to create completion provider")?;
            let services = Services {
                config,
                catalog,
                provider,
                storage,
            };
            commands::resume(&services, &mut out, report.as_deref())
        }
        Command::Models {
            category,
            difficulty,
            search,
        } => commands::models(
            &catalog,
            &mut out,
            category.as_deref(),
            difficulty.as_deref(),
            search.as_deref(),
        ),
        Command::History { favorites, show, remove } => match remove {
            Some(id) => commands::remove(&storage, &mut out, &id),
            None => commands::history(&storage, &mut out, favorites, show.as_deref()),
        },
        Command::Favorite { id } => commands::favorite(&storage, &mut out, &id),
        Command::Usage => commands::usage(&storage, &mut out, config.trial_limit()),
        Command::Export { path } => commands::export(&storage, &mut out, path),
        Command::Import { path } => commands::import(&storage, &mut out, &path),
        Command::Clear => commands::clear(&storage, &mut out),
    }
}
