use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rmcp::transport::stdio;
use rmcp::ServiceExt;

use tourkit::config::TourkitConfig;
use tourkit::server::TourkitServer;
use tourkit::store::{Catalog, MemoryStore, TourStore};
use tourkit::tools::page;

/// tourkit: author and play product tours over MCP
#[derive(Parser)]
#[command(name = "tourkit", version, about)]
struct Cli {
    /// Run Chrome with a visible window (default: headless)
    #[arg(long)]
    headed: bool,

    /// Project catalog (project, tours, signed-in user) to serve
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// File backing the browser-local state: play counts and the recording session
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// JSON config: tooltip geometry, selector strategy, auto-start, discovery limit
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print branding, proposed steps and placements for a captured page snapshot
    Inspect {
        /// Snapshot JSON as produced by the page capture
        snapshot: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr only; stdout carries MCP traffic
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    let config = TourkitConfig::load_or_default(cli.config.as_deref())?;

    if let Some(Command::Inspect { snapshot }) = cli.command {
        let tree = page::load_snapshot(&snapshot)?;
        let report = page::inspect(&tree, &config);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (store, project_id): (Arc<dyn TourStore>, Option<String>) = match &cli.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?;
            let project_id = catalog.project.id.clone();
            tracing::info!("Serving project {} ({} tours)", project_id, catalog.tours.len());
            (Arc::new(MemoryStore::from_catalog(catalog)), Some(project_id))
        }
        None => (Arc::new(MemoryStore::new()), None),
    };

    let headless = !cli.headed;
    tracing::info!("Starting tourkit MCP server (headless: {})", headless);

    let server = TourkitServer::new(headless, store, project_id, cli.state, config);
    let service = server.clone().serve(stdio()).await?;

    // Run until the client disconnects or we get ctrl-c
    tokio::select! {
        result = service.waiting() => { result?; }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt signal, shutting down");
        }
    }

    // Always kill Chrome before exiting
    server.shutdown().await;

    tracing::info!("tourkit MCP server shut down");
    Ok(())
}
