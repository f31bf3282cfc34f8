//! HTTP server for the engram vector database.

mod api;

use anyhow::Result;
use clap::Parser;
use engram_core::{EngineConfig, PersistenceConfig, VectorStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Lightweight vector database with snapshot persistence.
#[derive(Debug, Parser)]
#[command(name = "engram-server", version, about)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "ENGRAM_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind.
    #[arg(long, env = "ENGRAM_PORT", default_value_t = 8080)]
    port: u16,

    /// Enable the snapshot persistence layer.
    #[arg(long, env = "ENGRAM_PERSISTENCE", default_value_t = false)]
    persistence: bool,

    /// Directory receiving snapshot files.
    #[arg(long, env = "ENGRAM_SNAPSHOT_DIR", default_value = "./data")]
    snapshot_dir: PathBuf,

    /// Mutating operations between autosaves; -1 disables autosaving.
    #[arg(long, env = "ENGRAM_AUTOSAVE_THRESHOLD", default_value_t = -1, allow_hyphen_values = true)]
    autosave_threshold: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = EngineConfig {
        persistence: PersistenceConfig {
            enabled: args.persistence,
            snapshot_dir: args.snapshot_dir,
            autosave_threshold: args.autosave_threshold,
        },
    };

    let store = Arc::new(VectorStore::open(config)?);
    let app = api::router(store);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!(%addr, "engram server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
