//! Trellis server binary.
//!
//! Loads workflow definitions (one JSON file per workflow) from a
//! directory, assembles an engine with the built-in node set, and serves
//! it over HTTP until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trellis_engine::{builtin_nodes, Engine, WorkflowDef};

#[derive(Debug, Parser)]
#[command(name = "trellis-server", about = "Declarative workflow HTTP server")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "TRELLIS_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Directory of workflow definition files (*.json).
    #[arg(long, env = "TRELLIS_WORKFLOWS", default_value = "workflows")]
    workflows: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let defs = load_workflows(&args.workflows)?;
    anyhow::ensure!(
        !defs.is_empty(),
        "no workflow definitions found in {}",
        args.workflows.display()
    );
    for def in &defs {
        tracing::info!(workflow = %def.name, triggers = def.triggers.len(), "loaded workflow");
    }

    let engine = Arc::new(
        Engine::builder()
            .node_set(builtin_nodes())
            .workflows(defs)
            .build()
            .context("engine assembly failed")?,
    );

    let app = trellis_server::router(engine);
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(addr = %args.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn load_workflows(dir: &PathBuf) -> anyhow::Result<Vec<WorkflowDef>> {
    let mut defs = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read workflow directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let def: WorkflowDef = serde_json::from_str(&raw)
            .with_context(|| format!("invalid workflow definition in {}", path.display()))?;
        defs.push(def);
    }
    defs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(defs)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
