use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rag_gateway::{app, AppState};

#[derive(Parser)]
#[command(name = "rag-gateway")]
#[command(about = "API gateway for the RAG chatbot platform")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
    host: String,

    #[arg(long, help = "Port to listen on (defaults to PORT / configuration)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up SUPABASE_URL, QDRANT_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = rag_gateway::config::config().clone();
    tracing::info!("Starting RAG gateway in {:?} mode", config.environment);
    if config.is_production() && config.security.allow_any_origin {
        tracing::warn!("SECURITY_ALLOW_ANY_ORIGIN is enabled in production");
    }

    let port = cli.port.unwrap_or(config.server.port);
    let state = AppState::new(config).context("failed to build service clients")?;
    let app = app(Arc::new(state));

    let bind_addr = format!("{}:{}", cli.host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("RAG gateway listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
