//! Serve command handler.

use std::sync::Arc;

use anyhow::Result;
use spoke_axum::{CorsConfig, ServerConfig, start_server};

use crate::bootstrap::{PipelineConfig, Persistence, start_service};

/// Run the HTTP server until Ctrl+C, then drain the worker.
pub async fn execute(pipeline: PipelineConfig, server: ServerConfig) -> Result<()> {
    let service = tokio::task::spawn_blocking(move || {
        start_service(&pipeline, Persistence::ReadWrite)
    })
    .await??;
    let service = Arc::new(service);

    start_server(Arc::clone(&service), server).await?;

    tracing::info!("Shutting down speech pipeline");
    tokio::task::spawn_blocking(move || service.shutdown()).await?;
    Ok(())
}

/// Server settings from the command line.
pub fn server_config(
    host: std::net::IpAddr,
    port: u16,
    allowed_origins: Vec<String>,
) -> ServerConfig {
    let config = ServerConfig {
        host,
        port,
        cors: CorsConfig::AllowAll,
    };
    if allowed_origins.is_empty() {
        config
    } else {
        config.with_allowed_origins(allowed_origins)
    }
}
