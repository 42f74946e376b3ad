use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::build_client;
use crate::api::rest::{create_router, AppState};
use crate::shared::config::AgentSettings;

pub async fn run_rest_server(settings: &AgentSettings, host: &str, port: u16) -> Result<()> {
    info!("Starting toolrelay API v{}...", env!("CARGO_PKG_VERSION"));

    let client = build_client(settings)?;
    let credential_count = client.credentials().credentials_for("").len();
    if credential_count == 0 {
        warn!("No completion API keys configured; every request will fail until one is set");
    } else {
        info!("{} completion credential(s) available", credential_count);
    }
    if settings.google_api_key.is_none() || settings.google_cx.is_none() {
        warn!("GOOGLE_API_KEY or GOOGLE_CX missing; web search steps will report errors");
    }

    let app = create_router(Arc::new(AppState::new(client)));

    let bind_addr = format!("{host}:{port}");
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("API started successfully!");
    info!("Agent endpoint: http://{}:{}/api/agent", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("toolrelay API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down toolrelay API...");
}
