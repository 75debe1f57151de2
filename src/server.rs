// src/server.rs
// Bind, serve, and shut down on Ctrl-C / SIGTERM

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::create_router;
use crate::config::JurisConfig;
use crate::state::AppState;

pub async fn run(config: JurisConfig) -> Result<()> {
    let bind_address = config.bind_address();

    info!("Model: {} via {}", config.model, config.groq_base_url);
    info!(
        "Max duration: chat {}s, summarize {}s; stream protocol: {}",
        config.chat_max_duration_secs,
        config.summarize_max_duration_secs,
        config.stream_protocol.as_str()
    );
    info!(
        "Access token gate: {}",
        if config.access_token.is_some() { "enabled" } else { "disabled" }
    );

    let state = AppState::from_config(config).context("Failed to build model client")?;
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    info!("JurisAI listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
