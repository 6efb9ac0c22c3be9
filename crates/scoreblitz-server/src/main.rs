use std::net::SocketAddr;
use std::process;

use tracing_subscriber::EnvFilter;

use scoreblitz_server::config::ServerConfig;
use scoreblitz_server::{build_app, spawn_idle_sweeper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = build_app(config);
    spawn_idle_sweeper(state.clone());

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind listener");
            process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Scoreblitz server listening");

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = serve.await {
        tracing::error!(error = %e, "Server error");
        process::exit(1);
    }

    state.registry.drain().await;
    tracing::info!("Scoreblitz server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
