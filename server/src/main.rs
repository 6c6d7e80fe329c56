mod app;
mod config;
mod routes;
mod state;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let atlas_path = config::atlas_data_path();
    let atlas = match state::load_atlas(&atlas_path) {
        Ok(atlas) => atlas,
        Err(e) => {
            tracing::error!(error = %e, path = %atlas_path.display(), "failed to load atlas");
            std::process::exit(1);
        }
    };
    let year_bounds = atlas.year_bounds();
    tracing::info!(
        empires = atlas.len(),
        min_year = year_bounds.map(|b| b.min),
        max_year = year_bounds.map(|b| b.max),
        path = %atlas_path.display(),
        "atlas loaded"
    );

    let state = match AppState::new(atlas) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to prepare atlas payloads");
            std::process::exit(1);
        }
    };
    tracing::info!(
        placements = state.atlas.placements.len(),
        etag = %state.atlas.etag,
        "label placements precomputed"
    );

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Nusantara map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
