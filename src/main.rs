use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use musicrecs::{
    api,
    auth::AdminAuthConfig,
    config::AppConfig,
    music::{CatalogProvider, MusicConfig, MusicProvider},
    state::AppState,
    words::Words,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musicrecs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting musicrecs...");

    let config = AppConfig::from_env();
    let auth_config = Arc::new(AdminAuthConfig::from_env());

    let provider: Arc<dyn MusicProvider> = match MusicConfig::from_env().build_provider() {
        Ok(provider) => {
            tracing::info!("Using {} music provider", provider.name());
            provider
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize music provider: {}. Links will not resolve.",
                e
            );
            Arc::new(CatalogProvider::new(Vec::new()))
        }
    };

    let words = match &config.words_file {
        Some(path) => Words::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to read word list {}: {}, using built-in words",
                path.display(),
                e
            );
            Words::default()
        }),
        None => Words::default(),
    };

    let state = Arc::new(
        AppState::new(provider)
            .with_config(config.clone())
            .with_words(words),
    );

    if let Some(path) = &config.state_file {
        match state.load_snapshot(path).await {
            Ok(true) => tracing::info!("Restored state from {}", path.display()),
            Ok(false) => tracing::info!("No snapshot at {}, starting fresh", path.display()),
            Err(e) => tracing::error!("Failed to restore state: {}", e),
        }
        spawn_snapshot_writer(state.clone());
    }

    let restored = state.restore_schedules().await;
    if restored > 0 {
        tracing::info!("Restored {} phase schedules", restored);
    }

    let app = api::router(state.clone(), auth_config)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    state.cancel_all_jobs();
    if let Some(path) = &config.state_file {
        if let Err(e) = state.save_snapshot(path).await {
            tracing::error!("Failed to save snapshot on shutdown: {}", e);
        }
    }
    tracing::info!("Shut down");
}

/// Periodically write the state file
fn spawn_snapshot_writer(state: Arc<AppState>) {
    let Some(path) = state.config.state_file.clone() else {
        return;
    };
    let period = state.config.snapshot_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = state.save_snapshot(&path).await {
                tracing::warn!("Periodic snapshot failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
