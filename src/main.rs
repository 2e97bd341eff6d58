//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database and imports seed data
//! - Starts the HTTP server with graceful shutdown support

use std::error::Error;
use std::fs;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use staybook::config::Config;
use staybook::database::{import_seed, init_db, AppState};
use staybook::model::Seed;
use staybook::route::create_app;

/// Application entry point
///
/// 1. Loads environment variables from .env file
/// 2. Reads configuration (see [`staybook::config`])
/// 3. Initializes the embedded database, importing `SEED_FILE` into an
///    empty store
/// 4. Starts the HTTP server with graceful shutdown handling
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let db = init_db(&config.database_url)?;

    if let Some(seed_path) = &config.seed_file {
        let seed: Seed = serde_json::from_str(&fs::read_to_string(seed_path)?)?;
        let imported = import_seed(&db, &seed)?;
        tracing::info!(seed_path, imported, "seed data loaded");
    }

    let state = AppState::with_policy(db, config.policy());
    let app = create_app(state).layer(TraceLayer::new_for_http());

    // Bind to all network interfaces on the specified port
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    println!("🏨 Booking service running at http://localhost:{}", config.port);
    println!("📂 Using database: {}", config.database_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// Open connections finish and the in-flight write transaction commits or
/// aborts before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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

    println!("\n🛑 Shutdown signal received, stopping server.");
}
