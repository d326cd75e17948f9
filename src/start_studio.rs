//! Startup helpers for the reference studio server.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use crate::generation::core::config::StudioConfig;
use crate::server::{self, AppState};

/// Run the server (used by the `reference-studio` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting reference studio v{}", env!("CARGO_PKG_VERSION"));

    let config = StudioConfig::from_env();
    let state = match initialize(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server(state, config.server.port)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if the configuration is invalid or the service client
/// cannot be built.
pub fn initialize(
    config: &StudioConfig,
) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("Generation service: {}", config.service.base_url);
    match config.project_id {
        Some(project_id) => tracing::info!("Startup project: {project_id}"),
        None => tracing::warn!("No startup project; submissions are refused until one is set"),
    }

    AppState::new(config).map_err(|e| format!("Failed to create state: {e}").into())
}

/// Run server with graceful shutdown.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    server::run_server_with_shutdown(state, port, shutdown_signal).await
}
