//! HTTP viewer: picker page, JSON API and the generated files.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use crate::app::{generate_maps, maps_ready};
use crate::config::toml_config::TomlConfig;
use crate::utils::error::Result;

pub use routes::app_router;
pub use state::AppState;

/// Renders maps if they are missing (best effort), then serves until Ctrl-C.
pub async fn run(config: TomlConfig) -> Result<()> {
    let state = AppState::new(config);

    if !maps_ready(&state.storage, &state.config).await {
        tracing::info!("Maps not found, generating them before starting the server");
        match generate_maps(&state.storage, &state.config).await {
            Ok(summary) => tracing::info!(
                "Generated {} breed maps and {} name maps",
                summary.breed_maps,
                summary.name_maps
            ),
            Err(e) => {
                tracing::warn!("Map generation failed, starting without maps: {}", e);
                tracing::warn!("Suggestion: {}", e.recovery_suggestion());
            }
        }
    }

    let listen = state.config.server.listen.clone();
    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
