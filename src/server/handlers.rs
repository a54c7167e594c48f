//! Route handlers: two browser pages plus the JSON API the map pages call.

use crate::app::run_all;
use crate::core::maps::read_popular;
use crate::core::pipeline::{
    data_ready, POPULAR_BREEDS, POPULAR_NAMES, VALID_BREEDS, VALID_NAMES, ZIPCODE_STATS,
};
use crate::core::viewer::{map_options, render_index, render_processing};
use crate::core::Storage;
use crate::domain::model::{normalize_zip, PopularEntry, ZipcodeStats, ZipcodeTable};
use crate::server::error::AppError;
use crate::server::state::AppState;
use crate::utils::error::EtlError;
use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    Json,
};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub data_ready: bool,
}

async fn require_data(state: &AppState) -> Result<(), AppError> {
    if data_ready(&state.storage, &state.config).await {
        Ok(())
    } else {
        Err(AppError::unavailable("Aggregated data has not been generated yet"))
    }
}

/// `GET /`: the map picker, or a page offering to process the data.
pub async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let config = &state.config;
    if !data_ready(&state.storage, config).await {
        return render_processing(config)
            .map(Html)
            .map_err(|e| AppError::page(config, &e.user_friendly_message()));
    }

    let page = match map_options(&state.storage, config).await {
        Ok(options) => render_index(config, &options, "/maps"),
        Err(e) => Err(e),
    };
    page.map(Html).map_err(|e| {
        tracing::error!("Failed to render index: {}", e);
        AppError::page(config, &e.user_friendly_message())
    })
}

/// `GET /process`: preprocess and render maps, then back to the picker.
pub async fn process_handler(State(state): State<AppState>) -> Result<Redirect, AppError> {
    tracing::info!("Processing requested over HTTP");
    match run_all(&state.storage, &state.config).await {
        Ok(summary) => {
            tracing::info!(
                "Processing finished: {} breed maps, {} name maps",
                summary.breed_maps,
                summary.name_maps
            );
            Ok(Redirect::to("/"))
        }
        Err(e) => {
            tracing::error!("Processing failed: {} ({})", e, e.recovery_suggestion());
            Err(AppError::page(
                &state.config,
                "An error occurred while processing the data. Check the server logs for details.",
            ))
        }
    }
}

/// `GET /api/zipcode/{zip}`
pub async fn zipcode_handler(
    State(state): State<AppState>,
    Path(zip): Path<String>,
) -> Result<Json<ZipcodeStats>, AppError> {
    require_data(&state).await?;
    let bytes = state
        .storage
        .read_file(&state.config.output.data_file(ZIPCODE_STATS))
        .await?;
    let mut table: ZipcodeTable = serde_json::from_slice(&bytes).map_err(EtlError::from)?;

    normalize_zip(&zip)
        .and_then(|key| table.remove(&key))
        .map(Json)
        .ok_or_else(|| AppError::not_found("Zip code not found", json!({ "zipcode": zip })))
}

async fn entry(state: &AppState, file: &str, key: &str) -> Result<Json<PopularEntry>, AppError> {
    require_data(state).await?;
    let mut table = read_popular(&state.storage, &state.config, file).await?;
    table
        .remove(key)
        .map(Json)
        .ok_or_else(|| AppError::not_found("Entry not found", json!({ "key": key })))
}

/// `GET /api/breed/{breed}`
pub async fn breed_handler(
    State(state): State<AppState>,
    Path(breed): Path<String>,
) -> Result<Json<PopularEntry>, AppError> {
    entry(&state, POPULAR_BREEDS, &breed).await
}

/// `GET /api/name/{name}`
pub async fn name_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PopularEntry>, AppError> {
    entry(&state, POPULAR_NAMES, &name).await
}

async fn valid_keys(state: &AppState, file: &str) -> Result<Json<Vec<String>>, AppError> {
    require_data(state).await?;
    let bytes = state
        .storage
        .read_file(&state.config.output.data_file(file))
        .await?;
    let keys: Vec<String> = serde_json::from_slice(&bytes).map_err(EtlError::from)?;
    Ok(Json(keys))
}

/// `GET /api/breeds`: every popular breed, largest first.
pub async fn breeds_handler(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    valid_keys(&state, VALID_BREEDS).await
}

/// `GET /api/names`
pub async fn names_handler(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    valid_keys(&state, VALID_NAMES).await
}

/// `GET /api/health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data_ready: data_ready(&state.storage, &state.config).await,
    })
}
