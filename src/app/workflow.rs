use crate::config::toml_config::TomlConfig;
use crate::core::etl::EtlEngine;
use crate::core::maps::{maps_current, MapRenderer, MapSummary};
use crate::core::pipeline::{data_ready, DogPipeline};
use crate::core::site::{ExportSummary, SiteExporter};
use crate::core::Storage;
use crate::utils::error::Result;

/// Runs Extract/Transform/Load over the dataset and returns the data directory.
pub async fn preprocess<S: Storage + Clone>(storage: &S, config: &TomlConfig) -> Result<String> {
    let pipeline = DogPipeline::new(storage.clone(), config.clone());
    let engine = EtlEngine::new_with_monitoring(pipeline, config.monitoring_enabled());
    engine.run().await
}

/// Preprocesses only when the aggregated files are missing. Returns whether it ran.
pub async fn ensure_data<S: Storage + Clone>(storage: &S, config: &TomlConfig) -> Result<bool> {
    if data_ready(storage, config).await {
        tracing::debug!("Aggregated data already present in {}", config.output.data_dir);
        return Ok(false);
    }
    tracing::info!("Aggregated data missing, running preprocessing first");
    preprocess(storage, config).await?;
    Ok(true)
}

/// Maps exist and were rendered from the data currently on disk.
pub async fn maps_ready<S: Storage>(storage: &S, config: &TomlConfig) -> bool {
    for listing in ["filtered_breeds.json", "filtered_names.json"] {
        if !storage.exists(&config.output.maps_file(listing)).await {
            return false;
        }
    }
    maps_current(storage, config).await
}

pub async fn generate_maps<S: Storage + Clone>(
    storage: &S,
    config: &TomlConfig,
) -> Result<MapSummary> {
    ensure_data(storage, config).await?;
    MapRenderer::new(storage.clone(), config.clone())
        .render_all()
        .await
}

/// Fresh preprocessing followed by map generation.
pub async fn run_all<S: Storage + Clone>(storage: &S, config: &TomlConfig) -> Result<MapSummary> {
    preprocess(storage, config).await?;
    generate_maps(storage, config).await
}

async fn dataset_available<S: Storage>(storage: &S, config: &TomlConfig) -> bool {
    config.source.dataset_url.is_some() || storage.exists(&config.source.dataset_path).await
}

/// Builds the static site. Without data or a dataset to build it from, the site is a placeholder.
pub async fn export_site<S: Storage + Clone>(
    storage: &S,
    config: &TomlConfig,
) -> Result<ExportSummary> {
    if !data_ready(storage, config).await {
        if dataset_available(storage, config).await {
            preprocess(storage, config).await?;
        } else {
            tracing::warn!(
                "Dataset {} not found and no download URL configured",
                config.source.dataset_path
            );
        }
    }

    if data_ready(storage, config).await && !maps_ready(storage, config).await {
        generate_maps(storage, config).await?;
    }

    SiteExporter::new(storage.clone(), config.clone())
        .export()
        .await
}
