use crate::config::toml_config::TomlConfig;
use crate::core::aggregate::{popular_table, zipcode_stats};
use crate::core::dedup::{deduplicate, parse_dataset, write_dataset_csv};
use crate::core::{Pipeline, Storage};
use crate::domain::model::{
    sorted_by_total, Dataset, PopularTable, RunManifest, Thresholds, TransformResult,
};
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::Duration;

pub const UNIQUE_CSV: &str = "nycdogs_unique.csv";
pub const POPULAR_BREEDS: &str = "popular_breeds.json";
pub const POPULAR_NAMES: &str = "popular_names.json";
pub const ZIPCODE_STATS: &str = "zipcode_stats.json";
pub const VALID_BREEDS: &str = "valid_breeds.json";
pub const VALID_NAMES: &str = "valid_names.json";
pub const MANIFEST: &str = "manifest.json";

/// Whether the aggregated files the viewer needs are on disk.
pub async fn data_ready<S: Storage>(storage: &S, config: &TomlConfig) -> bool {
    for file in [POPULAR_BREEDS, POPULAR_NAMES, ZIPCODE_STATS] {
        if !storage.exists(&config.output.data_file(file)).await {
            return false;
        }
    }
    true
}

/// Extract → dedupe/aggregate → write the flat JSON files.
pub struct DogPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: TomlConfig,
    pub(crate) client: Client,
}

impl<S: Storage> DogPipeline<S> {
    pub fn new(storage: S, config: TomlConfig) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
        }
    }

    async fn download_dataset(&self, url: &str) -> Result<()> {
        tracing::info!("⬇️  Downloading dataset from: {}", url);
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(self.config.source.timeout_seconds))
            .send()
            .await?;

        tracing::debug!("Download response status: {}", response.status());
        if !response.status().is_success() {
            return Err(EtlError::DownloadStatusError {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        self.storage
            .write_file(&self.config.source.dataset_path, &body)
            .await?;
        tracing::info!(
            "Saved {} bytes to {}",
            body.len(),
            self.config.source.dataset_path
        );
        Ok(())
    }

    async fn write_json<T: serde::Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.config.output.data_file(file);
        let bytes = serde_json::to_vec(value)?;
        tracing::debug!("Writing {} ({} bytes)", path, bytes.len());
        self.storage.write_file(&path, &bytes).await
    }
}

fn keys_by_total(table: &PopularTable) -> Vec<&String> {
    sorted_by_total(table).into_iter().map(|(key, _)| key).collect()
}

/// Dedupe, then build the popularity tables and per-zip statistics.
pub fn aggregate_dataset(data: Dataset, thresholds: &Thresholds) -> Result<TransformResult> {
    let rows_before_dedup = data.len();

    let unique = deduplicate(data);
    tracing::info!(
        "Rows before deduplication: {}, after: {}",
        rows_before_dedup,
        unique.len()
    );
    if unique.is_empty() {
        return Err(EtlError::processing("dataset has no rows"));
    }

    let popular_breeds = popular_table(&unique, Dataset::breed, thresholds.min_population);
    let popular_names = popular_table(&unique, Dataset::name, thresholds.min_population);
    tracing::info!(
        "Found {} breeds and {} names with at least {} dogs",
        popular_breeds.len(),
        popular_names.len(),
        thresholds.min_population
    );

    let stats = zipcode_stats(&unique, &popular_breeds, &popular_names, thresholds);

    Ok(TransformResult {
        unique,
        rows_before_dedup,
        popular_breeds,
        popular_names,
        zipcode_stats: stats,
    })
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for DogPipeline<S> {
    async fn extract(&self) -> Result<Dataset> {
        let path = &self.config.source.dataset_path;

        if !self.storage.exists(path).await {
            match &self.config.source.dataset_url {
                Some(url) => self.download_dataset(url).await?,
                None => return Err(EtlError::DatasetNotFound { path: path.clone() }),
            }
        }

        tracing::info!("Loading dataset from: {}", path);
        let bytes = self.storage.read_file(path).await?;
        let columns = self.config.source.columns.clone();
        let dataset =
            tokio::task::spawn_blocking(move || parse_dataset(&bytes, &columns)).await??;
        tracing::debug!("Dataset columns: {:?}", dataset.headers);
        Ok(dataset)
    }

    async fn transform(&self, data: Dataset) -> Result<TransformResult> {
        let thresholds = self.config.aggregate.thresholds();
        tokio::task::spawn_blocking(move || aggregate_dataset(data, &thresholds)).await?
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let output = &self.config.output;

        let csv = write_dataset_csv(&result.unique)?;
        self.storage
            .write_file(&output.data_file(UNIQUE_CSV), &csv)
            .await?;

        self.write_json(POPULAR_BREEDS, &result.popular_breeds).await?;
        self.write_json(POPULAR_NAMES, &result.popular_names).await?;
        self.write_json(ZIPCODE_STATS, &result.zipcode_stats).await?;
        self.write_json(VALID_BREEDS, &keys_by_total(&result.popular_breeds))
            .await?;
        self.write_json(VALID_NAMES, &keys_by_total(&result.popular_names))
            .await?;

        let manifest = RunManifest {
            rows_before_dedup: result.rows_before_dedup,
            rows_after_dedup: result.unique.len(),
            duplicates_removed: result.rows_before_dedup - result.unique.len(),
            popular_breeds: result.popular_breeds.len(),
            popular_names: result.popular_names.len(),
            zipcodes: result.zipcode_stats.len(),
            thresholds: self.config.aggregate.thresholds(),
            generated_at: chrono::Utc::now(),
        };
        self.write_json(MANIFEST, &manifest).await?;

        Ok(output.data_dir.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::model::{PopularEntry, ZipcodeTable};
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    pub(crate) struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        pub(crate) async fn get_json(&self, path: &str) -> Option<serde_json::Value> {
            let bytes = self.get_file(path).await?;
            serde_json::from_slice(&bytes).ok()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.lock().await.contains_key(path)
        }

        async fn remove_file(&self, path: &str) -> Result<()> {
            self.files.lock().await.remove(path);
            Ok(())
        }

        async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
            let prefix = format!("{}/", dir.trim_end_matches('/'));
            let files = self.files.lock().await;
            let mut found: Vec<String> = files
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            found.sort();
            Ok(found)
        }
    }

    /// 40 Beagles split over two zips, 25 Poodles mostly in 10002, plus two exact duplicates.
    pub(crate) fn sample_csv() -> String {
        let mut csv = String::from("AnimalName,AnimalGender,BreedName,ZipCode,LicenseIssuedDate\n");
        for i in 0..30 {
            csv.push_str(&format!("Bella,F,Beagle,10001,2020-{:02}-{:02}\n", i / 28 + 1, i % 28 + 1));
        }
        for i in 0..10 {
            csv.push_str(&format!("Max,M,Beagle,10002,2021-02-{:02}\n", i + 1));
        }
        for i in 0..20 {
            csv.push_str(&format!("Max,M,Poodle,10002,2021-03-{:02}\n", i + 1));
        }
        for i in 0..5 {
            csv.push_str(&format!("Luna,F,Poodle,10001,2021-04-{:02}\n", i + 1));
        }
        csv.push_str("Rex,M,Pug,10003,2022-01-01\n");
        csv.push_str("Max,M,Poodle,10002,2021-03-01\n");
        csv.push_str("Max,M,Poodle,10002,2021-03-02\n");
        csv
    }

    pub(crate) fn small_config() -> TomlConfig {
        let mut config = TomlConfig::default();
        config.aggregate.min_population = 5;
        config.aggregate.min_zip_dogs = 5;
        config.maps.min_count = 5;
        config
    }

    #[tokio::test]
    async fn test_extract_reads_local_dataset() {
        let storage = MockStorage::new();
        storage.write_file("nycdogs.csv", sample_csv().as_bytes()).await.unwrap();
        let pipeline = DogPipeline::new(storage, small_config());

        let dataset = pipeline.extract().await.unwrap();
        assert_eq!(dataset.len(), 68);
        assert_eq!(dataset.headers[4], "LicenseIssuedDate");
    }

    #[tokio::test]
    async fn test_extract_missing_dataset_without_url_fails() {
        let pipeline = DogPipeline::new(MockStorage::new(), small_config());
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::DatasetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_extract_downloads_missing_dataset() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/dogs.csv");
            then.status(200)
                .header("Content-Type", "text/csv")
                .body(sample_csv());
        });

        let storage = MockStorage::new();
        let mut config = small_config();
        config.source.dataset_url = Some(server.url("/dogs.csv"));
        let pipeline = DogPipeline::new(storage.clone(), config);

        let dataset = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(dataset.len(), 68);
        assert!(storage.get_file("nycdogs.csv").await.is_some());
    }

    #[tokio::test]
    async fn test_extract_download_failure_reports_status() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/dogs.csv");
            then.status(404);
        });

        let mut config = small_config();
        config.source.dataset_url = Some(server.url("/dogs.csv"));
        let pipeline = DogPipeline::new(MockStorage::new(), config);

        let err = pipeline.extract().await.unwrap_err();
        api_mock.assert();
        assert!(matches!(err, EtlError::DownloadStatusError { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_transform_dedupes_and_aggregates() {
        let storage = MockStorage::new();
        storage.write_file("nycdogs.csv", sample_csv().as_bytes()).await.unwrap();
        let pipeline = DogPipeline::new(storage, small_config());

        let dataset = pipeline.extract().await.unwrap();
        let result = pipeline.transform(dataset).await.unwrap();

        assert_eq!(result.rows_before_dedup, 68);
        assert_eq!(result.unique.len(), 66);
        assert!(!result.popular_breeds.contains_key("Pug"));
        assert_eq!(result.popular_breeds["Poodle"].total_count, 25);
        assert_eq!(result.popular_names["Max"].total_count, 30);

        let stats: &ZipcodeTable = &result.zipcode_stats;
        assert!(!stats.contains_key("10003"));
        let zip = &stats["10002"];
        assert_eq!(zip.total_dogs, 30);
        assert_eq!(zip.top_breeds[0].breed, "Poodle");
        assert!(zip.top_breeds.iter().all(|b| b.representation > 1.0));
    }

    #[tokio::test]
    async fn test_transform_rejects_empty_dataset() {
        let pipeline = DogPipeline::new(MockStorage::new(), small_config());
        let dataset = parse_dataset(
            b"AnimalName,BreedName,ZipCode\n",
            &pipeline.config.source.columns,
        )
        .unwrap();
        assert!(pipeline.transform(dataset).await.is_err());
    }

    #[test]
    fn test_aggregate_dataset_needs_no_runtime() {
        let config = small_config();
        let dataset = parse_dataset(sample_csv().as_bytes(), &config.source.columns).unwrap();

        let result = aggregate_dataset(dataset, &config.aggregate.thresholds()).unwrap();
        assert_eq!(result.unique.len(), 66);
        assert_eq!(result.popular_breeds["Beagle"].total_count, 40);
    }

    #[tokio::test]
    async fn test_load_writes_every_artifact() {
        let storage = MockStorage::new();
        storage.write_file("nycdogs.csv", sample_csv().as_bytes()).await.unwrap();
        let config = small_config();
        let pipeline = DogPipeline::new(storage.clone(), config.clone());

        let dataset = pipeline.extract().await.unwrap();
        let result = pipeline.transform(dataset).await.unwrap();
        let output = pipeline.load(result).await.unwrap();
        assert_eq!(output, "data");
        assert!(data_ready(&storage, &config).await);

        let breeds = storage.get_json("data/popular_breeds.json").await.unwrap();
        let beagle: PopularEntry = serde_json::from_value(breeds["Beagle"].clone()).unwrap();
        assert_eq!(beagle.total_count, 40);
        assert_eq!(beagle.zipcode_counts["10001"], 30);
        assert_eq!(beagle.zipcode_counts["10002"], 10);

        let valid = storage.get_json("data/valid_names.json").await.unwrap();
        assert_eq!(valid, serde_json::json!(["Bella", "Max", "Luna"]));

        let manifest = storage.get_json("data/manifest.json").await.unwrap();
        assert_eq!(manifest["duplicates_removed"], 2);
        assert_eq!(manifest["rows_after_dedup"], 66);

        let csv = storage.get_file("data/nycdogs_unique.csv").await.unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert!(csv.starts_with("AnimalName,AnimalGender,BreedName,ZipCode,LicenseIssuedDate"));
        assert_eq!(csv.lines().count(), 67);
    }
}
