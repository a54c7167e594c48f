use crate::domain::model::Thresholds;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Project configuration; every section and field has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub project: ProjectConfig,
    pub source: SourceConfig,
    pub aggregate: AggregateConfig,
    pub maps: MapsConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub city: String,
    pub title: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            city: "NYC".to_string(),
            title: "NYC Dogs - Geographic Distribution".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dataset_path: String,
    /// Downloaded once into `dataset_path` when the file is missing.
    pub dataset_url: Option<String>,
    pub timeout_seconds: u64,
    pub columns: ColumnConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dataset_path: "nycdogs.csv".to_string(),
            dataset_url: None,
            timeout_seconds: 120,
            columns: ColumnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub animal_name: String,
    pub breed_name: String,
    pub zip_code: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            animal_name: "AnimalName".to_string(),
            breed_name: "BreedName".to_string(),
            zip_code: "ZipCode".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub min_population: u64,
    pub min_zip_dogs: u64,
    pub top_n: usize,
    pub min_representation: f64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            min_population: 100,
            min_zip_dogs: 20,
            top_n: 10,
            min_representation: 1.0,
        }
    }
}

impl AggregateConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_population: self.min_population,
            min_zip_dogs: self.min_zip_dogs,
            top_n: self.top_n,
            min_representation: self.min_representation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsConfig {
    pub boundaries_path: String,
    /// Only entries with at least this many dogs get a map page.
    pub min_count: u64,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
    pub tiles_url: String,
    pub tiles_attribution: String,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            boundaries_path: "zcta.geojson".to_string(),
            min_count: 500,
            center_lat: 40.7128,
            center_lng: -74.0060,
            zoom: 10,
            tiles_url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png".to_string(),
            tiles_attribution: "&copy; OpenStreetMap contributors &copy; CARTO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: String,
    pub data_dir: String,
    pub maps_dir: String,
    pub site_dir: String,
    pub archive: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            data_dir: "data".to_string(),
            maps_dir: "maps".to_string(),
            site_dir: "site_build".to_string(),
            archive: false,
        }
    }
}

impl OutputConfig {
    pub fn data_file(&self, file: &str) -> String {
        format!("{}/{}", self.data_dir, file)
    }

    pub fn maps_file(&self, file: &str) -> String {
        format!("{}/{}", self.maps_dir, file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:5000".to_string(),
            static_dir: "static".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATASET_URL})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("source.dataset_path", &self.source.dataset_path)?;
        validation::validate_file_extension("source.dataset_path", &self.source.dataset_path, &["csv"])?;
        if let Some(url) = &self.source.dataset_url {
            validation::validate_url("source.dataset_url", url)?;
        }
        validation::validate_non_empty_string("source.columns.animal_name", &self.source.columns.animal_name)?;
        validation::validate_non_empty_string("source.columns.breed_name", &self.source.columns.breed_name)?;
        validation::validate_non_empty_string("source.columns.zip_code", &self.source.columns.zip_code)?;

        validation::validate_positive_number("aggregate.top_n", self.aggregate.top_n, 1)?;
        validation::validate_positive_number(
            "aggregate.min_population",
            self.aggregate.min_population as usize,
            1,
        )?;
        validation::validate_range(
            "aggregate.min_representation",
            self.aggregate.min_representation,
            0.0,
            f64::MAX,
        )?;

        validation::validate_path("maps.boundaries_path", &self.maps.boundaries_path)?;
        validation::validate_file_extension(
            "maps.boundaries_path",
            &self.maps.boundaries_path,
            &["geojson", "json"],
        )?;
        validation::validate_range("maps.center_lat", self.maps.center_lat, -90.0, 90.0)?;
        validation::validate_range("maps.center_lng", self.maps.center_lng, -180.0, 180.0)?;
        validation::validate_range("maps.zoom", self.maps.zoom, 1, 18)?;

        validation::validate_path("output.root", &self.output.root)?;
        validation::validate_path("output.data_dir", &self.output.data_dir)?;
        validation::validate_path("output.maps_dir", &self.output.maps_dir)?;
        validation::validate_path("output.site_dir", &self.output.site_dir)?;
        for (field, dir) in [
            ("output.data_dir", &self.output.data_dir),
            ("output.maps_dir", &self.output.maps_dir),
        ] {
            if dir == &self.output.site_dir {
                return Err(EtlError::ConfigValidationError {
                    field: field.to_string(),
                    message: "must differ from output.site_dir".to_string(),
                });
            }
        }

        validation::validate_socket_addr("server.listen", &self.server.listen)?;

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.source.dataset_path, "nycdogs.csv");
        assert_eq!(config.aggregate.min_population, 100);
        assert_eq!(config.aggregate.min_zip_dogs, 20);
        assert_eq!(config.aggregate.top_n, 10);
        assert_eq!(config.maps.min_count, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
[source]
dataset_path = "data/raw/dogs.csv"

[source.columns]
zip_code = "Zip"

[aggregate]
min_population = 50

[output]
archive = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.source.dataset_path, "data/raw/dogs.csv");
        assert_eq!(config.source.columns.zip_code, "Zip");
        assert_eq!(config.source.columns.breed_name, "BreedName");
        assert_eq!(config.aggregate.min_population, 50);
        assert_eq!(config.aggregate.top_n, 10);
        assert!(config.output.archive);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DOGMAP_TEST_DATASET_URL", "https://data.example.com/dogs.csv");

        let toml_content = r#"
[source]
dataset_url = "${DOGMAP_TEST_DATASET_URL}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.source.dataset_url.as_deref(),
            Some("https://data.example.com/dogs.csv")
        );

        std::env::remove_var("DOGMAP_TEST_DATASET_URL");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str(
            r#"
[source]
dataset_url = "not-a-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str("[aggregate]\ntop_n = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str("[output]\nsite_dir = \"data\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("[aggregate\n").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[project]\ncity = \"Chicago\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.project.city, "Chicago");
    }
}
