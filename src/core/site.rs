//! Static export: index page, data and maps bundled into one deployable directory.

use crate::config::toml_config::TomlConfig;
use crate::core::pipeline::data_ready;
use crate::core::viewer::{map_options, render_index, PlaceholderPage};
use crate::core::Storage;
use crate::utils::error::Result;
use askama::Template;
use std::io::Write;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const NETLIFY_TOML: &str = "[build]
  publish = \".\"

[[redirects]]
  from = \"/*\"
  to = \"/index.html\"
  status = 200
";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub site_dir: String,
    pub files: usize,
    pub placeholder: bool,
    pub archive: Option<String>,
}

pub struct SiteExporter<S: Storage> {
    storage: S,
    config: TomlConfig,
}

impl<S: Storage> SiteExporter<S> {
    pub fn new(storage: S, config: TomlConfig) -> Self {
        Self { storage, config }
    }

    fn site_file(&self, file: &str) -> String {
        format!("{}/{}", self.config.output.site_dir, file)
    }

    /// Copies every file below `source` into `<site_dir>/<target>`.
    async fn copy_tree(&self, source: &str, target: &str) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for path in self.storage.list_files(source).await? {
            let relative = path
                .strip_prefix(source)
                .unwrap_or(&path)
                .trim_start_matches('/');
            let destination = self.site_file(&format!("{}/{}", target, relative));
            let bytes = self.storage.read_file(&path).await?;
            self.storage.write_file(&destination, &bytes).await?;
            written.push(destination);
        }
        tracing::debug!("Copied {} files from {} to {}", written.len(), source, target);
        Ok(written)
    }

    fn placeholder_html(&self) -> Result<String> {
        let page = PlaceholderPage {
            title: &self.config.project.title,
            heading: "Dog map data is not available",
            message: "This deployment was built without the licensing dataset. \
                      Run `dogmap run` locally with the dataset present, then \
                      `dogmap export` and deploy the generated site directory.",
            action_href: "",
            action_label: "",
        };
        Ok(page.render()?)
    }

    /// Packs the listed site files into `<site_dir>.zip`, with paths relative to the site dir.
    async fn write_archive(&self, files: &[String]) -> Result<String> {
        let prefix = format!("{}/", self.config.output.site_dir);
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            entries.push((file.clone(), self.storage.read_file(file).await?));
        }

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (file, bytes) in &entries {
                let name = file.strip_prefix(&prefix).unwrap_or(file);
                zip.start_file::<_, ()>(name, FileOptions::default())?;
                zip.write_all(bytes)?;
            }
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        let archive_path = format!("{}.zip", self.config.output.site_dir);
        tracing::debug!("Writing site archive ({} bytes)", zip_data.len());
        self.storage.write_file(&archive_path, &zip_data).await?;
        Ok(archive_path)
    }

    pub async fn export(&self) -> Result<ExportSummary> {
        let output = &self.config.output;
        let mut files = Vec::new();
        let placeholder = !data_ready(&self.storage, &self.config).await;

        let index = if placeholder {
            tracing::warn!("No aggregated data found, exporting a placeholder site");
            self.placeholder_html()?
        } else {
            let options = map_options(&self.storage, &self.config).await?;
            files.extend(self.copy_tree(&output.data_dir, "data").await?);
            files.extend(self.copy_tree(&output.maps_dir, "maps").await?);
            render_index(&self.config, &options, "maps")?
        };

        let index_path = self.site_file("index.html");
        self.storage.write_file(&index_path, index.as_bytes()).await?;
        files.push(index_path);

        let netlify_path = self.site_file("netlify.toml");
        self.storage
            .write_file(&netlify_path, NETLIFY_TOML.as_bytes())
            .await?;
        files.push(netlify_path);

        let archive = if output.archive {
            Some(self.write_archive(&files).await?)
        } else {
            None
        };

        tracing::info!("Static site written to {} ({} files)", output.site_dir, files.len());
        Ok(ExportSummary {
            site_dir: output.site_dir.clone(),
            files: files.len(),
            placeholder,
            archive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::etl::EtlEngine;
    use crate::core::maps::MapRenderer;
    use crate::core::pipeline::tests::{sample_csv, small_config, MockStorage};
    use crate::core::pipeline::DogPipeline;
    use std::io::Read;

    async fn prepared_storage(config: &TomlConfig) -> MockStorage {
        let storage = MockStorage::new();
        storage.write_file("nycdogs.csv", sample_csv().as_bytes()).await.unwrap();
        EtlEngine::new(DogPipeline::new(storage.clone(), config.clone()))
            .run()
            .await
            .unwrap();
        MapRenderer::new(storage.clone(), config.clone())
            .render_all()
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn test_export_copies_data_and_maps() {
        let config = small_config();
        let storage = prepared_storage(&config).await;

        let summary = SiteExporter::new(storage.clone(), config).export().await.unwrap();
        assert!(!summary.placeholder);
        assert_eq!(summary.archive, None);

        let index = storage.get_file("site_build/index.html").await.unwrap();
        let index = String::from_utf8(index).unwrap();
        assert!(index.contains("value=\"maps/breeds/Beagle_map.html\""));

        assert!(storage.get_file("site_build/data/zipcode_stats.json").await.is_some());
        assert!(storage.get_file("site_build/maps/names/Max_map.html").await.is_some());
        let netlify = storage.get_file("site_build/netlify.toml").await.unwrap();
        assert_eq!(netlify, NETLIFY_TOML.as_bytes());
    }

    #[tokio::test]
    async fn test_export_without_data_writes_placeholder() {
        let storage = MockStorage::new();
        let summary = SiteExporter::new(storage.clone(), small_config())
            .export()
            .await
            .unwrap();

        assert!(summary.placeholder);
        assert_eq!(summary.files, 2);
        let index = String::from_utf8(storage.get_file("site_build/index.html").await.unwrap()).unwrap();
        assert!(index.contains("Dog map data is not available"));
        assert!(!index.contains("href=\"/process\""));
    }

    #[tokio::test]
    async fn test_export_archive_contains_every_site_file() {
        let mut config = small_config();
        config.output.archive = true;
        let storage = prepared_storage(&config).await;

        let summary = SiteExporter::new(storage.clone(), config).export().await.unwrap();
        assert_eq!(summary.archive.as_deref(), Some("site_build.zip"));

        let bytes = storage.get_file("site_build.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), summary.files);

        let mut netlify = String::new();
        archive
            .by_name("netlify.toml")
            .unwrap()
            .read_to_string(&mut netlify)
            .unwrap();
        assert!(netlify.contains("to = \"/index.html\""));
        assert!(archive.by_name("data/popular_breeds.json").is_ok());
    }
}
