//! Choropleth map pages, one per popular breed or name.

use crate::config::toml_config::TomlConfig;
use crate::core::boundaries::{load_boundaries, repair_zip_counts, Boundaries};
use crate::core::pipeline::{MANIFEST, POPULAR_BREEDS, POPULAR_NAMES};
use crate::core::Storage;
use crate::domain::model::{sorted_by_total, unique_slugs, Category, PopularEntry, PopularTable};
use crate::utils::error::Result;
use askama::Template;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Written next to the pages; ties them to the data run they were rendered from.
pub const MAPS_MANIFEST: &str = "manifest.json";

/// ColorBrewer YlOrRd, six classes.
pub const YL_OR_RD: [&str; 6] = ["#ffffb2", "#fed976", "#feb24c", "#fd8d3c", "#f03b20", "#bd0026"];

pub struct LegendItem {
    pub color: &'static str,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ZipShare {
    pub count: u64,
    pub percentage: f64,
    pub color: &'static str,
}

#[derive(Template)]
#[template(path = "map.html")]
struct MapPage<'a> {
    title: String,
    legend_name: String,
    total_count: u64,
    center_lat: f64,
    center_lng: f64,
    zoom: u8,
    tiles_url: &'a str,
    tiles_attribution: &'a str,
    geojson: String,
    shares: String,
    zip_field_json: String,
    tooltip_fields: String,
    legend: Vec<LegendItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSummary {
    pub breed_maps: usize,
    pub name_maps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapsManifest {
    /// `generated_at` of the data manifest the pages were rendered from.
    pub data_generated_at: Value,
    #[serde(flatten)]
    pub summary: MapSummary,
}

/// A table entry that gets its own map page.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedEntry {
    pub key: String,
    pub slug: String,
    pub entry: PopularEntry,
}

impl MappedEntry {
    /// Page location relative to the maps directory.
    pub fn file(&self, category: Category) -> String {
        format!("{}/{}_map.html", category.dir(), self.slug)
    }
}

/// Serialises for embedding inside a `<script>` block.
fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Linear class of `value` within `[min, max]`, mapped onto the palette.
pub fn color_for(value: f64, min: f64, max: f64) -> &'static str {
    let classes = YL_OR_RD.len();
    if max <= min {
        return YL_OR_RD[classes - 1];
    }
    let position = ((value - min) / (max - min) * classes as f64).floor() as usize;
    YL_OR_RD[position.min(classes - 1)]
}

/// Each zip's share of the entry's dogs, in percent, with its fill colour.
pub fn zip_shares(counts: &BTreeMap<String, u64>) -> BTreeMap<String, ZipShare> {
    let total: u64 = counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }

    let percentages: Vec<(&String, u64, f64)> = counts
        .iter()
        .map(|(zip, &count)| (zip, count, count as f64 / total as f64 * 100.0))
        .collect();
    let min = percentages.iter().map(|p| p.2).fold(f64::INFINITY, f64::min);
    let max = percentages.iter().map(|p| p.2).fold(f64::NEG_INFINITY, f64::max);

    percentages
        .into_iter()
        .map(|(zip, count, percentage)| {
            (
                zip.clone(),
                ZipShare {
                    count,
                    percentage,
                    color: color_for(percentage, min, max),
                },
            )
        })
        .collect()
}

fn legend(shares: &BTreeMap<String, ZipShare>) -> Vec<LegendItem> {
    let min = shares.values().map(|s| s.percentage).fold(f64::INFINITY, f64::min);
    let max = shares.values().map(|s| s.percentage).fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }

    let step = (max - min) / YL_OR_RD.len() as f64;
    YL_OR_RD
        .iter()
        .enumerate()
        .map(|(i, color)| LegendItem {
            color: *color,
            label: format!(
                "{:.2}% – {:.2}%",
                min + step * i as f64,
                min + step * (i + 1) as f64
            ),
        })
        .collect()
}

pub async fn read_popular<S: Storage>(
    storage: &S,
    config: &TomlConfig,
    file: &str,
) -> Result<PopularTable> {
    let bytes = storage.read_file(&config.output.data_file(file)).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Entries that get a map page, largest first, with collision-free slugs.
pub fn mapped_entries(table: &PopularTable, min_count: u64) -> Vec<MappedEntry> {
    let selected: Vec<(&String, &PopularEntry)> = sorted_by_total(table)
        .into_iter()
        .filter(|(_, entry)| entry.total_count >= min_count)
        .collect();
    let slugs = unique_slugs(selected.iter().map(|(key, _)| key.as_str()));

    selected
        .into_iter()
        .zip(slugs)
        .map(|((key, entry), slug)| MappedEntry {
            key: key.clone(),
            slug,
            entry: entry.clone(),
        })
        .collect()
}

/// `generated_at` of the current data manifest, `null` when there is none.
async fn data_generated_at<S: Storage>(storage: &S, config: &TomlConfig) -> Value {
    let Ok(bytes) = storage.read_file(&config.output.data_file(MANIFEST)).await else {
        return Value::Null;
    };
    serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|manifest| manifest.get("generated_at").cloned())
        .unwrap_or(Value::Null)
}

/// True when the pages were rendered from the data currently on disk.
pub async fn maps_current<S: Storage>(storage: &S, config: &TomlConfig) -> bool {
    let Ok(bytes) = storage.read_file(&config.output.maps_file(MAPS_MANIFEST)).await else {
        return false;
    };
    let Ok(manifest) = serde_json::from_slice::<MapsManifest>(&bytes) else {
        return false;
    };
    manifest.data_generated_at == data_generated_at(storage, config).await
}

pub fn render_page(
    config: &TomlConfig,
    category: Category,
    key: &str,
    entry: &PopularEntry,
    boundaries: &Boundaries,
) -> Result<String> {
    let counts = repair_zip_counts(&entry.zipcode_counts, &boundaries.zip_codes());
    let shares = zip_shares(&counts);

    let (title, legend_name) = match category {
        Category::Breed => (
            format!("{} Distribution in {}", key, config.project.city),
            format!("Percentage of {} Dogs (%)", key),
        ),
        Category::Name => (
            format!("Dogs Named {} in {}", key, config.project.city),
            format!("Percentage of Dogs Named {} (%)", key),
        ),
    };

    let mut tooltip_fields = vec![(boundaries.zip_field(), "Zip Code:")];
    for (field, alias) in [("borough", "Borough:"), ("neighborhood", "Neighborhood:")] {
        if boundaries.has_property(field) {
            tooltip_fields.push((field, alias));
        }
    }

    let page = MapPage {
        title,
        legend_name,
        total_count: entry.total_count,
        center_lat: config.maps.center_lat,
        center_lng: config.maps.center_lng,
        zoom: config.maps.zoom,
        tiles_url: &config.maps.tiles_url,
        tiles_attribution: &config.maps.tiles_attribution,
        geojson: boundaries.to_json()?.replace("</", "<\\/"),
        shares: script_json(&shares)?,
        zip_field_json: script_json(boundaries.zip_field())?,
        tooltip_fields: script_json(&tooltip_fields)?,
        legend: legend(&shares),
    };
    Ok(page.render()?)
}

pub struct MapRenderer<S: Storage> {
    storage: S,
    config: Arc<TomlConfig>,
}

impl<S: Storage> MapRenderer<S> {
    pub fn new(storage: S, config: TomlConfig) -> Self {
        Self {
            storage,
            config: Arc::new(config),
        }
    }

    /// Removes pages under `maps/<category>/` whose file name this run did not write.
    async fn remove_stale_pages(&self, category: Category, written: &HashSet<String>) -> Result<()> {
        let dir = self.config.output.maps_file(category.dir());
        for path in self.storage.list_files(&dir).await? {
            let file_name = path.rsplit('/').next().unwrap_or(&path);
            if !written.contains(file_name) {
                tracing::debug!("Removing stale map {}", path);
                self.storage.remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn render_category(
        &self,
        category: Category,
        table_file: &str,
        boundaries: &Arc<Boundaries>,
    ) -> Result<usize> {
        let table = read_popular(&self.storage, &self.config, table_file).await?;
        let entries = mapped_entries(&table, self.config.maps.min_count);
        tracing::info!(
            "Found {} {}s with at least {} dogs",
            entries.len(),
            category.label(),
            self.config.maps.min_count
        );

        let mut written = HashSet::with_capacity(entries.len());
        for (i, mapped) in entries.iter().enumerate() {
            tracing::debug!(
                "Rendering {} map {}/{}: {}",
                category.label(),
                i + 1,
                entries.len(),
                mapped.key
            );
            let config = Arc::clone(&self.config);
            let shapes = Arc::clone(boundaries);
            let (key, entry) = (mapped.key.clone(), mapped.entry.clone());
            let html = tokio::task::spawn_blocking(move || {
                render_page(&config, category, &key, &entry, &shapes)
            })
            .await??;

            let path = self.config.output.maps_file(&mapped.file(category));
            self.storage.write_file(&path, html.as_bytes()).await?;
            written.insert(format!("{}_map.html", mapped.slug));
        }
        self.remove_stale_pages(category, &written).await?;

        let filtered: BTreeMap<&String, &PopularEntry> =
            entries.iter().map(|m| (&m.key, &m.entry)).collect();
        let listing = self
            .config
            .output
            .maps_file(&format!("filtered_{}.json", category.dir()));
        self.storage
            .write_file(&listing, &serde_json::to_vec(&filtered)?)
            .await?;

        Ok(entries.len())
    }

    pub async fn render_all(&self) -> Result<MapSummary> {
        let boundaries = Arc::new(
            load_boundaries(&self.storage, &self.config.maps.boundaries_path).await,
        );

        let breed_maps = self
            .render_category(Category::Breed, POPULAR_BREEDS, &boundaries)
            .await?;
        let name_maps = self
            .render_category(Category::Name, POPULAR_NAMES, &boundaries)
            .await?;

        tracing::info!(
            "Generated {} breed maps and {} name maps in {}",
            breed_maps,
            name_maps,
            self.config.output.maps_dir
        );
        let summary = MapSummary {
            breed_maps,
            name_maps,
        };
        let manifest = MapsManifest {
            data_generated_at: data_generated_at(&self.storage, &self.config).await,
            summary: summary.clone(),
        };
        self.storage
            .write_file(
                &self.config.output.maps_file(MAPS_MANIFEST),
                &serde_json::to_vec(&manifest)?,
            )
            .await?;
        Ok(summary)
    }
}
