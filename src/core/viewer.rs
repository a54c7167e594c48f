//! HTML pages shared by the HTTP server and the static export.

use crate::config::toml_config::TomlConfig;
use crate::core::maps::{mapped_entries, read_popular};
use crate::core::pipeline::{POPULAR_BREEDS, POPULAR_NAMES};
use crate::core::Storage;
use crate::domain::model::{Category, PopularTable};
use crate::utils::error::{EtlError, Result};
use askama::Template;
use url::Url;

/// One dropdown entry pointing at a rendered map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapOption {
    pub key: String,
    pub label: String,
    /// Relative to the maps directory.
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    pub breeds: Vec<MapOption>,
    pub names: Vec<MapOption>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub title: &'a str,
    pub city: &'a str,
    pub map_base: &'a str,
    pub breeds: &'a [MapOption],
    pub names: &'a [MapOption],
}

#[derive(Template)]
#[template(path = "placeholder.html")]
pub struct PlaceholderPage<'a> {
    pub title: &'a str,
    pub heading: &'a str,
    pub message: &'a str,
    pub action_href: &'a str,
    pub action_label: &'a str,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    pub title: &'a str,
    pub message: &'a str,
}

/// Percent-encodes each segment of a relative path for use in a link.
pub fn encode_path(path: &str) -> Result<String> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| EtlError::processing(format!("invalid base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| EtlError::processing("base URL cannot hold a path"))?
        .pop_if_empty()
        .extend(path.split('/'));
    Ok(url.path().trim_start_matches('/').to_string())
}

fn options_for(category: Category, table: &PopularTable, min_count: u64) -> Result<Vec<MapOption>> {
    mapped_entries(table, min_count)
        .into_iter()
        .map(|mapped| {
            Ok(MapOption {
                label: format!("{} ({})", mapped.key, mapped.entry.total_count),
                path: encode_path(&mapped.file(category))?,
                key: mapped.key,
            })
        })
        .collect()
}

/// Dropdown options for every entry that has a map, largest first.
pub async fn map_options<S: Storage>(storage: &S, config: &TomlConfig) -> Result<MapOptions> {
    let breeds = read_popular(storage, config, POPULAR_BREEDS).await?;
    let names = read_popular(storage, config, POPULAR_NAMES).await?;
    let min_count = config.maps.min_count;

    Ok(MapOptions {
        breeds: options_for(Category::Breed, &breeds, min_count)?,
        names: options_for(Category::Name, &names, min_count)?,
    })
}

pub fn render_index(config: &TomlConfig, options: &MapOptions, map_base: &str) -> Result<String> {
    let page = IndexPage {
        title: &config.project.title,
        city: &config.project.city,
        map_base,
        breeds: &options.breeds,
        names: &options.names,
    };
    Ok(page.render()?)
}

pub fn render_processing(config: &TomlConfig) -> Result<String> {
    let page = PlaceholderPage {
        title: &config.project.title,
        heading: "Data Processing Required",
        message: "The aggregated data files have not been generated yet. \
                  Processing the dataset can take a few minutes.",
        action_href: "/process",
        action_label: "Process data now",
    };
    Ok(page.render()?)
}

pub fn render_error(config: &TomlConfig, message: &str) -> Result<String> {
    Ok(ErrorPage {
        title: &config.project.title,
        message,
    }
    .render()?)
}
