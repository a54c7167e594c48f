//! Zip-code boundary polygons (GeoJSON) and matching them against dataset zip codes.

use crate::core::Storage;
use crate::domain::model::normalize_zip;
use crate::utils::error::{EtlError, Result};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Below this many matching zips the renderer tries to repair the zip format.
pub const MIN_MATCHING_ZIPS: usize = 5;

#[derive(Debug, Clone)]
pub struct Boundaries {
    collection: Value,
    zip_field: String,
}

impl Boundaries {
    pub fn from_geojson(bytes: &[u8]) -> Result<Self> {
        let mut collection: Value = serde_json::from_slice(bytes)?;

        if collection.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(EtlError::processing("boundaries file is not a GeoJSON FeatureCollection"));
        }
        let features = collection
            .get_mut("features")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| EtlError::processing("boundaries file has no features array"))?;

        let zip_field = detect_zip_field(features);
        for feature in features.iter_mut() {
            if let Some(Value::Object(props)) = feature.get_mut("properties") {
                let zip = props.get(&zip_field).and_then(property_zip);
                if let Some(zip) = zip {
                    props.insert(zip_field.clone(), Value::String(zip));
                }
            }
        }

        Ok(Self {
            collection,
            zip_field,
        })
    }

    /// Two simplified Manhattan polygons, used when no boundary file is available.
    pub fn fallback() -> Self {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"postalCode": "10001", "borough": "Manhattan", "neighborhood": "Chelsea"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [-73.9972, 40.7503], [-73.9872, 40.7503],
                            [-73.9872, 40.7603], [-73.9972, 40.7603],
                            [-73.9972, 40.7503]
                        ]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"postalCode": "10002", "borough": "Manhattan", "neighborhood": "Lower East Side"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [-73.9862, 40.7159], [-73.9762, 40.7159],
                            [-73.9762, 40.7259], [-73.9862, 40.7259],
                            [-73.9862, 40.7159]
                        ]]
                    }
                }
            ]
        });
        Self {
            collection,
            zip_field: "postalCode".to_string(),
        }
    }

    pub fn zip_field(&self) -> &str {
        &self.zip_field
    }

    fn features(&self) -> impl Iterator<Item = &Value> {
        self.collection
            .get("features")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.features().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zip_codes(&self) -> BTreeSet<String> {
        self.features()
            .filter_map(|f| f.get("properties")?.get(&self.zip_field)?.as_str())
            .map(str::to_string)
            .collect()
    }

    /// True when at least one feature carries the property.
    pub fn has_property(&self, name: &str) -> bool {
        self.features()
            .any(|f| f.get("properties").and_then(|p| p.get(name)).is_some())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.collection)?)
    }
}

fn property_zip(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_zip(s),
        Value::Number(n) => normalize_zip(&n.to_string()),
        _ => None,
    }
}

/// `postalCode`, then `ZCTA`, then the first key that looks like a zip field.
pub fn detect_zip_field(features: &[Value]) -> String {
    let keys: BTreeSet<&str> = features
        .iter()
        .filter_map(|f| f.get("properties")?.as_object())
        .flat_map(|props| props.keys().map(String::as_str))
        .collect();

    for preferred in ["postalCode", "ZCTA"] {
        if keys.contains(preferred) {
            return preferred.to_string();
        }
    }

    // Feature order, not alphabetical, decides among candidates
    features
        .iter()
        .filter_map(|f| f.get("properties")?.as_object())
        .flat_map(|props| props.keys())
        .find(|key| {
            let lower = key.to_lowercase();
            ["zip", "postal", "zcta"].iter().any(|needle| lower.contains(needle))
        })
        .cloned()
        .unwrap_or_else(|| "ZCTA".to_string())
}

/// Reads the boundary file, falling back to the built-in polygons on any failure.
pub async fn load_boundaries<S: Storage>(storage: &S, path: &str) -> Boundaries {
    let loaded = match storage.read_file(path).await {
        Ok(bytes) => Boundaries::from_geojson(&bytes),
        Err(e) => Err(e),
    };

    match loaded {
        Ok(boundaries) => {
            tracing::info!(
                "Loaded {} zip code boundaries from {} (zip field: {})",
                boundaries.len(),
                path,
                boundaries.zip_field()
            );
            boundaries
        }
        Err(e) => {
            tracing::warn!("Could not load boundaries from {}: {}", path, e);
            tracing::warn!("Using simplified zip code boundaries as fallback");
            Boundaries::fallback()
        }
    }
}

fn matching(counts: &BTreeMap<String, u64>, geo_zips: &BTreeSet<String>) -> usize {
    counts.keys().filter(|zip| geo_zips.contains(*zip)).count()
}

/// Re-keys zip counts by padding to five digits or stripping leading zeros when that
/// makes them line up with the boundaries. Returns the input unchanged unless enough
/// zips were unmatched and the repair matches strictly more of them.
pub fn repair_zip_counts(
    counts: &BTreeMap<String, u64>,
    geo_zips: &BTreeSet<String>,
) -> BTreeMap<String, u64> {
    let matched = matching(counts, geo_zips);
    if matched >= MIN_MATCHING_ZIPS {
        return counts.clone();
    }

    let mut fixed: BTreeMap<String, u64> = BTreeMap::new();
    for (zip, &count) in counts {
        let mut key = zip.clone();
        if !geo_zips.contains(zip) {
            let padded = format!("{:0>5}", zip);
            let stripped = zip.trim_start_matches('0').to_string();
            if zip.chars().all(|c| c.is_ascii_digit()) && geo_zips.contains(&padded) {
                key = padded;
            } else if zip.starts_with('0') && geo_zips.contains(&stripped) {
                key = stripped;
            }
        }
        *fixed.entry(key).or_insert(0) += count;
    }

    if matching(&fixed, geo_zips) > matched {
        tracing::debug!("Using repaired zip code format for better map matching");
        fixed
    } else {
        counts.clone()
    }
}
