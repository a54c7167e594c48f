//! Per-zip counts and representation ratios for the popular breeds and names.
//!
//! A representation ratio compares a value's share of the dogs in one zip code
//! with its share of the whole city:
//!
//! ```text
//! ratio = (count_in_zip / dogs_in_zip) / (count_in_city / dogs_in_city)
//! ```
//!
//! Anything above `1.0` is overrepresented locally.

use crate::domain::model::{
    Dataset, DogRecord, PopularEntry, PopularTable, Representation, Thresholds, ZipcodeStats,
    ZipcodeTable,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::dedup::{filter_popular, value_counts};

type KeyFn = fn(&Dataset, &DogRecord) -> Option<String>;

/// Popular values of one column with their per-zip counts.
pub fn popular_table(dataset: &Dataset, key: KeyFn, min_population: u64) -> PopularTable {
    let popular = filter_popular(value_counts(dataset, key), min_population);

    let mut table: PopularTable = popular
        .into_iter()
        .map(|(value, total_count)| {
            (
                value,
                PopularEntry {
                    total_count,
                    zipcode_counts: BTreeMap::new(),
                },
            )
        })
        .collect();

    for row in &dataset.rows {
        let (Some(value), Some(zip)) = (key(dataset, row), dataset.zip(row)) else {
            continue;
        };
        if let Some(entry) = table.get_mut(&value) {
            *entry.zipcode_counts.entry(zip).or_insert(0) += 1;
        }
    }

    table
}

pub fn representation_ratio(local_count: u64, zip_total: u64, city_count: u64, city_total: u64) -> f64 {
    if zip_total == 0 || city_count == 0 || city_total == 0 {
        return 0.0;
    }
    let local_share = local_count as f64 / zip_total as f64;
    let city_share = city_count as f64 / city_total as f64;
    local_share / city_share
}

/// Ranks the values of one zip code against their city-wide share.
///
/// Keeps only popular values, sorts by ratio (then local count, then key),
/// truncates to `top_n` and finally drops ratios at or below the floor.
pub fn rank_overrepresented(
    local_counts: &HashMap<String, u64>,
    zip_total: u64,
    popular: &PopularTable,
    city_total: u64,
    thresholds: &Thresholds,
) -> Vec<Representation> {
    let mut ranked: Vec<Representation> = local_counts
        .iter()
        .filter_map(|(key, &count)| {
            let entry = popular.get(key)?;
            Some(Representation {
                key: key.clone(),
                count,
                percentage: count as f64 / zip_total as f64,
                ratio: representation_ratio(count, zip_total, entry.total_count, city_total),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.key.cmp(&b.key))
    });
    ranked.truncate(thresholds.top_n);
    ranked.retain(|r| r.ratio > thresholds.min_representation);
    ranked
}

#[derive(Default)]
struct ZipAccumulator {
    total: u64,
    breeds: HashMap<String, u64>,
    names: HashMap<String, u64>,
}

pub fn zipcode_stats(
    dataset: &Dataset,
    popular_breeds: &PopularTable,
    popular_names: &PopularTable,
    thresholds: &Thresholds,
) -> ZipcodeTable {
    let city_total = dataset.len() as u64;

    let mut zips: HashMap<String, ZipAccumulator> = HashMap::new();
    for row in &dataset.rows {
        let Some(zip) = dataset.zip(row) else {
            continue;
        };
        let acc = zips.entry(zip).or_default();
        acc.total += 1;
        if let Some(breed) = dataset.breed(row) {
            *acc.breeds.entry(breed).or_insert(0) += 1;
        }
        if let Some(name) = dataset.name(row) {
            *acc.names.entry(name).or_insert(0) += 1;
        }
    }

    let total_zips = zips.len();
    let stats: ZipcodeTable = zips
        .into_iter()
        .filter(|(_, acc)| acc.total >= thresholds.min_zip_dogs)
        .map(|(zip, acc)| {
            let top_breeds =
                rank_overrepresented(&acc.breeds, acc.total, popular_breeds, city_total, thresholds);
            let top_names =
                rank_overrepresented(&acc.names, acc.total, popular_names, city_total, thresholds);
            (
                zip,
                ZipcodeStats {
                    total_dogs: acc.total,
                    top_breeds: top_breeds.into_iter().map(Into::into).collect(),
                    top_names: top_names.into_iter().map(Into::into).collect(),
                },
            )
        })
        .collect();

    tracing::debug!(
        "Kept {} of {} zip codes with at least {} dogs",
        stats.len(),
        total_zips,
        thresholds.min_zip_dogs
    );
    stats
}
