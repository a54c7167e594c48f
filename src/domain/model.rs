use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One licensing row, all columns kept so duplicates are detected on the full row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DogRecord {
    pub fields: Vec<String>,
}

impl DogRecord {
    pub fn new<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Trimmed value of a column; `None` when the cell is empty or absent.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.fields
            .get(index)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Positions of the columns the aggregation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub animal_name: usize,
    pub breed_name: usize,
    pub zip_code: usize,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub columns: ColumnIndex,
    pub rows: Vec<DogRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn breed(&self, row: &DogRecord) -> Option<String> {
        row.value(self.columns.breed_name).map(str::to_string)
    }

    pub fn name(&self, row: &DogRecord) -> Option<String> {
        row.value(self.columns.animal_name).map(str::to_string)
    }

    pub fn zip(&self, row: &DogRecord) -> Option<String> {
        row.value(self.columns.zip_code).and_then(normalize_zip)
    }
}

/// `"10001.0"` and `" 10001 "` both become `"10001"`.
pub fn normalize_zip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let zip = trimmed.split('.').next().unwrap_or(trimmed).trim();
    if zip.is_empty() {
        None
    } else {
        Some(zip.to_string())
    }
}

/// File-name safe form of a breed or name key.
pub fn slugify(key: &str) -> String {
    key.replace(['/', ' '], "_")
}

/// Slugs for keys in the given order; a key whose slug is already taken gets `_2`, `_3`, ...
pub fn unique_slugs<'a, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    keys.into_iter()
        .map(|key| {
            let base = slugify(key);
            let mut slug = base.clone();
            let mut n = 2;
            while !taken.insert(slug.clone()) {
                slug = format!("{}_{}", base, n);
                n += 1;
            }
            slug
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Breed,
    Name,
}

impl Category {
    /// Directory under `maps/` holding this category's pages.
    pub fn dir(self) -> &'static str {
        match self {
            Category::Breed => "breeds",
            Category::Name => "names",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Breed => "breed",
            Category::Name => "name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularEntry {
    pub total_count: u64,
    pub zipcode_counts: BTreeMap<String, u64>,
}

pub type PopularTable = BTreeMap<String, PopularEntry>;

/// Entries of a table ordered by total count, largest first; ties by key.
pub fn sorted_by_total(table: &PopularTable) -> Vec<(&String, &PopularEntry)> {
    let mut entries: Vec<_> = table.iter().collect();
    entries.sort_by(|a, b| b.1.total_count.cmp(&a.1.total_count).then_with(|| a.0.cmp(b.0)));
    entries
}

/// A breed or name that is more common in a zip code than city-wide.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    pub key: String,
    pub count: u64,
    pub percentage: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopBreed {
    pub breed: String,
    pub count: u64,
    pub percentage: f64,
    pub representation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopName {
    pub name: String,
    pub count: u64,
    pub percentage: f64,
    pub representation: f64,
}

impl From<Representation> for TopBreed {
    fn from(r: Representation) -> Self {
        Self {
            breed: r.key,
            count: r.count,
            percentage: r.percentage,
            representation: r.ratio,
        }
    }
}

impl From<Representation> for TopName {
    fn from(r: Representation) -> Self {
        Self {
            name: r.key,
            count: r.count,
            percentage: r.percentage,
            representation: r.ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipcodeStats {
    pub total_dogs: u64,
    pub top_breeds: Vec<TopBreed>,
    pub top_names: Vec<TopName>,
}

pub type ZipcodeTable = BTreeMap<String, ZipcodeStats>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_population: u64,
    pub min_zip_dogs: u64,
    pub top_n: usize,
    pub min_representation: f64,
}

/// Metadata written next to the aggregated files on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub rows_before_dedup: usize,
    pub rows_after_dedup: usize,
    pub duplicates_removed: usize,
    pub popular_breeds: usize,
    pub popular_names: usize,
    pub zipcodes: usize,
    pub thresholds: Thresholds,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub unique: Dataset,
    pub rows_before_dedup: usize,
    pub popular_breeds: PopularTable,
    pub popular_names: PopularTable,
    pub zipcode_stats: ZipcodeTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zip() {
        assert_eq!(normalize_zip("10001"), Some("10001".to_string()));
        assert_eq!(normalize_zip(" 10001.0 "), Some("10001".to_string()));
        assert_eq!(normalize_zip(""), None);
        assert_eq!(normalize_zip("  "), None);
    }

    #[test]
    fn test_slugify_replaces_every_slash_and_space() {
        assert_eq!(slugify("Pit Bull (or Mix)"), "Pit_Bull_(or_Mix)");
        assert_eq!(slugify("Shih Tzu/Poodle Mix"), "Shih_Tzu_Poodle_Mix");
        assert_eq!(slugify("Bella"), "Bella");
    }

    #[test]
    fn test_unique_slugs_disambiguate_collisions() {
        let slugs = unique_slugs(["Pit Bull", "Pit/Bull", "Pit_Bull", "Beagle"]);
        assert_eq!(slugs, vec!["Pit_Bull", "Pit_Bull_2", "Pit_Bull_3", "Beagle"]);
    }

    #[test]
    fn test_sorted_by_total_breaks_ties_by_key() {
        let mut table = PopularTable::new();
        for (key, total) in [("Max", 5), ("Bella", 9), ("Coco", 5)] {
            table.insert(
                key.to_string(),
                PopularEntry {
                    total_count: total,
                    zipcode_counts: BTreeMap::new(),
                },
            );
        }
        let order: Vec<&str> = sorted_by_total(&table).iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["Bella", "Coco", "Max"]);
    }

    #[test]
    fn test_top_breed_serializes_with_breed_key() {
        let top: TopBreed = Representation {
            key: "Beagle".to_string(),
            count: 4,
            percentage: 0.2,
            ratio: 2.0,
        }
        .into();
        let json = serde_json::to_value(&top).unwrap();
        assert_eq!(json["breed"], "Beagle");
        assert_eq!(json["representation"], 2.0);
    }
}
