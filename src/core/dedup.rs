//! Loading, deduplication and population filtering of the licensing table.

use crate::config::toml_config::ColumnConfig;
use crate::domain::model::{normalize_zip, ColumnIndex, Dataset, DogRecord};
use crate::utils::error::{EtlError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn parse_dataset(bytes: &[u8], columns: &ColumnConfig) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let find = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| EtlError::MissingColumnError {
                column: column.to_string(),
            })
    };
    let index = ColumnIndex {
        animal_name: find(&columns.animal_name)?,
        breed_name: find(&columns.breed_name)?,
        zip_code: find(&columns.zip_code)?,
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(DogRecord::new(record.iter()));
    }

    tracing::debug!("Parsed {} rows with columns {:?}", rows.len(), headers);

    Ok(Dataset {
        headers,
        columns: index,
        rows,
    })
}

pub fn write_dataset_csv(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&dataset.headers)?;
    for row in &dataset.rows {
        writer.write_record(&row.fields)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::processing(format!("Failed to flush CSV writer: {}", e)))
}

/// Row identity for deduplication: raw cells, except the zip which is compared normalised
/// so `10001` and `10001.0` are the same value.
fn dedup_key(columns: &ColumnIndex, row: &DogRecord) -> Vec<String> {
    let mut key = row.fields.clone();
    if let Some(zip) = key.get_mut(columns.zip_code) {
        *zip = normalize_zip(zip).unwrap_or_default();
    }
    key
}

/// Drops duplicate rows, keeping the first occurrence in input order.
pub fn deduplicate(dataset: Dataset) -> Dataset {
    let Dataset {
        headers,
        columns,
        rows,
    } = dataset;

    let mut seen = HashSet::with_capacity(rows.len());
    let rows: Vec<DogRecord> = rows
        .into_iter()
        .filter(|row| seen.insert(dedup_key(&columns, row)))
        .collect();

    Dataset {
        headers,
        columns,
        rows,
    }
}

/// Occurrences of each non-missing value produced by `key`.
pub fn value_counts<F>(dataset: &Dataset, key: F) -> HashMap<String, u64>
where
    F: Fn(&Dataset, &DogRecord) -> Option<String>,
{
    let mut counts = HashMap::new();
    for row in &dataset.rows {
        if let Some(value) = key(dataset, row) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    counts
}

/// Keeps the values seen at least `min_population` times.
pub fn filter_popular(counts: HashMap<String, u64>, min_population: u64) -> BTreeMap<String, u64> {
    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_population)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
AnimalName,AnimalGender,BreedName,ZipCode
Bella,F,Beagle,10001
Bella,F,Beagle,10001
Max,M,Poodle,10002.0
Max,M,Poodle,10002
,M,Beagle,
";

    fn sample() -> Dataset {
        parse_dataset(SAMPLE.as_bytes(), &ColumnConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_resolves_columns() {
        let dataset = sample();
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.columns.animal_name, 0);
        assert_eq!(dataset.columns.breed_name, 2);
        assert_eq!(dataset.columns.zip_code, 3);
        assert_eq!(dataset.zip(&dataset.rows[2]), Some("10002".to_string()));
        assert_eq!(dataset.name(&dataset.rows[4]), None);
    }

    #[test]
    fn test_parse_reports_missing_column() {
        let err = parse_dataset(b"AnimalName,ZipCode\nBella,10001\n", &ColumnConfig::default())
            .unwrap_err();
        match err {
            EtlError::MissingColumnError { column } => assert_eq!(column, "BreedName"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence_and_is_idempotent() {
        let once = deduplicate(sample());
        assert_eq!(once.len(), 3);
        assert_eq!(once.rows[0].fields[0], "Bella");
        assert_eq!(once.rows[1].fields[0], "Max");
        assert_eq!(once.rows[1].fields[3], "10002.0");

        let twice = deduplicate(once.clone());
        assert_eq!(twice.rows, once.rows);
    }

    #[test]
    fn test_deduplicate_treats_decimal_zip_as_same_row() {
        let dataset = parse_dataset(
            b"AnimalName,BreedName,ZipCode\nBella,Beagle,10001\nBella,Beagle,10001.0\nBella,Beagle,10002\n",
            &ColumnConfig::default(),
        )
        .unwrap();
        let unique = deduplicate(dataset);
        assert_eq!(unique.len(), 2);

        let counts = value_counts(&unique, Dataset::zip);
        assert_eq!(counts.get("10001"), Some(&1));
        assert_eq!(counts.get("10002"), Some(&1));
    }

    #[test]
    fn test_deduplicate_keeps_rows_differing_in_other_columns() {
        let dataset = parse_dataset(
            b"AnimalName,BreedName,ZipCode\nBella,Beagle,10001\nbella,Beagle,10001\n",
            &ColumnConfig::default(),
        )
        .unwrap();
        assert_eq!(deduplicate(dataset).len(), 2);
    }

    #[test]
    fn test_value_counts_skip_missing_values() {
        let dataset = deduplicate(sample());
        let names = value_counts(&dataset, Dataset::name);
        assert_eq!(names.get("Bella"), Some(&1));
        assert_eq!(names.get("Max"), Some(&1));
        assert_eq!(names.len(), 2);

        let zips = value_counts(&dataset, Dataset::zip);
        assert_eq!(zips.get("10002"), Some(&1));
    }

    #[test]
    fn test_filter_popular_is_inclusive() {
        let dataset = deduplicate(sample());
        let breeds = filter_popular(value_counts(&dataset, Dataset::breed), 2);
        assert_eq!(breeds.get("Beagle"), Some(&2));
        assert_eq!(breeds.get("Poodle"), None);

        let breeds = filter_popular(value_counts(&dataset, Dataset::breed), 3);
        assert!(breeds.is_empty());
    }

    #[test]
    fn test_write_round_trips_header() {
        let dataset = deduplicate(sample());
        let bytes = write_dataset_csv(&dataset).unwrap();
        let reparsed = parse_dataset(&bytes, &ColumnConfig::default()).unwrap();
        assert_eq!(reparsed.headers, dataset.headers);
        assert_eq!(reparsed.rows, dataset.rows);
    }
}
