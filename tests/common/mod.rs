#![allow(dead_code)]

use dogmap::TomlConfig;
use std::path::Path;

pub const DATASET_FILE: &str = "nycdogs.csv";

/// 30 Beagles named Bella in 10001, 20 Pit Bulls named Rocky in 10002,
/// 15 Poodles named Max across both, 7 Dachshunds named Coco in 10003
/// (popular, but below the map threshold), and one exact duplicate row.
pub fn dataset_csv() -> String {
    let mut csv = String::from("RowNumber,AnimalName,AnimalGender,BreedName,ZipCode\n");
    let mut row = 0;
    let mut push = |csv: &mut String, name: &str, breed: &str, zip: &str, count: usize| {
        for _ in 0..count {
            row += 1;
            csv.push_str(&format!("{},{},M,{},{}\n", row, name, breed, zip));
        }
    };
    push(&mut csv, "Bella", "Beagle", "10001", 30);
    push(&mut csv, "Rocky", "Pit Bull", "10002.0", 20);
    push(&mut csv, "Max", "Poodle", "10002", 10);
    push(&mut csv, "Max", "Poodle", "10001", 5);
    push(&mut csv, "Coco", "Dachshund", "10003", 7);
    csv.push_str("65,Max,M,Poodle,10001\n");
    csv
}

pub fn write_dataset(root: &Path) {
    std::fs::write(root.join(DATASET_FILE), dataset_csv()).unwrap();
}

pub fn test_config(root: &Path) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.output.root = root.to_string_lossy().into_owned();
    config.source.dataset_path = DATASET_FILE.to_string();
    config.aggregate.min_population = 5;
    config.aggregate.min_zip_dogs = 5;
    config.maps.min_count = 10;
    config
}
