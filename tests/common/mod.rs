// Shared fixture: a small two-region data directory on disk
//
// Curves are linear through the origin so expected values are easy to write:
//   ACRU       value = (factor_index + 1) * diameter / 10 * scale
//   BDS OTHER  value = 2 * (factor_index + 1) * diameter / 10 * scale
//   ULAM       only present for even factor indexes, value = 0.5 * diameter * scale

#![allow(dead_code)]

use ecobenefits::{Config, FACTORS};
use std::fs;
use std::path::Path;

pub const BREAKS: [f64; 4] = [10.0, 20.0, 30.0, 60.0];

pub fn acru_value(factor: usize, diameter: f64, scale: f64) -> f64 {
    (factor as f64 + 1.0) * diameter / 10.0 * scale
}

pub fn bds_value(factor: usize, diameter: f64, scale: f64) -> f64 {
    2.0 * acru_value(factor, diameter, scale)
}

pub fn ulam_value(factor: usize, diameter: f64, scale: f64) -> f64 {
    if factor % 2 == 0 {
        0.5 * diameter * scale
    } else {
        0.0
    }
}

const SPECIES: &str = r#"{
    "NoEastXXX": { "ACRU": "ACRU", "MASO": "BDS OTHER" },
    "LoMidWXXX": { "ULAM": "ULAM", "MASO": "BDS OTHER" }
}"#;

fn curve_row(code: &str, f: impl Fn(f64) -> f64) -> String {
    let values: Vec<String> = BREAKS.iter().map(|b| format!("{}", f(*b))).collect();
    format!("{},{}\n", code, values.join(","))
}

fn header() -> String {
    let breaks: Vec<String> = BREAKS.iter().map(|b| format!("{}", b)).collect();
    format!("itree_code,{}\n", breaks.join(","))
}

/// Write species.json and both regions' factor files, values multiplied by `scale`
pub fn write_fixture(dir: &Path, scale: f64) {
    fs::write(dir.join("species.json"), SPECIES).unwrap();

    for region in ["NoEastXXX", "LoMidWXXX"] {
        let region_dir = dir.join(region);
        fs::create_dir_all(&region_dir).unwrap();

        for (i, factor) in FACTORS.iter().enumerate() {
            let mut csv = header();
            csv.push_str(&curve_row("BDS OTHER", |d| bds_value(i, d, scale)));
            match region {
                "NoEastXXX" => csv.push_str(&curve_row("ACRU", |d| acru_value(i, d, scale))),
                _ => {
                    if i % 2 == 0 {
                        csv.push_str(&curve_row("ULAM", |d| ulam_value(i, d, scale)));
                    }
                }
            }
            fs::write(region_dir.join(format!("{}.csv", factor)), csv).unwrap();
        }
    }
}

pub fn fixture_config(scale: f64) -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), scale);
    let config = Config::for_data_dir(dir.path());
    (dir, config)
}
