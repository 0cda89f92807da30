//! Process configuration from environment variables
//!
//! | Variable                  | Default                    |
//! |---------------------------|----------------------------|
//! | `DATA_DIR`                | `data`                     |
//! | `SPECIES_FILE`            | `<DATA_DIR>/species.json`  |
//! | `HOST`                    | `0.0.0.0`                  |
//! | `PORT`                    | `8080`                     |
//! | `RESPONSE_CACHE_CAPACITY` | `10000`                    |
//! | `RESPONSE_CACHE_TTL_SECS` | `300`                      |

use crate::error::{EcoError, EcoResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const SPECIES_FILE_NAME: &str = "species.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory with one sub-directory of curve files per region
    pub data_dir: PathBuf,
    /// JSON file mapping OTM codes to i-Tree codes for every region
    pub species_file: PathBuf,
    pub host: String,
    pub port: u16,
    pub response_cache_capacity: u64,
    pub response_cache_ttl_secs: u64,
}

impl Config {
    /// Defaults for a given data directory
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Config {
            species_file: data_dir.join(SPECIES_FILE_NAME),
            data_dir,
            host: "0.0.0.0".to_string(),
            port: 8080,
            response_cache_capacity: 10_000,
            response_cache_ttl_secs: 300,
        }
    }

    pub fn from_env() -> EcoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test maps)
    pub fn from_lookup<F>(lookup: F) -> EcoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut config = Config::for_data_dir(&data_dir);

        if let Some(species_file) = lookup("SPECIES_FILE") {
            config.species_file = PathBuf::from(species_file);
        }
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(capacity) = lookup("RESPONSE_CACHE_CAPACITY") {
            config.response_cache_capacity = parse_var("RESPONSE_CACHE_CAPACITY", &capacity)?;
        }
        if let Some(ttl) = lookup("RESPONSE_CACHE_TTL_SECS") {
            config.response_cache_ttl_secs = parse_var("RESPONSE_CACHE_TTL_SECS", &ttl)?;
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> EcoResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| EcoError::Config(format!("{} has invalid value '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.species_file, PathBuf::from("data").join("species.json"));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATA_DIR", "/srv/eco"),
            ("PORT", "13000"),
            ("HOST", "127.0.0.1"),
            ("RESPONSE_CACHE_TTL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.species_file, PathBuf::from("/srv/eco/species.json"));
        assert_eq!(config.bind_address(), "127.0.0.1:13000");
        assert_eq!(config.response_cache_ttl_secs, 5);

        let config = Config::from_lookup(lookup_from(&[("SPECIES_FILE", "/tmp/s.json")])).unwrap();
        assert_eq!(config.species_file, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, EcoError::Config(_)));
        assert!(err.to_string().contains("PORT"));
    }
}
