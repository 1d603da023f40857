use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "LECTURE_MAP_CONFIG";

/// Application settings.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Workbook (or `.bin.gz` snapshot) holding Events and Stats.
    pub workbook_path: PathBuf,
    /// Workbook holding the map views.
    pub views_path: PathBuf,
    /// Where archived copies of the workbook go.
    pub archive_dir: PathBuf,
    pub geocoder: GeocoderConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Search endpoint of a Nominatim-compatible service.
    pub endpoint: String,
    pub user_agent: String,
    /// Appended to every coordinate query.
    pub country: String,
    /// Restricts place searches, ISO 3166-1 alpha-2.
    pub country_code: String,
    pub requests_per_second: f64,
    /// Extra attempts after a transport failure.
    pub retries: u32,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from("Plotter_Output").join("ClimatePlotter.xlsx"),
            views_path: PathBuf::from("Views.xlsx"),
            archive_dir: PathBuf::from("Plotter_Output").join("Archive"),
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: concat!("lecture-map/", env!("CARGO_PKG_VERSION")).to_string(),
            country: "Germany".to_string(),
            country_code: "de".to_string(),
            requests_per_second: 1.0,
            retries: 2,
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load settings from `path`, or from [`CONFIG_ENV`] when `path` is `None`.
    ///
    /// A file that does not exist yields the defaults; a file that exists but
    /// does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        };
        match path {
            Some(p) if p.exists() => {
                let contents = fs::read_to_string(&p)?;
                let config = serde_json::from_str(&contents)?;
                log::debug!("loaded config from {}", p.display());
                Ok(config)
            }
            Some(p) => {
                log::warn!("config file {} not found, using defaults", p.display());
                Ok(Config::default())
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"workbook_path": "data.bin.gz", "geocoder": {"retries": 0}}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.workbook_path, PathBuf::from("data.bin.gz"));
        assert_eq!(config.geocoder.retries, 0);
        assert_eq!(config.geocoder.requests_per_second, 1.0);
        assert_eq!(config.views_path, PathBuf::from("Views.xlsx"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("none.json"))).unwrap();
        assert_eq!(config, Config::default());
    }
}
