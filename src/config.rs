//! Dashboard configuration (optional TOML file plus CLI overrides)

use crate::data::{DatasetSource, RegionAliases};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Selectable datasets; the first one loads at startup
    #[serde(default = "default_datasets")]
    pub datasets: Vec<DatasetSource>,
    #[serde(default)]
    pub boundaries: BoundaryConfig,
    #[serde(default)]
    pub charts: ChartConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            datasets: default_datasets(),
            boundaries: BoundaryConfig::default(),
            charts: ChartConfig::default(),
        }
    }
}

fn default_datasets() -> Vec<DatasetSource> {
    vec![DatasetSource {
        name: "Ukraine & Black Sea 2020-2025".to_string(),
        cache_path: PathBuf::from("data/Ukraine_Black_Sea_2020_2025_May02.csv"),
        url: None,
    }]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoundaryConfig {
    #[serde(default = "default_boundary_dir")]
    pub dir: PathBuf,
    #[serde(flatten)]
    pub rules: RegionAliases,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            dir: default_boundary_dir(),
            rules: RegionAliases::default(),
        }
    }
}

fn default_boundary_dir() -> PathBuf {
    PathBuf::from("data/boundaries")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChartConfig {
    #[serde(default = "default_top_sources")]
    pub top_sources: usize,
    /// Share below which a slice is folded into "Other"
    #[serde(default = "default_other_threshold")]
    pub other_threshold: f64,
    /// Days moved per date-bound key press
    #[serde(default = "default_date_step")]
    pub date_step_days: i64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            top_sources: default_top_sources(),
            other_threshold: default_other_threshold(),
            date_step_days: default_date_step(),
        }
    }
}

fn default_top_sources() -> usize {
    5
}

fn default_other_threshold() -> f64 {
    0.01
}

fn default_date_step() -> i64 {
    7
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.datasets.is_empty(), "at least one dataset must be configured");
        anyhow::ensure!(self.charts.top_sources > 0, "charts.top_sources must be positive");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.charts.other_threshold),
            "charts.other_threshold must be in [0, 1)"
        );
        anyhow::ensure!(self.charts.date_step_days > 0, "charts.date_step_days must be positive");
        Ok(())
    }

    /// Point the startup dataset at another local file
    pub fn override_data_path(&mut self, path: PathBuf) {
        match self.datasets.first_mut() {
            Some(first) => {
                first.cache_path = path;
                first.url = None;
            }
            None => self.datasets.push(DatasetSource {
                name: "custom".to_string(),
                cache_path: path,
                url: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.datasets, default_datasets());
        assert_eq!(config.charts.top_sources, 5);
        assert_eq!(config.charts.other_threshold, 0.01);
        assert_eq!(config.boundaries.rules, RegionAliases::default());
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::parse(
            r#"
            [[datasets]]
            name = "Black Sea"
            cache_path = "cache/black_sea.csv"
            url = "https://example.org/black_sea.csv"

            [[datasets]]
            name = "Local"
            cache_path = "local.csv"

            [boundaries]
            dir = "geo"
            strip_suffixes = [" Oblast"]
            aliases = { "Kiev" = "Kyiv" }

            [charts]
            top_sources = 8
            other_threshold = 0.02
            date_step_days = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.datasets[0].url.as_deref(), Some("https://example.org/black_sea.csv"));
        assert!(config.datasets[1].url.is_none());
        assert_eq!(config.boundaries.dir, PathBuf::from("geo"));
        assert_eq!(config.boundaries.rules.aliases.len(), 1);
        assert_eq!(config.charts.top_sources, 8);
        assert_eq!(config.charts.date_step_days, 1);
    }

    #[test]
    fn test_example_config_parses() {
        let config = AppConfig::parse(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.datasets, default_datasets());
        assert_eq!(config.boundaries.rules.aliases["Kiev"], "Kyiv");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::parse("datasets = []").is_err());
        assert!(AppConfig::parse("[charts]\nother_threshold = 1.5").is_err());
        assert!(AppConfig::parse("[charts]\ntop_sources = 0").is_err());
    }

    #[test]
    fn test_override_data_path() {
        let mut config = AppConfig::default();
        config.override_data_path(PathBuf::from("mine.csv"));
        assert_eq!(config.datasets[0].cache_path, PathBuf::from("mine.csv"));
        assert!(config.datasets[0].url.is_none());
    }
}
