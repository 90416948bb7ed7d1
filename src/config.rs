use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProdlensError, Result};
use crate::fetch::DEFAULT_USER_AGENT;
use crate::platform::{clamp_trust, RetailerTable};
use crate::rating::AggregationPolicy;

/// Per-request probe timeout bounds, in seconds
pub const MIN_PROBE_TIMEOUT_SECS: u64 = 5;
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 45;

/// Global prodlens configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rating probe behaviour
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Weighting and confidence constants
    #[serde(default)]
    pub aggregation: AggregationPolicy,

    /// Platform name -> trust weight (1-10), applied over the retailer table
    #[serde(default)]
    pub trust_overrides: HashMap<String, f64>,

    /// Replacement retailer table
    #[serde(default)]
    pub retailers_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Platforms probed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-platform timeout, clamped to 5-45 seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_concurrency() -> usize {
    crate::batch::DEFAULT_CONCURRENCY
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .clamp(MIN_PROBE_TIMEOUT_SECS, MAX_PROBE_TIMEOUT_SECS),
        )
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// Supports PRODLENS_CONFIG environment variable to point elsewhere
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("PRODLENS_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let dirs = ProjectDirs::from("", "", "prodlens")
            .ok_or_else(|| ProdlensError::ConfigError("Could not determine config directory".into()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// The retailer table this config asks for, with trust overrides applied
    pub fn retailer_table(&self) -> RetailerTable {
        let mut table = RetailerTable::load_or_default(self.retailers_path.as_deref());

        for (platform, weight) in &self.trust_overrides {
            let platform = platform.trim();
            match table
                .retailers
                .iter_mut()
                .find(|r| r.id.eq_ignore_ascii_case(platform) || r.name.eq_ignore_ascii_case(platform))
            {
                Some(retailer) => retailer.trust_weight = clamp_trust(*weight),
                None => tracing::warn!(platform, "trust override for unknown platform ignored"),
            }
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.probe.concurrency, 3);
        assert_eq!(config.probe.timeout(), Duration::from_secs(15));
        assert_eq!(config.aggregation, AggregationPolicy::default());
        assert!(config.trust_overrides.is_empty());
        assert!(config.retailers_path.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [probe]
            timeout_secs = 120

            [aggregation]
            confidence_cap = 0.9

            [trust_overrides]
            "Best Buy" = 4.0
            etsy = 0.0
            "#,
        )
        .unwrap();

        assert_eq!(config.probe.concurrency, 3);
        assert_eq!(config.probe.timeout(), Duration::from_secs(45));
        assert_eq!(config.aggregation.confidence_cap, 0.9);
        assert_eq!(config.aggregation.max_log_weight, 5.0);

        let table = config.retailer_table();
        assert_eq!(table.trust_weight("Best Buy"), 4.0);
        // Clamped to the bottom of the scale
        assert_eq!(table.trust_weight("Etsy"), 1.0);
        assert_eq!(table.trust_weight("Amazon"), 9.0);
    }

    #[test]
    fn test_short_timeout_clamped() {
        let probe = ProbeConfig { timeout_secs: 1, ..ProbeConfig::default() };
        assert_eq!(probe.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("prodlens-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[probe]\nconcurrency = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.probe.concurrency, 5);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let path = std::env::temp_dir().join(format!("prodlens-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[probe\nconcurrency = ").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ProdlensError::TomlError(_))));

        std::fs::remove_file(&path).ok();
    }
}
