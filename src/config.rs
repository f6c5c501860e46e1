//! Configuration module for the argus engine

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::asset::ServiceKind;
use crate::error::ArgusError;

/// Upper bound on concurrent discovery cells
pub const MAX_CONCURRENCY_CAP: usize = 64;

/// Main configuration structure for discovery and classification runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of (region, service) cells in flight
    pub max_concurrency: usize,

    /// Timeout for one provider fetch in milliseconds
    pub cell_timeout_ms: u64,

    /// Timeout for the connection probe in milliseconds
    pub probe_timeout_ms: u64,

    /// Regions scanned when a request names none
    pub default_regions: Vec<String>,

    /// Services scanned when a request names none; all services when unset
    pub default_services: Option<Vec<ServiceKind>>,

    /// TOML or JSON file of classification rules
    pub rules_file: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            cell_timeout_ms: 30_000,
            probe_timeout_ms: 10_000,
            default_regions: vec!["us-east-1".to_string()],
            default_services: None,
            rules_file: None,
            log_level: "info".to_string(),
        }
    }
}

fn default_concurrency() -> usize {
    std::cmp::min(num_cpus::get() * 4, MAX_CONCURRENCY_CAP)
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_cell_timeout(mut self, timeout_ms: u64) -> Self {
        self.cell_timeout_ms = timeout_ms;
        self
    }

    pub fn with_probe_timeout(mut self, timeout_ms: u64) -> Self {
        self.probe_timeout_ms = timeout_ms;
        self
    }

    pub fn with_default_regions(mut self, regions: Vec<String>) -> Self {
        self.default_regions = regions;
        self
    }

    pub fn with_default_services(mut self, services: Vec<ServiceKind>) -> Self {
        self.default_services = Some(services);
        self
    }

    pub fn with_rules_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.rules_file = Some(path.into());
        self
    }

    pub fn cell_timeout(&self) -> Duration {
        Duration::from_millis(self.cell_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ArgusError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the per-user config file, `~/.argus.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".argus.toml")
    }

    /// Load `~/.argus.toml` if present, defaults otherwise
    pub fn load_default_config() -> Self {
        let path = Self::default_path();
        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrency == 0 {
            return Err(ArgusError::ConfigError("max_concurrency must be greater than 0".to_string()));
        }
        if self.max_concurrency > MAX_CONCURRENCY_CAP {
            return Err(ArgusError::ConfigError(format!(
                "max_concurrency must not exceed {}",
                MAX_CONCURRENCY_CAP
            )));
        }
        if self.cell_timeout_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(ArgusError::ConfigError("Timeouts must be greater than 0".to_string()));
        }
        if self.default_regions.iter().any(|r| r.trim().is_empty()) {
            return Err(ArgusError::ConfigError("default_regions contains a blank entry".to_string()));
        }
        if let Some(services) = &self.default_services {
            if services.is_empty() {
                return Err(ArgusError::ConfigError("default_services must not be empty when set".to_string()));
            }
        }
        Ok(())
    }

    /// Services to scan: the configured default, or every known service
    pub fn services(&self) -> Vec<ServiceKind> {
        self.default_services
            .clone()
            .unwrap_or_else(|| ServiceKind::ALL.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_concurrency >= 1 && config.max_concurrency <= MAX_CONCURRENCY_CAP);
        assert_eq!(config.cell_timeout(), Duration::from_secs(30));
        assert_eq!(config.services().len(), ServiceKind::ALL.len());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = EngineConfig::new().with_max_concurrency(0);
        assert!(matches!(config.validate(), Err(ArgusError::ConfigError(_))));
        assert!(EngineConfig::new().with_max_concurrency(65).validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
max_concurrency = 8
default_regions = ["eu-west-1", "eu-central-1"]
default_services = ["ec2", "s3", "dynamodb"]
"#
        )
        .unwrap();

        let config = EngineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.default_regions, vec!["eu-west-1", "eu-central-1"]);
        assert_eq!(
            config.services(),
            vec![ServiceKind::Ec2, ServiceKind::S3, ServiceKind::DynamoDb]
        );
        assert_eq!(config.probe_timeout_ms, 10_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_services = [\"cloudfront\"]").unwrap();
        assert!(matches!(
            EngineConfig::from_toml_file(file.path()),
            Err(ArgusError::TomlError(_))
        ));
    }
}
