use crate::error::{OnboardError, Result};
use crate::paths;
use crate::validate::DEFAULT_BULK_LIMIT;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Drafts untouched for this many days count as abandoned.
    #[serde(default = "default_abandoned_after_days")]
    pub abandoned_after_days: u32,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

/// One hundred years; larger thresholds cannot describe a real draft.
pub const MAX_ABANDONED_AFTER_DAYS: u32 = 36_500;

fn default_abandoned_after_days() -> u32 {
    7
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            abandoned_after_days: default_abandoned_after_days(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl RegistryConfig {
    pub fn abandoned_after(&self) -> Duration {
        Duration::days(i64::from(self.abandoned_after_days))
    }
}

// ---------------------------------------------------------------------------
// AdminConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_bulk_limit")]
    pub bulk_limit: usize,
}

fn default_bulk_limit() -> usize {
    DEFAULT_BULK_LIMIT
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bulk_limit: default_bulk_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3150
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(platform_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            platform: PlatformConfig {
                name: platform_name.into(),
            },
            registry: RegistryConfig::default(),
            admin: AdminConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(OnboardError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.admin.bulk_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "admin.bulk_limit is 0; every bulk action will be refused".to_string(),
            });
        } else if self.admin.bulk_limit > 500 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "admin.bulk_limit={} (bulk actions run sequentially within one request)",
                    self.admin.bulk_limit
                ),
            });
        }

        if self.registry.max_page_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "registry.max_page_size must be at least 1".to_string(),
            });
        }
        if self.registry.default_page_size > self.registry.max_page_size {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "registry.default_page_size ({}) exceeds max_page_size ({}); pages will be clamped",
                    self.registry.default_page_size, self.registry.max_page_size
                ),
            });
        }

        if self.registry.abandoned_after_days > MAX_ABANDONED_AFTER_DAYS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "registry.abandoned_after_days={} exceeds the maximum of {MAX_ABANDONED_AFTER_DAYS}",
                    self.registry.abandoned_after_days
                ),
            });
        } else if self.registry.abandoned_after_days == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "registry.abandoned_after_days is 0; every draft counts as abandoned"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
