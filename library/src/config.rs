use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};
use crate::image::BitDepth;
use crate::property::keys;

pub const PLUGIN_PATH_ENV: &str = "FXHOST_PLUGIN_PATH";
pub const CACHE_PATH_ENV: &str = "FXHOST_CACHE";
pub const WORKERS_ENV: &str = "FXHOST_WORKERS";

const CONFIG_FILE: &str = "host.toml";
const CACHE_FILE: &str = "plugin_cache.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "fxhost", "fxhost")
}

/// Host settings read from `host.toml` in the user's config directory.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct HostConfig {
    /// Directories (or files) searched for plugin binaries.
    pub plugin_paths: Vec<PathBuf>,
    /// Where the described plugins are persisted. `None` disables the cache.
    pub cache_path: Option<PathBuf>,
    /// Context picked for a new node, first supported wins.
    pub context_priority: Vec<String>,
    pub workers: usize,
    /// Width and height used as the region of definition when a plugin
    /// leaves it to the host.
    pub project_size: [f64; 2],
    pub default_bit_depth: BitDepth,
}

impl Default for HostConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        Self {
            plugin_paths: dirs
                .as_ref()
                .map(|d| vec![d.data_dir().join("plugins")])
                .unwrap_or_default(),
            cache_path: dirs.as_ref().map(|d| d.cache_dir().join(CACHE_FILE)),
            context_priority: [
                keys::CONTEXT_READER,
                keys::CONTEXT_WRITER,
                keys::CONTEXT_GENERATOR,
                keys::CONTEXT_FILTER,
                keys::CONTEXT_GENERAL,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            workers: 1,
            project_size: [1920.0, 1080.0],
            default_bit_depth: BitDepth::Byte,
        }
    }
}

impl HostConfig {
    /// Settings without any plugin path or cache, for embedding.
    pub fn in_memory() -> Self {
        Self {
            plugin_paths: Vec::new(),
            cache_path: None,
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
    }

    /// Reads the user's `host.toml` and applies environment overrides.
    /// A missing or broken file falls back to the defaults.
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(text) => match Self::from_toml_str(&text) {
                    Ok(config) => {
                        info!("Loaded host configuration from {}", path.display());
                        config
                    }
                    Err(e) => {
                        warn!("Failed to parse {}, using defaults: {}", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("Failed to read {}, using defaults: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Applies `FXHOST_*` overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(paths) = var(PLUGIN_PATH_ENV) {
            self.plugin_paths = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(cache) = var(CACHE_PATH_ENV) {
            self.cache_path = (!cache.is_empty()).then(|| PathBuf::from(cache));
        }
        if let Some(workers) = var(WORKERS_ENV) {
            match workers.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.workers = n,
                _ => warn!("Ignoring {}={:?}", WORKERS_ENV, workers),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HostError::Config("workers must be at least 1".to_string()));
        }
        if self.project_size.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(HostError::Config(format!(
                "project_size must be positive, got {:?}",
                self.project_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = HostConfig::from_toml_str(
            r#"
            plugin_paths = ["/opt/fx"]
            workers = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.plugin_paths, vec![PathBuf::from("/opt/fx")]);
        assert_eq!(config.workers, 4);
        assert_eq!(config.context_priority[0], keys::CONTEXT_READER);
        assert_eq!(config.default_bit_depth, BitDepth::Byte);
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        assert!(matches!(
            HostConfig::from_toml_str("workers = 0"),
            Err(HostError::Config(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = HostConfig::in_memory();
        config.apply_overrides(|key| match key {
            WORKERS_ENV => Some("3".to_string()),
            CACHE_PATH_ENV => Some("/tmp/fx.json".to_string()),
            _ => None,
        });
        assert_eq!(config.workers, 3);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/fx.json")));
        assert!(config.plugin_paths.is_empty());

        config.apply_overrides(|key| (key == WORKERS_ENV).then(|| "none".to_string()));
        assert_eq!(config.workers, 3);
    }
}
