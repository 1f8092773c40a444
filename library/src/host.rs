use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use crate::abi::ffi::{GetNumberOfPluginsFn, GetPluginFn, HostSuite};
use crate::abi::publish_host_suite;
use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::image::BitDepth;
use crate::plugin::{Plugin, PluginCache, ScanReport};
use crate::property::{PropertySet, PropertySpec, keys};

pub const HOST_NAME: &str = "org.fxhost";
pub const HOST_LABEL: &str = "fxhost";

fn host_properties(config: &HostConfig) -> Result<PropertySet> {
    let version: Vec<i32> = env!("CARGO_PKG_VERSION")
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect();
    let depths = [BitDepth::Byte, BitDepth::Short, BitDepth::Float].map(BitDepth::name);
    Ok(PropertySet::from_specs([
        PropertySpec::string(keys::HOST_NAME, HOST_NAME).read_only(),
        PropertySpec::string(keys::HOST_LABEL, HOST_LABEL).read_only(),
        PropertySpec::ints(keys::HOST_VERSION, &version).read_only(),
        PropertySpec::doubles(keys::HOST_PROJECT_SIZE, &config.project_size).read_only(),
        PropertySpec::strings(keys::HOST_SUPPORTED_DEPTHS, depths).read_only(),
    ])?)
}

/// The plugin host: configuration, the description handed to plugins and
/// the registry of known plugins.
///
/// Several hosts can coexist in one process. Each publishes its own host
/// suite, which lives until the process exits.
pub struct Host {
    config: HostConfig,
    properties: &'static PropertySet,
    suite: &'static HostSuite,
    cache: RwLock<PluginCache>,
}

impl Host {
    pub fn new(config: HostConfig) -> Result<Self> {
        config.validate()?;
        let (properties, suite) = publish_host_suite(host_properties(&config)?);
        Ok(Self {
            config,
            properties,
            suite,
            cache: RwLock::new(PluginCache::new(suite)),
        })
    }

    /// A host with the configuration from [`HostConfig::load`], its
    /// persisted cache read and its plugin paths scanned.
    pub fn from_environment() -> Result<(Self, ScanReport)> {
        let host = Self::new(HostConfig::load())?;
        let report = host.load_plugins();
        Ok((host, report))
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn properties(&self) -> &PropertySet {
        self.properties
    }

    pub fn suite(&self) -> &'static HostSuite {
        self.suite
    }

    pub fn cache(&self) -> RwLockReadGuard<'_, PluginCache> {
        self.cache.read().unwrap_or_else(|p| p.into_inner())
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, PluginCache> {
        self.cache.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Reads the configured cache file, if any, then scans the configured
    /// plugin paths.
    pub fn load_plugins(&self) -> ScanReport {
        if let Some(path) = &self.config.cache_path {
            if path.exists() {
                if let Err(e) = self.load_persisted(path) {
                    warn!("Ignoring plugin cache {}: {}", path.display(), e);
                }
            }
        }
        self.scan(&self.config.plugin_paths)
    }

    pub fn load_persisted(&self, path: &Path) -> Result<usize> {
        self.cache_mut().load_persisted(path)
    }

    pub fn scan(&self, paths: &[PathBuf]) -> ScanReport {
        self.cache_mut().scan(paths)
    }

    pub fn register_static(&self, name: &str, count: GetNumberOfPluginsFn, get: GetPluginFn) -> ScanReport {
        self.cache_mut().register_static(name, count, get)
    }

    /// Writes every description known so far to `path`.
    pub fn save_cache(&self, path: &Path) -> Result<()> {
        self.cache().save(path)
    }

    /// Writes to the configured cache path.
    pub fn save_configured_cache(&self) -> Result<()> {
        let path = self
            .config
            .cache_path
            .as_ref()
            .ok_or_else(|| HostError::Config("no cache_path configured".to_string()))?;
        self.save_cache(path)?;
        info!("Plugin cache saved");
        Ok(())
    }

    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.cache().plugins().to_vec()
    }

    pub fn get_plugin_by_id(&self, identifier: &str, major: Option<u32>, minor: Option<u32>) -> Option<Arc<Plugin>> {
        self.cache().get_plugin_by_id(identifier, major, minor)
    }

    pub fn get_plugin_by_label(&self, label: &str, major: Option<u32>, minor: Option<u32>) -> Option<Arc<Plugin>> {
        self.cache().get_plugin_by_label(label, major, minor)
    }

    /// Resolves a node name typed by a user: an exact identifier first,
    /// then a substring that matches exactly one identifier.
    pub fn resolve_plugin(&self, name: &str) -> Result<Arc<Plugin>> {
        let cache = self.cache();
        if let Some(plugin) = cache.get_plugin_by_id(name, None, None) {
            return Ok(plugin);
        }
        let needle = name.to_lowercase();
        let mut candidates: Vec<Arc<Plugin>> = cache
            .plugins_by_id()
            .into_iter()
            .filter(|p| p.identifier().contains(&needle))
            .collect();
        match candidates.len() {
            0 => Err(HostError::UnknownNodeName(name.to_string())),
            1 => Ok(candidates.remove(0)),
            _ => Err(HostError::AmbiguousNodeName {
                name: name.to_string(),
                candidates: candidates.iter().map(|p| p.raw_identifier().to_string()).collect(),
            }),
        }
    }

    /// First context of the configured priority list that `plugin` supports.
    pub fn preferred_context(&self, plugin: &Plugin) -> Result<String> {
        plugin.load_and_describe_actions()?;
        let supported = plugin.supported_contexts();
        self.config
            .context_priority
            .iter()
            .find(|c| supported.contains(c))
            .or_else(|| supported.first())
            .cloned()
            .ok_or_else(|| HostError::ContextUnsupported {
                plugin: plugin.raw_identifier().to_string(),
                context: self.config.context_priority.join("|"),
            })
    }
}
