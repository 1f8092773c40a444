use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use super::binary::{BinaryIdentity, BinarySource, PluginBinary};
use super::persist::{CACHE_FORMAT_VERSION, CacheFile, CachedBinary, CachedPlugin};
use super::{Plugin, PluginId, PluginIdentity};
use crate::abi::PluginHandle;
use crate::abi::ffi::{GetNumberOfPluginsFn, GetPluginFn, HostSuite};
use crate::error::{HostError, Result};
use crate::property::keys;
use crate::util::timing::ScopedTimer;

/// A binary or plugin that could not be used. Scanning carries on.
#[derive(Clone, PartialEq, Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub plugin: Option<String>,
    pub reason: String,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ScanReport {
    /// Plugins that went through Load and Describe.
    pub described: usize,
    /// Plugins restored from the persisted cache.
    pub cached: usize,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.described += other.described;
        self.cached += other.cached;
        self.failures.extend(other.failures);
    }
}

fn is_plugin_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION || ext == "fx")
}

/// Registry of every plugin the host knows about.
pub struct PluginCache {
    host: &'static HostSuite,
    binaries: Vec<Arc<PluginBinary>>,
    known_paths: HashSet<PathBuf>,
    plugins: Vec<Arc<Plugin>>,
    persisted: HashMap<PathBuf, CachedBinary>,
}

impl PluginCache {
    pub(crate) fn new(host: &'static HostSuite) -> Self {
        Self {
            host,
            binaries: Vec::new(),
            known_paths: HashSet::new(),
            plugins: Vec::new(),
            persisted: HashMap::new(),
        }
    }

    /// Finds candidate binaries under `paths`, recursively, without loading
    /// them. Unreadable directories are skipped.
    pub fn locate(paths: &[PathBuf]) -> Vec<BinaryIdentity> {
        let mut found = Vec::new();
        let mut pending: Vec<PathBuf> = paths.to_vec();
        let mut seen = HashSet::new();
        while let Some(path) = pending.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if path.is_file() {
                if is_plugin_file(&path) {
                    match BinaryIdentity::of_file(&path) {
                        Ok(identity) => found.push(identity),
                        Err(e) => warn!("Cannot stat {}: {}", path.display(), e),
                    }
                }
                continue;
            }
            let entries = match fs::read_dir(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                pending.push(entry.path());
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Reads a persisted cache. Entries are used by later scans whose
    /// binaries still match.
    pub fn load_persisted(&mut self, path: &Path) -> Result<usize> {
        let file = CacheFile::read(path)?;
        if file.version != CACHE_FORMAT_VERSION {
            warn!(
                "Ignoring plugin cache {} with format version {}",
                path.display(),
                file.version
            );
            return Ok(0);
        }
        let count = file.binaries.len();
        for binary in file.binaries {
            self.persisted.insert(binary.identity.path.clone(), binary);
        }
        info!("Read {} cached binaries from {}", count, path.display());
        Ok(count)
    }

    /// Snapshot of every described plugin, grouped by binary.
    pub fn to_cache_file(&self) -> CacheFile {
        let mut binaries = Vec::new();
        for binary in &self.binaries {
            let plugins: Vec<CachedPlugin> = self
                .plugins
                .iter()
                .filter(|p| Arc::ptr_eq(p.binary(), binary))
                .filter_map(|p| CachedPlugin::from_plugin(p))
                .collect();
            binaries.push(CachedBinary {
                identity: binary.identity().clone(),
                plugins,
            });
        }
        CacheFile {
            version: CACHE_FORMAT_VERSION,
            binaries,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_cache_file().write(path)?;
        info!("Wrote plugin cache to {}", path.display());
        Ok(())
    }

    /// Locates and registers every binary under `paths`.
    pub fn scan(&mut self, paths: &[PathBuf]) -> ScanReport {
        let _timer = ScopedTimer::info("Plugin scan");
        let mut report = ScanReport::default();
        for identity in Self::locate(paths) {
            report.merge(self.add_binary(identity, BinarySource::Dynamic));
        }
        info!(
            "Plugin scan: {} described, {} from cache, {} failures",
            report.described,
            report.cached,
            report.failures.len()
        );
        report
    }

    /// Registers plugins linked into the process under `name`.
    pub fn register_static(
        &mut self,
        name: &str,
        count: GetNumberOfPluginsFn,
        get: GetPluginFn,
    ) -> ScanReport {
        self.add_binary(BinaryIdentity::for_static(name), BinarySource::Static { count, get })
    }

    fn add_binary(&mut self, identity: BinaryIdentity, source: BinarySource) -> ScanReport {
        let mut report = ScanReport::default();
        if !self.known_paths.insert(identity.path.clone()) {
            debug!("{} already registered", identity.path.display());
            return report;
        }
        let cached = self
            .persisted
            .get(&identity.path)
            .filter(|c| c.identity == identity)
            .cloned();
        let binary = Arc::new(PluginBinary::new(identity, source));
        self.binaries.push(binary.clone());

        match cached {
            Some(cached) => {
                for entry in &cached.plugins {
                    let plugin = self.push_plugin(binary.clone(), entry.identity());
                    plugin.restore(entry.description(), entry.context_descriptors());
                    report.cached += 1;
                }
                debug!("{} restored from cache", binary.path().display());
            }
            None => self.describe_binary(&binary, &mut report),
        }
        report
    }

    fn push_plugin(&mut self, binary: Arc<PluginBinary>, identity: PluginIdentity) -> Arc<Plugin> {
        let id = PluginId(self.plugins.len());
        let handle = PluginHandle::new(binary, identity.index, identity.raw_identifier.clone(), self.host);
        let plugin = Arc::new(Plugin::new(handle, id, identity));
        self.plugins.push(plugin.clone());
        plugin
    }

    fn describe_binary(&mut self, binary: &Arc<PluginBinary>, report: &mut ScanReport) {
        let fail = |plugin: Option<String>, reason: String| {
            warn!(
                "Skipping {}{}: {}",
                binary.path().display(),
                plugin.as_deref().map(|p| format!(" ({})", p)).unwrap_or_default(),
                reason
            );
            ScanFailure {
                path: binary.path().to_path_buf(),
                plugin,
                reason,
            }
        };

        let count = match binary.plugin_count() {
            Ok(count) => count,
            Err(e) => {
                report.failures.push(fail(None, e.to_string()));
                return;
            }
        };

        for index in 0..count {
            let raw = match binary.raw_plugin(index) {
                Ok(raw) => raw,
                Err(e) => {
                    report.failures.push(fail(None, e.to_string()));
                    continue;
                }
            };
            let record = raw.get();
            let identity = PluginIdentity {
                index,
                api: raw.api(),
                api_version: record.api_version,
                raw_identifier: raw.identifier(),
                version_major: record.version_major,
                version_minor: record.version_minor,
            };
            if identity.api != keys::API_NAME || identity.api_version != keys::API_VERSION {
                report.failures.push(fail(
                    Some(identity.raw_identifier.clone()),
                    format!("unsupported API {} v{}", identity.api, identity.api_version),
                ));
                continue;
            }

            let id = PluginId(self.plugins.len());
            let handle = PluginHandle::new(binary.clone(), index, identity.raw_identifier.clone(), self.host);
            let plugin = Arc::new(Plugin::new(handle, id, identity));
            match plugin.load_and_describe_actions() {
                Ok(_) => {
                    self.plugins.push(plugin);
                    report.described += 1;
                }
                Err(e) => report
                    .failures
                    .push(fail(Some(plugin.raw_identifier().to_string()), e.to_string())),
            }
        }
    }

    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    pub fn plugin(&self, id: PluginId) -> Option<&Arc<Plugin>> {
        self.plugins.get(id.0)
    }

    pub fn binaries(&self) -> &[Arc<PluginBinary>] {
        &self.binaries
    }

    fn best<'a>(candidates: impl Iterator<Item = &'a Arc<Plugin>>) -> Option<Arc<Plugin>> {
        let mut best: Option<&Arc<Plugin>> = None;
        for plugin in candidates {
            if best.is_none_or(|current| plugin.trumps(current)) {
                best = Some(plugin);
            }
        }
        best.cloned()
    }

    fn matches_version(plugin: &Plugin, major: Option<u32>, minor: Option<u32>) -> bool {
        let (plugin_major, plugin_minor) = plugin.version();
        major.is_none_or(|m| m == plugin_major) && minor.is_none_or(|m| m == plugin_minor)
    }

    /// Highest version with `identifier` (case-insensitive), optionally
    /// restricted to an exact major and/or minor version.
    pub fn get_plugin_by_id(&self, identifier: &str, major: Option<u32>, minor: Option<u32>) -> Option<Arc<Plugin>> {
        let identifier = identifier.to_lowercase();
        Self::best(
            self.plugins
                .iter()
                .filter(|p| p.handle().is_usable())
                .filter(|p| p.identifier() == identifier && Self::matches_version(p, major, minor)),
        )
    }

    pub fn get_plugin_by_label(&self, label: &str, major: Option<u32>, minor: Option<u32>) -> Option<Arc<Plugin>> {
        Self::best(
            self.plugins
                .iter()
                .filter(|p| p.handle().is_usable())
                .filter(|p| p.label() == label && Self::matches_version(p, major, minor)),
        )
    }

    /// The trumping plugin of every identifier, sorted by identifier.
    pub fn plugins_by_id(&self) -> Vec<Arc<Plugin>> {
        let mut latest: BTreeMap<String, Arc<Plugin>> = BTreeMap::new();
        for plugin in self.plugins.iter().filter(|p| p.handle().is_usable()) {
            let slot = latest.entry(plugin.identifier()).or_insert_with(|| plugin.clone());
            if plugin.trumps(slot) {
                *slot = plugin.clone();
            }
        }
        latest.into_values().collect()
    }

    /// Same as [`PluginCache::get_plugin_by_id`] but reports what is missing.
    pub fn require_plugin(&self, identifier: &str) -> Result<Arc<Plugin>> {
        self.get_plugin_by_id(identifier, None, None)
            .ok_or_else(|| HostError::UnknownNodeName(identifier.to_string()))
    }

    /// Human readable listing of every plugin.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for plugin in &self.plugins {
            let (major, minor) = plugin.version();
            let _ = writeln!(
                out,
                "{} v{}.{} [{}#{}]",
                plugin.raw_identifier(),
                major,
                minor,
                plugin.binary().path().display(),
                plugin.identity().index
            );
            let _ = writeln!(out, "  contexts: {}", plugin.supported_contexts().join(", "));
            for (context, descriptor) in plugin.described_contexts() {
                let clips: Vec<&str> = descriptor.clips().iter().map(|c| c.name.as_str()).collect();
                let _ = writeln!(out, "  {} clips: {}", context, clips.join(", "));
            }
        }
        out
    }
}
