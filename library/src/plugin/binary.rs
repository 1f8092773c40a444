use std::ffi::{CStr, c_int};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use libloading::{Library, Symbol};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::abi::ffi::{GET_NUMBER_OF_PLUGINS, GET_PLUGIN, GetNumberOfPluginsFn, GetPluginFn, RawPlugin};
use crate::error::{HostError, Result};

/// What identifies a binary on disk. A change in any field invalidates its
/// cached description.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BinaryIdentity {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: u64,
}

impl BinaryIdentity {
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime,
        })
    }

    pub fn for_static(name: &str) -> Self {
        Self {
            path: PathBuf::from(format!("static:{}", name)),
            size: 0,
            mtime: 0,
        }
    }
}

/// Where the entry points come from.
#[derive(Clone, Copy)]
pub enum BinarySource {
    Dynamic,
    Static {
        count: GetNumberOfPluginsFn,
        get: GetPluginFn,
    },
}

struct EntryPoints {
    _library: Option<Library>,
    count: GetNumberOfPluginsFn,
    get: GetPluginFn,
}

/// Pointer to a plugin record owned by a binary.
#[derive(Clone, Copy)]
pub(crate) struct RawPluginRef(*const RawPlugin);

// SAFETY: the record is static data of a binary that stays mapped while any
// `Plugin` referring to it is alive.
unsafe impl Send for RawPluginRef {}
unsafe impl Sync for RawPluginRef {}

impl RawPluginRef {
    pub(crate) fn get(&self) -> &RawPlugin {
        // SAFETY: non-null checked on construction, see type-level note.
        unsafe { &*self.0 }
    }

    pub(crate) fn api(&self) -> String {
        lossy(self.get().api)
    }

    pub(crate) fn identifier(&self) -> String {
        lossy(self.get().identifier)
    }
}

fn lossy(value: *const std::ffi::c_char) -> String {
    if value.is_null() {
        return String::new();
    }
    // SAFETY: plugin records carry NUL terminated static strings.
    unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned()
}

/// A file (or in-process table) exporting zero or more plugins.
///
/// The library is opened on first use and stays open until the last
/// `Plugin` referring to it is dropped.
pub struct PluginBinary {
    identity: BinaryIdentity,
    source: BinarySource,
    entry: OnceLock<std::result::Result<EntryPoints, String>>,
}

impl fmt::Debug for PluginBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBinary")
            .field("path", &self.identity.path)
            .field("size", &self.identity.size)
            .field("mtime", &self.identity.mtime)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl PluginBinary {
    pub fn new(identity: BinaryIdentity, source: BinarySource) -> Self {
        Self {
            identity,
            source,
            entry: OnceLock::new(),
        }
    }

    pub fn identity(&self) -> &BinaryIdentity {
        &self.identity
    }

    pub fn path(&self) -> &Path {
        &self.identity.path
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.entry.get(), Some(Ok(_)))
    }

    fn entry_points(&self) -> Result<&EntryPoints> {
        self.entry
            .get_or_init(|| self.open())
            .as_ref()
            .map_err(|reason| HostError::PluginLoad {
                plugin: self.identity.path.display().to_string(),
                reason: reason.clone(),
            })
    }

    fn open(&self) -> std::result::Result<EntryPoints, String> {
        match self.source {
            BinarySource::Static { count, get } => Ok(EntryPoints {
                _library: None,
                count,
                get,
            }),
            BinarySource::Dynamic => {
                debug!("Opening plugin binary {}", self.identity.path.display());
                // SAFETY: loading a plugin runs its initialisers; binaries on
                // the plugin path are trusted.
                let library = unsafe { Library::new(&self.identity.path) }
                    .map_err(|e| e.to_string())?;
                // SAFETY: the symbols are declared with these signatures by
                // the binary contract.
                let (count, get) = unsafe {
                    let count: Symbol<GetNumberOfPluginsFn> = library
                        .get(GET_NUMBER_OF_PLUGINS)
                        .map_err(|_| "missing entry point FxGetNumberOfPlugins".to_string())?;
                    let get: Symbol<GetPluginFn> = library
                        .get(GET_PLUGIN)
                        .map_err(|_| "missing entry point FxGetPlugin".to_string())?;
                    (*count, *get)
                };
                Ok(EntryPoints {
                    _library: Some(library),
                    count,
                    get,
                })
            }
        }
    }

    pub fn plugin_count(&self) -> Result<usize> {
        let entry = self.entry_points()?;
        // SAFETY: entry point resolved from a loaded binary.
        let n = unsafe { (entry.count)() };
        Ok(usize::try_from(n).unwrap_or(0))
    }

    pub(crate) fn raw_plugin(&self, index: usize) -> Result<RawPluginRef> {
        let entry = self.entry_points()?;
        let c_index = c_int::try_from(index).map_err(|_| HostError::PluginLoad {
            plugin: self.identity.path.display().to_string(),
            reason: format!("plugin index {} out of range", index),
        })?;
        // SAFETY: entry point resolved from a loaded binary.
        let raw = unsafe { (entry.get)(c_index) };
        if raw.is_null() {
            return Err(HostError::PluginLoad {
                plugin: self.identity.path.display().to_string(),
                reason: format!("no plugin record at index {}", index),
            });
        }
        Ok(RawPluginRef(raw))
    }
}
