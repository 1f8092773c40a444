//! Plugin binaries, their descriptions and the persistent cache.

pub mod binary;
mod cache;
mod descriptor;
pub mod persist;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use log::{debug, warn};

use crate::abi::{Action, PluginHandle};
use crate::error::{HostError, Result};
use crate::instance::Instance;
use crate::property::{PropertySet, PropertySpec, keys};

pub use binary::{BinaryIdentity, BinarySource, PluginBinary};
pub use cache::{PluginCache, ScanFailure, ScanReport};
pub use descriptor::{ClipDescriptor, ClipId, EffectDescriptor, ParamDescriptor, ParamId};

/// Arena index of a plugin inside its [`PluginCache`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct PluginId(pub usize);

/// Fields of a binary's plugin record, readable without loading it again.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PluginIdentity {
    pub index: usize,
    pub api: String,
    pub api_version: i32,
    pub raw_identifier: String,
    pub version_major: u32,
    pub version_minor: u32,
}

/// One plugin of a binary.
///
/// Load and Describe are sent lazily and at most once. Context
/// descriptors are produced on demand and kept for the life of the plugin.
pub struct Plugin {
    handle: PluginHandle,
    id: PluginId,
    identity: PluginIdentity,
    description: RwLock<Option<Arc<EffectDescriptor>>>,
    described_this_run: AtomicBool,
    contexts: Mutex<BTreeMap<String, Arc<EffectDescriptor>>>,
    render_lock: Mutex<()>,
    describe_calls: AtomicUsize,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("identifier", &self.identity.raw_identifier)
            .field("version", &(self.identity.version_major, self.identity.version_minor))
            .field("binary", &self.handle.binary().path())
            .finish()
    }
}

impl Plugin {
    pub(crate) fn new(handle: PluginHandle, id: PluginId, identity: PluginIdentity) -> Self {
        Self {
            handle,
            id,
            identity,
            description: RwLock::new(None),
            described_this_run: AtomicBool::new(false),
            contexts: Mutex::new(BTreeMap::new()),
            render_lock: Mutex::new(()),
            describe_calls: AtomicUsize::new(0),
        }
    }

    /// Restores descriptions read from the persisted cache.
    pub(crate) fn restore(
        &self,
        description: EffectDescriptor,
        contexts: impl IntoIterator<Item = (String, EffectDescriptor)>,
    ) {
        *self.description.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(description));
        let mut cached = self.contexts();
        for (name, descriptor) in contexts {
            cached.insert(name, Arc::new(descriptor));
        }
    }

    pub fn id(&self) -> PluginId {
        self.id
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    /// Lowercase identifier used for lookups.
    pub fn identifier(&self) -> String {
        self.identity.raw_identifier.to_lowercase()
    }

    pub fn raw_identifier(&self) -> &str {
        &self.identity.raw_identifier
    }

    pub fn version(&self) -> (u32, u32) {
        (self.identity.version_major, self.identity.version_minor)
    }

    pub fn handle(&self) -> &PluginHandle {
        &self.handle
    }

    pub fn binary(&self) -> &Arc<PluginBinary> {
        self.handle.binary()
    }

    /// How many times Describe has been sent during this run.
    pub fn describe_count(&self) -> usize {
        self.describe_calls.load(AtomicOrdering::Relaxed)
    }

    /// True when this plugin should replace `other` for the same identifier.
    pub fn trumps(&self, other: &Plugin) -> bool {
        self.version().cmp(&other.version()) == Ordering::Greater
    }

    pub fn description(&self) -> Option<Arc<EffectDescriptor>> {
        self.description.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn label(&self) -> String {
        self.description()
            .map(|d| d.label())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| self.identity.raw_identifier.clone())
    }

    pub fn supported_contexts(&self) -> Vec<String> {
        self.description()
            .map(|d| d.supported_contexts())
            .unwrap_or_default()
    }

    pub fn supports_context(&self, context: &str) -> bool {
        self.supported_contexts().iter().any(|c| c == context)
    }

    fn contexts(&self) -> MutexGuard<'_, BTreeMap<String, Arc<EffectDescriptor>>> {
        self.contexts.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Context descriptors produced so far, by context name.
    pub fn described_contexts(&self) -> Vec<(String, Arc<EffectDescriptor>)> {
        self.contexts()
            .iter()
            .map(|(name, desc)| (name.clone(), desc.clone()))
            .collect()
    }

    /// Sends Load, then Describe unless already done in this run.
    ///
    /// A description restored from the cache is returned without Describe.
    /// Any failure marks the handle unusable.
    pub fn load_and_describe_actions(&self) -> Result<Arc<EffectDescriptor>> {
        self.handle.load()?;
        if let Some(description) = self.description() {
            return Ok(description);
        }
        self.describe()
    }

    fn describe(&self) -> Result<Arc<EffectDescriptor>> {
        let mut slot = self.description.write().unwrap_or_else(|p| p.into_inner());
        if self.described_this_run.load(AtomicOrdering::Acquire) {
            if let Some(description) = slot.as_ref() {
                return Ok(description.clone());
            }
        }

        let mut descriptor = EffectDescriptor::new()?;
        self.describe_calls.fetch_add(1, AtomicOrdering::Relaxed);
        match self
            .handle
            .call_action(Action::Describe, Some(&mut descriptor), None, None)
        {
            Ok(_) => {
                debug!(
                    "Described {} with contexts {:?}",
                    self.identity.raw_identifier,
                    descriptor.supported_contexts()
                );
                let descriptor = Arc::new(descriptor);
                *slot = Some(descriptor.clone());
                self.described_this_run.store(true, AtomicOrdering::Release);
                Ok(descriptor)
            }
            Err(HostError::ActionFailed { status, .. }) => {
                self.handle.mark_failed(format!("describe action returned {}", status));
                Err(HostError::DescribeActionFailed {
                    plugin: self.identity.raw_identifier.clone(),
                    status,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Descriptor for `context`, running DescribeInContext the first time.
    pub fn context_descriptor(&self, context: &str) -> Result<Arc<EffectDescriptor>> {
        let base = self.load_and_describe_actions()?;
        if !base.supported_contexts().iter().any(|c| c == context) {
            return Err(HostError::ContextUnsupported {
                plugin: self.identity.raw_identifier.clone(),
                context: context.to_string(),
            });
        }
        if let Some(descriptor) = self.contexts().get(context) {
            return Ok(descriptor.clone());
        }

        // A cached base description does not mean the binary has seen
        // Describe in this process.
        let base = if self.described_this_run.load(AtomicOrdering::Acquire) {
            base
        } else {
            self.describe()?
        };

        let mut descriptor = EffectDescriptor::for_context(&base, context)?;
        let mut in_args = PropertySet::from_specs([PropertySpec::string(keys::CONTEXT, context)])?;
        self.handle.call_action(
            Action::DescribeInContext,
            Some(&mut descriptor),
            Some(&mut in_args),
            None,
        )?;
        let descriptor = Arc::new(descriptor);
        self.contexts()
            .entry(context.to_string())
            .or_insert_with(|| descriptor.clone());
        Ok(descriptor)
    }

    /// Creates an instance in `context`.
    pub fn create_instance(self: &Arc<Self>, context: &str) -> Result<Instance> {
        let descriptor = self.context_descriptor(context)?;
        Instance::create(self.clone(), context, &descriptor)
    }

    /// Held during Render when the plugin declares itself thread-unsafe.
    pub(crate) fn render_guard(&self) -> Option<MutexGuard<'_, ()>> {
        let safety = self
            .description()
            .and_then(|d| d.properties().get_string(keys::RENDER_THREAD_SAFETY, 0).ok());
        match safety.as_deref() {
            Some(keys::THREAD_SAFETY_UNSAFE) => Some(self.render_lock.lock().unwrap_or_else(|p| {
                warn!("render lock of {} was poisoned", self.identity.raw_identifier);
                p.into_inner()
            })),
            _ => None,
        }
    }
}
