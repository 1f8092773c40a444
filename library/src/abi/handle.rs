use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use super::action::{Action, Status};
use super::ffi::{FxEffectHandle, FxPropertySetHandle, HostSuite};
use super::suite::{EffectCall, EffectTarget, property_handle_mut};
use crate::error::{HostError, Result};
use crate::plugin::binary::{PluginBinary, RawPluginRef};
use crate::property::PropertySet;

enum LoadState {
    Unloaded,
    Loaded(RawPluginRef),
    Failed(String),
}

/// Calls into one plugin of a binary.
///
/// The binary is opened and the Load action sent on first use; a failed
/// Load leaves the handle unusable for the rest of the process. Unload is
/// sent when the handle is dropped.
pub struct PluginHandle {
    binary: Arc<PluginBinary>,
    index: usize,
    identifier: String,
    host: &'static HostSuite,
    state: Mutex<LoadState>,
}

impl PluginHandle {
    pub(crate) fn new(
        binary: Arc<PluginBinary>,
        index: usize,
        identifier: String,
        host: &'static HostSuite,
    ) -> Self {
        Self {
            binary,
            index,
            identifier,
            host,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    pub fn binary(&self) -> &Arc<PluginBinary> {
        &self.binary
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.state(), LoadState::Loaded(_))
    }

    pub fn is_usable(&self) -> bool {
        !matches!(*self.state(), LoadState::Failed(_))
    }

    /// Sends Load once. Later calls return the first outcome.
    pub(crate) fn load(&self) -> Result<RawPluginRef> {
        let mut state = self.state();
        match &*state {
            LoadState::Loaded(raw) => return Ok(*raw),
            LoadState::Failed(reason) => {
                return Err(HostError::PluginLoad {
                    plugin: self.identifier.clone(),
                    reason: reason.clone(),
                });
            }
            LoadState::Unloaded => {}
        }

        let raw = match self.binary.raw_plugin(self.index) {
            Ok(raw) => raw,
            Err(e) => {
                *state = LoadState::Failed(e.to_string());
                return Err(e);
            }
        };
        // SAFETY: the suite outlives the process; the record comes from a
        // loaded binary.
        unsafe { (raw.get().set_host)(self.host) };
        let status = invoke(raw, Action::Load, None, None, None);
        if status.is_success() {
            debug!("Loaded plugin {}", self.identifier);
            *state = LoadState::Loaded(raw);
            Ok(raw)
        } else {
            let reason = format!("load action returned {}", status);
            warn!("Plugin {}: {}", self.identifier, reason);
            *state = LoadState::Failed(reason.clone());
            Err(HostError::PluginLoad {
                plugin: self.identifier.clone(),
                reason,
            })
        }
    }

    /// Flags the handle so it is never called again.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        let mut state = self.state();
        if let LoadState::Loaded(raw) = &*state {
            invoke(*raw, Action::Unload, None, None, None);
        }
        *state = LoadState::Failed(reason.into());
    }

    /// Runs `action`, loading the plugin first if needed. Statuses other
    /// than OK and ReplyDefault become [`HostError::ActionFailed`].
    pub fn call_action(
        &self,
        action: Action,
        target: Option<&mut dyn EffectTarget>,
        in_args: Option<&mut PropertySet>,
        out_args: Option<&mut PropertySet>,
    ) -> Result<Status> {
        let raw = self.load()?;
        let status = invoke(raw, action, target, in_args, out_args);
        if status.is_success() {
            Ok(status)
        } else {
            Err(HostError::ActionFailed {
                plugin: self.identifier.clone(),
                action: action.name(),
                status,
            })
        }
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let LoadState::Loaded(raw) = state {
            debug!("Unloading plugin {}", self.identifier);
            let status = invoke(*raw, Action::Unload, None, None, None);
            if !status.is_success() {
                warn!("Unload of {} returned {}", self.identifier, status);
            }
        }
    }
}

pub(crate) fn invoke(
    raw: RawPluginRef,
    action: Action,
    target: Option<&mut dyn EffectTarget>,
    in_args: Option<&mut PropertySet>,
    out_args: Option<&mut PropertySet>,
) -> Status {
    let mut call = target.map(|target| EffectCall { target });
    let handle: FxEffectHandle = match call.as_mut() {
        Some(call) => call as *mut EffectCall<'_> as FxEffectHandle,
        None => ptr::null_mut(),
    };
    let in_args: FxPropertySetHandle = in_args.map_or(ptr::null_mut(), property_handle_mut);
    let out_args: FxPropertySetHandle = out_args.map_or(ptr::null_mut(), property_handle_mut);
    // SAFETY: every handle points at data borrowed for the duration of
    // this call.
    let code = unsafe { (raw.get().main_entry)(action.c_name().as_ptr(), handle, in_args, out_args) };
    Status::from_raw(code)
}
