//! Host side of the suite tables: the `extern "C"` functions plugins call.
//!
//! No panic may unwind into plugin code, so every entry point runs under
//! `catch_unwind` and reports `ErrFatal` instead.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use log::error;

use super::action::Status;
use super::ffi::{
    EffectSuite, FxEffectHandle, FxPropertySetHandle, FxStatus, HOST_ABI_VERSION, HostSuite,
    PropertySuite,
};
use crate::property::{Access, PropertyError, PropertySet, PropertyValue};

/// What an effect handle refers to while an action is running: a plugin
/// descriptor during Describe, an instance afterwards.
pub trait EffectTarget {
    fn properties(&mut self) -> &mut PropertySet;
    fn define_param(&mut self, param_type: &str, name: &str) -> Result<&mut PropertySet, Status>;
    fn define_clip(&mut self, name: &str) -> Result<&mut PropertySet, Status>;
    fn param_properties(&mut self, name: &str) -> Option<&mut PropertySet>;
    fn clip_properties(&mut self, name: &str) -> Option<&mut PropertySet>;
}

/// Lives on the caller's stack for exactly one main-entry call; the effect
/// handle points at it.
pub(crate) struct EffectCall<'a> {
    pub(crate) target: &'a mut dyn EffectTarget,
}

impl From<&PropertyError> for Status {
    fn from(err: &PropertyError) -> Self {
        match err {
            PropertyError::UnknownKey(_) => Status::ErrUnknown,
            PropertyError::TypeMismatch { .. } | PropertyError::Rejected { .. } => Status::ErrValue,
            PropertyError::BadIndex { .. } | PropertyError::DimensionMismatch { .. } => {
                Status::ErrBadIndex
            }
            PropertyError::ReadOnly(_) => Status::ErrUnsupported,
        }
    }
}

impl From<PropertyError> for Status {
    fn from(err: PropertyError) -> Self {
        Status::from(&err)
    }
}

pub(crate) static PROPERTY_SUITE: PropertySuite = PropertySuite {
    set_string: prop_set_string,
    set_int: prop_set_int,
    set_double: prop_set_double,
    set_pointer: prop_set_pointer,
    get_string: prop_get_string,
    get_int: prop_get_int,
    get_double: prop_get_double,
    get_pointer: prop_get_pointer,
    get_dimension: prop_get_dimension,
    reset: prop_reset,
};

pub(crate) static EFFECT_SUITE: EffectSuite = EffectSuite {
    get_property_set: effect_get_property_set,
    param_define: effect_param_define,
    clip_define: effect_clip_define,
    param_get_handle: effect_param_get_handle,
    clip_get_handle: effect_clip_get_handle,
};

/// Publishes the host description for the rest of the process.
///
/// Plugins keep the pointer handed to `set_host` for as long as their binary
/// stays mapped, so the suite and its property set are never freed.
pub(crate) fn publish_host_suite(properties: PropertySet) -> (&'static PropertySet, &'static HostSuite) {
    let properties: &'static PropertySet = Box::leak(Box::new(properties));
    let suite: &'static HostSuite = Box::leak(Box::new(HostSuite {
        host: property_handle(properties),
        abi_version: HOST_ABI_VERSION,
        property: &PROPERTY_SUITE,
        effect: &EFFECT_SUITE,
    }));
    (properties, suite)
}

/// The handle plugins use for a set.
///
/// Writes through a handle first check the key on a shared reference, so a
/// set exposed from a shared borrow must only hold read-only keys.
pub(crate) fn property_handle(set: &PropertySet) -> FxPropertySetHandle {
    set as *const PropertySet as FxPropertySetHandle
}

pub(crate) fn property_handle_mut(set: &mut PropertySet) -> FxPropertySetHandle {
    set as *mut PropertySet as FxPropertySetHandle
}

fn guarded(f: impl FnOnce() -> Result<(), Status>) -> FxStatus {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Status::Ok.to_raw(),
        Ok(Err(status)) => status.to_raw(),
        Err(_) => {
            error!("panic inside a host suite call");
            Status::ErrFatal.to_raw()
        }
    }
}

unsafe fn c_str<'a>(value: *const c_char) -> Result<&'a str, Status> {
    if value.is_null() {
        return Err(Status::ErrBadHandle);
    }
    // SAFETY: non-null and, by contract, NUL terminated.
    unsafe { CStr::from_ptr(value) }
        .to_str()
        .map_err(|_| Status::ErrValue)
}

fn index(value: c_int) -> Result<usize, Status> {
    usize::try_from(value).map_err(|_| Status::ErrBadIndex)
}

unsafe fn set_ref<'a>(handle: FxPropertySetHandle) -> Result<&'a PropertySet, Status> {
    // SAFETY: handles are only minted by `property_handle*` from live sets.
    unsafe { (handle as *const PropertySet).as_ref() }.ok_or(Status::ErrBadHandle)
}

unsafe fn write(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: PropertyValue,
) -> Result<(), Status> {
    let key = unsafe { c_str(key) }?;
    let idx = index(idx)?;
    let set = unsafe { set_ref(handle) }?;
    if set.spec(key)?.read_only {
        return Err(Status::ErrUnsupported);
    }
    // SAFETY: the key is writable, so the handle came from a mutable borrow.
    let set = unsafe { &mut *(handle as *mut PropertySet) };
    set.set_as(Access::Plugin, key, idx, value)?;
    Ok(())
}

unsafe fn read(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
) -> Result<PropertyValue, Status> {
    let key = unsafe { c_str(key) }?;
    let idx = index(idx)?;
    let set = unsafe { set_ref(handle) }?;
    Ok(set.get(key, idx)?)
}

unsafe fn out<T>(target: *mut T, value: T) -> Result<(), Status> {
    if target.is_null() {
        return Err(Status::ErrBadHandle);
    }
    // SAFETY: non-null out-pointer provided by the caller.
    unsafe { target.write(value) };
    Ok(())
}

unsafe extern "C" fn prop_set_string(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: *const c_char,
) -> FxStatus {
    guarded(|| unsafe {
        let value = c_str(value)?;
        write(handle, key, idx, value.into())
    })
}

unsafe extern "C" fn prop_set_int(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: c_int,
) -> FxStatus {
    guarded(|| unsafe { write(handle, key, idx, PropertyValue::Int(value)) })
}

unsafe extern "C" fn prop_set_double(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: f64,
) -> FxStatus {
    guarded(|| unsafe { write(handle, key, idx, value.into()) })
}

unsafe extern "C" fn prop_set_pointer(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: *mut c_void,
) -> FxStatus {
    guarded(|| unsafe { write(handle, key, idx, PropertyValue::Pointer(value as usize)) })
}

unsafe extern "C" fn prop_get_string(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    buffer: *mut c_char,
    capacity: usize,
    length: *mut usize,
) -> FxStatus {
    guarded(|| unsafe {
        let value = read(handle, key, idx)?;
        let text = value.as_str().ok_or(Status::ErrValue)?;
        let bytes = text.as_bytes();
        if !buffer.is_null() && capacity > 0 {
            let copied = bytes.len().min(capacity);
            ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), copied);
            if copied < capacity {
                buffer.add(copied).write(0);
            }
        }
        out(length, bytes.len())
    })
}

unsafe extern "C" fn prop_get_int(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: *mut c_int,
) -> FxStatus {
    guarded(|| unsafe {
        let v = read(handle, key, idx)?.as_int().ok_or(Status::ErrValue)?;
        out(value, v)
    })
}

unsafe extern "C" fn prop_get_double(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: *mut f64,
) -> FxStatus {
    guarded(|| unsafe {
        let v = read(handle, key, idx)?.as_double().ok_or(Status::ErrValue)?;
        out(value, v)
    })
}

unsafe extern "C" fn prop_get_pointer(
    handle: FxPropertySetHandle,
    key: *const c_char,
    idx: c_int,
    value: *mut *mut c_void,
) -> FxStatus {
    guarded(|| unsafe {
        let v = read(handle, key, idx)?.as_pointer().ok_or(Status::ErrValue)?;
        out(value, v as *mut c_void)
    })
}

unsafe extern "C" fn prop_get_dimension(
    handle: FxPropertySetHandle,
    key: *const c_char,
    count: *mut c_int,
) -> FxStatus {
    guarded(|| unsafe {
        let key = c_str(key)?;
        let n = set_ref(handle)?.dimension(key)?;
        out(count, c_int::try_from(n).map_err(|_| Status::ErrValue)?)
    })
}

unsafe extern "C" fn prop_reset(handle: FxPropertySetHandle, key: *const c_char) -> FxStatus {
    guarded(|| unsafe {
        let key = c_str(key)?;
        if set_ref(handle)?.spec(key)?.read_only {
            return Err(Status::ErrUnsupported);
        }
        let set = &mut *(handle as *mut PropertySet);
        Ok(set.reset(key)?)
    })
}

unsafe fn effect<'a>(handle: FxEffectHandle) -> Result<&'a mut EffectCall<'a>, Status> {
    // SAFETY: effect handles point at an `EffectCall` that outlives the
    // main-entry call they were passed to.
    unsafe { handle.cast::<EffectCall<'a>>().as_mut() }.ok_or(Status::ErrBadHandle)
}

unsafe extern "C" fn effect_get_property_set(
    handle: FxEffectHandle,
    properties: *mut FxPropertySetHandle,
) -> FxStatus {
    guarded(|| unsafe {
        let call = effect(handle)?;
        let set = call.target.properties();
        out(properties, property_handle_mut(set))
    })
}

unsafe extern "C" fn effect_param_define(
    handle: FxEffectHandle,
    param_type: *const c_char,
    name: *const c_char,
    properties: *mut FxPropertySetHandle,
) -> FxStatus {
    guarded(|| unsafe {
        let param_type = c_str(param_type)?;
        let name = c_str(name)?;
        let call = effect(handle)?;
        let set = call.target.define_param(param_type, name)?;
        let set = property_handle_mut(set);
        if properties.is_null() {
            return Ok(());
        }
        out(properties, set)
    })
}

unsafe extern "C" fn effect_clip_define(
    handle: FxEffectHandle,
    name: *const c_char,
    properties: *mut FxPropertySetHandle,
) -> FxStatus {
    guarded(|| unsafe {
        let name = c_str(name)?;
        let call = effect(handle)?;
        let set = property_handle_mut(call.target.define_clip(name)?);
        if properties.is_null() {
            return Ok(());
        }
        out(properties, set)
    })
}

unsafe extern "C" fn effect_param_get_handle(
    handle: FxEffectHandle,
    name: *const c_char,
    properties: *mut FxPropertySetHandle,
) -> FxStatus {
    guarded(|| unsafe {
        let name = c_str(name)?;
        let call = effect(handle)?;
        let set = call.target.param_properties(name).ok_or(Status::ErrUnknown)?;
        out(properties, property_handle_mut(set))
    })
}

unsafe extern "C" fn effect_clip_get_handle(
    handle: FxEffectHandle,
    name: *const c_char,
    properties: *mut FxPropertySetHandle,
) -> FxStatus {
    guarded(|| unsafe {
        let name = c_str(name)?;
        let call = effect(handle)?;
        let set = call.target.clip_properties(name).ok_or(Status::ErrUnknown)?;
        out(properties, property_handle_mut(set))
    })
}
