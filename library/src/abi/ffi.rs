//! Raw C calling contract between the host and plugin binaries.
//!
//! Everything here is `#[repr(C)]`. Plugins written against these
//! definitions in any language can be loaded by the host.

use std::ffi::{c_char, c_int, c_uint, c_void};

pub type FxStatus = c_int;

pub const STAT_OK: FxStatus = 0;
pub const STAT_FAILED: FxStatus = 1;
pub const STAT_ERR_FATAL: FxStatus = 2;
pub const STAT_ERR_UNKNOWN: FxStatus = 3;
pub const STAT_ERR_MISSING_HOST_FEATURE: FxStatus = 4;
pub const STAT_ERR_UNSUPPORTED: FxStatus = 5;
pub const STAT_ERR_EXISTS: FxStatus = 6;
pub const STAT_ERR_FORMAT: FxStatus = 7;
pub const STAT_ERR_MEMORY: FxStatus = 8;
pub const STAT_ERR_BAD_HANDLE: FxStatus = 9;
pub const STAT_ERR_BAD_INDEX: FxStatus = 10;
pub const STAT_ERR_VALUE: FxStatus = 11;
pub const STAT_REPLY_YES: FxStatus = 12;
pub const STAT_REPLY_NO: FxStatus = 13;
pub const STAT_REPLY_DEFAULT: FxStatus = 14;

/// Version of the suite tables below.
pub const HOST_ABI_VERSION: c_int = 1;

/// Symbol returning how many plugins a binary exports.
pub const GET_NUMBER_OF_PLUGINS: &[u8] = b"FxGetNumberOfPlugins\0";
/// Symbol returning the plugin record at an index.
pub const GET_PLUGIN: &[u8] = b"FxGetPlugin\0";

pub type GetNumberOfPluginsFn = unsafe extern "C" fn() -> c_int;
pub type GetPluginFn = unsafe extern "C" fn(index: c_int) -> *const RawPlugin;

#[repr(C)]
pub struct FxPropertySet {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FxEffect {
    _private: [u8; 0],
}

pub type FxPropertySetHandle = *mut FxPropertySet;
pub type FxEffectHandle = *mut FxEffect;

pub type SetHostFn = unsafe extern "C" fn(host: *const HostSuite);
pub type MainEntryFn = unsafe extern "C" fn(
    action: *const c_char,
    handle: FxEffectHandle,
    in_args: FxPropertySetHandle,
    out_args: FxPropertySetHandle,
) -> FxStatus;

/// Record a binary exports for each plugin it contains.
#[repr(C)]
pub struct RawPlugin {
    pub api: *const c_char,
    pub api_version: c_int,
    pub identifier: *const c_char,
    pub version_major: c_uint,
    pub version_minor: c_uint,
    pub set_host: SetHostFn,
    pub main_entry: MainEntryFn,
}

// SAFETY: the record is immutable static data; its string pointers refer to
// static C strings inside the binary that exports it.
unsafe impl Sync for RawPlugin {}

/// Handed to every plugin through `set_host`; valid for the whole process.
#[repr(C)]
pub struct HostSuite {
    pub host: FxPropertySetHandle,
    pub abi_version: c_int,
    pub property: *const PropertySuite,
    pub effect: *const EffectSuite,
}

// SAFETY: the host property set behind `host` is never written after the
// suite is published, and the suite tables are statics.
unsafe impl Sync for HostSuite {}
unsafe impl Send for HostSuite {}

#[repr(C)]
pub struct PropertySuite {
    pub set_string: unsafe extern "C" fn(
        FxPropertySetHandle,
        key: *const c_char,
        index: c_int,
        value: *const c_char,
    ) -> FxStatus,
    pub set_int:
        unsafe extern "C" fn(FxPropertySetHandle, key: *const c_char, index: c_int, value: c_int) -> FxStatus,
    pub set_double:
        unsafe extern "C" fn(FxPropertySetHandle, key: *const c_char, index: c_int, value: f64) -> FxStatus,
    pub set_pointer: unsafe extern "C" fn(
        FxPropertySetHandle,
        key: *const c_char,
        index: c_int,
        value: *mut c_void,
    ) -> FxStatus,
    /// Copies the string (without terminator when it does not fit) into
    /// `buffer` and writes its full byte length to `length`.
    pub get_string: unsafe extern "C" fn(
        FxPropertySetHandle,
        key: *const c_char,
        index: c_int,
        buffer: *mut c_char,
        capacity: usize,
        length: *mut usize,
    ) -> FxStatus,
    pub get_int: unsafe extern "C" fn(
        FxPropertySetHandle,
        key: *const c_char,
        index: c_int,
        value: *mut c_int,
    ) -> FxStatus,
    pub get_double: unsafe extern "C" fn(
        FxPropertySetHandle,
        key: *const c_char,
        index: c_int,
        value: *mut f64,
    ) -> FxStatus,
    pub get_pointer: unsafe extern "C" fn(
        FxPropertySetHandle,
        key: *const c_char,
        index: c_int,
        value: *mut *mut c_void,
    ) -> FxStatus,
    pub get_dimension:
        unsafe extern "C" fn(FxPropertySetHandle, key: *const c_char, count: *mut c_int) -> FxStatus,
    pub reset: unsafe extern "C" fn(FxPropertySetHandle, key: *const c_char) -> FxStatus,
}

#[repr(C)]
pub struct EffectSuite {
    pub get_property_set:
        unsafe extern "C" fn(FxEffectHandle, properties: *mut FxPropertySetHandle) -> FxStatus,
    pub param_define: unsafe extern "C" fn(
        FxEffectHandle,
        param_type: *const c_char,
        name: *const c_char,
        properties: *mut FxPropertySetHandle,
    ) -> FxStatus,
    pub clip_define: unsafe extern "C" fn(
        FxEffectHandle,
        name: *const c_char,
        properties: *mut FxPropertySetHandle,
    ) -> FxStatus,
    pub param_get_handle: unsafe extern "C" fn(
        FxEffectHandle,
        name: *const c_char,
        properties: *mut FxPropertySetHandle,
    ) -> FxStatus,
    pub clip_get_handle: unsafe extern "C" fn(
        FxEffectHandle,
        name: *const c_char,
        properties: *mut FxPropertySetHandle,
    ) -> FxStatus,
}
