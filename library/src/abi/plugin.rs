//! Safe wrappers for plugins written in Rust.
//!
//! A plugin binary stores the suite pointer it receives in `set_host` in a
//! [`HostSlot`] and reaches the host through [`HostApi`] from its main entry.

use std::ffi::{CString, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use super::action::Status;
use super::ffi::{EffectSuite, FxEffectHandle, FxPropertySetHandle, HostSuite, PropertySuite};
use crate::image::{BitDepth, PixelComponents, RectI};
use crate::property::keys;

pub type PluginResult<T> = Result<T, Status>;

fn check(code: c_int) -> PluginResult<()> {
    match Status::from_raw(code) {
        Status::Ok => Ok(()),
        other => Err(other),
    }
}

fn c_string(value: &str) -> PluginResult<CString> {
    CString::new(value).map_err(|_| Status::ErrValue)
}

fn c_index(index: usize) -> PluginResult<c_int> {
    c_int::try_from(index).map_err(|_| Status::ErrBadIndex)
}

pub struct HostSlot(AtomicPtr<HostSuite>);

impl HostSlot {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    pub fn store(&self, host: *const HostSuite) {
        self.0.store(host.cast_mut(), Ordering::Release);
    }

    pub fn get(&self) -> Option<HostApi> {
        // SAFETY: only pointers received through `set_host` are stored.
        unsafe { HostApi::from_raw(self.0.load(Ordering::Acquire)) }
    }
}

impl Default for HostSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub struct HostApi {
    suite: &'static HostSuite,
}

impl HostApi {
    /// # Safety
    ///
    /// `host` must be null or a pointer received through `set_host`.
    pub unsafe fn from_raw(host: *const HostSuite) -> Option<Self> {
        // SAFETY: see the function contract; host suites are never freed.
        unsafe { host.as_ref() }.map(|suite| Self { suite })
    }

    fn property_suite(&self) -> &'static PropertySuite {
        // SAFETY: published suites point at static tables.
        unsafe { &*self.suite.property }
    }

    fn effect_suite(&self) -> &'static EffectSuite {
        // SAFETY: as above.
        unsafe { &*self.suite.effect }
    }

    pub fn host_properties(&self) -> PropertySetRef {
        PropertySetRef {
            handle: self.suite.host,
            suite: self.property_suite(),
        }
    }

    /// Wraps an argument set passed to the main entry. Null yields `None`.
    pub fn properties(&self, handle: FxPropertySetHandle) -> Option<PropertySetRef> {
        (!handle.is_null()).then(|| PropertySetRef {
            handle,
            suite: self.property_suite(),
        })
    }

    pub fn effect(&self, handle: FxEffectHandle) -> Option<EffectRef> {
        (!handle.is_null()).then(|| EffectRef { handle, host: *self })
    }
}

#[derive(Clone, Copy)]
pub struct PropertySetRef {
    handle: FxPropertySetHandle,
    suite: &'static PropertySuite,
}

impl PropertySetRef {
    pub fn get_string(&self, key: &str, index: usize) -> PluginResult<String> {
        let key = c_string(key)?;
        let index = c_index(index)?;
        let mut buffer = vec![0u8; 64];
        loop {
            let mut length = 0usize;
            // SAFETY: buffer and out-pointer are valid for the call.
            check(unsafe {
                (self.suite.get_string)(
                    self.handle,
                    key.as_ptr(),
                    index,
                    buffer.as_mut_ptr().cast(),
                    buffer.len(),
                    &mut length,
                )
            })?;
            if length < buffer.len() {
                buffer.truncate(length);
                return String::from_utf8(buffer).map_err(|_| Status::ErrValue);
            }
            buffer = vec![0u8; length + 1];
        }
    }

    pub fn get_int(&self, key: &str, index: usize) -> PluginResult<i32> {
        let key = c_string(key)?;
        let mut value = 0;
        // SAFETY: out-pointer valid for the call.
        check(unsafe { (self.suite.get_int)(self.handle, key.as_ptr(), c_index(index)?, &mut value) })?;
        Ok(value)
    }

    pub fn get_double(&self, key: &str, index: usize) -> PluginResult<f64> {
        let key = c_string(key)?;
        let mut value = 0.0;
        // SAFETY: out-pointer valid for the call.
        check(unsafe {
            (self.suite.get_double)(self.handle, key.as_ptr(), c_index(index)?, &mut value)
        })?;
        Ok(value)
    }

    pub fn get_pointer(&self, key: &str, index: usize) -> PluginResult<*mut c_void> {
        let key = c_string(key)?;
        let mut value = ptr::null_mut();
        // SAFETY: out-pointer valid for the call.
        check(unsafe {
            (self.suite.get_pointer)(self.handle, key.as_ptr(), c_index(index)?, &mut value)
        })?;
        Ok(value)
    }

    pub fn dimension(&self, key: &str) -> PluginResult<usize> {
        let key = c_string(key)?;
        let mut count = 0;
        // SAFETY: out-pointer valid for the call.
        check(unsafe { (self.suite.get_dimension)(self.handle, key.as_ptr(), &mut count) })?;
        usize::try_from(count).map_err(|_| Status::ErrValue)
    }

    pub fn get_strings(&self, key: &str) -> PluginResult<Vec<String>> {
        (0..self.dimension(key)?)
            .map(|i| self.get_string(key, i))
            .collect()
    }

    pub fn get_ints(&self, key: &str) -> PluginResult<Vec<i32>> {
        (0..self.dimension(key)?).map(|i| self.get_int(key, i)).collect()
    }

    pub fn get_doubles(&self, key: &str) -> PluginResult<Vec<f64>> {
        (0..self.dimension(key)?)
            .map(|i| self.get_double(key, i))
            .collect()
    }

    pub fn set_string(&self, key: &str, index: usize, value: &str) -> PluginResult<()> {
        let key = c_string(key)?;
        let value = c_string(value)?;
        // SAFETY: both strings outlive the call.
        check(unsafe {
            (self.suite.set_string)(self.handle, key.as_ptr(), c_index(index)?, value.as_ptr())
        })
    }

    pub fn set_strings(&self, key: &str, values: &[&str]) -> PluginResult<()> {
        values
            .iter()
            .enumerate()
            .try_for_each(|(i, value)| self.set_string(key, i, value))
    }

    pub fn set_int(&self, key: &str, index: usize, value: i32) -> PluginResult<()> {
        let key = c_string(key)?;
        // SAFETY: key outlives the call.
        check(unsafe { (self.suite.set_int)(self.handle, key.as_ptr(), c_index(index)?, value) })
    }

    pub fn set_double(&self, key: &str, index: usize, value: f64) -> PluginResult<()> {
        let key = c_string(key)?;
        // SAFETY: key outlives the call.
        check(unsafe { (self.suite.set_double)(self.handle, key.as_ptr(), c_index(index)?, value) })
    }

    pub fn set_doubles(&self, key: &str, values: &[f64]) -> PluginResult<()> {
        values
            .iter()
            .enumerate()
            .try_for_each(|(i, value)| self.set_double(key, i, *value))
    }

    pub fn set_pointer(&self, key: &str, index: usize, value: *mut c_void) -> PluginResult<()> {
        let key = c_string(key)?;
        // SAFETY: key outlives the call.
        check(unsafe {
            (self.suite.set_pointer)(self.handle, key.as_ptr(), c_index(index)?, value)
        })
    }

    pub fn reset(&self, key: &str) -> PluginResult<()> {
        let key = c_string(key)?;
        // SAFETY: key outlives the call.
        check(unsafe { (self.suite.reset)(self.handle, key.as_ptr()) })
    }

    /// The image currently attached to a clip during Render.
    pub fn image(&self) -> PluginResult<ClipImage> {
        let bounds = RectI::from_slice(&self.get_ints(keys::IMAGE_BOUNDS)?).ok_or(Status::ErrValue)?;
        let components =
            PixelComponents::from_name(&self.get_string(keys::IMAGE_COMPONENTS, 0)?).ok_or(Status::ErrValue)?;
        let depth = BitDepth::from_name(&self.get_string(keys::IMAGE_DEPTH, 0)?).ok_or(Status::ErrValue)?;
        let row_bytes = usize::try_from(self.get_int(keys::IMAGE_ROW_BYTES, 0)?).map_err(|_| Status::ErrValue)?;
        let data = self.get_pointer(keys::IMAGE_DATA, 0)?;
        if data.is_null() {
            return Err(Status::Failed);
        }
        Ok(ClipImage {
            data: data.cast(),
            bounds,
            components,
            depth,
            row_bytes,
        })
    }
}

#[derive(Clone, Copy)]
pub struct EffectRef {
    handle: FxEffectHandle,
    host: HostApi,
}

impl EffectRef {
    fn handle_out(
        &self,
        call: impl FnOnce(*mut FxPropertySetHandle) -> c_int,
    ) -> PluginResult<PropertySetRef> {
        let mut handle: FxPropertySetHandle = ptr::null_mut();
        check(call(&mut handle))?;
        self.host.properties(handle).ok_or(Status::ErrBadHandle)
    }

    pub fn properties(&self) -> PluginResult<PropertySetRef> {
        let suite = self.host.effect_suite();
        // SAFETY: effect handle valid for the current action.
        self.handle_out(|out| unsafe { (suite.get_property_set)(self.handle, out) })
    }

    pub fn define_param(&self, param_type: &str, name: &str) -> PluginResult<PropertySetRef> {
        let suite = self.host.effect_suite();
        let param_type = c_string(param_type)?;
        let name = c_string(name)?;
        // SAFETY: strings and handle valid for the call.
        self.handle_out(|out| unsafe {
            (suite.param_define)(self.handle, param_type.as_ptr(), name.as_ptr(), out)
        })
    }

    pub fn define_clip(&self, name: &str) -> PluginResult<PropertySetRef> {
        let suite = self.host.effect_suite();
        let name = c_string(name)?;
        // SAFETY: string and handle valid for the call.
        self.handle_out(|out| unsafe { (suite.clip_define)(self.handle, name.as_ptr(), out) })
    }

    pub fn param(&self, name: &str) -> PluginResult<PropertySetRef> {
        let suite = self.host.effect_suite();
        let name = c_string(name)?;
        // SAFETY: string and handle valid for the call.
        self.handle_out(|out| unsafe { (suite.param_get_handle)(self.handle, name.as_ptr(), out) })
    }

    pub fn clip(&self, name: &str) -> PluginResult<PropertySetRef> {
        let suite = self.host.effect_suite();
        let name = c_string(name)?;
        // SAFETY: string and handle valid for the call.
        self.handle_out(|out| unsafe { (suite.clip_get_handle)(self.handle, name.as_ptr(), out) })
    }
}

/// Pixels of a clip during Render. Only valid until the action returns.
pub struct ClipImage {
    data: *mut u8,
    pub bounds: RectI,
    pub components: PixelComponents,
    pub depth: BitDepth,
    pub row_bytes: usize,
}

impl ClipImage {
    pub fn len(&self) -> usize {
        self.row_bytes * self.bounds.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Safety
    ///
    /// Must be called inside the Render action that produced this image.
    pub unsafe fn bytes(&self) -> &[u8] {
        // SAFETY: the host keeps `len` bytes alive at `data` during Render.
        unsafe { std::slice::from_raw_parts(self.data, self.len()) }
    }

    /// # Safety
    ///
    /// As [`ClipImage::bytes`]; only the output clip may be written.
    pub unsafe fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: the output buffer is exclusively owned by this Render.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.len()) }
    }
}
