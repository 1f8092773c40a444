//! A filter that inverts the colour channels of RGBA byte images.
//!
//! Build it as a cdylib and put it on the host's plugin path.

use std::ffi::{c_char, c_int, CStr};

use fxhost::abi::ffi::{FxEffectHandle, FxPropertySetHandle, FxStatus, HostSuite, RawPlugin};
use fxhost::abi::plugin::{EffectRef, HostApi, HostSlot, PluginResult};
use fxhost::abi::{Action, Status};
use fxhost::image::{BitDepth, PixelComponents};
use fxhost::property::keys;

pub const IDENTIFIER: &str = "org.fxhost.sample.Invert";

static HOST: HostSlot = HostSlot::new();

unsafe extern "C" fn set_host(host: *const HostSuite) {
    HOST.store(host);
}

fn describe(effect: EffectRef) -> PluginResult<()> {
    let properties = effect.properties()?;
    properties.set_string(keys::LABEL, 0, "Invert")?;
    properties.reset(keys::SUPPORTED_CONTEXTS)?;
    properties.set_strings(keys::SUPPORTED_CONTEXTS, &[keys::CONTEXT_FILTER, keys::CONTEXT_GENERAL])?;
    properties.set_string(keys::RENDER_THREAD_SAFETY, 0, keys::THREAD_SAFETY_FULL)
}

fn describe_in_context(effect: EffectRef) -> PluginResult<()> {
    for name in [keys::OUTPUT_CLIP, keys::SOURCE_CLIP] {
        let clip = effect.define_clip(name)?;
        clip.set_strings(keys::CLIP_SUPPORTED_COMPONENTS, &["RGBA"])?;
    }

    let amount = effect.define_param("double", "amount")?;
    amount.set_double(keys::PARAM_DEFAULT, 0, 1.0)?;
    amount.set_double(keys::PARAM_MIN, 0, 0.0)?;
    amount.set_double(keys::PARAM_MAX, 0, 1.0)?;
    amount.set_string(keys::PARAM_HINT, 0, "Blend between the source (0) and its inverse (1)")?;

    let alpha = effect.define_param("boolean", "alpha")?;
    alpha.set_string(keys::PARAM_HINT, 0, "Invert the alpha channel too")
}

/// Inverts one RGBA byte pixel, blended with the original by `amount`.
fn invert_pixel(source: &[u8], target: &mut [u8], amount: f64, alpha: bool) {
    for (channel, (s, t)) in source.iter().zip(target.iter_mut()).enumerate() {
        if channel == 3 && !alpha {
            *t = *s;
            continue;
        }
        let inverted = 255.0 - f64::from(*s);
        let blended = f64::from(*s) + (inverted - f64::from(*s)) * amount;
        *t = blended.round().clamp(0.0, 255.0) as u8;
    }
}

fn render(effect: EffectRef) -> PluginResult<()> {
    let amount = effect.param("amount")?.get_double(keys::PARAM_VALUE, 0)?;
    let alpha = effect.param("alpha")?.get_int(keys::PARAM_VALUE, 0)? != 0;

    let mut output = effect.clip(keys::OUTPUT_CLIP)?.image()?;
    let source = effect.clip(keys::SOURCE_CLIP)?.image()?;
    for image in [&output, &source] {
        if image.components != PixelComponents::Rgba || image.depth != BitDepth::Byte {
            return Err(Status::ErrUnsupported);
        }
    }

    let (out_bounds, out_row) = (output.bounds, output.row_bytes);
    let (src_bounds, src_row) = (source.bounds, source.row_bytes);
    // SAFETY: both images belong to the Render action in progress.
    let input = unsafe { source.bytes() };
    let out = unsafe { output.bytes_mut() };

    let x1 = out_bounds.x1.max(src_bounds.x1);
    let x2 = out_bounds.x2.min(src_bounds.x2);
    for y in out_bounds.y1..out_bounds.y2 {
        let out_start = (y - out_bounds.y1) as usize * out_row;
        let row = &mut out[out_start..out_start + out_row];
        row.fill(0);
        if y < src_bounds.y1 || y >= src_bounds.y2 || x1 >= x2 {
            continue;
        }
        let src_start = (y - src_bounds.y1) as usize * src_row;
        for x in x1..x2 {
            let o = (x - out_bounds.x1) as usize * 4;
            let s = src_start + (x - src_bounds.x1) as usize * 4;
            invert_pixel(&input[s..s + 4], &mut row[o..o + 4], amount, alpha);
        }
    }
    Ok(())
}

fn dispatch(host: HostApi, action: Action, handle: FxEffectHandle) -> PluginResult<()> {
    match action {
        Action::Load | Action::Unload => Ok(()),
        Action::Describe => describe(host.effect(handle).ok_or(Status::ErrBadHandle)?),
        Action::DescribeInContext => describe_in_context(host.effect(handle).ok_or(Status::ErrBadHandle)?),
        Action::Render => render(host.effect(handle).ok_or(Status::ErrBadHandle)?),
        _ => Err(Status::ReplyDefault),
    }
}

unsafe extern "C" fn main_entry(
    action: *const c_char,
    handle: FxEffectHandle,
    _in_args: FxPropertySetHandle,
    _out_args: FxPropertySetHandle,
) -> FxStatus {
    let Some(host) = HOST.get() else {
        return Status::ErrMissingHostFeature.to_raw();
    };
    if action.is_null() {
        return Status::ErrBadHandle.to_raw();
    }
    // SAFETY: the host passes a NUL terminated action name.
    let name = unsafe { CStr::from_ptr(action) }.to_str().unwrap_or_default();
    let result = match Action::from_name(name) {
        Some(action) => dispatch(host, action, handle),
        None => Err(Status::ReplyDefault),
    };
    match result {
        Ok(()) => Status::Ok.to_raw(),
        Err(status) => status.to_raw(),
    }
}

static PLUGINS: [RawPlugin; 1] = [RawPlugin {
    api: c"fx.ImageEffectPlugin".as_ptr(),
    api_version: 1,
    identifier: c"org.fxhost.sample.Invert".as_ptr(),
    version_major: 1,
    version_minor: 0,
    set_host,
    main_entry,
}];

#[no_mangle]
pub extern "C" fn FxGetNumberOfPlugins() -> c_int {
    PLUGINS.len() as c_int
}

#[no_mangle]
pub extern "C" fn FxGetPlugin(index: c_int) -> *const RawPlugin {
    usize::try_from(index)
        .ok()
        .and_then(|i| PLUGINS.get(i))
        .map_or(std::ptr::null(), |plugin| plugin as *const RawPlugin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fxhost::graph::Graph;
    use fxhost::{FrameRange, Host, HostConfig};

    unsafe extern "C" fn count() -> c_int {
        FxGetNumberOfPlugins()
    }

    unsafe extern "C" fn get(index: c_int) -> *const RawPlugin {
        FxGetPlugin(index)
    }

    #[test]
    fn test_invert_pixel() {
        let mut out = [0u8; 4];
        invert_pixel(&[10, 20, 30, 200], &mut out, 1.0, false);
        assert_eq!(out, [245, 235, 225, 200]);
        invert_pixel(&[10, 20, 30, 200], &mut out, 0.0, true);
        assert_eq!(out, [10, 20, 30, 200]);
        invert_pixel(&[0, 0, 0, 255], &mut out, 0.5, true);
        assert_eq!(out, [128, 128, 128, 128]);
    }

    #[test]
    fn test_registers_and_describes() {
        let mut config = HostConfig::in_memory();
        config.project_size = [4.0, 2.0];
        let host = Host::new(config).unwrap();
        let report = host.register_static("sample_invert", count, get);
        assert_eq!(report.described, 1);

        let plugin = host.get_plugin_by_id(IDENTIFIER, None, None).unwrap();
        assert_eq!(plugin.label(), "Invert");
        let descriptor = plugin.context_descriptor(keys::CONTEXT_FILTER).unwrap();
        assert_eq!(descriptor.params().len(), 2);
        assert_eq!(descriptor.clips().len(), 2);

        // With nothing upstream the node cannot be computed.
        let mut graph = Graph::new(Arc::new(host));
        let node = graph.create_node("sample.invert").unwrap();
        assert!(graph.compute(node, FrameRange::single(0.0)).is_err());
    }
}
