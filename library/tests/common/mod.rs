//! In-process plugins driven through the real binary contract.
//!
//! `testfx` exports reader, invert, writer, two versions of blur and
//! bitdepth. `brokenfx` exports plugins that fail to load, fail to describe
//! or speak another API. `hostilefx` exports generators that report regions
//! of definition no image can be allocated for.

#![allow(dead_code)]

use std::ffi::{CStr, c_char, c_int};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use fxhost::abi::ffi::{FxEffectHandle, FxPropertySetHandle, FxStatus, HostSuite, RawPlugin};
use fxhost::abi::plugin::{EffectRef, HostSlot, PluginResult, PropertySetRef};
use fxhost::abi::{Action, Status};
use fxhost::image::{BitDepth, PixelComponents};
use fxhost::property::keys;
use fxhost::{Host, HostConfig};

static HOST: HostSlot = HostSlot::new();

/// Status of the out of range write `Sprawl` attempts while describing.
static SPARSE_WRITE: AtomicI32 = AtomicI32::new(i32::MIN);

unsafe extern "C" fn set_host(host: *const HostSuite) {
    HOST.store(host);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    Reader,
    Invert,
    Writer,
    Blur,
    BitDepth,
    NoLoad,
    NoDescribe,
    Sprawl,
    Undefined,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Reader => "Reader",
            Kind::Invert => "Invert",
            Kind::Writer => "Writer",
            Kind::Blur => "Blur",
            Kind::BitDepth => "Bit Depth",
            Kind::NoLoad => "No Load",
            Kind::NoDescribe => "No Describe",
            Kind::Sprawl => "Sprawl",
            Kind::Undefined => "Undefined",
        }
    }

    fn contexts(self) -> &'static [&'static str] {
        match self {
            Kind::Reader => &[keys::CONTEXT_READER, keys::CONTEXT_GENERATOR],
            Kind::Writer => &[keys::CONTEXT_WRITER],
            Kind::BitDepth => &[keys::CONTEXT_FILTER, keys::CONTEXT_GENERAL],
            Kind::Sprawl | Kind::Undefined => &[keys::CONTEXT_GENERATOR],
            _ => &[keys::CONTEXT_FILTER],
        }
    }

    fn thread_safety(self) -> &'static str {
        match self {
            Kind::Blur => keys::THREAD_SAFETY_UNSAFE,
            _ => keys::THREAD_SAFETY_FULL,
        }
    }

    fn region_of_definition(self) -> Option<[f64; 4]> {
        match self {
            Kind::Sprawl => Some([-1e10, 0.0, 1e10, 1.0]),
            Kind::Undefined => Some([0.0, 0.0, f64::NAN, 4.0]),
            _ => None,
        }
    }
}

fn main_entry(
    kind: Kind,
    action: *const c_char,
    handle: FxEffectHandle,
    in_args: FxPropertySetHandle,
    out_args: FxPropertySetHandle,
) -> FxStatus {
    let Some(host) = HOST.get() else {
        return Status::ErrMissingHostFeature.to_raw();
    };
    if action.is_null() {
        return Status::ErrBadHandle.to_raw();
    }
    // SAFETY: the host passes a NUL terminated action name.
    let name = unsafe { CStr::from_ptr(action) }.to_str().unwrap_or_default();
    let effect = host.effect(handle);
    let result = match Action::from_name(name) {
        Some(Action::Load) if kind == Kind::NoLoad => Err(Status::Failed),
        Some(Action::Describe) if kind == Kind::NoDescribe => Err(Status::ErrFatal),
        Some(Action::Describe) => describe(kind, effect),
        Some(Action::DescribeInContext) => {
            let context = host
                .properties(in_args)
                .ok_or(Status::ErrBadHandle)
                .and_then(|args| args.get_string(keys::CONTEXT, 0));
            context.and_then(|context| describe_in_context(kind, effect, &context))
        }
        Some(Action::GetTimeDomain) if kind == Kind::Reader => host
            .properties(out_args)
            .ok_or(Status::ErrBadHandle)
            .and_then(|out| out.set_doubles(keys::FRAME_RANGE, &[0.0, 9.0])),
        Some(Action::GetRegionOfDefinition) => match kind.region_of_definition() {
            Some(rod) => host
                .properties(out_args)
                .ok_or(Status::ErrBadHandle)
                .and_then(|out| out.set_doubles(keys::REGION_OF_DEFINITION, &rod)),
            None => Err(Status::ReplyDefault),
        },
        Some(Action::GetTimeDomain) => Err(Status::ReplyDefault),
        Some(Action::Render) => render(kind, effect),
        Some(_) => Ok(()),
        None => Err(Status::ReplyDefault),
    };
    match result {
        Ok(()) => Status::Ok.to_raw(),
        Err(status) => status.to_raw(),
    }
}

fn describe(kind: Kind, effect: Option<EffectRef>) -> PluginResult<()> {
    let properties = effect.ok_or(Status::ErrBadHandle)?.properties()?;
    properties.set_string(keys::LABEL, 0, kind.label())?;
    properties.reset(keys::SUPPORTED_CONTEXTS)?;
    properties.set_strings(keys::SUPPORTED_CONTEXTS, kind.contexts())?;
    if kind == Kind::Sprawl {
        let status = properties.set_string(keys::SUPPORTED_CONTEXTS, 1000, keys::CONTEXT_FILTER);
        SPARSE_WRITE.store(status.err().map_or(Status::Ok.to_raw(), Status::to_raw), Ordering::SeqCst);
    }
    properties.set_string(keys::RENDER_THREAD_SAFETY, 0, kind.thread_safety())
}

fn define_double(effect: &EffectRef, name: &str, default: f64, min: f64, max: f64) -> PluginResult<PropertySetRef> {
    let param = effect.define_param("double", name)?;
    param.set_double(keys::PARAM_DEFAULT, 0, default)?;
    param.set_double(keys::PARAM_MIN, 0, min)?;
    param.set_double(keys::PARAM_MAX, 0, max)?;
    Ok(param)
}

fn describe_in_context(kind: Kind, effect: Option<EffectRef>, context: &str) -> PluginResult<()> {
    let effect = effect.ok_or(Status::ErrBadHandle)?;
    let output = effect.define_clip(keys::OUTPUT_CLIP)?;
    output.set_strings(keys::CLIP_SUPPORTED_COMPONENTS, &["RGBA"])?;
    if context != keys::CONTEXT_READER && context != keys::CONTEXT_GENERATOR {
        effect.define_clip(keys::SOURCE_CLIP)?;
    }
    match kind {
        Kind::Reader => {
            define_double(&effect, "level", 0.5, 0.0, 1.0)?;
        }
        Kind::Invert => {
            effect.define_param("boolean", "alpha")?;
        }
        Kind::Writer => {
            let filename = effect.define_param("string", "filename")?;
            filename.set_string(keys::PARAM_DEFAULT, 0, "out.png")?;
        }
        Kind::Blur => {
            define_double(&effect, "radius", 1.0, 0.0, 100.0)?;
            let size = effect.define_param("double2d", "size")?;
            size.set_doubles(keys::PARAM_DEFAULT, &[1.0, 1.0])?;
            let mode = effect.define_param("choice", "mode")?;
            mode.set_strings(keys::PARAM_CHOICE_OPTIONS, &["box", "gaussian"])?;
            effect.define_param("string", "label")?;
        }
        Kind::BitDepth => {
            let depth = effect.define_param("choice", "depth")?;
            depth.set_strings(keys::PARAM_CHOICE_OPTIONS, &["byte", "short", "float"])?;
            if context == keys::CONTEXT_GENERAL {
                let mask = effect.define_clip("Mask")?;
                mask.set_int(keys::CLIP_OPTIONAL, 0, 1)?;
            }
        }
        Kind::NoLoad | Kind::NoDescribe => return Err(Status::Failed),
        Kind::Sprawl | Kind::Undefined => {}
    }
    Ok(())
}

fn render(kind: Kind, effect: Option<EffectRef>) -> PluginResult<()> {
    let effect = effect.ok_or(Status::ErrBadHandle)?;
    let mut output = effect.clip(keys::OUTPUT_CLIP)?.image()?;
    if output.components != PixelComponents::Rgba || output.depth != BitDepth::Byte {
        return Err(Status::ErrUnsupported);
    }
    // SAFETY: inside Render; the output buffer belongs to this action.
    let out = unsafe { output.bytes_mut() };

    if kind == Kind::Reader {
        let level = effect.param("level")?.get_double(keys::PARAM_VALUE, 0)?;
        let byte = (level * 255.0).round().clamp(0.0, 255.0) as u8;
        for (i, value) in out.iter_mut().enumerate() {
            *value = if i % 4 == 3 { 255 } else { byte };
        }
        return Ok(());
    }

    let source = effect.clip(keys::SOURCE_CLIP)?.image()?;
    // SAFETY: inside Render; inputs stay alive until it returns.
    let input = unsafe { source.bytes() };
    let n = input.len().min(out.len());
    match kind {
        Kind::Invert => {
            for i in 0..n {
                out[i] = if i % 4 == 3 { input[i] } else { 255 - input[i] };
            }
        }
        _ => out[..n].copy_from_slice(&input[..n]),
    }
    Ok(())
}

macro_rules! entry {
    ($name:ident, $kind:expr) => {
        unsafe extern "C" fn $name(
            action: *const c_char,
            handle: FxEffectHandle,
            in_args: FxPropertySetHandle,
            out_args: FxPropertySetHandle,
        ) -> FxStatus {
            main_entry($kind, action, handle, in_args, out_args)
        }
    };
}

entry!(reader_main, Kind::Reader);
entry!(invert_main, Kind::Invert);
entry!(writer_main, Kind::Writer);
entry!(blur_main, Kind::Blur);
entry!(bitdepth_main, Kind::BitDepth);
entry!(no_load_main, Kind::NoLoad);
entry!(no_describe_main, Kind::NoDescribe);
entry!(sprawl_main, Kind::Sprawl);
entry!(undefined_main, Kind::Undefined);

const fn record(
    api: &'static CStr,
    identifier: &'static CStr,
    major: u32,
    minor: u32,
    main_entry: unsafe extern "C" fn(*const c_char, FxEffectHandle, FxPropertySetHandle, FxPropertySetHandle) -> FxStatus,
) -> RawPlugin {
    RawPlugin {
        api: api.as_ptr(),
        api_version: 1,
        identifier: identifier.as_ptr(),
        version_major: major,
        version_minor: minor,
        set_host,
        main_entry,
    }
}

static TEST_PLUGINS: [RawPlugin; 6] = [
    record(c"fx.ImageEffectPlugin", c"org.test.Reader", 1, 0, reader_main),
    record(c"fx.ImageEffectPlugin", c"org.test.Invert", 1, 0, invert_main),
    record(c"fx.ImageEffectPlugin", c"org.test.Writer", 1, 0, writer_main),
    record(c"fx.ImageEffectPlugin", c"org.test.Blur", 1, 0, blur_main),
    record(c"fx.ImageEffectPlugin", c"org.test.Blur", 1, 2, blur_main),
    record(c"fx.ImageEffectPlugin", c"org.test.BitDepth", 1, 0, bitdepth_main),
];

static BROKEN_PLUGINS: [RawPlugin; 3] = [
    record(c"fx.ImageEffectPlugin", c"org.test.NoLoad", 1, 0, no_load_main),
    record(c"fx.ImageEffectPlugin", c"org.test.NoDescribe", 1, 0, no_describe_main),
    record(c"fx.SomethingElse", c"org.test.Alien", 1, 0, reader_main),
];

static HOSTILE_PLUGINS: [RawPlugin; 2] = [
    record(c"fx.ImageEffectPlugin", c"org.test.Sprawl", 1, 0, sprawl_main),
    record(c"fx.ImageEffectPlugin", c"org.test.Undefined", 1, 0, undefined_main),
];

fn lookup(table: &'static [RawPlugin], index: c_int) -> *const RawPlugin {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .map_or(std::ptr::null(), |p| p as *const RawPlugin)
}

pub unsafe extern "C" fn test_plugin_count() -> c_int {
    TEST_PLUGINS.len() as c_int
}

pub unsafe extern "C" fn test_get_plugin(index: c_int) -> *const RawPlugin {
    lookup(&TEST_PLUGINS, index)
}

pub unsafe extern "C" fn broken_plugin_count() -> c_int {
    BROKEN_PLUGINS.len() as c_int
}

pub unsafe extern "C" fn broken_get_plugin(index: c_int) -> *const RawPlugin {
    lookup(&BROKEN_PLUGINS, index)
}

pub unsafe extern "C" fn hostile_plugin_count() -> c_int {
    HOSTILE_PLUGINS.len() as c_int
}

pub unsafe extern "C" fn hostile_get_plugin(index: c_int) -> *const RawPlugin {
    lookup(&HOSTILE_PLUGINS, index)
}

/// What the host answered when `Sprawl` wrote far past the end of its
/// supported contexts, once it has been described.
pub fn sparse_write_status() -> Option<Status> {
    match SPARSE_WRITE.load(Ordering::SeqCst) {
        i32::MIN => None,
        raw => Some(Status::from_raw(raw)),
    }
}

pub fn test_config() -> HostConfig {
    let mut config = HostConfig::in_memory();
    config.project_size = [8.0, 4.0];
    config
}

/// A host with `testfx` registered.
pub fn test_host() -> Arc<Host> {
    host_with(test_config())
}

pub fn host_with(config: HostConfig) -> Arc<Host> {
    let host = Host::new(config).expect("host");
    let report = host.register_static("testfx", test_plugin_count, test_get_plugin);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    Arc::new(host)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
