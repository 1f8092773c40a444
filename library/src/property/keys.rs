//! Property names shared by the host and plugins.

pub const API_NAME: &str = "fx.ImageEffectPlugin";
pub const API_VERSION: i32 = 1;

// Host description.
pub const HOST_NAME: &str = "host.name";
pub const HOST_LABEL: &str = "host.label";
pub const HOST_VERSION: &str = "host.version";
pub const HOST_PROJECT_SIZE: &str = "host.projectSize";
pub const HOST_SUPPORTED_DEPTHS: &str = "host.supportedBitDepths";

// Effect descriptor and instance.
pub const LABEL: &str = "label";
pub const DESCRIPTION: &str = "description";
pub const GROUPING: &str = "grouping";
pub const SUPPORTED_CONTEXTS: &str = "supportedContexts";
pub const SUPPORTED_DEPTHS: &str = "supportedBitDepths";
pub const RENDER_THREAD_SAFETY: &str = "renderThreadSafety";
pub const CONTEXT: &str = "context";
pub const INSTANCE_DATA: &str = "instanceData";

pub const THREAD_SAFETY_UNSAFE: &str = "unsafe";
pub const THREAD_SAFETY_INSTANCE: &str = "instance";
pub const THREAD_SAFETY_FULL: &str = "full";

// Parameters.
pub const PARAM_TYPE: &str = "param.type";
pub const PARAM_DEFAULT: &str = "param.default";
pub const PARAM_MIN: &str = "param.min";
pub const PARAM_MAX: &str = "param.max";
pub const PARAM_DISPLAY_MIN: &str = "param.displayMin";
pub const PARAM_DISPLAY_MAX: &str = "param.displayMax";
pub const PARAM_ANIMATES: &str = "param.animates";
pub const PARAM_INTERPOLATION: &str = "param.interpolation";
pub const PARAM_CHOICE_OPTIONS: &str = "param.choiceOptions";
pub const PARAM_HINT: &str = "param.hint";
pub const PARAM_VALUE: &str = "param.value";

// Clips.
pub const CLIP_OPTIONAL: &str = "clip.optional";
pub const CLIP_SUPPORTED_COMPONENTS: &str = "clip.supportedComponents";
pub const CLIP_CONNECTED: &str = "clip.connected";

pub const OUTPUT_CLIP: &str = "Output";
pub const SOURCE_CLIP: &str = "Source";

// Images handed over during Render.
pub const IMAGE_DATA: &str = "image.data";
pub const IMAGE_BOUNDS: &str = "image.bounds";
pub const IMAGE_ROW_BYTES: &str = "image.rowBytes";
pub const IMAGE_COMPONENTS: &str = "image.components";
pub const IMAGE_DEPTH: &str = "image.bitDepth";

// Action arguments.
pub const TIME: &str = "time";
pub const RENDER_SCALE: &str = "renderScale";
pub const RENDER_WINDOW: &str = "renderWindow";
pub const REGION_OF_DEFINITION: &str = "regionOfDefinition";
pub const FRAME_RANGE: &str = "frameRange";
pub const FRAME_STEP: &str = "frameStep";

// Contexts.
pub const CONTEXT_READER: &str = "reader";
pub const CONTEXT_WRITER: &str = "writer";
pub const CONTEXT_GENERATOR: &str = "generator";
pub const CONTEXT_FILTER: &str = "filter";
pub const CONTEXT_GENERAL: &str = "general";
