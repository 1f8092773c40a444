use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::abi::{Action, EffectTarget, Status};
use crate::error::{HostError, Result};
use crate::image::{RectD, RectI};
use crate::param::{Clip, Param, ParamError};
use crate::plugin::{EffectDescriptor, Plugin};
use crate::property::{Dimension, PropertyKind, PropertySet, PropertySpec, keys};

/// A live activation of a plugin in one context.
///
/// Parameters and clips are seeded from the context descriptor. The plugin
/// receives DestroyInstance when the instance is dropped.
pub struct Instance {
    plugin: Arc<Plugin>,
    context: String,
    properties: PropertySet,
    params: Vec<Param>,
    param_index: HashMap<String, usize>,
    clips: Vec<Clip>,
    clip_index: HashMap<String, usize>,
    created: bool,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("plugin", &self.plugin.raw_identifier())
            .field("context", &self.context)
            .field("params", &self.params.len())
            .field("clips", &self.clips.len())
            .finish()
    }
}

impl Instance {
    pub(crate) fn create(plugin: Arc<Plugin>, context: &str, descriptor: &EffectDescriptor) -> Result<Self> {
        let mut properties = descriptor.properties().clone();
        properties.put(PropertySpec::string(keys::CONTEXT, context).read_only())?;
        properties.put(PropertySpec::pointer(keys::INSTANCE_DATA))?;

        let params = descriptor
            .params()
            .iter()
            .map(|p| Param::new(&p.name, p.param_type, &p.properties))
            .collect::<std::result::Result<Vec<_>, ParamError>>()?;
        let clips = descriptor
            .clips()
            .iter()
            .map(|c| Clip::new(&c.name, &c.properties))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut instance = Self {
            param_index: params.iter().enumerate().map(|(i, p)| (p.name().to_string(), i)).collect(),
            clip_index: clips.iter().enumerate().map(|(i, c)| (c.name().to_string(), i)).collect(),
            plugin,
            context: context.to_string(),
            properties,
            params,
            clips,
            created: false,
        };
        instance.call_action(Action::CreateInstance, None, None)?;
        instance.created = true;
        debug!("Created {} instance of {}", context, instance.plugin.raw_identifier());
        Ok(instance)
    }

    pub fn plugin(&self) -> &Arc<Plugin> {
        &self.plugin
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Result<&Param> {
        self.param_index
            .get(name)
            .map(|i| &self.params[*i])
            .ok_or_else(|| ParamError::UnknownParam(name.to_string()).into())
    }

    pub fn param_mut(&mut self, name: &str) -> Result<&mut Param> {
        match self.param_index.get(name) {
            Some(i) => Ok(&mut self.params[*i]),
            None => Err(ParamError::UnknownParam(name.to_string()).into()),
        }
    }

    /// Parameter by declaration order.
    pub fn param_at(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }

    pub fn param_at_mut(&mut self, index: usize) -> Option<&mut Param> {
        self.params.get_mut(index)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, name: &str) -> Option<&Clip> {
        self.clip_index.get(name).map(|i| &self.clips[*i])
    }

    pub(crate) fn clip_mut(&mut self, name: &str) -> Option<&mut Clip> {
        self.clip_index.get(name).map(|i| &mut self.clips[*i])
    }

    pub fn input_clips(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter().filter(|c| !c.is_output())
    }

    pub fn output_clip(&self) -> Option<&Clip> {
        self.clip(keys::OUTPUT_CLIP)
    }

    /// Sends `action` with this instance as the effect handle.
    pub fn call_action(
        &mut self,
        action: Action,
        in_args: Option<&mut PropertySet>,
        out_args: Option<&mut PropertySet>,
    ) -> Result<Status> {
        let plugin = self.plugin.clone();
        plugin
            .handle()
            .call_action(action, Some(self as &mut dyn EffectTarget), in_args, out_args)
    }

    fn time_args(time: f64) -> Result<PropertySet> {
        Ok(PropertySet::from_specs([
            PropertySpec::double(keys::TIME, time),
            PropertySpec::doubles(keys::RENDER_SCALE, &[1.0, 1.0]),
        ])?)
    }

    /// Asks the plugin for its region of definition at `time`; `default` is
    /// returned when the plugin leaves it to the host.
    pub fn region_of_definition(&mut self, time: f64, default: RectD) -> Result<RectD> {
        let mut in_args = Self::time_args(time)?;
        let mut out_args = PropertySet::from_specs([PropertySpec::doubles(
            keys::REGION_OF_DEFINITION,
            &default.to_array(),
        )])?;
        let status = self.call_action(
            Action::GetRegionOfDefinition,
            Some(&mut in_args),
            Some(&mut out_args),
        )?;
        if status == Status::ReplyDefault {
            return Ok(default);
        }
        let values = out_args.get_doubles(keys::REGION_OF_DEFINITION)?;
        RectD::from_slice(&values).ok_or_else(|| {
            HostError::Unexpected(format!(
                "{} returned a malformed region of definition",
                self.plugin.raw_identifier()
            ))
        })
    }

    /// Frame range the plugin can produce, if it reports one.
    pub fn time_domain(&mut self) -> Result<Option<(f64, f64)>> {
        let mut out_args = PropertySet::from_specs([PropertySpec::new(
            keys::FRAME_RANGE,
            PropertyKind::Double,
            Dimension::Fixed(2),
        )])?;
        let status = self.call_action(Action::GetTimeDomain, None, Some(&mut out_args))?;
        if status == Status::ReplyDefault {
            return Ok(None);
        }
        let range = out_args.get_doubles(keys::FRAME_RANGE)?;
        Ok(match range.as_slice() {
            [start, end] if start <= end => Some((*start, *end)),
            _ => None,
        })
    }

    fn sequence_args(start: f64, end: f64, step: f64) -> Result<PropertySet> {
        Ok(PropertySet::from_specs([
            PropertySpec::doubles(keys::FRAME_RANGE, &[start, end]),
            PropertySpec::double(keys::FRAME_STEP, step),
            PropertySpec::doubles(keys::RENDER_SCALE, &[1.0, 1.0]),
        ])?)
    }

    pub fn begin_sequence_render(&mut self, start: f64, end: f64, step: f64) -> Result<()> {
        let mut in_args = Self::sequence_args(start, end, step)?;
        self.call_action(Action::BeginSequenceRender, Some(&mut in_args), None)?;
        Ok(())
    }

    pub fn end_sequence_render(&mut self, start: f64, end: f64, step: f64) -> Result<()> {
        let mut in_args = Self::sequence_args(start, end, step)?;
        self.call_action(Action::EndSequenceRender, Some(&mut in_args), None)?;
        Ok(())
    }

    /// Sends Render for `window` at `time`. Images must already be attached.
    pub fn render(&mut self, time: f64, window: RectI) -> Result<Status> {
        let mut in_args = Self::time_args(time)?;
        in_args.define(PropertySpec::ints(keys::RENDER_WINDOW, &window.to_array()))?;
        self.snapshot_params(time)?;
        let plugin = self.plugin.clone();
        let _guard = plugin.render_guard();
        self.call_action(Action::Render, Some(&mut in_args), None)
    }

    /// Publishes every parameter's value at `time` under `param.value`.
    pub fn snapshot_params(&mut self, time: f64) -> Result<()> {
        for param in &mut self.params {
            let values = param.value_properties(time);
            param.properties_mut().set_all(keys::PARAM_VALUE, values)?;
        }
        Ok(())
    }
}

impl EffectTarget for Instance {
    fn properties(&mut self) -> &mut PropertySet {
        &mut self.properties
    }

    fn define_param(&mut self, _param_type: &str, _name: &str) -> std::result::Result<&mut PropertySet, Status> {
        Err(Status::ErrUnsupported)
    }

    fn define_clip(&mut self, _name: &str) -> std::result::Result<&mut PropertySet, Status> {
        Err(Status::ErrUnsupported)
    }

    fn param_properties(&mut self, name: &str) -> Option<&mut PropertySet> {
        let i = *self.param_index.get(name)?;
        Some(self.params[i].properties_mut())
    }

    fn clip_properties(&mut self, name: &str) -> Option<&mut PropertySet> {
        let i = *self.clip_index.get(name)?;
        Some(self.clips[i].properties_mut())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if !self.created {
            return;
        }
        if let Err(e) = self.call_action(Action::DestroyInstance, None, None) {
            warn!("DestroyInstance failed for {}: {}", self.plugin.raw_identifier(), e);
        }
    }
}
