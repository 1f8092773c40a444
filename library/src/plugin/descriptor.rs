use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::abi::{EffectTarget, Status};
use crate::param::ParamType;
use crate::property::{Dimension, PropertyError, PropertyKind, PropertySet, PropertySpec, keys};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ParamId(pub usize);

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClipId(pub usize);

#[derive(Clone, PartialEq, Debug)]
pub struct ParamDescriptor {
    pub name: String,
    pub param_type: ParamType,
    // Boxed so handles given to a plugin survive later definitions.
    pub properties: Box<PropertySet>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClipDescriptor {
    pub name: String,
    pub properties: Box<PropertySet>,
}

impl ClipDescriptor {
    pub fn is_optional(&self) -> bool {
        self.properties.get_int(keys::CLIP_OPTIONAL, 0).unwrap_or(0) != 0
    }

    pub fn is_output(&self) -> bool {
        self.name == keys::OUTPUT_CLIP
    }
}

/// What Describe (or DescribeInContext) produced: effect properties plus
/// parameter and clip declarations in declaration order.
#[derive(Clone, PartialEq, Debug)]
pub struct EffectDescriptor {
    properties: PropertySet,
    params: Vec<ParamDescriptor>,
    param_index: HashMap<String, ParamId>,
    clips: Vec<ClipDescriptor>,
    clip_index: HashMap<String, ClipId>,
}

pub(crate) fn effect_properties() -> Result<PropertySet, PropertyError> {
    PropertySet::from_specs([
        PropertySpec::string(keys::LABEL, ""),
        PropertySpec::string(keys::DESCRIPTION, ""),
        PropertySpec::string(keys::GROUPING, ""),
        PropertySpec::new(keys::SUPPORTED_CONTEXTS, PropertyKind::String, Dimension::Variable),
        PropertySpec::strings(keys::SUPPORTED_DEPTHS, ["byte"]),
        PropertySpec::string(keys::RENDER_THREAD_SAFETY, keys::THREAD_SAFETY_INSTANCE),
    ])
}

pub(crate) fn clip_properties(name: &str) -> Result<PropertySet, PropertyError> {
    PropertySet::from_specs([
        PropertySpec::string(keys::LABEL, name),
        PropertySpec::int(keys::CLIP_OPTIONAL, 0),
        PropertySpec::strings(keys::CLIP_SUPPORTED_COMPONENTS, ["RGBA"]),
    ])
}

impl EffectDescriptor {
    /// Empty descriptor ready for Describe.
    pub fn new() -> Result<Self, PropertyError> {
        Ok(Self::from_parts(effect_properties()?, Vec::new(), Vec::new()))
    }

    /// Descriptor for DescribeInContext, seeded with the base properties.
    pub fn for_context(base: &EffectDescriptor, context: &str) -> Result<Self, PropertyError> {
        let mut properties = base.properties.clone();
        properties.put(PropertySpec::string(keys::CONTEXT, context).read_only())?;
        Ok(Self::from_parts(properties, base.params.clone(), base.clips.clone()))
    }

    pub fn from_parts(
        properties: PropertySet,
        params: Vec<ParamDescriptor>,
        clips: Vec<ClipDescriptor>,
    ) -> Self {
        let param_index = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), ParamId(i)))
            .collect();
        let clip_index = clips
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), ClipId(i)))
            .collect();
        Self {
            properties,
            params,
            param_index,
            clips,
            clip_index,
        }
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn label(&self) -> String {
        self.properties.get_string(keys::LABEL, 0).unwrap_or_default()
    }

    pub fn supported_contexts(&self) -> Vec<String> {
        self.properties
            .get_strings(keys::SUPPORTED_CONTEXTS)
            .unwrap_or_default()
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.param_index.get(name).map(|id| &self.params[id.0])
    }

    pub fn param_id(&self, name: &str) -> Option<ParamId> {
        self.param_index.get(name).copied()
    }

    pub fn clips(&self) -> &[ClipDescriptor] {
        &self.clips
    }

    pub fn clip(&self, name: &str) -> Option<&ClipDescriptor> {
        self.clip_index.get(name).map(|id| &self.clips[id.0])
    }

    pub fn clip_id(&self, name: &str) -> Option<ClipId> {
        self.clip_index.get(name).copied()
    }

    pub fn input_clips(&self) -> impl Iterator<Item = &ClipDescriptor> {
        self.clips.iter().filter(|c| !c.is_output())
    }
}

impl EffectTarget for EffectDescriptor {
    fn properties(&mut self) -> &mut PropertySet {
        &mut self.properties
    }

    fn define_param(&mut self, param_type: &str, name: &str) -> Result<&mut PropertySet, Status> {
        let param_type = ParamType::from_name(param_type).ok_or(Status::ErrUnknown)?;
        if let Some(id) = self.param_index.get(name) {
            // Redefinition in a context descriptor of a base declaration.
            let existing = &mut self.params[id.0];
            if existing.param_type != param_type {
                return Err(Status::ErrExists);
            }
            return Ok(&mut existing.properties);
        }
        let properties = param_type.descriptor_properties(name)?;
        let id = ParamId(self.params.len());
        self.params.push(ParamDescriptor {
            name: name.to_string(),
            param_type,
            properties: Box::new(properties),
        });
        self.param_index.insert(name.to_string(), id);
        Ok(&mut self.params[id.0].properties)
    }

    fn define_clip(&mut self, name: &str) -> Result<&mut PropertySet, Status> {
        if let Some(id) = self.clip_index.get(name) {
            return Ok(&mut self.clips[id.0].properties);
        }
        let id = ClipId(self.clips.len());
        self.clips.push(ClipDescriptor {
            name: name.to_string(),
            properties: Box::new(clip_properties(name)?),
        });
        self.clip_index.insert(name.to_string(), id);
        Ok(&mut self.clips[id.0].properties)
    }

    fn param_properties(&mut self, name: &str) -> Option<&mut PropertySet> {
        let id = self.param_index.get(name)?;
        Some(&mut self.params[id.0].properties)
    }

    fn clip_properties(&mut self, name: &str) -> Option<&mut PropertySet> {
        let id = self.clip_index.get(name)?;
        Some(&mut self.clips[id.0].properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_keep_declaration_order() {
        let mut desc = EffectDescriptor::new().unwrap();
        desc.define_param("double", "size").unwrap();
        desc.define_param("choice", "mode").unwrap();
        desc.define_clip("Source").unwrap();
        desc.define_clip("Output").unwrap();

        let names: Vec<_> = desc.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["size", "mode"]);
        assert_eq!(desc.param_id("mode"), Some(ParamId(1)));
        assert_eq!(desc.input_clips().count(), 1);
        assert!(desc.param("mode").unwrap().properties.contains(keys::PARAM_CHOICE_OPTIONS));
    }

    #[test]
    fn test_unknown_type_and_conflicting_redefinition() {
        let mut desc = EffectDescriptor::new().unwrap();
        assert_eq!(desc.define_param("matrix", "m").unwrap_err(), Status::ErrUnknown);
        desc.define_param("double", "size").unwrap();
        assert_eq!(desc.define_param("integer", "size").unwrap_err(), Status::ErrExists);
    }

    #[test]
    fn test_context_descriptor_carries_context() {
        let base = EffectDescriptor::new().unwrap();
        let desc = EffectDescriptor::for_context(&base, "filter").unwrap();
        assert_eq!(desc.properties().get_string(keys::CONTEXT, 0).unwrap(), "filter");
        assert!(!base.properties().contains(keys::CONTEXT));
    }
}
