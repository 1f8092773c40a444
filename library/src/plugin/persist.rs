//! On-disk form of the plugin cache.
//!
//! One entry per binary, keyed by path, size and modification time, holding
//! what Describe and DescribeInContext produced for each of its plugins.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::binary::BinaryIdentity;
use super::descriptor::{ClipDescriptor, EffectDescriptor, ParamDescriptor};
use super::{Plugin, PluginIdentity};
use crate::error::Result;
use crate::param::ParamType;
use crate::property::PropertySet;

pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct CacheFile {
    pub version: u32,
    #[serde(rename = "binary", default)]
    pub binaries: Vec<CachedBinary>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CachedBinary {
    #[serde(flatten)]
    pub identity: BinaryIdentity,
    #[serde(rename = "plugin", default)]
    pub plugins: Vec<CachedPlugin>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CachedPlugin {
    pub index: usize,
    pub api: String,
    pub api_version: i32,
    pub identifier: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub apiproperties: PropertySet,
    #[serde(rename = "param", default)]
    pub params: Vec<CachedParam>,
    #[serde(rename = "clip", default)]
    pub clips: Vec<CachedClip>,
    #[serde(rename = "context", default)]
    pub contexts: Vec<CachedContext>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CachedContext {
    pub name: String,
    pub properties: PropertySet,
    #[serde(rename = "param", default)]
    pub params: Vec<CachedParam>,
    #[serde(rename = "clip", default)]
    pub clips: Vec<CachedClip>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CachedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub properties: PropertySet,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CachedClip {
    pub name: String,
    pub properties: PropertySet,
}

fn params_of(descriptor: &EffectDescriptor) -> Vec<CachedParam> {
    descriptor
        .params()
        .iter()
        .map(|p| CachedParam {
            name: p.name.clone(),
            param_type: p.param_type,
            properties: (*p.properties).clone(),
        })
        .collect()
}

fn clips_of(descriptor: &EffectDescriptor) -> Vec<CachedClip> {
    descriptor
        .clips()
        .iter()
        .map(|c| CachedClip {
            name: c.name.clone(),
            properties: (*c.properties).clone(),
        })
        .collect()
}

fn descriptor_from(properties: &PropertySet, params: &[CachedParam], clips: &[CachedClip]) -> EffectDescriptor {
    EffectDescriptor::from_parts(
        properties.clone(),
        params
            .iter()
            .map(|p| ParamDescriptor {
                name: p.name.clone(),
                param_type: p.param_type,
                properties: Box::new(p.properties.clone()),
            })
            .collect(),
        clips
            .iter()
            .map(|c| ClipDescriptor {
                name: c.name.clone(),
                properties: Box::new(c.properties.clone()),
            })
            .collect(),
    )
}

impl CachedPlugin {
    /// Snapshot of a described plugin. `None` when it was never described.
    pub fn from_plugin(plugin: &Plugin) -> Option<Self> {
        let description = plugin.description()?;
        let identity = plugin.identity();
        Some(Self {
            index: identity.index,
            api: identity.api.clone(),
            api_version: identity.api_version,
            identifier: identity.raw_identifier.clone(),
            version_major: identity.version_major,
            version_minor: identity.version_minor,
            apiproperties: description.properties().clone(),
            params: params_of(&description),
            clips: clips_of(&description),
            contexts: plugin
                .described_contexts()
                .into_iter()
                .map(|(name, desc)| CachedContext {
                    name,
                    properties: desc.properties().clone(),
                    params: params_of(&desc),
                    clips: clips_of(&desc),
                })
                .collect(),
        })
    }

    pub fn identity(&self) -> PluginIdentity {
        PluginIdentity {
            index: self.index,
            api: self.api.clone(),
            api_version: self.api_version,
            raw_identifier: self.identifier.clone(),
            version_major: self.version_major,
            version_minor: self.version_minor,
        }
    }

    pub fn description(&self) -> EffectDescriptor {
        descriptor_from(&self.apiproperties, &self.params, &self.clips)
    }

    pub fn context_descriptors(&self) -> Vec<(String, EffectDescriptor)> {
        self.contexts
            .iter()
            .map(|c| (c.name.clone(), descriptor_from(&c.properties, &c.params, &c.clips)))
            .collect()
    }
}

impl CacheFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::EffectTarget;
    use crate::property::keys;

    #[test]
    fn test_descriptor_survives_json() {
        let mut desc = EffectDescriptor::new().unwrap();
        EffectTarget::properties(&mut desc)
            .set_strings(keys::SUPPORTED_CONTEXTS, ["filter"])
            .unwrap();
        desc.define_param("rgba", "color")
            .unwrap()
            .set_doubles(keys::PARAM_DEFAULT, &[1.0, 0.5, 0.25, 1.0])
            .unwrap();
        desc.define_clip("Output").unwrap();

        let cached = CachedContext {
            name: "filter".to_string(),
            properties: desc.properties().clone(),
            params: params_of(&desc),
            clips: clips_of(&desc),
        };
        let json = serde_json::to_string(&cached).unwrap();
        assert!(json.contains("\"param\""));
        let back: CachedContext = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor_from(&back.properties, &back.params, &back.clips), desc);
    }

    #[test]
    fn test_cache_file_layout() {
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            binaries: vec![CachedBinary {
                identity: BinaryIdentity::for_static("blur"),
                plugins: Vec::new(),
            }],
        };
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["binary"][0]["path"], "static:blur");
        assert_eq!(value["binary"][0]["size"], 0);
    }
}
