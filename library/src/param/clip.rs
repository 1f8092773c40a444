use crate::image::{BitDepth, ImageBuffer, PixelComponents, RectD, RectI};
use crate::property::{Dimension, PropertyError, PropertyKind, PropertySet, PropertySpec, keys};

/// Per-frame description of what a clip delivers.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ClipMetadata {
    pub region_of_definition: RectD,
    pub components: PixelComponents,
    pub depth: BitDepth,
}

/// A named image slot of an instance.
///
/// Images are only attached for the duration of a Render action; the rest
/// of the time the image keys hold null and empty values.
#[derive(Clone, Debug)]
pub struct Clip {
    name: String,
    properties: PropertySet,
}

impl Clip {
    pub fn new(name: &str, descriptor: &PropertySet) -> Result<Self, PropertyError> {
        let mut properties = descriptor.clone();
        for spec in [
            PropertySpec::int(keys::CLIP_CONNECTED, 0).read_only(),
            PropertySpec::pointer(keys::IMAGE_DATA).read_only(),
            PropertySpec::ints(keys::IMAGE_BOUNDS, &[0, 0, 0, 0]).read_only(),
            PropertySpec::int(keys::IMAGE_ROW_BYTES, 0).read_only(),
            PropertySpec::string(keys::IMAGE_COMPONENTS, "").read_only(),
            PropertySpec::string(keys::IMAGE_DEPTH, "").read_only(),
            PropertySpec::new(keys::REGION_OF_DEFINITION, PropertyKind::Double, Dimension::Fixed(4)).read_only(),
        ] {
            properties.define(spec)?;
        }
        Ok(Self {
            name: name.to_string(),
            properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_output(&self) -> bool {
        self.name == keys::OUTPUT_CLIP
    }

    pub fn is_optional(&self) -> bool {
        self.properties.get_int(keys::CLIP_OPTIONAL, 0).unwrap_or(0) != 0
    }

    pub fn supported_components(&self) -> Vec<PixelComponents> {
        self.properties
            .get_strings(keys::CLIP_SUPPORTED_COMPONENTS)
            .unwrap_or_default()
            .iter()
            .filter_map(|name| PixelComponents::from_name(name))
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.properties.get_int(keys::CLIP_CONNECTED, 0).unwrap_or(0) != 0
    }

    pub(crate) fn set_connected(&mut self, connected: bool) -> Result<(), PropertyError> {
        self.properties.set_int(keys::CLIP_CONNECTED, 0, connected as i32)
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertySet {
        &mut self.properties
    }

    /// Last region of definition published on this clip.
    pub fn region_of_definition(&self) -> Option<RectD> {
        self.properties
            .get_doubles(keys::REGION_OF_DEFINITION)
            .ok()
            .and_then(|values| RectD::from_slice(&values))
    }

    /// Publishes a read-only input image.
    pub(crate) fn attach(&mut self, image: &ImageBuffer, metadata: &ClipMetadata) -> Result<(), PropertyError> {
        self.publish(image, image.data_address(), metadata)
    }

    /// Publishes the image the plugin renders into.
    pub(crate) fn attach_output(&mut self, image: &mut ImageBuffer, metadata: &ClipMetadata) -> Result<(), PropertyError> {
        let address = image.data_address_mut();
        self.publish(image, address, metadata)
    }

    fn publish(&mut self, image: &ImageBuffer, address: usize, metadata: &ClipMetadata) -> Result<(), PropertyError> {
        let set = &mut self.properties;
        set.set_pointer(keys::IMAGE_DATA, 0, address)?;
        set.set_ints(keys::IMAGE_BOUNDS, &image.bounds().to_array())?;
        set.set_int(keys::IMAGE_ROW_BYTES, 0, image.row_bytes() as i32)?;
        set.set_string(keys::IMAGE_COMPONENTS, 0, image.components().name())?;
        set.set_string(keys::IMAGE_DEPTH, 0, image.depth().name())?;
        set.set_doubles(keys::REGION_OF_DEFINITION, &metadata.region_of_definition.to_array())
    }

    pub(crate) fn detach(&mut self) -> Result<(), PropertyError> {
        let set = &mut self.properties;
        set.set_pointer(keys::IMAGE_DATA, 0, 0)?;
        set.set_ints(keys::IMAGE_BOUNDS, &RectI::default().to_array())?;
        set.set_int(keys::IMAGE_ROW_BYTES, 0, 0)?;
        set.set_string(keys::IMAGE_COMPONENTS, 0, "")?;
        set.set_string(keys::IMAGE_DEPTH, 0, "")
    }
}
