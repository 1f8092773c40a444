//! Opaque image buffers the host allocates for plugins to fill.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest image, in pixels, the host allocates for one clip (8192 x 8192).
pub const MAX_IMAGE_PIXELS: u64 = 1 << 26;

fn span(from: i32, to: i32) -> usize {
    usize::try_from((i64::from(to) - i64::from(from)).max(0)).unwrap_or(usize::MAX)
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct RectI {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl RectI {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> usize {
        span(self.x1, self.x2)
    }

    pub fn height(&self) -> usize {
        span(self.y1, self.y2)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn to_array(self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn from_slice(values: &[i32]) -> Option<Self> {
        match values {
            [x1, y1, x2, y2] => Some(Self::new(*x1, *y1, *x2, *y2)),
            _ => None,
        }
    }

    /// Smallest pixel rectangle covering `rect`.
    pub fn enclosing(rect: RectD) -> Self {
        Self {
            x1: rect.x1.floor() as i32,
            y1: rect.y1.floor() as i32,
            x2: rect.x2.ceil() as i32,
            y2: rect.y2.ceil() as i32,
        }
    }

    /// The pixel window to allocate for a region of definition. `None` when
    /// the region is not finite, is inverted or exceeds [`MAX_IMAGE_PIXELS`].
    pub fn pixel_window(rect: RectD) -> Option<Self> {
        let limit = f64::from(i32::MAX);
        if rect.to_array().iter().any(|v| !v.is_finite() || v.abs() > limit) {
            return None;
        }
        if rect.x2 < rect.x1 || rect.y2 < rect.y1 {
            return None;
        }
        let window = Self::enclosing(rect);
        let pixels = window.width() as u64 * window.height() as u64;
        (pixels <= MAX_IMAGE_PIXELS).then_some(window)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct RectD {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl RectD {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x1, y1, x2, y2] => Some(Self::new(*x1, *y1, *x2, *y2)),
            _ => None,
        }
    }

    pub fn union(self, other: RectD) -> RectD {
        RectD {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PixelComponents {
    Rgba,
    Rgb,
    Alpha,
}

impl PixelComponents {
    pub fn name(self) -> &'static str {
        match self {
            PixelComponents::Rgba => "RGBA",
            PixelComponents::Rgb => "RGB",
            PixelComponents::Alpha => "Alpha",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [PixelComponents::Rgba, PixelComponents::Rgb, PixelComponents::Alpha]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn count(self) -> usize {
        match self {
            PixelComponents::Rgba => 4,
            PixelComponents::Rgb => 3,
            PixelComponents::Alpha => 1,
        }
    }
}

impl fmt::Display for PixelComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum BitDepth {
    Byte,
    Short,
    Float,
}

impl BitDepth {
    pub fn name(self) -> &'static str {
        match self {
            BitDepth::Byte => "byte",
            BitDepth::Short => "short",
            BitDepth::Float => "float",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [BitDepth::Byte, BitDepth::Short, BitDepth::Float]
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }

    pub fn bytes(self) -> usize {
        match self {
            BitDepth::Byte => 1,
            BitDepth::Short => 2,
            BitDepth::Float => 4,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tightly packed rows of pixels, bottom row first.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    bounds: RectI,
    components: PixelComponents,
    depth: BitDepth,
    row_bytes: usize,
    data: Vec<u8>,
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("bounds", &self.bounds)
            .field("components", &self.components)
            .field("depth", &self.depth)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl ImageBuffer {
    pub fn new(bounds: RectI, components: PixelComponents, depth: BitDepth) -> Self {
        let row_bytes = bounds.width() * components.count() * depth.bytes();
        Self {
            bounds,
            components,
            depth,
            row_bytes,
            data: vec![0; row_bytes * bounds.height()],
        }
    }

    pub fn bounds(&self) -> RectI {
        self.bounds
    }

    pub fn components(&self) -> PixelComponents {
        self.components
    }

    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Address handed to plugins through `image.data`.
    pub(crate) fn data_address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Address for an image the plugin writes to.
    pub(crate) fn data_address_mut(&mut self) -> usize {
        self.data.as_mut_ptr() as usize
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<&[u8]> {
        if x < self.bounds.x1 || x >= self.bounds.x2 || y < self.bounds.y1 || y >= self.bounds.y2 {
            return None;
        }
        let pixel_bytes = self.components.count() * self.depth.bytes();
        let offset = (y - self.bounds.y1) as usize * self.row_bytes
            + (x - self.bounds.x1) as usize * pixel_bytes;
        self.data.get(offset..offset + pixel_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_layout() {
        let image = ImageBuffer::new(RectI::new(0, 0, 4, 2), PixelComponents::Rgba, BitDepth::Short);
        assert_eq!(image.row_bytes(), 32);
        assert_eq!(image.as_bytes().len(), 64);
        assert_eq!(image.pixel(3, 1).map(<[u8]>::len), Some(8));
        assert!(image.pixel(4, 0).is_none());
    }

    #[test]
    fn test_enclosing_rect() {
        let rect = RectI::enclosing(RectD::new(-0.5, 0.0, 10.2, 5.0));
        assert_eq!(rect, RectI::new(-1, 0, 11, 5));
    }

    #[test]
    fn test_extent_of_saturated_rect() {
        let rect = RectI::enclosing(RectD::new(-1e10, 0.0, 1e10, 1.0));
        assert_eq!(rect.width(), u32::MAX as usize);
        assert_eq!(rect.height(), 1);
        assert_eq!(RectI::new(5, 5, 2, 2).width(), 0);
    }

    #[test]
    fn test_pixel_window_bounds() {
        assert_eq!(
            RectI::pixel_window(RectD::new(0.0, 0.0, 8.5, 4.0)),
            Some(RectI::new(0, 0, 9, 4))
        );
        assert_eq!(RectI::pixel_window(RectD::new(-1e10, 0.0, 1e10, 1.0)), None);
        assert_eq!(RectI::pixel_window(RectD::new(0.0, 0.0, f64::NAN, 1.0)), None);
        assert_eq!(RectI::pixel_window(RectD::new(0.0, 0.0, 10000.0, 10000.0)), None);
        assert_eq!(RectI::pixel_window(RectD::new(4.0, 0.0, 1.0, 1.0)), None);
        assert_eq!(
            RectI::pixel_window(RectD::new(0.0, 0.0, 8192.0, 8192.0)),
            Some(RectI::new(0, 0, 8192, 8192))
        );
    }

    #[test]
    fn test_names() {
        assert_eq!(PixelComponents::from_name("rgba"), Some(PixelComponents::Rgba));
        assert_eq!(BitDepth::from_name("float"), Some(BitDepth::Float));
        assert_eq!(BitDepth::from_name("half"), None);
    }
}
