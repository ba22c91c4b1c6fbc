//! Declarative style descriptors and the resolved styles derived from them.
//!
//! A [`StyleDescriptor`] is a bag of optional attributes attached to an element. The
//! [`StyleCache`] overlays the attributes a descriptor sets onto a fallback base style
//! to produce a [`ResolvedStyle`], and hands back the same `Arc` for every descriptor
//! with the same content.

pub mod asset;
pub mod cache;

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;

use crate::geometry::{f32_bits, Alignment, Color, Padding};

pub use asset::{AssetId, AssetKey, AssetPool, CachedAsset, Rgba8, MAX_CORNER_RADIUS};
pub use cache::{BaseStyleId, StyleCache};

bitflags! {
    /// Which attributes a descriptor sets explicitly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleAttrs: u16 {
        const COLOR = 1 << 0;
        const BACKGROUND = 1 << 1;
        const WIDTH = 1 << 2;
        const HEIGHT = 1 << 3;
        const PADDING = 1 << 4;
        const BORDER_RADIUS = 1 << 5;
        const ALIGNMENT = 1 << 6;
        const FONT_SIZE = 1 << 7;
    }
}

/// Declarative style attached to an element. Unset attributes fall back to the
/// renderer's base style.
///
/// Equality and hashing compare float attributes by bit pattern, so a descriptor is
/// always equal to itself even when it holds a NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleDescriptor {
    color: Option<Color>,
    background: Option<Color>,
    width: Option<f32>,
    height: Option<f32>,
    padding: Option<Padding>,
    border_radius: Option<f32>,
    alignment: Option<Alignment>,
    font_size: Option<f32>,
}

impl StyleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn padding(mut self, padding: impl Into<Padding>) -> Self {
        self.padding = Some(padding.into());
        self
    }

    pub fn border_radius(mut self, radius: f32) -> Self {
        self.border_radius = Some(radius);
        self
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn attrs(&self) -> StyleAttrs {
        let mut attrs = StyleAttrs::empty();
        attrs.set(StyleAttrs::COLOR, self.color.is_some());
        attrs.set(StyleAttrs::BACKGROUND, self.background.is_some());
        attrs.set(StyleAttrs::WIDTH, self.width.is_some());
        attrs.set(StyleAttrs::HEIGHT, self.height.is_some());
        attrs.set(StyleAttrs::PADDING, self.padding.is_some());
        attrs.set(StyleAttrs::BORDER_RADIUS, self.border_radius.is_some());
        attrs.set(StyleAttrs::ALIGNMENT, self.alignment.is_some());
        attrs.set(StyleAttrs::FONT_SIZE, self.font_size.is_some());
        attrs
    }

    pub fn is_empty(&self) -> bool {
        self.attrs().is_empty()
    }

    /// Structural hash over the set attributes.
    ///
    /// Attributes are fields rather than a list, so the value does not depend on the
    /// order the builder methods were called in.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Copy `base` and overwrite only the attributes this descriptor sets.
    pub fn overlay(&self, base: &ResolvedStyle) -> ResolvedStyle {
        let mut style = base.clone();
        if let Some(color) = self.color {
            style.color = color;
        }
        if let Some(background) = self.background {
            style.background = Some(background);
        }
        if let Some(width) = self.width {
            style.width = Some(width);
        }
        if let Some(height) = self.height {
            style.height = Some(height);
        }
        if let Some(padding) = self.padding {
            style.padding = padding;
        }
        if let Some(radius) = self.border_radius {
            style.border_radius = radius;
        }
        if let Some(alignment) = self.alignment {
            style.alignment = alignment;
        }
        if let Some(size) = self.font_size {
            style.font_size = size;
        }
        // Assets belong to the base's attribute set; the cache regenerates them.
        style.fill = None;
        style.corner_mask = None;
        style
    }
}

type DescriptorBits = (
    Option<[u32; 4]>,
    Option<[u32; 4]>,
    Option<u32>,
    Option<u32>,
    Option<[u32; 4]>,
    Option<u32>,
    Option<Alignment>,
    Option<u32>,
);

impl StyleDescriptor {
    fn bits(&self) -> DescriptorBits {
        (
            self.color.map(Color::bits),
            self.background.map(Color::bits),
            self.width.map(f32_bits),
            self.height.map(f32_bits),
            self.padding.map(Padding::bits),
            self.border_radius.map(f32_bits),
            self.alignment,
            self.font_size.map(f32_bits),
        )
    }
}

impl PartialEq for StyleDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for StyleDescriptor {}

impl Hash for StyleDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Host-ready style: every attribute has a concrete value and the textures a host
/// needs to paint the background are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub color: Color,
    pub background: Option<Color>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub padding: Padding,
    pub border_radius: f32,
    pub alignment: Alignment,
    pub font_size: f32,
    /// 1x1 texture of the background color.
    pub fill: Option<Arc<CachedAsset>>,
    /// Top-left quadrant mask for rounded backgrounds; hosts mirror it per corner.
    pub corner_mask: Option<Arc<CachedAsset>>,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            background: None,
            width: None,
            height: None,
            padding: Padding::default(),
            border_radius: 0.0,
            alignment: Alignment::Start,
            font_size: 14.0,
            fill: None,
            corner_mask: None,
        }
    }
}

impl ResolvedStyle {
    /// Asset keys this style needs, given its background and radius.
    pub(crate) fn asset_keys(&self) -> (Option<AssetKey>, Option<AssetKey>) {
        let Some(background) = self.background else {
            return (None, None);
        };
        let fill = AssetKey::Solid {
            color: background.to_rgba8(),
        };
        let mask = (self.border_radius >= 1.0).then(|| AssetKey::CornerMask {
            radius: self.border_radius.min(MAX_CORNER_RADIUS as f32).round() as u32,
            color: background.to_rgba8(),
        });
        (Some(fill), mask)
    }
}
