//! Plain value types shared by styles, renderers and the host canvas.

use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size::new(0.0, 0.0);

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Grow by the given padding on every side.
    pub fn padded(self, padding: Padding) -> Self {
        Self {
            width: self.width + padding.horizontal(),
            height: self.height + padding.vertical(),
        }
    }

    /// Component-wise maximum.
    pub fn max(self, other: Size) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Shrink by the padding, never going below zero size.
    pub fn inset(&self, padding: Padding) -> Self {
        Self {
            x: self.x + padding.left,
            y: self.y + padding.top,
            width: (self.width - padding.horizontal()).max(0.0),
            height: (self.height - padding.vertical()).max(0.0),
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            a: 1.0,
        }
    }

    /// Quantize to 8-bit channels (used for asset keys and pixel output).
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Color {
    pub(crate) fn bits(self) -> [u32; 4] {
        [self.r, self.g, self.b, self.a].map(f32_bits)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for channel in [self.r, self.g, self.b, self.a] {
            hash_f32(channel, state);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Padding {
    pub fn all(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn symmetric(horizontal: f32, vertical: f32) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

impl From<f32> for Padding {
    fn from(v: f32) -> Self {
        Padding::all(v)
    }
}

/// `[vertical, horizontal]` shorthand.
impl From<[f32; 2]> for Padding {
    fn from(v: [f32; 2]) -> Self {
        Padding::symmetric(v[1], v[0])
    }
}

/// `[top, right, bottom, left]` shorthand.
impl From<[f32; 4]> for Padding {
    fn from(v: [f32; 4]) -> Self {
        Padding {
            top: v[0],
            right: v[1],
            bottom: v[2],
            left: v[3],
        }
    }
}

impl Padding {
    pub(crate) fn bits(self) -> [u32; 4] {
        [self.top, self.right, self.bottom, self.left].map(f32_bits)
    }
}

impl Hash for Padding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for side in [self.top, self.right, self.bottom, self.left] {
            hash_f32(side, state);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alignment {
    #[default]
    Start,
    Center,
    End,
}

/// Direction a group advances the host's layout cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Bit pattern of an `f32` with `-0.0` folded into `0.0`. Two values with the same
/// bits are the same value, NaN included.
pub(crate) fn f32_bits(value: f32) -> u32 {
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_bits()
}

pub(crate) fn hash_f32<H: Hasher>(value: f32, state: &mut H) {
    f32_bits(value).hash(state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_hex() {
        let color = Color::from_hex(0xFF0000);
        assert_eq!(color, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_color_to_rgba8_clamps() {
        assert_eq!(Color::rgba(2.0, -1.0, 0.5, 1.0).to_rgba8(), [255, 0, 128, 255]);
    }

    #[test]
    fn test_rect_inset_never_negative() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let inset = rect.inset(Padding::all(20.0));
        assert_eq!(inset.width, 0.0);
        assert_eq!(inset.height, 0.0);
        assert_eq!(inset.x, 20.0);
    }

    #[test]
    fn test_size_padded() {
        let size = Size::new(10.0, 5.0).padded(Padding::symmetric(2.0, 1.0));
        assert_eq!(size, Size::new(14.0, 7.0));
    }

    #[test]
    fn test_padding_shorthands() {
        assert_eq!(Padding::from([8.0, 16.0]), Padding::symmetric(16.0, 8.0));
        let p = Padding::from([1.0, 2.0, 3.0, 4.0]);
        assert_eq!((p.top, p.right, p.bottom, p.left), (1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_hash_f32_folds_negative_zero() {
        use std::hash::DefaultHasher;
        let mut a = DefaultHasher::new();
        let mut b = DefaultHasher::new();
        hash_f32(0.0, &mut a);
        hash_f32(-0.0, &mut b);
        assert_eq!(a.finish(), b.finish());
    }
}
