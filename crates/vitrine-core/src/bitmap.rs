//! Pixel buffers and the handful of painting primitives the compositor needs.
//!
//! Pixels are ARGB8888 stored as `u32`. Every painting call clips to the
//! destination bitmap and to the caller's clip rect, so callers can pass
//! screen-space rects straight through.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::geometry::{Point, Rect, Size};

/// Bitmap allocation errors.
#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("bitmap size {0} is invalid")]
    InvalidSize(Size),
    #[error("failed to allocate {bytes} bytes for a {size} bitmap")]
    Allocation { size: Size, bytes: usize },
}

/// An ARGB8888 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Self = Self(0xff00_0000);
    pub const WHITE: Self = Self(0xffff_ffff);
    pub const TRANSPARENT: Self = Self(0);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xff, r, g, b)
    }

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    #[must_use]
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self((self.0 & 0x00ff_ffff) | (alpha as u32) << 24)
    }

    /// Parse `#rrggbb` or `#aarrggbb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let value = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(Self(0xff00_0000 | value)),
            8 => Some(Self(value)),
            _ => None,
        }
    }

    /// Source-over composite of `self` onto `dst` with an extra global opacity.
    #[must_use]
    pub fn blend_over(self, dst: Self, opacity: f32) -> Self {
        let alpha = (f32::from(self.alpha()) * opacity.clamp(0.0, 1.0)).round() as u32;
        if alpha == 0 {
            return dst;
        }
        if alpha >= 255 {
            return self.with_alpha(0xff);
        }
        let inverse = 255 - alpha;
        let mix = |s: u8, d: u8| ((u32::from(s) * alpha + u32::from(d) * inverse + 127) / 255) as u8;
        let out_alpha = (alpha + u32::from(dst.alpha()) * inverse / 255).min(255) as u8;
        Self::from_argb(
            out_alpha,
            mix(self.red(), dst.red()),
            mix(self.green(), dst.green()),
            mix(self.blue(), dst.blue()),
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha() == 0xff {
            write!(f, "#{:06x}", self.0 & 0x00ff_ffff)
        } else {
            write!(f, "#{:08x}", self.0)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{text}'")))
    }
}

/// A 32-bit pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    size: Size,
    pixels: Vec<u32>,
    has_alpha_channel: bool,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("size", &self.size)
            .field("has_alpha_channel", &self.has_alpha_channel)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    /// Allocate a zeroed bitmap, failing instead of aborting on exhaustion.
    pub fn try_new(size: Size) -> Result<Self, BitmapError> {
        if size.is_empty() {
            return Err(BitmapError::InvalidSize(size));
        }
        let count = size.width as usize * size.height as usize;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(count)
            .map_err(|_| BitmapError::Allocation {
                size,
                bytes: count * std::mem::size_of::<u32>(),
            })?;
        pixels.resize(count, 0);
        Ok(Self {
            size,
            pixels,
            has_alpha_channel: false,
        })
    }

    /// Allocate a bitmap. Empty sizes produce a 1x1 bitmap.
    pub fn new(size: Size) -> Self {
        let size = Size::new(size.width.max(1), size.height.max(1));
        Self {
            size,
            pixels: vec![0; size.width as usize * size.height as usize],
            has_alpha_channel: false,
        }
    }

    pub fn filled(size: Size, color: Color) -> Self {
        let mut bitmap = Self::new(size);
        bitmap.pixels.fill(color.0);
        bitmap
    }

    #[must_use]
    pub const fn with_alpha_channel(mut self, has_alpha_channel: bool) -> Self {
        self.has_alpha_channel = has_alpha_channel;
        self
    }

    pub const fn size(&self) -> Size {
        self.size
    }

    pub const fn width(&self) -> i32 {
        self.size.width
    }

    pub const fn height(&self) -> i32 {
        self.size.height
    }

    pub const fn rect(&self) -> Rect {
        Rect::new(0, 0, self.size.width, self.size.height)
    }

    /// Bytes per row.
    pub const fn pitch(&self) -> usize {
        self.size.width as usize * std::mem::size_of::<u32>()
    }

    pub const fn has_alpha_channel(&self) -> bool {
        self.has_alpha_channel
    }

    pub fn set_has_alpha_channel(&mut self, value: bool) {
        self.has_alpha_channel = value;
    }

    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }

    pub fn pixel(&self, point: Point) -> Option<Color> {
        self.rect()
            .contains(point)
            .then(|| Color(self.pixels[self.index(point.x, point.y)]))
    }

    pub fn set_pixel(&mut self, point: Point, color: Color) {
        if self.rect().contains(point) {
            let index = self.index(point.x, point.y);
            self.pixels[index] = color.0;
        }
    }

    pub fn scanline(&self, y: i32) -> &[u32] {
        assert!(y >= 0 && y < self.size.height, "scanline {y} out of range");
        let start = self.index(0, y);
        &self.pixels[start..start + self.size.width as usize]
    }

    pub fn scanline_mut(&mut self, y: i32) -> &mut [u32] {
        assert!(y >= 0 && y < self.size.height, "scanline {y} out of range");
        let start = self.index(0, y);
        let width = self.size.width as usize;
        &mut self.pixels[start..start + width]
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color.0);
    }

    pub fn fill_rect(&mut self, rect: Rect, clip: Rect, color: Color) {
        let area = rect.intersected(clip).intersected(self.rect());
        if area.is_empty() {
            return;
        }
        for y in area.top()..area.bottom() {
            let start = self.index(area.x, y);
            self.pixels[start..start + area.width as usize].fill(color.0);
        }
    }

    /// Blend a translucent color over the destination.
    pub fn fill_rect_blended(&mut self, rect: Rect, clip: Rect, color: Color) {
        if color.alpha() == 0xff {
            return self.fill_rect(rect, clip, color);
        }
        let area = rect.intersected(clip).intersected(self.rect());
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                let index = self.index(x, y);
                self.pixels[index] = color.blend_over(Color(self.pixels[index]), 1.0).0;
            }
        }
    }

    /// One pixel outline.
    pub fn draw_rect(&mut self, rect: Rect, clip: Rect, color: Color) {
        if rect.is_empty() {
            return;
        }
        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, 1), clip, color);
        self.fill_rect(Rect::new(rect.x, rect.bottom() - 1, rect.width, 1), clip, color);
        self.fill_rect(Rect::new(rect.x, rect.y, 1, rect.height), clip, color);
        self.fill_rect(Rect::new(rect.right() - 1, rect.y, 1, rect.height), clip, color);
    }

    /// Destination-space rect that a blit of `source_rect` to `location`
    /// actually touches after clipping, paired with the matching source origin.
    fn clip_blit(&self, location: Point, source: &Self, source_rect: Rect, clip: Rect) -> Option<(Rect, Point)> {
        let source_rect = source_rect.intersected(source.rect());
        let dst = Rect::from_location_and_size(location, source_rect.size())
            .intersected(clip)
            .intersected(self.rect());
        if dst.is_empty() {
            return None;
        }
        let src_origin = Point::new(
            source_rect.x + (dst.x - location.x),
            source_rect.y + (dst.y - location.y),
        );
        Some((dst, src_origin))
    }

    /// Copy `source_rect` of `source` so its top-left lands at `location`.
    pub fn blit(&mut self, location: Point, source: &Self, source_rect: Rect, clip: Rect) {
        let Some((dst, src)) = self.clip_blit(location, source, source_rect, clip) else {
            return;
        };
        let width = dst.width as usize;
        for row in 0..dst.height {
            let s = source.index(src.x, src.y + row);
            let d = self.index(dst.x, dst.y + row);
            self.pixels[d..d + width].copy_from_slice(&source.pixels[s..s + width]);
        }
    }

    /// Like [`blit`](Self::blit), compositing with per-pixel alpha (when the
    /// source has an alpha channel) and a global opacity.
    pub fn blit_blended(
        &mut self,
        location: Point,
        source: &Self,
        source_rect: Rect,
        clip: Rect,
        opacity: f32,
    ) {
        if opacity >= 1.0 && !source.has_alpha_channel {
            return self.blit(location, source, source_rect, clip);
        }
        let Some((dst, src)) = self.clip_blit(location, source, source_rect, clip) else {
            return;
        };
        for row in 0..dst.height {
            for column in 0..dst.width {
                let s = source.index(src.x + column, src.y + row);
                let d = self.index(dst.x + column, dst.y + row);
                let mut pixel = Color(source.pixels[s]);
                if !source.has_alpha_channel {
                    pixel = pixel.with_alpha(0xff);
                }
                self.pixels[d] = pixel.blend_over(Color(self.pixels[d]), opacity).0;
            }
        }
    }

    /// Repeat `source` across `rect`, anchored at the rect origin.
    pub fn blit_tiled(&mut self, rect: Rect, source: &Self, clip: Rect) {
        let area = rect.intersected(clip).intersected(self.rect());
        for y in area.top()..area.bottom() {
            let sy = (y - rect.y).rem_euclid(source.height());
            for x in area.left()..area.right() {
                let sx = (x - rect.x).rem_euclid(source.width());
                let d = self.index(x, y);
                self.pixels[d] = source.pixels[source.index(sx, sy)];
            }
        }
    }

    /// Nearest-neighbour scale of the whole `source` into `rect`.
    pub fn blit_scaled(&mut self, rect: Rect, source: &Self, clip: Rect) {
        if rect.is_empty() {
            return;
        }
        let area = rect.intersected(clip).intersected(self.rect());
        for y in area.top()..area.bottom() {
            let sy = ((i64::from(y - rect.y) * i64::from(source.height())) / i64::from(rect.height)) as i32;
            for x in area.left()..area.right() {
                let sx = ((i64::from(x - rect.x) * i64::from(source.width())) / i64::from(rect.width)) as i32;
                let d = self.index(x, y);
                self.pixels[d] = source.pixels[source.index(sx, sy)];
            }
        }
    }

    /// Copy pixels between two rows/areas of the same bitmap.
    pub fn copy_rect_from(&mut self, source: &Self, rect: Rect) {
        self.blit(rect.location(), source, rect, rect);
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(Color::from_hex("80ffffff"), Some(Color(0x80ff_ffff)));
        assert_eq!(Color::from_hex("#12"), None);
        assert_eq!(Color::from_rgb(0x12, 0x34, 0x56).to_string(), "#123456");
    }

    #[test]
    fn test_blend_half_opacity() {
        let blended = Color::WHITE.blend_over(Color::BLACK, 0.5);
        assert_eq!(blended.red(), 128);
        assert_eq!(blended.alpha(), 255);
        assert_eq!(Color::WHITE.blend_over(Color::BLACK, 0.0), Color::BLACK);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut bitmap = Bitmap::new(Size::new(10, 10));
        bitmap.fill_rect(Rect::new(-5, -5, 8, 8), Rect::new(0, 0, 100, 100), Color::WHITE);
        assert_eq!(bitmap.pixel(Point::new(2, 2)), Some(Color::WHITE));
        assert_eq!(bitmap.pixel(Point::new(3, 3)), Some(Color(0)));
    }

    #[test]
    fn test_blit_with_offset_and_clip() {
        let source = Bitmap::filled(Size::new(4, 4), Color::WHITE);
        let mut dest = Bitmap::filled(Size::new(10, 10), Color::BLACK);
        dest.blit(Point::new(8, 8), &source, source.rect(), Rect::new(0, 0, 9, 10));
        assert_eq!(dest.pixel(Point::new(8, 8)), Some(Color::WHITE));
        assert_eq!(dest.pixel(Point::new(9, 9)), Some(Color::BLACK));
        assert_eq!(dest.pixel(Point::new(7, 7)), Some(Color::BLACK));
    }

    #[test]
    fn test_try_new_rejects_empty() {
        assert!(matches!(
            Bitmap::try_new(Size::new(0, 4)),
            Err(BitmapError::InvalidSize(_))
        ));
    }
}
