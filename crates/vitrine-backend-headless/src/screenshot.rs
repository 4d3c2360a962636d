//! Frame dumps.

use std::path::Path;

use image::{ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::info;

use vitrine_core::bitmap::Bitmap;

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("bitmap of {0} does not fit an image buffer")]
    Size(vitrine_core::geometry::Size),
    #[error("failed to write screenshot: {0}")]
    Write(#[from] image::ImageError),
}

/// Convert ARGB pixels to an RGBA image. Alpha is forced opaque unless the
/// bitmap carries an alpha channel.
pub fn to_image(bitmap: &Bitmap) -> Result<RgbaImage, ScreenshotError> {
    let size = bitmap.size();
    let mut bytes = Vec::with_capacity(bitmap.pixels().len() * 4);
    for &pixel in bitmap.pixels() {
        let [a, r, g, b] = pixel.to_be_bytes();
        let a = if bitmap.has_alpha_channel() { a } else { 0xff };
        bytes.extend_from_slice(&[r, g, b, a]);
    }
    RgbaImage::from_raw(size.width as u32, size.height as u32, bytes).ok_or(ScreenshotError::Size(size))
}

/// Write `bitmap` to `path` as PNG.
pub fn save_png(bitmap: &Bitmap, path: &Path) -> Result<(), ScreenshotError> {
    to_image(bitmap)?.save_with_format(path, ImageFormat::Png)?;
    info!("Saved {} screenshot to {:?}", bitmap.size(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::bitmap::Color;
    use vitrine_core::geometry::{Point, Size};

    #[test]
    fn test_pixels_are_converted_to_rgba() {
        let mut bitmap = Bitmap::filled(Size::new(2, 1), Color(0x0011_2233));
        bitmap.set_pixel(Point::new(1, 0), Color::from_rgb(0xaa, 0xbb, 0xcc));
        let image = to_image(&bitmap).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0x11, 0x22, 0x33, 0xff]);
        assert_eq!(image.get_pixel(1, 0).0, [0xaa, 0xbb, 0xcc, 0xff]);
    }

    #[test]
    fn test_save_png_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let bitmap = Bitmap::filled(Size::new(8, 4), Color::from_rgb(0x50, 0x50, 0x50));
        save_png(&bitmap, &path).unwrap();
        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (8, 4));
        assert_eq!(image.get_pixel(7, 3).0, [0x50, 0x50, 0x50, 0xff]);
    }
}
