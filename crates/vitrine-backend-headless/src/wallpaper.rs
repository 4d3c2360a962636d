//! Wallpaper loading.
//!
//! Decoding runs on a worker thread. The result comes back to the event
//! loop exactly once through a calloop channel, and only the loop thread
//! touches the compositor.

use std::path::{Path, PathBuf};
use std::thread;

use calloop::channel::Sender;
use thiserror::Error;
use tracing::{debug, warn};

use vitrine_core::bitmap::{Bitmap, BitmapError};
use vitrine_core::geometry::Size;

#[derive(Debug, Error)]
pub enum WallpaperError {
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("wallpaper {path:?} is too large: {source}")]
    Bitmap {
        path: PathBuf,
        source: BitmapError,
    },
}

/// What a loader thread sends back.
#[derive(Debug)]
pub struct WallpaperLoaded {
    pub path: PathBuf,
    pub result: Result<Bitmap, WallpaperError>,
}

/// Decode an image file into an ARGB bitmap with an alpha channel.
pub fn decode(path: &Path) -> Result<Bitmap, WallpaperError> {
    let image = image::open(path)
        .map_err(|source| WallpaperError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let size = Size::new(image.width() as i32, image.height() as i32);
    let mut bitmap = Bitmap::try_new(size)
        .map_err(|source| WallpaperError::Bitmap {
            path: path.to_path_buf(),
            source,
        })?
        .with_alpha_channel(true);
    for (pixel, rgba) in bitmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = rgba.0;
        *pixel = u32::from_be_bytes([a, r, g, b]);
    }
    Ok(bitmap)
}

/// Decode `path` on a new thread and deliver the result through `sender`.
pub fn spawn_loader(path: PathBuf, sender: Sender<WallpaperLoaded>) -> thread::JoinHandle<()> {
    debug!("Loading wallpaper {:?} in the background", path);
    thread::spawn(move || {
        let result = decode(&path);
        if sender.send(WallpaperLoaded { path, result }).is_err() {
            warn!("Wallpaper finished loading after the event loop went away");
        }
    })
}
