//! Image decoding for texture loaders
//!
//! Decoding happens off the frame loop; results are handed to the waiting
//! texture through its [`TextureLoader`].

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use image::RgbaImage;

use crate::render::TextureLoader;

use super::{AssetError, AssetResult};

/// Decode an image file into RGBA8
pub fn decode_file(path: impl AsRef<Path>) -> AssetResult<RgbaImage> {
    let path = path.as_ref();
    log::debug!("Loading image from: {:?}", path);

    let image = image::open(path)
        .map_err(|e| AssetError::LoadFailed(format!("Failed to load image {}: {}", path.display(), e)))?
        .to_rgba8();

    log::debug!("Loaded image {}x{} from {:?}", image.width(), image.height(), path);
    Ok(image)
}

/// Decode an in-memory encoded image into RGBA8
pub fn decode_bytes(bytes: &[u8]) -> AssetResult<RgbaImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| AssetError::LoadFailed(format!("Failed to load image from bytes: {}", e)))?;
    Ok(image.to_rgba8())
}

/// Solid color image, handy for placeholders and tests
pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, image::Rgba(color))
}

/// Resolve a loader's URI against `base_dir`, decode it and complete the loader.
///
/// Failures are delivered to the texture instead of being returned.
pub fn complete_from_dir(loader: TextureLoader, base_dir: &Path) {
    let path = base_dir.join(loader.uri());
    match decode_file(&path) {
        Ok(image) => loader.complete(vec![image]),
        Err(err) => loader.fail(err.to_string()),
    }
}

/// Decode every loader's image on a background thread
pub fn spawn_loads(loaders: Vec<TextureLoader>, base_dir: PathBuf) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let count = loaders.len();
        for loader in loaders {
            complete_from_dir(loader, &base_dir);
        }
        log::debug!("Finished {} texture loads from {}", count, base_dir.display());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{Sampler, TextureKind};
    use crate::render::{HeadlessDevice, Texture, TextureState};

    #[test]
    fn test_solid_color_image() {
        let image = solid_color(4, 2, [255, 0, 0, 255]);
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(3, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_png_round_trip_through_memory() {
        let image = solid_color(2, 2, [0, 128, 255, 255]);
        let mut encoded = std::io::Cursor::new(Vec::new());
        image.write_to(&mut encoded, image::ImageFormat::Png).unwrap();

        let decoded = decode_bytes(encoded.get_ref()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_missing_file_fails_texture() {
        let mut device = HeadlessDevice::new();
        let (mut texture, loader) = Texture::pending("does-not-exist.png", TextureKind::Texture2D, Sampler::default());

        spawn_loads(vec![loader], std::env::temp_dir()).join().unwrap();
        assert!(!texture.prepare(&mut device).unwrap());
        assert!(matches!(texture.state(), TextureState::Failed(_)));
    }
}
