use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};

use crate::app::sprite::BasicSprite;
use crate::app::ImageRegion;
use crate::resource_keys::{sprite_path_for_key, ResourceKeyError};

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid image key '{key}': {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: ResourceKeyError,
    },
    #[error("rgba buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SpriteImage {
    pub fn load(path: &Path) -> Result<Self, ImageLoadError> {
        let reader = ImageReader::open(path).map_err(|source| ImageLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = reader.decode().map_err(|source| ImageLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let image = decoded.to_rgba8();
        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "image_loaded"
        );
        Ok(Self {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }

    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ImageLoadError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ImageLoadError::BufferSize {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::from_fn(width, height, |_, _| color)
    }

    pub fn from_fn(width: u32, height: u32, mut pixel: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&pixel(x, y));
            }
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn full_region(&self) -> ImageRegion {
        ImageRegion::new(0, 0, self.width, self.height)
    }

    /// Returns `region` when it is non-empty and lies inside the image.
    pub fn region(&self, region: ImageRegion) -> Option<ImageRegion> {
        (!region.is_empty() && region.fits_within(self.width, self.height)).then_some(region)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Flyweight factory: each key is decoded at most once and shared after that.
#[derive(Debug)]
pub struct ImageCache {
    asset_root: PathBuf,
    images: HashMap<String, Arc<SpriteImage>>,
}

impl ImageCache {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            images: HashMap::new(),
        }
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn get(&self, key: &str) -> Option<Arc<SpriteImage>> {
        self.images.get(key).cloned()
    }

    /// Replaces any image already stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, image: SpriteImage) -> Arc<SpriteImage> {
        let image = Arc::new(image);
        self.images.insert(key.into(), Arc::clone(&image));
        image
    }

    pub fn get_or_load(&mut self, key: &str) -> Result<Arc<SpriteImage>, ImageLoadError> {
        if let Some(image) = self.get(key) {
            return Ok(image);
        }
        let path =
            sprite_path_for_key(&self.asset_root, key).map_err(|source| ImageLoadError::InvalidKey {
                key: key.to_string(),
                source,
            })?;
        self.get_or_load_path(key, &path)
    }

    pub fn get_or_load_path(
        &mut self,
        key: &str,
        path: &Path,
    ) -> Result<Arc<SpriteImage>, ImageLoadError> {
        if let Some(image) = self.get(key) {
            return Ok(image);
        }
        let image = Arc::new(SpriteImage::load(path)?);
        self.images.insert(key.to_string(), Arc::clone(&image));
        debug!(key, cached = self.images.len(), "image_cache_insert");
        Ok(image)
    }

    /// New sprite sharing the cached image for `key`.
    pub fn basic_sprite(&mut self, key: &str) -> Result<BasicSprite, ImageLoadError> {
        Ok(BasicSprite::with_image(self.get_or_load(key)?))
    }

    pub fn flush(&mut self) {
        debug!(flushed = self.images.len(), "image_cache_flush");
        self.images.clear();
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        image::RgbaImage::from_pixel(width, height, image::Rgba(color))
            .save(path)
            .expect("write png");
    }

    #[test]
    fn load_decodes_png_into_rgba() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("red.png");
        write_png(&path, 3, 2, [255, 0, 0, 255]);

        let image = SpriteImage::load(&path).expect("load");
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(image.pixel(2, 1), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(3, 0), None);
    }

    #[test]
    fn load_missing_file_reports_open_error() {
        let temp = TempDir::new().expect("temp");
        let error = SpriteImage::load(&temp.path().join("missing.png")).expect_err("missing");
        assert!(matches!(error, ImageLoadError::Open { .. }));
    }

    #[test]
    fn load_garbage_reports_decode_error() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").expect("write");
        let error = SpriteImage::load(&path).expect_err("garbage");
        assert!(matches!(error, ImageLoadError::Decode { .. }));
    }

    #[test]
    fn from_rgba_rejects_wrong_length() {
        let error = SpriteImage::from_rgba(2, 2, vec![0; 15]).expect_err("size");
        assert!(matches!(
            error,
            ImageLoadError::BufferSize {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn region_rejects_out_of_bounds_and_empty() {
        let image = SpriteImage::solid(8, 4, [0, 0, 0, 255]);
        assert_eq!(
            image.region(ImageRegion::new(4, 0, 4, 4)),
            Some(ImageRegion::new(4, 0, 4, 4))
        );
        assert_eq!(image.region(ImageRegion::new(6, 0, 4, 4)), None);
        assert_eq!(image.region(ImageRegion::new(0, 0, 0, 4)), None);
    }

    #[test]
    fn cache_loads_each_key_once() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("sprites").join("hero.png");
        write_png(&path, 2, 2, [0, 255, 0, 255]);
        let mut cache = ImageCache::new(temp.path());

        let first = cache.get_or_load("hero").expect("first load");
        std::fs::remove_file(&path).expect("remove");
        let second = cache.get_or_load("hero").expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_failure_is_not_cached() {
        let temp = TempDir::new().expect("temp");
        let mut cache = ImageCache::new(temp.path());

        assert!(cache.get_or_load("ghost").is_err());
        assert!(cache.is_empty());

        write_png(&temp.path().join("sprites").join("ghost.png"), 1, 1, [1, 2, 3, 255]);
        assert!(cache.get_or_load("ghost").is_ok());
    }

    #[test]
    fn cache_rejects_invalid_keys_without_touching_disk() {
        let mut cache = ImageCache::new("unused");
        let error = cache.get_or_load("../escape").expect_err("invalid key");
        assert!(matches!(error, ImageLoadError::InvalidKey { .. }));
    }

    #[test]
    fn insert_replaces_and_flush_empties() {
        let mut cache = ImageCache::new("unused");
        cache.insert("tile", SpriteImage::solid(1, 1, [1, 1, 1, 255]));
        cache.insert("tile", SpriteImage::solid(2, 2, [2, 2, 2, 255]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("tile").expect("tile").width(), 2);

        cache.flush();
        assert!(cache.get("tile").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn basic_sprite_shares_cached_image() {
        let mut cache = ImageCache::new("unused");
        let image = cache.insert("coin", SpriteImage::solid(1, 1, [9, 9, 9, 255]));
        let sprite = cache.basic_sprite("coin").expect("sprite");
        assert!(Arc::ptr_eq(sprite.image().expect("image"), &image));
    }
}
