//! Procedurally generated textures shared across resolved styles.
//!
//! Assets are keyed by their generation parameters, generated once and handed out as
//! `Arc`s. Lookup and creation are thread-safe so hosts can warm the pool from a
//! loader thread; generation happens outside the write lock, and if two threads race
//! on the same key the first insert wins and both get the same instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytemuck::{Pod, Zeroable};
use image::{Rgba, RgbaImage};

use crate::canvas::Canvas;

/// Largest corner mask generated, in pixels. Bigger radii are clamped.
pub const MAX_CORNER_RADIUS: u32 = 256;

/// Generation parameters. Equal keys always produce identical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKey {
    /// 1x1 texture of a solid color.
    Solid { color: [u8; 4] },
    /// Anti-aliased top-left quadrant of a rounded rectangle, `radius` pixels square.
    CornerMask { radius: u32, color: [u8; 4] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(u64);

impl AssetId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One RGBA8 pixel, laid out for direct upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

pub struct CachedAsset {
    id: AssetId,
    key: AssetKey,
    image: RgbaImage,
}

impl CachedAsset {
    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn key(&self) -> AssetKey {
        self.key
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixels(&self) -> &[Rgba8] {
        bytemuck::cast_slice(self.image.as_raw())
    }
}

impl PartialEq for CachedAsset {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for CachedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAsset")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("size", &(self.width(), self.height()))
            .finish()
    }
}

/// Pure pixel generation for a key.
pub fn generate(key: AssetKey) -> RgbaImage {
    match key {
        AssetKey::Solid { color } => RgbaImage::from_pixel(1, 1, Rgba(color)),
        AssetKey::CornerMask { radius, color } => {
            let size = radius.clamp(1, MAX_CORNER_RADIUS);
            let r = size as f32;
            RgbaImage::from_fn(size, size, |x, y| {
                let dx = r - (x as f32 + 0.5);
                let dy = r - (y as f32 + 0.5);
                let distance = (dx * dx + dy * dy).sqrt();
                let coverage = (r - distance + 0.5).clamp(0.0, 1.0);
                let alpha = (f32::from(color[3]) * coverage).round() as u8;
                Rgba([color[0], color[1], color[2], alpha])
            })
        }
    }
}

#[derive(Default)]
pub struct AssetPool {
    assets: RwLock<HashMap<AssetKey, Arc<CachedAsset>>>,
    next_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AssetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the asset for `key`, generating it on first request.
    pub fn resolve_asset(&self, key: AssetKey) -> Arc<CachedAsset> {
        if let Some(asset) = self
            .assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(asset);
        }

        let image = generate(key);
        let mut assets = self.assets.write().unwrap_or_else(PoisonError::into_inner);
        let asset = assets.entry(key).or_insert_with(|| {
            self.misses.fetch_add(1, Ordering::Relaxed);
            let id = AssetId(self.next_id.fetch_add(1, Ordering::Relaxed));
            log::debug!("generated asset {:?} for {:?}", id, key);
            Arc::new(CachedAsset { id, key, image })
        });
        Arc::clone(asset)
    }

    pub fn contains(&self, key: AssetKey) -> bool {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every asset and ask the host to release its native copies.
    ///
    /// Styles still holding an `Arc` keep their pixels alive, but the host handle is
    /// gone; callers normally clear the style cache first.
    pub fn dispose(&self, canvas: &mut dyn Canvas) -> usize {
        let drained: Vec<Arc<CachedAsset>> = self
            .assets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, asset)| asset)
            .collect();
        for asset in &drained {
            canvas.release_asset(asset.id());
        }
        log::debug!("disposed {} assets", drained.len());
        drained.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
