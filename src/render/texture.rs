use std::collections::HashMap;

use smallvec::SmallVec;

use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::HandleId;
use crate::render::composite;
use crate::render::surface::ImageView;

/// Decoded image held by the backend, premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    fingerprint: u64,
}

impl Texture {
    /// Wrap premultiplied pixels.
    pub fn from_premul(width: u32, height: u32, pixels: Vec<u8>) -> StageResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| StageError::validation("texture size overflow"))?;
        if pixels.len() != expected {
            return Err(StageError::validation(format!(
                "texture {width}x{height} expects {expected} bytes, got {}",
                pixels.len()
            )));
        }
        let fingerprint = fingerprint(width, height, &pixels);
        Ok(Self {
            width,
            height,
            pixels,
            fingerprint,
        })
    }

    /// Premultiply straight-alpha RGBA8 and wrap it.
    pub fn from_straight_rgba(width: u32, height: u32, mut pixels: Vec<u8>) -> StageResult<Self> {
        for px in pixels.chunks_exact_mut(4) {
            let p = composite::premultiply([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&p);
        }
        Self::from_premul(width, height, pixels)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Content hash over size and pixels.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Borrow for drawing.
    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            width: self.width,
            height: self.height,
            pixels: &self.pixels,
        }
    }
}

fn fingerprint(width: u32, height: u32, pixels: &[u8]) -> u64 {
    let mut h = xxhash_rust::xxh3::Xxh3::new();
    h.update(&width.to_le_bytes());
    h.update(&height.to_le_bytes());
    h.update(pixels);
    h.digest()
}

/// Textures by key, plus which bitmap nodes draw each key.
///
/// Links let a content change invalidate exactly the nodes that show it. Bitmaps without a
/// texture key are never linked.
#[derive(Debug, Default)]
pub struct TextureStore {
    textures: HashMap<String, Texture>,
    links: HashMap<String, SmallVec<[HandleId; 4]>>,
}

impl TextureStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `texture` under `key`. Returns `true` when the content differs from what was
    /// stored before.
    pub fn insert(&mut self, key: &str, texture: Texture) -> bool {
        if self
            .textures
            .get(key)
            .is_some_and(|t| t.fingerprint == texture.fingerprint)
        {
            return false;
        }
        self.textures.insert(key.to_owned(), texture);
        true
    }

    /// Texture stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Texture> {
        self.textures.get(key)
    }

    /// Drop a texture. Links are kept so a later re-registration still invalidates.
    pub fn remove(&mut self, key: &str) -> bool {
        self.textures.remove(key).is_some()
    }

    /// Number of stored textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Record that `node` draws `key`.
    pub fn link(&mut self, key: &str, node: HandleId) {
        let list = self.links.entry(key.to_owned()).or_default();
        if !list.contains(&node) {
            list.push(node);
        }
    }

    /// Forget that `node` draws `key`.
    pub fn unlink(&mut self, key: &str, node: HandleId) {
        if let Some(list) = self.links.get_mut(key) {
            list.retain(|h| *h != node);
            if list.is_empty() {
                self.links.remove(key);
            }
        }
    }

    /// Nodes drawing `key`.
    pub fn linked(&self, key: &str) -> &[HandleId] {
        self.links.get(key).map_or(&[], |l| l.as_slice())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/texture.rs"]
mod tests;
