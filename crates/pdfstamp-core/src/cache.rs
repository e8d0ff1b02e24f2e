//! Session cache of rendered pages
//!
//! Keyed by document content hash rather than object identity, so uploading
//! the same bytes again hits the cache.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::raster::{PageRaster, Resolution};

/// (content hash, page index, resolution)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RasterKey {
    pub content_hash: String,
    pub page_index: usize,
    /// `f64::to_bits` of the DPI, so equal resolutions compare equal
    dpi_bits: u64,
}

impl RasterKey {
    pub fn new(content_hash: &str, page_index: usize, resolution: Resolution) -> Self {
        Self {
            content_hash: content_hash.to_string(),
            page_index,
            dpi_bits: resolution.dpi().to_bits(),
        }
    }

    pub fn dpi(&self) -> f64 {
        f64::from_bits(self.dpi_bits)
    }
}

#[derive(Debug, Default)]
pub struct RasterCache {
    entries: HashMap<RasterKey, PageRaster>,
    hits: u64,
    misses: u64,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached raster for `key`, rendering it with `render` on a miss.
    /// A failed render leaves the cache untouched.
    pub fn get_or_render<F>(&mut self, key: RasterKey, render: F) -> Result<&PageRaster>
    where
        F: FnOnce() -> Result<PageRaster>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                debug!(
                    page = entry.key().page_index,
                    dpi = entry.key().dpi(),
                    "Raster cache miss"
                );
                let raster = render()?;
                Ok(entry.insert(raster))
            }
        }
    }

    /// Store a raster produced outside the cache (e.g. by the host page viewer)
    pub fn insert(&mut self, key: RasterKey, raster: PageRaster) {
        self.entries.insert(key, raster);
    }

    pub fn get(&self, key: &RasterKey) -> Option<&PageRaster> {
        self.entries.get(key)
    }

    /// Drop every raster derived from the document with `content_hash`
    pub fn invalidate_document(&mut self, content_hash: &str) {
        self.entries.retain(|key, _| key.content_hash != content_hash);
    }

    /// Drop every raster rendered at a resolution other than `resolution`
    pub fn retain_resolution(&mut self, resolution: Resolution) {
        let dpi_bits = resolution.dpi().to_bits();
        let before = self.entries.len();
        self.entries.retain(|key, _| key.dpi_bits == dpi_bits);
        debug!(
            dpi = resolution.dpi(),
            evicted = before - self.entries.len(),
            "Evicted rasters at other resolutions"
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
