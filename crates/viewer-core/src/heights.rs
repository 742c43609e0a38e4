//! Rendered page height cache.
//!
//! Heights are recorded after a page is rasterized and reused to size the
//! placeholders of pages outside the render window, so that the total scroll
//! height stays stable while pages come and go.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Page index to last observed rendered height.
///
/// Updates replace the shared map as a whole: a [`snapshot`](Self::snapshot)
/// taken before a write never observes that write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeightCache {
    entries: Arc<BTreeMap<u32, f32>>,
}

impl HeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: u32) -> Option<f32> {
        self.entries.get(&page).copied()
    }

    /// Height to reserve for `page`: its own measurement, else the first
    /// page's, else `default_height`.
    pub fn placeholder_height(&self, page: u32, default_height: f32) -> f32 {
        self.get(page).or_else(|| self.get(1)).unwrap_or(default_height)
    }

    /// Stores `height` for `page`.
    ///
    /// Returns `false` without touching the cache when the value is already
    /// cached or is not a usable height.
    pub fn record(&mut self, page: u32, height: f32) -> bool {
        if !height.is_finite() || height <= 0.0 {
            log::warn!("ignoring unusable height {height} for page {page}");
            return false;
        }

        if self.get(page) == Some(height) {
            return false;
        }

        Arc::make_mut(&mut self.entries).insert(page, height);
        log::debug!("page {page} height cached at {height}");
        true
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries = Arc::new(BTreeMap::new());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared read-only view of the current entries.
    pub fn snapshot(&self) -> Arc<BTreeMap<u32, f32>> {
        Arc::clone(&self.entries)
    }
}
