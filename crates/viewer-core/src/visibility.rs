//! Visible page tracking.
//!
//! A [`VisibilitySource`] watches the page targets of a scroll container and
//! emits [`VisibilityTick`]s: batches of `(page, ratio)` entries for targets
//! whose visibility crossed one of the configured thresholds. The viewer folds
//! every tick into its visible page with [`next_visible_page`].

use std::collections::HashMap;

/// Coarse visibility thresholds (10%, 50%, 90%).
pub const DEFAULT_THRESHOLDS: [f32; 3] = [0.1, 0.5, 0.9];

/// Visible fraction of one page at one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    pub page: u32,
    pub ratio: f32,
}

impl VisibilityEntry {
    pub fn new(page: u32, ratio: f32) -> Self {
        Self { page, ratio }
    }
}

/// One batch of visibility entries delivered by an observer callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityTick {
    pub entries: Vec<VisibilityEntry>,
}

impl VisibilityTick {
    pub fn new(entries: Vec<VisibilityEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u32, f32)> for VisibilityTick {
    fn from_iter<I: IntoIterator<Item = (u32, f32)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(page, ratio)| VisibilityEntry { page, ratio }).collect() }
    }
}

/// Folds `tick` into the current visible page.
///
/// The single page with the largest positive ratio wins. A tie for the
/// largest ratio, or a tick in which nothing intersects, leaves `current`
/// unchanged.
pub fn next_visible_page(current: u32, tick: &VisibilityTick) -> u32 {
    let mut best: Option<(u32, f32)> = None;
    let mut tied = false;

    for entry in tick.entries.iter().filter(|entry| entry.ratio > 0.0) {
        match best {
            Some((_, ratio)) if entry.ratio < ratio => {}
            Some((page, ratio)) if entry.ratio == ratio => {
                if page != entry.page {
                    tied = true;
                }
            }
            _ => {
                best = Some((entry.page, entry.ratio));
                tied = false;
            }
        }
    }

    match best {
        Some((page, _)) if !tied => page,
        _ => current,
    }
}

/// Index of the threshold band `ratio` falls in: the number of thresholds it
/// has reached.
pub fn threshold_band(ratio: f32, thresholds: &[f32]) -> usize {
    thresholds.iter().filter(|threshold| ratio >= **threshold).count()
}

/// Scrollable viewport the page targets live in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollContainer {
    pub viewport_height: f32,
    pub page_spacing: f32,
}

impl ScrollContainer {
    pub fn new(viewport_height: f32, page_spacing: f32) -> Self {
        Self { viewport_height, page_spacing }
    }
}

/// One observed page element and its current layout height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTarget {
    pub page: u32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverSetupError {
    #[error("scroll container is missing")]
    MissingContainer,
    #[error("no page targets to observe")]
    NoTargets,
    #[error("scroll container has unusable viewport height")]
    InvalidContainer,
}

/// Something that reports page visibility for a scroll container.
pub trait VisibilitySource {
    /// Starts observing `targets` inside `container`, replacing any previous
    /// registration.
    fn observe(
        &mut self,
        targets: &[PageTarget],
        container: Option<&ScrollContainer>,
    ) -> Result<(), ObserverSetupError>;

    /// Stops observing every target.
    fn disconnect(&mut self);

    /// Pages currently observed.
    fn observed(&self) -> Vec<u32>;

    /// Notifies the source that a target's layout height changed.
    fn resize_target(&mut self, _page: u32, _height: f32) {}
}

/// Geometric observer over a vertical stack of pages.
///
/// Pages are laid out top to bottom in target order, separated by the
/// container's page spacing. Each [`scroll_to`](Self::scroll_to) computes
/// intersection ratios against the viewport and reports the targets whose
/// threshold band changed. The first call after registration reports every
/// target.
#[derive(Debug, Clone)]
pub struct ScrollObserver {
    thresholds: Vec<f32>,
    container: Option<ScrollContainer>,
    targets: Vec<PageTarget>,
    bands: HashMap<u32, usize>,
    primed: bool,
}

impl Default for ScrollObserver {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLDS.to_vec())
    }
}

impl ScrollObserver {
    pub fn new(thresholds: Vec<f32>) -> Self {
        Self { thresholds, container: None, targets: Vec::new(), bands: HashMap::new(), primed: false }
    }

    pub fn is_observing(&self) -> bool {
        self.container.is_some()
    }

    /// Top offset of `page` in the scroll content.
    pub fn offset_of(&self, page: u32) -> Option<f32> {
        let spacing = self.container?.page_spacing;
        let mut cursor = 0.0;

        for target in &self.targets {
            if target.page == page {
                return Some(cursor);
            }
            cursor += target.height + spacing;
        }

        None
    }

    /// Total height of the scroll content.
    pub fn content_height(&self) -> f32 {
        let Some(container) = self.container else {
            return 0.0;
        };

        let pages: f32 = self.targets.iter().map(|target| target.height).sum();
        let gaps = self.targets.len().saturating_sub(1) as f32 * container.page_spacing;
        pages + gaps
    }

    /// Visibility ratio of every observed target with the viewport top at `offset`.
    pub fn intersection_ratios(&self, offset: f32) -> Vec<VisibilityEntry> {
        let Some(container) = self.container else {
            return Vec::new();
        };

        let view_top = offset;
        let view_bottom = offset + container.viewport_height;
        let mut cursor = 0.0;
        let mut entries = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let top = cursor;
            let bottom = cursor + target.height;
            cursor = bottom + container.page_spacing;

            let ratio = if target.height > 0.0 {
                let overlap = (bottom.min(view_bottom) - top.max(view_top)).max(0.0);
                (overlap / target.height).clamp(0.0, 1.0)
            } else {
                0.0
            };

            entries.push(VisibilityEntry { page: target.page, ratio });
        }

        entries
    }

    /// Moves the viewport top to `offset` and returns the resulting tick.
    pub fn scroll_to(&mut self, offset: f32) -> VisibilityTick {
        if !self.is_observing() {
            return VisibilityTick::default();
        }

        let mut tick = VisibilityTick::default();

        for entry in self.intersection_ratios(offset) {
            let band = threshold_band(entry.ratio, &self.thresholds);
            let previous = self.bands.insert(entry.page, band);

            if !self.primed || previous != Some(band) {
                tick.entries.push(entry);
            }
        }

        self.primed = true;
        tick
    }
}

impl VisibilitySource for ScrollObserver {
    fn observe(
        &mut self,
        targets: &[PageTarget],
        container: Option<&ScrollContainer>,
    ) -> Result<(), ObserverSetupError> {
        self.disconnect();

        let container = container.ok_or(ObserverSetupError::MissingContainer)?;
        if !(container.viewport_height.is_finite() && container.viewport_height > 0.0) {
            return Err(ObserverSetupError::InvalidContainer);
        }
        if targets.is_empty() {
            return Err(ObserverSetupError::NoTargets);
        }

        self.container = Some(*container);
        self.targets = targets.to_vec();
        log::debug!("observing {} page targets", self.targets.len());

        Ok(())
    }

    fn disconnect(&mut self) {
        if self.container.take().is_some() {
            log::debug!("stopped observing {} page targets", self.targets.len());
        }
        self.targets.clear();
        self.bands.clear();
        self.primed = false;
    }

    fn observed(&self) -> Vec<u32> {
        self.targets.iter().map(|target| target.page).collect()
    }

    fn resize_target(&mut self, page: u32, height: f32) {
        if let Some(target) = self.targets.iter_mut().find(|target| target.page == page) {
            target.height = height;
        }
    }
}
