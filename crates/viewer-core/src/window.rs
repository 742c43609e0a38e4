//! Render window decisions.
//!
//! Only pages within `window` of the visible page are rasterized. Everything
//! else is drawn as a placeholder of the best known height.

use std::ops::RangeInclusive;

use crate::heights::HeightCache;

/// Pages rendered on each side of the visible page.
pub const DEFAULT_WINDOW: u32 = 2;

/// Placeholder height before any page has been measured.
pub const DEFAULT_PAGE_HEIGHT: f32 = 800.0;

/// What to draw for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderDecision {
    /// Rasterize the page at `scale`.
    Materialize { scale: f32 },
    /// Reserve `height` of empty space.
    Placeholder { height: f32 },
}

impl RenderDecision {
    pub fn is_materialize(&self) -> bool {
        matches!(self, Self::Materialize { .. })
    }

    /// One-letter code, `M` or `P`.
    pub fn code(&self) -> char {
        match self {
            Self::Materialize { .. } => 'M',
            Self::Placeholder { .. } => 'P',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub window: u32,
    pub default_page_height: f32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self { window: DEFAULT_WINDOW, default_page_height: DEFAULT_PAGE_HEIGHT }
    }
}

impl WindowPolicy {
    pub fn contains(&self, page: u32, visible_page: u32) -> bool {
        page.abs_diff(visible_page) <= self.window
    }

    /// Pages in the window around `visible_page`, clipped to `1..=page_count`.
    pub fn range(&self, visible_page: u32, page_count: u32) -> RangeInclusive<u32> {
        if page_count == 0 {
            #[allow(clippy::reversed_empty_ranges)]
            return 1..=0;
        }

        let start = visible_page.saturating_sub(self.window).max(1);
        let end = visible_page.saturating_add(self.window).min(page_count);
        start..=end
    }

    /// Decides how `page` is drawn. Pure in all of its inputs.
    pub fn decide(
        &self,
        page: u32,
        visible_page: u32,
        scale: f32,
        heights: &HeightCache,
    ) -> RenderDecision {
        if self.contains(page, visible_page) {
            RenderDecision::Materialize { scale }
        } else {
            RenderDecision::Placeholder {
                height: heights.placeholder_height(page, self.default_page_height),
            }
        }
    }
}
