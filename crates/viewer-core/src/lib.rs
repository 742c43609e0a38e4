//! Windowed page rendering for the knowledge-base file viewer.
//!
//! A PDF may have hundreds of pages. Only the pages within a small window of
//! the page currently in view are rasterized; the rest are drawn as
//! placeholders sized from measured heights so that the scroll height stays
//! stable.
//!
//! # Example
//!
//! ```
//! use viewer_core::{HeightCache, RenderDecision, WindowPolicy};
//!
//! let policy = WindowPolicy::default();
//! let mut heights = HeightCache::new();
//! heights.record(1, 600.0);
//!
//! assert_eq!(policy.decide(5, 5, 1.2, &heights), RenderDecision::Materialize { scale: 1.2 });
//! assert_eq!(policy.decide(9, 5, 1.2, &heights), RenderDecision::Placeholder { height: 600.0 });
//! ```

pub mod config;
pub mod content;
pub mod heights;
pub mod resource;
pub mod viewer;
pub mod visibility;
pub mod window;
pub mod zoom;

pub use config::{ConfigError, ViewerConfig};
pub use content::{ContentKind, FileContent, ViewerFile};
pub use heights::HeightCache;
pub use resource::{DownloadLink, Resource, ResourceRegistry, ResourceUrl};
pub use viewer::{LoadState, PageView, PdfViewer, RasterTicket, ViewerError};
pub use visibility::{
    next_visible_page, threshold_band, ObserverSetupError, PageTarget, ScrollContainer,
    ScrollObserver, VisibilityEntry, VisibilitySource, VisibilityTick, DEFAULT_THRESHOLDS,
};
pub use window::{RenderDecision, WindowPolicy, DEFAULT_PAGE_HEIGHT, DEFAULT_WINDOW};
pub use zoom::ZoomController;
