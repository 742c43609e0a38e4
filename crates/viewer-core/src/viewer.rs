//! Windowed PDF viewer state.
//!
//! [`PdfViewer`] ties the pieces together for one viewer instance:
//! - decoding the opened file and owning its download link,
//! - registering page targets with a [`VisibilitySource`],
//! - folding visibility ticks into the visible page,
//! - deciding per page between rasterization and placeholder,
//! - issuing rasterization tickets and accepting their (possibly late) results.
//!
//! All methods run on the caller's event loop. Rasterization happens outside
//! the viewer; its completion comes back through
//! [`PdfViewer::complete_rasterization`].

use std::collections::BTreeMap;
use std::sync::Arc;

use pdf_engine::{DecodeError, Document, DocumentSource, PageRasterizer, RasterError};

use crate::config::ViewerConfig;
use crate::content::{ContentKind, ViewerFile};
use crate::heights::HeightCache;
use crate::resource::{DownloadLink, ResourceRegistry};
use crate::visibility::{
    next_visible_page, ObserverSetupError, PageTarget, ScrollContainer, ScrollObserver,
    VisibilitySource, VisibilityTick,
};
use crate::window::{RenderDecision, WindowPolicy};
use crate::zoom::ZoomController;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("{name} is not a PDF (content type {mime_type})")]
    NotPdf { name: String, mime_type: String },
    #[error("failed to load PDF")]
    Decode(#[source] Arc<DecodeError>),
    #[error("visibility observer setup failed")]
    ObserverSetup(#[from] ObserverSetupError),
    #[error("viewer is unusable after an observer setup failure")]
    Broken,
}

/// Document lifecycle of the viewer.
#[derive(Debug, Clone)]
pub enum LoadState {
    Empty,
    Loaded(Document),
    /// The file could not be decoded. Nothing is rendered until another file
    /// is opened.
    Failed(Arc<DecodeError>),
    /// Observer registration failed. The instance accepts no further work.
    Broken(ObserverSetupError),
}

/// Handle for one requested page rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterTicket {
    pub page: u32,
    pub scale: f32,
    /// File generation the request belongs to.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum RasterStatus {
    Pending,
    Rendered { height: f32 },
    Failed(String),
}

/// What the page slot shows right now.
#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    Placeholder { height: f32 },
    Rendering { scale: f32 },
    Rendered { height: f32 },
    Failed { message: String },
}

pub struct PdfViewer<S: VisibilitySource = ScrollObserver> {
    policy: WindowPolicy,
    zoom: ZoomController,
    resources: ResourceRegistry,
    source: S,
    container: Option<ScrollContainer>,
    state: LoadState,
    file_name: Option<String>,
    download: Option<DownloadLink>,
    visible_page: Option<u32>,
    heights: HeightCache,
    mounted: BTreeMap<u32, f32>,
    status: BTreeMap<u32, RasterStatus>,
    generation: u64,
    revision: u64,
}

impl PdfViewer<ScrollObserver> {
    /// Viewer backed by a geometric [`ScrollObserver`].
    pub fn with_scroll_observer(config: &ViewerConfig, resources: ResourceRegistry) -> Self {
        let observer = ScrollObserver::new(config.thresholds.clone());
        Self::new(config, resources, observer)
    }

    /// Scrolls the observed container and applies the resulting tick.
    pub fn scroll_to(&mut self, offset: f32) -> Option<u32> {
        let tick = self.source.scroll_to(offset);
        self.apply_tick(&tick)
    }
}

impl<S: VisibilitySource> PdfViewer<S> {
    pub fn new(config: &ViewerConfig, resources: ResourceRegistry, source: S) -> Self {
        Self {
            policy: WindowPolicy {
                window: config.window,
                default_page_height: config.default_page_height,
            },
            zoom: ZoomController::from_config(config),
            resources,
            source,
            container: None,
            state: LoadState::Empty,
            file_name: None,
            download: None,
            visible_page: None,
            heights: HeightCache::new(),
            mounted: BTreeMap::new(),
            status: BTreeMap::new(),
            generation: 0,
            revision: 0,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn document(&self) -> Option<&Document> {
        match &self.state {
            LoadState::Loaded(document) => Some(document),
            _ => None,
        }
    }

    pub fn page_count(&self) -> Option<u32> {
        self.document().map(Document::page_count)
    }

    pub fn visible_page(&self) -> Option<u32> {
        self.visible_page
    }

    pub fn scale(&self) -> f32 {
        self.zoom.scale()
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn heights(&self) -> &HeightCache {
        &self.heights
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn download_link(&self) -> Option<&DownloadLink> {
        self.download.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Bumped whenever the opened file changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Counts observable state transitions; a consumer redraws when it changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn is_broken(&self) -> bool {
        matches!(self.state, LoadState::Broken(_))
    }

    /// Opens `file`, replacing whatever was shown before.
    ///
    /// Returns the page count. A decode failure leaves the viewer in
    /// [`LoadState::Failed`] and is also returned as an error.
    pub fn open(&mut self, file: ViewerFile) -> Result<u32, ViewerError> {
        if self.is_broken() {
            return Err(ViewerError::Broken);
        }

        self.reset();
        self.generation += 1;
        self.file_name = Some(file.name.clone());
        self.touch();

        if file.kind() != ContentKind::Pdf {
            return Err(ViewerError::NotPdf { name: file.name, mime_type: file.mime_type });
        }

        let bytes = match DocumentSource::from(file.content).into_shared() {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(&file.name, err)),
        };

        // Acquired before decoding so a failed decode releases it on the way out.
        let link = self.resources.create(Arc::clone(&bytes), &file.mime_type, &file.name);

        let document = match pdf_engine::load(bytes) {
            Ok(document) => document,
            Err(err) => {
                link.release();
                return Err(self.fail(&file.name, err));
            }
        };

        let page_count = document.page_count();
        log::info!("opened {} ({page_count} pages)", file.name);

        self.download = Some(link);
        self.state = LoadState::Loaded(document);
        self.visible_page = Some(1);

        if self.container.is_some() {
            self.register_targets()?;
        }

        Ok(page_count)
    }

    fn fail(&mut self, name: &str, err: DecodeError) -> ViewerError {
        log::warn!("failed to load {name}: {err}");
        let err = Arc::new(err);
        self.state = LoadState::Failed(Arc::clone(&err));
        ViewerError::Decode(err)
    }

    /// Attaches the scroll container and registers every page with the
    /// visibility source. Registration is repeated automatically when a new
    /// document finishes loading.
    ///
    /// A missing container is fatal: the viewer moves to [`LoadState::Broken`].
    pub fn attach(&mut self, container: Option<ScrollContainer>) -> Result<(), ViewerError> {
        if self.is_broken() {
            return Err(ViewerError::Broken);
        }

        let Some(container) = container else {
            return Err(self.break_with(ObserverSetupError::MissingContainer));
        };

        self.container = Some(container);

        match self.state {
            LoadState::Loaded(_) => self.register_targets(),
            _ => Ok(()),
        }
    }

    fn register_targets(&mut self) -> Result<(), ViewerError> {
        let targets = self.page_targets();

        if let Err(err) = self.source.observe(&targets, self.container.as_ref()) {
            return Err(self.break_with(err));
        }

        Ok(())
    }

    fn break_with(&mut self, err: ObserverSetupError) -> ViewerError {
        log::warn!("visibility observer setup failed: {err}");
        self.source.disconnect();
        self.mounted.clear();
        self.status.clear();
        drop(self.download.take());
        self.visible_page = None;
        self.state = LoadState::Broken(err.clone());
        self.touch();
        ViewerError::ObserverSetup(err)
    }

    fn page_targets(&self) -> Vec<PageTarget> {
        let page_count = self.page_count().unwrap_or(0);
        (1..=page_count)
            .map(|page| PageTarget { page, height: self.placeholder_height(page) })
            .collect()
    }

    /// Applies one visibility tick. Returns the visible page afterwards.
    pub fn apply_tick(&mut self, tick: &VisibilityTick) -> Option<u32> {
        let (Some(current), Some(page_count)) = (self.visible_page, self.page_count()) else {
            return self.visible_page;
        };

        let in_range = VisibilityTick::new(
            tick.entries.iter().copied().filter(|e| (1..=page_count).contains(&e.page)).collect(),
        );
        let next = next_visible_page(current, &in_range);

        if next != current {
            log::debug!("visible page {current} -> {next}");
            self.visible_page = Some(next);
            self.touch();
        }

        self.visible_page
    }

    /// Render decision for `page`, or `None` when no document is loaded or
    /// `page` is out of range.
    pub fn render(&self, page: u32) -> Option<RenderDecision> {
        let visible_page = self.visible_page?;
        let page_count = self.page_count()?;
        if !(1..=page_count).contains(&page) {
            return None;
        }

        Some(self.policy.decide(page, visible_page, self.scale(), &self.heights))
    }

    /// Decisions for every page in order.
    pub fn render_all(&self) -> Vec<RenderDecision> {
        let page_count = self.page_count().unwrap_or(0);
        (1..=page_count).filter_map(|page| self.render(page)).collect()
    }

    /// Height reserved for `page` while it is not rendered.
    pub fn placeholder_height(&self, page: u32) -> f32 {
        self.heights.placeholder_height(page, self.policy.default_page_height)
    }

    /// What the slot for `page` currently shows.
    pub fn page_view(&self, page: u32) -> Option<PageView> {
        let view = match self.render(page)? {
            RenderDecision::Placeholder { height } => PageView::Placeholder { height },
            RenderDecision::Materialize { scale } => match self.status.get(&page) {
                Some(RasterStatus::Rendered { height }) if self.mounted.get(&page) == Some(&scale) => {
                    PageView::Rendered { height: *height }
                }
                Some(RasterStatus::Failed(message)) => {
                    PageView::Failed { message: message.clone() }
                }
                _ => PageView::Rendering { scale },
            },
        };

        Some(view)
    }

    /// Mounts the pages of the current window and returns a ticket for every
    /// page that needs a fresh rasterization: pages that just entered the
    /// window and pages whose mounted scale is stale. Pages that left the
    /// window are unmounted.
    ///
    /// In-flight work is never deduplicated; a page that leaves and re-enters
    /// the window gets a new ticket.
    pub fn sync_window(&mut self) -> Vec<RasterTicket> {
        let (Some(visible_page), Some(page_count)) = (self.visible_page, self.page_count()) else {
            return Vec::new();
        };

        let window = self.policy.range(visible_page, page_count);
        let scale = self.scale();

        let before = self.mounted.len();
        self.mounted.retain(|page, _| window.contains(page));
        self.status.retain(|page, _| window.contains(page));
        let mut changed = self.mounted.len() != before;

        let mut tickets = Vec::new();
        for page in window {
            if self.mounted.get(&page) == Some(&scale) {
                continue;
            }

            self.mounted.insert(page, scale);
            self.status.insert(page, RasterStatus::Pending);
            tickets.push(RasterTicket { page, scale, generation: self.generation });
            changed = true;
        }

        if changed {
            self.touch();
        }

        tickets
    }

    /// Feeds back the outcome of a rasterization.
    ///
    /// A successful result is recorded in the height cache even when the page
    /// has meanwhile left the window. Results for an earlier file, or rendered
    /// at a scale other than the current one, are dropped. Returns whether
    /// anything changed.
    pub fn complete_rasterization(
        &mut self,
        ticket: RasterTicket,
        result: Result<f32, RasterError>,
    ) -> bool {
        if ticket.generation != self.generation || self.document().is_none() {
            log::debug!("dropping rasterization of page {} from an earlier file", ticket.page);
            return false;
        }

        if ticket.scale != self.scale() {
            log::debug!(
                "dropping rasterization of page {} at stale scale {}",
                ticket.page,
                ticket.scale
            );
            return false;
        }

        let still_mounted = self.mounted.get(&ticket.page) == Some(&ticket.scale);

        match result {
            Ok(height) => {
                let mut changed = self.record_height(ticket.page, height);
                if still_mounted {
                    let status = RasterStatus::Rendered { height };
                    if self.status.get(&ticket.page) != Some(&status) {
                        self.status.insert(ticket.page, status);
                        self.touch();
                        changed = true;
                    }
                }
                changed
            }
            Err(err) => {
                log::warn!("failed to render page {}: {err}", ticket.page);
                if !still_mounted {
                    return false;
                }
                self.status.insert(ticket.page, RasterStatus::Failed(err.to_string()));
                self.touch();
                true
            }
        }
    }

    /// Runs `ticket` on `rasterizer` right away and completes it.
    pub fn rasterize_now(&mut self, rasterizer: &dyn PageRasterizer, ticket: RasterTicket) -> bool {
        let result = match self.document() {
            Some(document) => rasterizer
                .rasterize(document, ticket.page, ticket.scale)
                .map(|image| image.height() as f32),
            None => return false,
        };

        self.complete_rasterization(ticket, result)
    }

    /// Records the rendered height of `page`. Equal heights are ignored.
    pub fn record_height(&mut self, page: u32, height: f32) -> bool {
        if !self.heights.record(page, height) {
            return false;
        }

        self.sync_layout();
        self.touch();
        true
    }

    fn sync_layout(&mut self) {
        let page_count = self.page_count().unwrap_or(0);
        for page in 1..=page_count {
            let height = self.placeholder_height(page);
            self.source.resize_target(page, height);
        }
    }

    /// Sets the scale for subsequent rasterizations. Returns the applied scale.
    pub fn set_scale(&mut self, scale: f32) -> f32 {
        let before = self.zoom.scale();
        let after = self.zoom.set(scale);
        if after != before {
            log::debug!("scale {before} -> {after}");
            self.touch();
        }
        after
    }

    pub fn zoom_in(&mut self) -> f32 {
        let before = self.zoom.scale();
        let after = self.zoom.zoom_in();
        if after != before {
            self.touch();
        }
        after
    }

    pub fn zoom_out(&mut self) -> f32 {
        let before = self.zoom.scale();
        let after = self.zoom.zoom_out();
        if after != before {
            self.touch();
        }
        after
    }

    fn reset(&mut self) {
        self.source.disconnect();
        if let Some(link) = self.download.take() {
            link.release();
        }
        self.state = LoadState::Empty;
        self.file_name = None;
        self.visible_page = None;
        self.heights.clear();
        self.mounted.clear();
        self.status.clear();
    }

    /// Tears the viewer down: stops observation and releases the download link.
    pub fn close(&mut self) {
        if self.is_broken() {
            return;
        }

        if self.file_name.is_some() {
            log::info!("closing viewer");
        }
        self.reset();
        self.generation += 1;
        self.touch();
    }
}

impl<S: VisibilitySource> Drop for PdfViewer<S> {
    fn drop(&mut self) {
        self.source.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FileContent;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use pdf_engine::fixtures::{blank_pdf, letter_pages};
    use pdf_engine::{BlankRasterizer, PageSize};

    fn viewer() -> (PdfViewer, ResourceRegistry) {
        let resources = ResourceRegistry::new();
        let viewer = PdfViewer::with_scroll_observer(&ViewerConfig::default(), resources.clone());
        (viewer, resources)
    }

    fn pdf_file(name: &str, pages: usize) -> ViewerFile {
        ViewerFile::pdf(name, blank_pdf(&letter_pages(pages)))
    }

    fn tick(entries: &[(u32, f32)]) -> VisibilityTick {
        entries.iter().copied().collect()
    }

    fn strip(viewer: &PdfViewer) -> String {
        viewer.render_all().iter().map(RenderDecision::code).collect()
    }

    #[test]
    fn open_starts_on_first_page() {
        let (mut viewer, resources) = viewer();
        assert_eq!(viewer.visible_page(), None);
        assert_eq!(viewer.render(1), None);

        let pages = viewer.open(pdf_file("a.pdf", 10)).unwrap();

        assert_eq!(pages, 10);
        assert_eq!(viewer.visible_page(), Some(1));
        assert_eq!(strip(&viewer), "MMMPPPPPPP");
        assert_eq!(resources.live_count(), 1);
        assert_eq!(viewer.download_link().unwrap().file_name(), "a.pdf");
    }

    #[test]
    fn window_follows_visible_page() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();

        viewer.apply_tick(&tick(&[(4, 0.5), (5, 0.9)]));

        assert_eq!(viewer.visible_page(), Some(5));
        assert_eq!(strip(&viewer), "PPMMMMMPPP");
    }

    #[test]
    fn tie_and_empty_ticks_keep_visible_page() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();
        viewer.apply_tick(&tick(&[(6, 0.9)]));
        let revision = viewer.revision();

        viewer.apply_tick(&tick(&[(2, 0.5), (3, 0.5)]));
        viewer.apply_tick(&tick(&[(2, 0.0)]));
        viewer.apply_tick(&VisibilityTick::default());

        assert_eq!(viewer.visible_page(), Some(6));
        assert_eq!(viewer.revision(), revision);
    }

    #[test]
    fn out_of_range_entries_are_ignored() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 3)).unwrap();

        viewer.apply_tick(&tick(&[(9, 1.0), (2, 0.4)]));

        assert_eq!(viewer.visible_page(), Some(2));
    }

    #[test]
    fn record_height_twice_is_one_transition() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 4)).unwrap();
        let revision = viewer.revision();

        assert!(viewer.record_height(2, 950.4));
        assert!(!viewer.record_height(2, 950.4));

        assert_eq!(viewer.revision(), revision + 1);
    }

    #[test]
    fn placeholder_heights_fall_back() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();

        assert_eq!(viewer.render(7), Some(RenderDecision::Placeholder { height: 800.0 }));

        viewer.record_height(1, 600.0);
        assert_eq!(viewer.render(7), Some(RenderDecision::Placeholder { height: 600.0 }));
    }

    #[test]
    fn sync_window_issues_tickets_for_new_pages_only() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();

        let first: Vec<u32> = viewer.sync_window().iter().map(|t| t.page).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert!(viewer.sync_window().is_empty());

        viewer.apply_tick(&tick(&[(3, 0.9)]));
        let second: Vec<u32> = viewer.sync_window().iter().map(|t| t.page).collect();
        assert_eq!(second, vec![4, 5]);
    }

    #[test]
    fn reentering_page_gets_a_fresh_ticket_despite_in_flight_work() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();

        let in_flight = viewer.sync_window();
        assert!(in_flight.iter().any(|t| t.page == 1));

        viewer.apply_tick(&tick(&[(8, 1.0)]));
        viewer.sync_window();
        viewer.apply_tick(&tick(&[(1, 1.0)]));
        let again = viewer.sync_window();

        assert!(again.iter().any(|t| t.page == 1));
    }

    #[test]
    fn late_height_report_is_still_recorded() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();
        let tickets = viewer.sync_window();
        let ticket = tickets[1];

        viewer.apply_tick(&tick(&[(9, 1.0)]));
        viewer.sync_window();

        assert!(viewer.complete_rasterization(ticket, Ok(950.0)));
        assert_eq!(viewer.heights().get(2), Some(950.0));
        assert_eq!(viewer.page_view(2), Some(PageView::Placeholder { height: 950.0 }));
    }

    #[test]
    fn rasterized_pages_report_rendered_view() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 5)).unwrap();

        for ticket in viewer.sync_window() {
            viewer.rasterize_now(&BlankRasterizer, ticket);
        }

        // US Letter at scale 1.2: 792 * 1.2 = 950.4, rounded to whole pixels.
        assert_eq!(viewer.page_view(1), Some(PageView::Rendered { height: 950.0 }));
        assert_eq!(viewer.page_view(4), Some(PageView::Placeholder { height: 950.0 }));
    }

    #[test]
    fn failed_page_does_not_affect_neighbours() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 5)).unwrap();
        let tickets = viewer.sync_window();

        viewer.complete_rasterization(tickets[0], Ok(900.0));
        viewer.complete_rasterization(tickets[1], Err(RasterError::Backend("boom".into())));

        assert_eq!(viewer.page_view(1), Some(PageView::Rendered { height: 900.0 }));
        assert_eq!(
            viewer.page_view(2),
            Some(PageView::Failed { message: "backend error: boom".into() })
        );
        assert_eq!(viewer.page_view(3), Some(PageView::Rendering { scale: 1.2 }));
    }

    #[test]
    fn scale_change_rerenders_window_and_keeps_old_heights() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();
        for ticket in viewer.sync_window() {
            viewer.rasterize_now(&BlankRasterizer, ticket);
        }
        viewer.record_height(9, 950.0);

        assert_eq!(viewer.zoom_in(), 1.4);
        assert_eq!(viewer.render(1), Some(RenderDecision::Materialize { scale: 1.4 }));

        let tickets = viewer.sync_window();
        assert_eq!(tickets.len(), 3);
        assert!(tickets.iter().all(|t| t.scale == 1.4));

        for ticket in tickets {
            viewer.rasterize_now(&BlankRasterizer, ticket);
        }

        // 792 * 1.4 = 1108.8
        assert_eq!(viewer.heights().get(1), Some(1109.0));
        assert_eq!(viewer.heights().get(9), Some(950.0));
    }

    #[test]
    fn stale_scale_completion_is_dropped() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 3)).unwrap();
        let tickets = viewer.sync_window();

        viewer.set_scale(2.0);

        assert!(!viewer.complete_rasterization(tickets[0], Ok(950.0)));
        assert!(viewer.heights().is_empty());
    }

    #[test]
    fn completion_from_previous_file_is_dropped() {
        let (mut viewer, _) = viewer();
        viewer.open(pdf_file("a.pdf", 3)).unwrap();
        let tickets = viewer.sync_window();

        viewer.open(pdf_file("b.pdf", 3)).unwrap();

        assert!(!viewer.complete_rasterization(tickets[0], Ok(950.0)));
        assert!(viewer.heights().is_empty());
    }

    #[test]
    fn download_link_shares_document_bytes() {
        let (mut viewer, resources) = viewer();
        viewer.open(pdf_file("a.pdf", 2)).unwrap();

        let link = viewer.download_link().unwrap();
        let resource = resources.resolve(link.url()).unwrap();
        let document = viewer.document().unwrap();

        assert!(std::ptr::eq(document.bytes(), &*resource.bytes));
    }

    #[test]
    fn inverted_zoom_range_in_config_does_not_panic() {
        let config = ViewerConfig { min_scale: 3.0, max_scale: 0.5, ..ViewerConfig::default() };
        let mut viewer = PdfViewer::with_scroll_observer(&config, ResourceRegistry::new());

        assert_eq!(viewer.scale(), 1.2);
        assert_eq!(viewer.set_scale(10.0), 3.0);
        viewer.open(pdf_file("a.pdf", 3)).unwrap();
        assert_eq!(viewer.render(1), Some(RenderDecision::Materialize { scale: 3.0 }));
    }

    #[test]
    fn switching_files_resets_state_and_releases_link() {
        let (mut viewer, resources) = viewer();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();
        viewer.apply_tick(&tick(&[(7, 1.0)]));
        viewer.record_height(1, 600.0);

        viewer.open(pdf_file("b.pdf", 4)).unwrap();

        assert_eq!(viewer.visible_page(), Some(1));
        assert!(viewer.heights().is_empty());
        assert_eq!(resources.live_count(), 1);
        assert_eq!(resources.revoked_count(), 1);
        assert_eq!(viewer.download_link().unwrap().file_name(), "b.pdf");
    }

    #[test]
    fn decode_failure_halts_rendering_and_releases_link() {
        let (mut viewer, resources) = viewer();

        let err = viewer.open(ViewerFile::pdf("bad.pdf", b"definitely not a pdf".to_vec()));

        assert!(matches!(err, Err(ViewerError::Decode(_))));
        assert!(matches!(viewer.state(), LoadState::Failed(_)));
        assert_eq!(viewer.render(1), None);
        assert!(viewer.sync_window().is_empty());
        assert_eq!(viewer.apply_tick(&tick(&[(1, 1.0)])), None);
        assert_eq!(resources.live_count(), 0);
        assert_eq!(resources.revoked_count(), 1);
    }

    #[test]
    fn base64_content_is_accepted() {
        let (mut viewer, _) = viewer();
        let bytes = blank_pdf(&[PageSize::new(100.0, 100.0); 2]);
        let encoded = STANDARD.encode(&bytes);

        let file = ViewerFile::new("b.pdf", "application/pdf", FileContent::Text(encoded));

        assert_eq!(viewer.open(file).unwrap(), 2);
    }

    #[test]
    fn non_pdf_files_are_rejected() {
        let (mut viewer, resources) = viewer();
        let file = ViewerFile::new("notes.md", "text/markdown", FileContent::Text("# hi".into()));

        assert!(matches!(viewer.open(file), Err(ViewerError::NotPdf { .. })));
        assert_eq!(resources.live_count(), 0);
    }

    #[test]
    fn attach_registers_every_page_and_reregisters_on_open() {
        let (mut viewer, _) = viewer();
        viewer.attach(Some(ScrollContainer::new(900.0, 16.0))).unwrap();
        assert!(viewer.source().observed().is_empty());

        viewer.open(pdf_file("a.pdf", 6)).unwrap();
        assert_eq!(viewer.source().observed(), vec![1, 2, 3, 4, 5, 6]);

        viewer.open(pdf_file("b.pdf", 2)).unwrap();
        assert_eq!(viewer.source().observed(), vec![1, 2]);
    }

    #[test]
    fn missing_container_breaks_the_viewer() {
        let (mut viewer, resources) = viewer();
        viewer.open(pdf_file("a.pdf", 3)).unwrap();

        let err = viewer.attach(None).unwrap_err();

        assert!(matches!(err, ViewerError::ObserverSetup(ObserverSetupError::MissingContainer)));
        assert!(matches!(viewer.state(), LoadState::Broken(_)));
        assert_eq!(viewer.render(1), None);
        assert_eq!(resources.live_count(), 0);
        assert!(matches!(viewer.open(pdf_file("b.pdf", 1)), Err(ViewerError::Broken)));
    }

    #[test]
    fn scrolling_moves_the_window() {
        let (mut viewer, _) = viewer();
        viewer.attach(Some(ScrollContainer::new(800.0, 0.0))).unwrap();
        viewer.open(pdf_file("a.pdf", 10)).unwrap();

        // Unmeasured pages are 800 tall; page 5 spans 3200..4000.
        assert_eq!(viewer.scroll_to(0.0), Some(1));
        assert_eq!(viewer.scroll_to(3200.0), Some(5));
        assert_eq!(strip(&viewer), "PPMMMMMPPP");
    }

    #[test]
    fn recorded_heights_reshape_scroll_layout() {
        let (mut viewer, _) = viewer();
        viewer.attach(Some(ScrollContainer::new(500.0, 0.0))).unwrap();
        viewer.open(pdf_file("a.pdf", 4)).unwrap();

        viewer.record_height(1, 500.0);

        assert_eq!(viewer.source().offset_of(3), Some(1000.0));
        assert_eq!(viewer.scroll_to(1000.0), Some(3));
    }

    #[test]
    fn close_stops_observing_and_releases_once() {
        let (mut viewer, resources) = viewer();
        viewer.attach(Some(ScrollContainer::new(800.0, 0.0))).unwrap();
        viewer.open(pdf_file("a.pdf", 3)).unwrap();

        viewer.close();
        viewer.close();

        assert!(viewer.source().observed().is_empty());
        assert_eq!(viewer.visible_page(), None);
        assert_eq!(resources.live_count(), 0);
        assert_eq!(resources.revoked_count(), 1);
    }

    #[test]
    fn drop_releases_link() {
        let (mut viewer, resources) = viewer();
        viewer.open(pdf_file("a.pdf", 3)).unwrap();

        drop(viewer);

        assert_eq!(resources.live_count(), 0);
        assert_eq!(resources.revoked_count(), 1);
    }
}
