use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use image::{ImageBuffer, Rgba};
use lopdf::{Object, ObjectId};
use std::fmt;
use std::sync::Arc;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Intrinsic page size in PDF points, used when a page carries no MediaBox.
pub const US_LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Largest raster edge in pixels.
pub const MAX_RASTER_DIMENSION: u32 = 16_384;

// Page trees deeper than this are treated as cyclic.
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// Standard alphabet, padding optional, trailing bits tolerated.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }

    /// Height in layout units once the page is drawn at `scale`.
    pub fn scaled_height(&self, scale: f32) -> f32 {
        self.height_pt * scale
    }
}

/// Raw document content as handed over by the file API.
///
/// The backend ships file bodies either as binary buffers or as base64 text;
/// both end up as the same byte vector before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Bytes(Vec<u8>),
    /// Bytes already shared with another owner, such as a download link.
    Shared(Arc<[u8]>),
    Base64(String),
}

impl DocumentSource {
    /// Resolves the source to a single shared buffer.
    pub fn into_shared(self) -> Result<Arc<[u8]>, DecodeError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.into()),
            Self::Shared(bytes) => Ok(bytes),
            Self::Base64(text) => Ok(decode_base64(&text)?.into()),
        }
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for DocumentSource {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Arc<[u8]>> for DocumentSource {
    fn from(value: Arc<[u8]>) -> Self {
        Self::Shared(value)
    }
}

impl From<String> for DocumentSource {
    fn from(value: String) -> Self {
        Self::Base64(value)
    }
}

/// Decodes standard-alphabet base64 the way browsers' `atob` does: ASCII
/// whitespace is skipped and the trailing `=` padding is optional.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(FORGIVING.decode(compact)?)
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("invalid scale {0}")]
    InvalidScale(f32),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A decoded, immutable multi-page document.
#[derive(Clone)]
pub struct Document {
    bytes: Arc<[u8]>,
    page_sizes: Vec<PageSize>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("bytes", &self.bytes.len())
            .field("page_sizes", &self.page_sizes)
            .finish()
    }
}

impl Document {
    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    /// Size of the 1-based `page`, or `None` when out of range.
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        let index = page.checked_sub(1)?;
        self.page_sizes.get(index as usize).copied()
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Decodes `source` into a [`Document`].
pub fn load(source: impl Into<DocumentSource>) -> Result<Document, DecodeError> {
    let bytes = source.into().into_shared()?;
    let page_sizes = parse_sizes(&bytes)?;

    log::debug!("decoded document: {} bytes, {} pages", bytes.len(), page_sizes.len());

    Ok(Document { bytes, page_sizes })
}

fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, DecodeError> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(DecodeError::EncryptedUnsupported);
    }

    let doc = lopdf::Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let mut sizes = Vec::with_capacity(pages.len());

    for (_, object_id) in pages {
        doc.get_dictionary(object_id)?;
        sizes.push(media_box(&doc, object_id).unwrap_or(US_LETTER));
    }

    if sizes.is_empty() {
        return Err(DecodeError::NoPages);
    }

    Ok(sizes)
}

/// MediaBox of a page, inherited through the `/Parent` chain when the page
/// itself has none.
fn media_box(doc: &lopdf::Document, page_id: ObjectId) -> Option<PageSize> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Some(size) = node.get(b"MediaBox").ok().and_then(|obj| parse_rect(doc, obj)) {
            return Some(size);
        }

        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn parse_rect(doc: &lopdf::Document, obj: &Object) -> Option<PageSize> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let array = obj.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

/// Turns one page of a document into pixels.
///
/// Implementations may be slow; callers treat the result as an asynchronous
/// completion and feed the resulting height back into the viewer.
pub trait PageRasterizer {
    fn rasterize(
        &self,
        document: &Document,
        page: u32,
        scale: f32,
    ) -> Result<RgbaImage, RasterError>;
}

/// Draws each page as a blank sheet of the right size with a thin border.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankRasterizer;

impl BlankRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for BlankRasterizer {
    fn rasterize(
        &self,
        document: &Document,
        page: u32,
        scale: f32,
    ) -> Result<RgbaImage, RasterError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RasterError::InvalidScale(scale));
        }

        let size = document
            .page_size(page)
            .ok_or(RasterError::PageOutOfRange { page, page_count: document.page_count() })?;

        let width = (size.width_pt * scale).round().max(1.0);
        let height = size.scaled_height(scale).round().max(1.0);

        let limit = MAX_RASTER_DIMENSION as f32;
        if !(width <= limit && height <= limit) {
            return Err(RasterError::Backend(format!(
                "page {page} is too large to rasterize ({width}x{height} px)"
            )));
        }

        let (width, height) = (width as u32, height as u32);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }
}
