//! File content routing.
//!
//! A file fetched from a knowledge base arrives with a MIME type and a body.
//! The MIME type decides which viewer shows it; only PDFs go through the
//! windowed page renderer.

use std::fmt;

use pdf_engine::DocumentSource;

/// Viewer family for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Markdown,
    Pdf,
    Unsupported,
}

impl ContentKind {
    /// Routes by MIME prefix, so parameters such as `; charset=utf-8` are accepted.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime_type = mime_type.trim();

        if mime_type.starts_with("text/plain") {
            Self::Text
        } else if mime_type.starts_with("text/markdown") {
            Self::Markdown
        } else if mime_type.starts_with("application/pdf") {
            Self::Pdf
        } else {
            Self::Unsupported
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File body as delivered by the file API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Binary(Vec<u8>),
    /// Text payload. For PDFs this is the base64-encoded document.
    Text(String),
}

impl From<FileContent> for DocumentSource {
    fn from(value: FileContent) -> Self {
        match value {
            FileContent::Binary(bytes) => DocumentSource::Bytes(bytes),
            FileContent::Text(text) => DocumentSource::Base64(text),
        }
    }
}

/// A file selected for viewing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerFile {
    pub name: String,
    pub mime_type: String,
    pub content: FileContent,
}

impl ViewerFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: FileContent) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), content }
    }

    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/pdf", FileContent::Binary(bytes))
    }

    pub fn kind(&self) -> ContentKind {
        ContentKind::from_mime(&self.mime_type)
    }
}
