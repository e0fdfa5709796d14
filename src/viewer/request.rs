//! Render request and response types

use std::sync::Arc;

use super::types::{Direction, Quality, Surface};

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Parameters for rendering a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// View scale the result is cached under
    pub scale: f32,
    /// Preview or full resolution
    pub quality: Quality,
    /// Cache generation the request was issued in
    pub epoch: u64,
}

impl RenderParams {
    /// Scale the backend rasterizes at
    #[must_use]
    pub fn effective_scale(&self) -> f32 {
        self.scale * self.quality.scale_factor()
    }
}

/// Why a page is being rendered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Needed by the spread being assembled
    View,
    /// Cache warming; `distance` counts pages away from the visible spread
    Preload { direction: Direction, distance: usize },
    /// Full resolution replacement for a visible preview
    Upgrade,
}

/// Request sent to render workers
#[derive(Debug)]
pub enum RenderRequest {
    /// Render a page
    Page {
        id: RequestId,
        page: usize,
        params: RenderParams,
        kind: RequestKind,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from render backends and workers
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("document has no pages")]
    EmptyDocument,

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered page surface
    Page {
        id: RequestId,
        page: usize,
        params: RenderParams,
        kind: RequestKind,
        surface: Arc<Surface>,
    },

    /// Error during rendering
    Error {
        id: RequestId,
        page: usize,
        params: RenderParams,
        kind: RequestKind,
        error: RenderFault,
    },
}

impl RenderResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Page { id, .. } | Self::Error { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn page(&self) -> usize {
        match self {
            Self::Page { page, .. } | Self::Error { page, .. } => *page,
        }
    }

    #[must_use]
    pub fn params(&self) -> &RenderParams {
        match self {
            Self::Page { params, .. } | Self::Error { params, .. } => params,
        }
    }
}
