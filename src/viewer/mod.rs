//! Page view rendering infrastructure

use std::time::Duration;

mod backend;
mod cache;
mod controller;
#[cfg(feature = "pdf")]
mod mupdf_backend;
mod overlay;
mod request;
mod service;
mod state;
mod surface;
mod transition;
mod types;
mod worker;
mod zoom;

pub use backend::{CbzBackend, CbzDocument, PageBackend, PageDocument, backend_for_path};
pub use cache::{CacheKey, PageCache};
pub use controller::{DispatchOutcome, PageViewController, ViewerAction, ViewerConfig};
#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfBackend;
pub use overlay::HeaderOverlay;
pub use request::{
    RenderFault, RenderParams, RenderRequest, RenderResponse, RequestId, RequestKind,
};
pub use service::{DocumentInfo, RenderService};
pub use state::{Command, Effect, ViewerState};
pub use surface::*;
pub use transition::{Transition, TransitionKind};
pub use types::*;
pub use worker::render_page;
pub use zoom::Zoom;

/// Render worker threads
pub const DEFAULT_WORKERS: usize = 2;
/// Surfaces kept in the page cache
pub const DEFAULT_CACHE_SIZE: usize = 24;
/// Pages preloaded beyond the visible spread in each direction
pub const DEFAULT_PREFETCH_RADIUS: usize = 2;
/// Preview renders use this fraction of the view scale
pub const PREVIEW_SCALE_FACTOR: f32 = 0.5;
/// Viewports narrower than this use mobile zoom bounds and single layout
pub const MOBILE_BREAKPOINT_PX: u32 = 768;
/// How often an incomplete spread re-checks the cache
pub const RETRY_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// A view render unanswered for this long is requested again
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(300);
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_millis(3000);
