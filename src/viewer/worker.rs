//! Render worker - runs in separate thread(s)

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, error};

use super::backend::{PageBackend, PageDocument};
use super::cache::{CacheKey, PageCache};
use super::request::{
    RenderFault, RenderParams, RenderRequest, RenderResponse, RequestId, RequestKind,
};
use super::types::Surface;

/// Worker loop: opens its own document handle and serves page requests
/// until a shutdown request arrives or the request channel closes.
pub fn render_worker(
    backend: Arc<dyn PageBackend>,
    location: &str,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    let doc = match backend.open(location) {
        Ok(doc) => doc,
        Err(e) => {
            error!("Render worker failed to open {location}: {e}");
            drain_with_errors(&requests, &responses, &e.to_string());
            return;
        }
    };

    for request in requests {
        match request {
            RenderRequest::Page {
                id,
                page,
                params,
                kind,
            } => {
                handle_page_request(doc.as_ref(), id, page, params, kind, &cache, &responses);
            }
            RenderRequest::Shutdown => break,
        }
    }
}

/// Answer every request with an error so no render cycle waits forever
fn drain_with_errors(
    requests: &Receiver<RenderRequest>,
    responses: &Sender<RenderResponse>,
    reason: &str,
) {
    for request in requests.iter() {
        match request {
            RenderRequest::Page {
                id,
                page,
                params,
                kind,
            } => {
                let _ = responses.send(RenderResponse::Error {
                    id,
                    page,
                    params,
                    kind,
                    error: RenderFault::generic(format!("document unavailable: {reason}")),
                });
            }
            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_page_request(
    doc: &dyn PageDocument,
    id: RequestId,
    page: usize,
    params: RenderParams,
    kind: RequestKind,
    cache: &Arc<Mutex<PageCache>>,
    responses: &Sender<RenderResponse>,
) {
    let key = CacheKey::new(page, params.scale, params.quality);

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(surface) = cached {
        let _ = responses.send(RenderResponse::Page {
            id,
            page,
            params,
            kind,
            surface,
        });
        return;
    }

    match render_page(doc, page, &params) {
        Ok(surface) => {
            debug!(
                "Rendered page {page} at {:.2} ({:?}, {}x{})",
                params.effective_scale(),
                params.quality,
                surface.width_px,
                surface.height_px
            );
            let surface = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, surface);
            let _ = responses.send(RenderResponse::Page {
                id,
                page,
                params,
                kind,
                surface,
            });
        }
        Err(error) => {
            let _ = responses.send(RenderResponse::Error {
                id,
                page,
                params,
                kind,
                error,
            });
        }
    }
}

/// Render a single page at the request's effective scale
pub fn render_page(
    doc: &dyn PageDocument,
    page: usize,
    params: &RenderParams,
) -> Result<Surface, RenderFault> {
    let viewport = doc.viewport(page, params.effective_scale())?;
    let mut surface = doc.render(&viewport)?;
    surface.quality = params.quality;
    Ok(surface)
}
