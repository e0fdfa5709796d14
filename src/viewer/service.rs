//! Render service - manages worker pool and cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::backend::PageBackend;
use super::cache::PageCache;
use super::request::{
    RenderFault, RenderParams, RenderRequest, RenderResponse, RequestId, RequestKind,
};
use super::types::{Quality, Surface};
use super::worker::render_worker;

#[derive(Debug)]
struct PendingRequest {
    page: usize,
    quality: Quality,
    epoch: u64,
    issued: Instant,
}

/// Document metadata
#[derive(Clone, Debug)]
pub struct DocumentInfo {
    pub location: String,
    pub page_count: usize,
}

/// Manages page rendering with worker threads and caching
pub struct RenderService {
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    pending_requests: HashMap<RequestId, PendingRequest>,
    cache: Arc<Mutex<PageCache>>,
    num_workers: usize,
    epoch: u64,
    doc_info: DocumentInfo,
}

impl RenderService {
    /// Open a document, loading its metadata on the calling thread before
    /// any worker is spawned.
    pub fn with_config(
        backend: Arc<dyn PageBackend>,
        location: &str,
        num_workers: usize,
        cache_size: usize,
    ) -> Result<Self, RenderFault> {
        let doc_info = Self::load_document_info(backend.as_ref(), location)?;
        let cache = Arc::new(Mutex::new(PageCache::new(cache_size)));

        // flume gives us MPMC: every worker pulls from the same request queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        for _ in 0..num_workers.max(1) {
            let backend = Arc::clone(&backend);
            let location = location.to_string();
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache_clone = cache.clone();

            std::thread::spawn(move || {
                render_worker(backend, &location, rx, tx, cache_clone);
            });
        }

        Ok(Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            pending_requests: HashMap::new(),
            cache,
            num_workers: num_workers.max(1),
            epoch: 0,
            doc_info,
        })
    }

    fn load_document_info(
        backend: &dyn PageBackend,
        location: &str,
    ) -> Result<DocumentInfo, RenderFault> {
        let doc = backend.open(location)?;
        let page_count = doc.page_count();
        if page_count == 0 {
            return Err(RenderFault::EmptyDocument);
        }
        Ok(DocumentInfo {
            location: location.to_string(),
            page_count,
        })
    }

    #[must_use]
    pub fn document_info(&self) -> &DocumentInfo {
        &self.doc_info
    }

    /// Current cache generation; responses from older generations are stale
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every cached surface and start a new generation
    pub fn invalidate(&mut self) {
        self.lock_cache().invalidate_all();
        self.epoch += 1;
        debug!("Cache invalidated, epoch {}", self.epoch);
    }

    /// Best cached surface for a page at the given view scale
    #[must_use]
    pub fn cached_page(&self, page: usize, scale: f32) -> Option<Arc<Surface>> {
        self.lock_cache().lookup(page, scale)
    }

    #[must_use]
    pub fn is_page_cached(&self, page: usize, scale: f32) -> bool {
        self.lock_cache().contains_page(page, scale)
    }

    /// Number of cached surfaces
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// True if a current-generation request for the page is outstanding at
    /// `quality` or better
    #[must_use]
    pub fn is_in_flight(&self, page: usize, quality: Quality) -> bool {
        self.pending_requests
            .values()
            .any(|p| p.page == page && p.epoch == self.epoch && p.quality >= quality)
    }

    /// True while any request is outstanding, stale ones included
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending_requests.is_empty()
    }

    /// Stop waiting for requests outstanding longer than `timeout`, so they
    /// can be issued again. A worker that died mid-render never answers.
    /// Returns the pages given up on.
    pub fn expire_stalled(&mut self, timeout: Duration, now: Instant) -> Vec<usize> {
        let stalled: Vec<RequestId> = self
            .pending_requests
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.issued) >= timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut pages = Vec::with_capacity(stalled.len());
        for id in stalled {
            if let Some(request) = self.pending_requests.remove(&id) {
                warn!(
                    "Render of page {} got no answer in {timeout:?}, giving up on it",
                    request.page
                );
                pages.push(request.page);
            }
        }
        pages
    }

    /// Request a page to be rendered
    pub fn request_page(
        &mut self,
        page: usize,
        scale: f32,
        quality: Quality,
        kind: RequestKind,
    ) -> RequestId {
        let id = self.next_id();
        let params = RenderParams {
            scale,
            quality,
            epoch: self.epoch,
        };

        let _ = self.request_tx.send(RenderRequest::Page {
            id,
            page,
            params,
            kind,
        });
        self.pending_requests.insert(
            id,
            PendingRequest {
                page,
                quality,
                epoch: self.epoch,
                issued: Instant::now(),
            },
        );

        id
    }

    /// Request a page only if it is not already cached or in flight at the
    /// requested quality.
    pub fn request_page_if_needed(
        &mut self,
        page: usize,
        scale: f32,
        quality: Quality,
        kind: RequestKind,
    ) -> Option<RequestId> {
        if self.is_in_flight(page, quality) {
            return None;
        }
        let cached = match quality {
            Quality::Full => self
                .cached_page(page, scale)
                .is_some_and(|s| s.quality == Quality::Full),
            Quality::Preview => self.is_page_cached(page, scale),
        };
        if cached {
            return None;
        }

        Some(self.request_page(page, scale, quality, kind))
    }

    /// Poll for completed render responses without blocking
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            self.pending_requests.remove(&response.id());
            responses.push(response);
        }

        responses
    }

    /// Block until a response arrives or the timeout expires
    pub fn wait_response(&mut self, timeout: Duration) -> Option<RenderResponse> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => {
                self.pending_requests.remove(&response.id());
                Some(response)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, PageCache> {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
