//! Page view controller
//!
//! Owns the view state, assembles spreads from cached or freshly rendered
//! surfaces and hands complete spreads to a [`ViewSurface`].
//!
//! Rendering is cooperative: requests go out to the render service and the
//! controller only learns about completions when it is pumped. At most one
//! render cycle is active; navigation during a cycle records a single
//! pending target, and a cycle whose spread no longer matches the current
//! position is discarded instead of displayed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::backend::PageBackend;
use super::overlay::HeaderOverlay;
use super::request::{RenderFault, RenderResponse, RequestKind};
use super::service::RenderService;
use super::state::{Command, Effect, ViewerState};
use super::surface::{LOAD_ERROR_MESSAGE, ViewSurface};
use super::transition::{Transition, TransitionKind};
use super::types::{Direction, LayoutMode, PageLabel, Quality, Slot, Spread, Surface};
use super::zoom::Zoom;
use super::{
    DEFAULT_CACHE_SIZE, DEFAULT_HEADER_TIMEOUT, DEFAULT_PREFETCH_RADIUS, DEFAULT_RENDER_TIMEOUT,
    DEFAULT_TRANSITION, DEFAULT_WORKERS, RETRY_POLL_INTERVAL,
};

/// Tunables for a controller
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub initial_scale: f32,
    pub layout_mode: LayoutMode,
    pub cache_size: usize,
    /// How many pages beyond the spread preloading warms in each direction
    pub preload_radius: usize,
    pub render_workers: usize,
    pub transition: Duration,
    pub header_timeout: Duration,
    /// How long the retry poll waits on a render before issuing it again
    pub render_timeout: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_scale: Zoom::DEFAULT_SCALE,
            layout_mode: LayoutMode::Single,
            cache_size: DEFAULT_CACHE_SIZE,
            preload_radius: DEFAULT_PREFETCH_RADIUS,
            render_workers: DEFAULT_WORKERS,
            transition: DEFAULT_TRANSITION,
            header_timeout: DEFAULT_HEADER_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

/// User intents the controller understands
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewerAction {
    Next,
    Previous,
    ZoomIn,
    ZoomOut,
    ToggleLayout,
    Resize { width: u32, height: u32 },
    /// Input that only keeps the header visible
    Activity,
    /// Leave the viewer for the document's details view
    Exit,
}

/// What the caller should do after dispatching an action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    ExitToDetails,
}

/// A spread being assembled
#[derive(Debug)]
struct RenderCycle {
    spread: Spread,
    epoch: u64,
    transition: TransitionKind,
    next_retry: Instant,
}

pub struct PageViewController<S: ViewSurface> {
    state: ViewerState,
    surface: S,
    config: ViewerConfig,
    service: Option<RenderService>,
    load_failed: bool,
    cycle: Option<RenderCycle>,
    pending_transition: Option<TransitionKind>,
    displayed: Option<Spread>,
    transition: Option<Transition>,
    header: HeaderOverlay,
}

impl<S: ViewSurface> PageViewController<S> {
    pub fn new(surface: S, config: ViewerConfig) -> Self {
        let state = ViewerState::new(config.initial_scale, config.layout_mode);
        let header = HeaderOverlay::new(config.header_timeout, Instant::now());
        Self {
            state,
            surface,
            config,
            service: None,
            load_failed: false,
            cycle: None,
            pending_transition: None,
            displayed: None,
            transition: None,
            header,
        }
    }

    /// Open a document and render its first spread.
    ///
    /// On failure the viewport is replaced by a static error banner and the
    /// controller ignores all further input.
    pub fn open(
        &mut self,
        backend: Arc<dyn PageBackend>,
        location: &str,
    ) -> Result<(), RenderFault> {
        let service = RenderService::with_config(
            backend,
            location,
            self.config.render_workers,
            self.config.cache_size,
        );

        match service {
            Ok(service) => {
                let page_count = service.document_info().page_count;
                info!("Opened {location} ({page_count} pages)");
                self.service = Some(service);
                self.load_failed = false;
                let _ = self.state.apply(Command::SetPageCount(page_count));
                self.surface.set_header_visible(self.header.is_visible());
                self.render_view(TransitionKind::Fade);
                Ok(())
            }
            Err(e) => {
                error!("Error loading {location}: {e}");
                self.service = None;
                self.load_failed = true;
                self.cycle = None;
                self.displayed = None;
                self.surface.show_load_error(LOAD_ERROR_MESSAGE);
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.service.is_some()
    }

    #[must_use]
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Spread currently on the surface
    #[must_use]
    pub fn displayed_spread(&self) -> Option<&Spread> {
        self.displayed.as_ref()
    }

    /// Running transition, if any
    #[must_use]
    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    #[must_use]
    pub fn is_cached(&self, page: usize) -> bool {
        self.service
            .as_ref()
            .is_some_and(|s| s.is_page_cached(page, self.state.scale()))
    }

    /// Number of surfaces in the page cache
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.service.as_ref().map_or(0, RenderService::cached_len)
    }

    pub fn go_to_next(&mut self) {
        self.refresh_transition(Instant::now());
        self.apply_command(Command::Next);
    }

    pub fn go_to_previous(&mut self) {
        self.refresh_transition(Instant::now());
        self.apply_command(Command::Previous);
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.refresh_transition(Instant::now());
        self.apply_command(Command::GoToPage(page));
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) {
        self.apply_command(Command::SetLayout(mode));
    }

    pub fn toggle_layout_mode(&mut self) {
        self.set_layout_mode(self.state.layout.toggled());
    }

    /// Change the scale by `delta` within the current bounds
    pub fn set_zoom(&mut self, delta: f32) {
        self.apply_command(Command::AdjustZoom(delta));
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(Zoom::STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(-Zoom::STEP);
    }

    /// Viewport resized; may switch between mobile and desktop behaviour
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.apply_command(Command::Resize { width, height });
    }

    /// Assemble and show the spread for the current position
    pub fn render_current_view(&mut self) {
        self.render_view(TransitionKind::Fade);
    }

    /// Warm the cache with a low resolution render of `page`, continuing
    /// outward away from the visible spread as renders complete.
    pub fn preload(&mut self, page: usize) {
        let direction = if page >= self.state.current_page {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.preload_from(page, direction, 1);
    }

    /// Apply a user action
    pub fn dispatch(&mut self, action: ViewerAction) -> DispatchOutcome {
        self.record_activity(Instant::now());
        match action {
            ViewerAction::Next => self.go_to_next(),
            ViewerAction::Previous => self.go_to_previous(),
            ViewerAction::ZoomIn => self.zoom_in(),
            ViewerAction::ZoomOut => self.zoom_out(),
            ViewerAction::ToggleLayout => self.toggle_layout_mode(),
            ViewerAction::Resize { width, height } => self.set_viewport(width, height),
            ViewerAction::Activity => {}
            ViewerAction::Exit => return DispatchOutcome::ExitToDetails,
        }
        DispatchOutcome::Continue
    }

    /// Apply every render result that has arrived
    pub fn pump(&mut self) {
        let responses = match self.service.as_mut() {
            Some(service) => service.poll_responses(),
            None => return,
        };
        for response in responses {
            self.handle_response(response);
        }
    }

    /// Advance timers: transition end, retry poll and header inactivity
    pub fn tick(&mut self, now: Instant) {
        self.refresh_transition(now);

        if self.header.tick(now) {
            self.surface.set_header_visible(false);
        }

        let retry_due = self
            .cycle
            .as_ref()
            .is_some_and(|cycle| now >= cycle.next_retry);
        if retry_due {
            self.retry_cycle(now);
        }
    }

    pub fn record_activity(&mut self, now: Instant) {
        if self.header.record_activity(now) {
            self.surface.set_header_visible(true);
        }
    }

    /// Block until no render cycle is active. Returns false on timeout.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        self.wait_while(timeout, |ctrl| ctrl.cycle.is_some())
    }

    /// Block until no render request is outstanding, preloads included.
    /// Returns false on timeout.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        self.wait_while(timeout, |ctrl| {
            ctrl.cycle.is_some() || ctrl.service.as_ref().is_some_and(RenderService::has_pending)
        })
    }

    fn wait_while(&mut self, timeout: Duration, busy: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            self.tick(Instant::now());
            if !busy(self) {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = deadline.duration_since(now).min(RETRY_POLL_INTERVAL);
            let response = match self.service.as_mut() {
                Some(service) => service.wait_response(wait),
                None => return true,
            };
            if let Some(response) = response {
                self.handle_response(response);
            }
        }
    }

    fn apply_command(&mut self, cmd: Command) {
        if self.service.is_none() {
            return;
        }
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::InvalidateCache => {
                    if let Some(service) = self.service.as_mut() {
                        service.invalidate();
                    }
                }
                Effect::RenderView(transition) => self.render_view(transition),
            }
        }
    }

    fn render_view(&mut self, transition: TransitionKind) {
        let Some(service) = self.service.as_mut() else {
            return;
        };

        if let Some(cycle) = &self.cycle {
            if cycle.epoch == service.epoch() {
                debug!(
                    "Render cycle active, coalescing request for page {}",
                    self.state.current_page
                );
                self.state.pending_page = Some(self.state.current_page);
                self.pending_transition = Some(transition);
                return;
            }
            debug!("Dropping render cycle from epoch {}", cycle.epoch);
            self.cycle = None;
        }

        let scale = self.state.scale();
        let mut spread = Spread::new(self.state.spread_pages());
        for page in spread.pages().to_vec() {
            match service.cached_page(page, scale) {
                Some(surface) => {
                    spread.fill(page, Slot::Ready(surface));
                }
                None => {
                    service.request_page_if_needed(page, scale, Quality::Full, RequestKind::View);
                }
            }
        }

        debug!(
            "Render cycle for pages {:?} (waiting on {:?})",
            spread.pages(),
            spread.waiting_pages()
        );
        self.state.rendering = true;
        self.state.pending_page = None;
        self.pending_transition = None;
        self.cycle = Some(RenderCycle {
            spread,
            epoch: service.epoch(),
            transition,
            next_retry: Instant::now() + RETRY_POLL_INTERVAL,
        });
        self.try_complete_cycle();
    }

    /// Re-resolve waiting slots from the cache and re-request pages nobody
    /// is rendering any more.
    fn retry_cycle(&mut self, now: Instant) {
        let (Some(service), Some(cycle)) = (self.service.as_mut(), self.cycle.as_mut()) else {
            return;
        };
        service.expire_stalled(self.config.render_timeout, now);
        let scale = self.state.scale();
        for page in cycle.spread.waiting_pages() {
            if let Some(surface) = service.cached_page(page, scale) {
                cycle.spread.fill(page, Slot::Ready(surface));
            } else {
                service.request_page_if_needed(page, scale, Quality::Full, RequestKind::View);
            }
        }
        cycle.next_retry = now + RETRY_POLL_INTERVAL;
        self.try_complete_cycle();
    }

    fn try_complete_cycle(&mut self) {
        if !self
            .cycle
            .as_ref()
            .is_some_and(|cycle| cycle.spread.is_complete())
        {
            return;
        }
        let Some(cycle) = self.cycle.take() else {
            return;
        };
        self.state.rendering = false;

        let pending = self.state.pending_page.take();
        let pending_transition = self.pending_transition.take();
        if cycle.spread.pages() != self.state.spread_pages().as_slice() {
            debug!(
                "Discarding superseded spread {:?}, rendering page {}",
                cycle.spread.pages(),
                pending.unwrap_or(self.state.current_page)
            );
            self.render_view(pending_transition.unwrap_or(cycle.transition));
            return;
        }

        self.commit(cycle.spread, cycle.transition);
    }

    fn commit(&mut self, spread: Spread, kind: TransitionKind) {
        let now = Instant::now();
        let transition = Transition::start(kind, now, self.config.transition);

        self.surface.show_spread(&spread, kind);
        self.surface
            .set_page_label(&PageLabel::for_spread(&spread, self.state.page_count));

        self.state.flipping = transition.is_flipping(now);
        self.transition = transition.is_running(now).then_some(transition);

        if let Some(service) = self.service.as_mut() {
            let scale = self.state.scale();
            for (page, slot) in spread.iter() {
                if slot
                    .surface()
                    .is_some_and(|s| s.quality == Quality::Preview)
                {
                    service.request_page_if_needed(
                        page,
                        scale,
                        Quality::Full,
                        RequestKind::Upgrade,
                    );
                }
            }
        }

        let first = spread.first_page();
        let last = spread.last_page();
        self.displayed = Some(spread);

        if let (Some(first), Some(last)) = (first, last) {
            self.preload_from(last + 1, Direction::Forward, 1);
            if first > 1 {
                self.preload_from(first - 1, Direction::Backward, 1);
            }
        }
    }

    fn handle_response(&mut self, response: RenderResponse) {
        let Some(service) = self.service.as_ref() else {
            return;
        };
        if response.params().epoch != service.epoch() {
            debug!("Discarding stale render of page {}", response.page());
            return;
        }

        match response {
            RenderResponse::Page {
                page,
                kind,
                surface,
                ..
            } => {
                let filled = self.fill_cycle_slot(page, Slot::Ready(Arc::clone(&surface)));
                match kind {
                    RequestKind::Preload { direction, .. } => {
                        // Measured from where the view is now, not where the walk began
                        let next = direction
                            .step(page, self.state.page_count)
                            .and_then(|next| {
                                self.distance_beyond_spread(next, direction)
                                    .map(|distance| (next, distance))
                            });
                        if let Some((next, distance)) = next {
                            self.preload_from(next, direction, distance);
                        }
                    }
                    RequestKind::View | RequestKind::Upgrade if !filled => {
                        self.apply_upgrade(surface);
                    }
                    _ => {}
                }
            }
            RenderResponse::Error {
                page, kind, error, ..
            } => {
                warn!("Failed to render page {page} ({kind:?}): {error}");
                // A full render still in flight may yet succeed for this slot.
                let full_pending = self
                    .service
                    .as_ref()
                    .is_some_and(|s| s.is_in_flight(page, Quality::Full));
                if kind == RequestKind::View || !full_pending {
                    self.fill_cycle_slot(page, Slot::Failed(error.to_string()));
                }
            }
        }

        self.try_complete_cycle();
    }

    fn fill_cycle_slot(&mut self, page: usize, slot: Slot) -> bool {
        self.cycle
            .as_mut()
            .is_some_and(|cycle| cycle.spread.fill(page, slot))
    }

    /// Swap a full resolution surface into the displayed spread
    fn apply_upgrade(&mut self, surface: Arc<Surface>) {
        if self.cycle.is_some() || surface.quality != Quality::Full {
            return;
        }
        let Some(displayed) = self.displayed.as_mut() else {
            return;
        };
        let page = surface.page;
        let is_preview = displayed
            .slot(page)
            .and_then(Slot::surface)
            .is_some_and(|s| s.quality == Quality::Preview);
        if !is_preview {
            return;
        }
        displayed.replace(page, Slot::Ready(surface));
        debug!("Upgraded page {page} to full resolution");
        self.surface.show_spread(displayed, TransitionKind::None);
    }

    /// Request preview renders starting at `page`, walking outward past
    /// pages that are already cached. Stops at pages already in flight;
    /// their completion continues the walk.
    fn preload_from(&mut self, page: usize, direction: Direction, distance: usize) {
        let radius = self.config.preload_radius;
        let Some(service) = self.service.as_mut() else {
            return;
        };
        let scale = self.state.scale();
        let page_count = self.state.page_count;

        let mut page = page;
        let mut distance = distance;
        while distance <= radius && (1..=page_count).contains(&page) {
            if service.is_in_flight(page, Quality::Preview) {
                return;
            }
            if !service.is_page_cached(page, scale) {
                debug!("Preloading page {page} ({direction:?}, distance {distance})");
                service.request_page(
                    page,
                    scale,
                    Quality::Preview,
                    RequestKind::Preload {
                        direction,
                        distance,
                    },
                );
                return;
            }
            match direction.step(page, page_count) {
                Some(next) => page = next,
                None => return,
            }
            distance += 1;
        }
    }

    /// How far `page` lies past the visible spread in `direction`. `None`
    /// when it is inside the spread or on its other side.
    fn distance_beyond_spread(&self, page: usize, direction: Direction) -> Option<usize> {
        let pages = self.state.spread_pages();
        let (first, last) = (*pages.first()?, *pages.last()?);
        let distance = match direction {
            Direction::Forward => page.checked_sub(last),
            Direction::Backward => first.checked_sub(page),
        };
        distance.filter(|d| *d > 0)
    }

    fn refresh_transition(&mut self, now: Instant) {
        let finished = self
            .transition
            .as_ref()
            .is_some_and(|t| !t.is_running(now));
        if finished {
            self.transition = None;
            self.state.flipping = false;
            self.surface.finish_transition();
        }
    }
}
