//! View state management

use super::MOBILE_BREAKPOINT_PX;
use super::transition::TransitionKind;
use super::types::{LayoutMode, Spread};
use super::zoom::Zoom;

/// Current view state for a document
#[derive(Clone, Debug)]
pub struct ViewerState {
    /// First visible page (1-based)
    pub current_page: usize,

    /// Total page count
    pub page_count: usize,

    /// Scale and its bounds
    pub zoom: Zoom,

    /// Single or double page spreads
    pub layout: LayoutMode,

    /// A render cycle is assembling a spread
    pub rendering: bool,

    /// A page flip animation is playing
    pub flipping: bool,

    /// Page requested while a cycle was active; last write wins
    pub pending_page: Option<usize>,
}

impl ViewerState {
    #[must_use]
    pub fn new(scale: f32, layout: LayoutMode) -> Self {
        Self {
            current_page: 1,
            page_count: 0,
            zoom: Zoom::new(scale, false),
            layout,
            rendering: false,
            flipping: false,
            pending_page: None,
        }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.zoom.scale()
    }

    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.zoom.is_mobile()
    }

    /// Pages the current position shows
    #[must_use]
    pub fn spread_pages(&self) -> Vec<usize> {
        Spread::pages_for(self.current_page, self.page_count, self.layout)
    }

    /// Target of a forward step, `None` when the last page is already visible
    #[must_use]
    pub fn next_page(&self) -> Option<usize> {
        let last_visible = *self.spread_pages().last()?;
        if last_visible >= self.page_count {
            return None;
        }
        Some((self.current_page + self.layout.pages_per_spread()).min(self.page_count))
    }

    /// Target of a backward step, `None` on the first page
    #[must_use]
    pub fn previous_page(&self) -> Option<usize> {
        if self.page_count == 0 || self.current_page <= 1 {
            return None;
        }
        Some(
            self.current_page
                .saturating_sub(self.layout.pages_per_spread())
                .max(1),
        )
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Next => {
                if self.flipping {
                    return vec![];
                }
                match self.next_page() {
                    Some(page) => self.move_to(page),
                    None => vec![],
                }
            }

            Command::Previous => {
                if self.flipping {
                    return vec![];
                }
                match self.previous_page() {
                    Some(page) => self.move_to(page),
                    None => vec![],
                }
            }

            Command::GoToPage(page) => {
                if self.flipping || self.page_count == 0 {
                    return vec![];
                }
                self.move_to(page.clamp(1, self.page_count))
            }

            Command::SetLayout(mode) => {
                let mode = if self.is_mobile() {
                    LayoutMode::Single
                } else {
                    mode
                };
                if self.layout == mode {
                    return vec![];
                }
                self.layout = mode;
                vec![Effect::RenderView(TransitionKind::Fade)]
            }

            Command::AdjustZoom(delta) => {
                if self.zoom.adjust(delta) {
                    vec![
                        Effect::InvalidateCache,
                        Effect::RenderView(TransitionKind::Fade),
                    ]
                } else {
                    vec![]
                }
            }

            Command::Resize { width, .. } => {
                let mobile = width < MOBILE_BREAKPOINT_PX;
                if !self.zoom.set_mobile(mobile) {
                    return vec![];
                }
                if mobile {
                    self.layout = LayoutMode::Single;
                }
                vec![
                    Effect::InvalidateCache,
                    Effect::RenderView(TransitionKind::Fade),
                ]
            }

            Command::SetPageCount(count) => {
                self.page_count = count;
                self.current_page = self.current_page.clamp(1, count.max(1));
                vec![]
            }
        }
    }

    fn move_to(&mut self, page: usize) -> Vec<Effect> {
        if page == self.current_page {
            return vec![];
        }
        let transition = TransitionKind::flip_between(self.current_page, page);
        self.current_page = page;
        vec![Effect::RenderView(transition)]
    }
}

/// Commands that modify view state
#[derive(Clone, Copy, Debug)]
pub enum Command {
    /// Advance one spread
    Next,
    /// Go back one spread
    Previous,
    /// Jump to a specific page
    GoToPage(usize),
    /// Switch between single and double layout
    SetLayout(LayoutMode),
    /// Change the scale by a delta
    AdjustZoom(f32),
    /// Viewport size changed (pixels)
    Resize { width: u32, height: u32 },
    /// Update the page count
    SetPageCount(usize),
}

/// Effects produced by state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Invalidate entire cache
    InvalidateCache,
    /// Render the spread at the current position
    RenderView(TransitionKind),
}

#[cfg(test)]
mod tests {
    use super::super::types::Direction;
    use super::*;

    fn test_state(page_count: usize, layout: LayoutMode) -> ViewerState {
        let mut state = ViewerState::new(1.5, layout);
        let _ = state.apply(Command::SetPageCount(page_count));
        state
    }

    #[test]
    fn single_mode_walks_every_page() {
        let mut state = test_state(10, LayoutMode::Single);

        assert!(state.apply(Command::Previous).is_empty());
        assert_eq!(state.current_page, 1);

        for _ in 0..9 {
            assert_eq!(
                state.apply(Command::Next),
                vec![Effect::RenderView(TransitionKind::Flip(Direction::Forward))]
            );
        }
        assert_eq!(state.current_page, 10);
        assert!(state.apply(Command::Next).is_empty());
        assert_eq!(state.current_page, 10);
    }

    #[test]
    fn double_mode_steps_by_two() {
        let mut state = test_state(10, LayoutMode::Double);
        state.current_page = 4;
        assert_eq!(state.spread_pages(), vec![4, 5]);

        let _ = state.apply(Command::Next);
        assert_eq!(state.spread_pages(), vec![6, 7]);

        let _ = state.apply(Command::Previous);
        assert_eq!(state.current_page, 4);
    }

    #[test]
    fn double_mode_stops_when_last_page_visible() {
        let mut state = test_state(10, LayoutMode::Double);
        state.current_page = 9;
        assert!(state.apply(Command::Next).is_empty());

        state.current_page = 8;
        let _ = state.apply(Command::Next);
        assert_eq!(state.spread_pages(), vec![10]);
    }

    #[test]
    fn previous_clamps_to_first_page() {
        let mut state = test_state(10, LayoutMode::Double);
        state.current_page = 2;
        let _ = state.apply(Command::Previous);
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn navigation_ignored_while_flipping() {
        let mut state = test_state(10, LayoutMode::Single);
        state.flipping = true;
        assert!(state.apply(Command::Next).is_empty());
        assert!(state.apply(Command::GoToPage(5)).is_empty());
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn zoom_change_invalidates_and_renders() {
        let mut state = test_state(10, LayoutMode::Single);
        assert_eq!(
            state.apply(Command::AdjustZoom(0.2)),
            vec![
                Effect::InvalidateCache,
                Effect::RenderView(TransitionKind::Fade)
            ]
        );

        state.zoom = super::super::zoom::Zoom::new(3.0, false);
        assert!(state.apply(Command::AdjustZoom(0.2)).is_empty());
    }

    #[test]
    fn mobile_resize_forces_single_layout() {
        let mut state = test_state(10, LayoutMode::Double);
        let effects = state.apply(Command::Resize {
            width: 400,
            height: 800,
        });
        assert_eq!(effects[0], Effect::InvalidateCache);
        assert!(state.is_mobile());
        assert_eq!(state.layout, LayoutMode::Single);

        assert!(state.apply(Command::SetLayout(LayoutMode::Double)).is_empty());
        assert!(
            state
                .apply(Command::Resize {
                    width: 500,
                    height: 800
                })
                .is_empty()
        );
    }

    #[test]
    fn go_to_page_clamps() {
        let mut state = test_state(10, LayoutMode::Single);
        let _ = state.apply(Command::GoToPage(99));
        assert_eq!(state.current_page, 10);
        assert_eq!(
            state.apply(Command::GoToPage(3)),
            vec![Effect::RenderView(TransitionKind::Flip(Direction::Backward))]
        );
    }
}
