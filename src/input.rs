//! Maps keys, buttons and touch gestures to viewer actions

use crossterm::event::KeyCode;

use crate::viewer::{
    LAYOUT_TOGGLE_ID, NEXT_PAGE_ID, PREV_PAGE_ID, ViewerAction, ZOOM_IN_ID, ZOOM_OUT_ID,
};

/// Minimum horizontal travel, in pixels, for a drag to count as a swipe
pub const SWIPE_THRESHOLD_PX: f32 = 50.0;

pub fn action_for_key(code: KeyCode) -> Option<ViewerAction> {
    match code {
        KeyCode::Right => Some(ViewerAction::Next),
        KeyCode::Left => Some(ViewerAction::Previous),
        KeyCode::Esc => Some(ViewerAction::Exit),
        KeyCode::Char('+' | '=') => Some(ViewerAction::ZoomIn),
        KeyCode::Char('-') => Some(ViewerAction::ZoomOut),
        KeyCode::Char('d') => Some(ViewerAction::ToggleLayout),
        _ => None,
    }
}

/// Action bound to a clickable element id
pub fn action_for_button(id: &str) -> Option<ViewerAction> {
    match id {
        PREV_PAGE_ID => Some(ViewerAction::Previous),
        NEXT_PAGE_ID => Some(ViewerAction::Next),
        ZOOM_IN_ID => Some(ViewerAction::ZoomIn),
        ZOOM_OUT_ID => Some(ViewerAction::ZoomOut),
        LAYOUT_TOGGLE_ID => Some(ViewerAction::ToggleLayout),
        _ => None,
    }
}

/// Turns a touch start/end pair into navigation
#[derive(Debug, Default)]
pub struct SwipeTracker {
    start: Option<(f32, f32)>,
}

impl SwipeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_start(&mut self, x: f32, y: f32) {
        self.start = Some((x, y));
    }

    /// Swipe left goes forward, swipe right goes back. Short or mostly
    /// vertical drags only count as activity.
    pub fn touch_end(&mut self, x: f32, y: f32) -> ViewerAction {
        let Some((start_x, start_y)) = self.start.take() else {
            return ViewerAction::Activity;
        };
        let dx = x - start_x;
        let dy = y - start_y;

        if dx.abs() < SWIPE_THRESHOLD_PX || dx.abs() < dy.abs() {
            return ViewerAction::Activity;
        }
        if dx < 0.0 {
            ViewerAction::Next
        } else {
            ViewerAction::Previous
        }
    }
}
