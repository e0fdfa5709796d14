//! Output side of the viewer
//!
//! The controller never draws; everything it wants shown goes through a
//! [`ViewSurface`]. Element ids mirror the fixed ids of the viewer page.

use super::transition::TransitionKind;
use super::types::{PageLabel, Spread};

/// Current page number display
pub const PAGE_NUM_ID: &str = "page-num";
pub const PREV_PAGE_ID: &str = "prev-page";
pub const NEXT_PAGE_ID: &str = "next-page";
pub const ZOOM_IN_ID: &str = "zoom-in";
pub const ZOOM_OUT_ID: &str = "zoom-out";
pub const LAYOUT_TOGGLE_ID: &str = "layout-toggle";

/// Banner shown when the document cannot be opened
pub const LOAD_ERROR_MESSAGE: &str = "Error loading document. Please try again later.";

/// Sink for everything the viewer displays
pub trait ViewSurface {
    /// Swap in a complete spread
    fn show_spread(&mut self, spread: &Spread, transition: TransitionKind);

    /// Update the page number and page count displays
    fn set_page_label(&mut self, label: &PageLabel);

    /// Replace the whole viewport with a static error message
    fn show_load_error(&mut self, message: &str);

    fn set_header_visible(&mut self, visible: bool);

    /// Called when the running transition has played out
    fn finish_transition(&mut self) {}
}
