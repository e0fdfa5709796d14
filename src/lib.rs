// Export modules for use in tests
pub mod app;
pub mod event_source;
pub mod input;
pub mod panic_handler;
pub mod settings;
pub mod terminal_surface;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use app::{AppAction, ViewerApp, run_app_with_event_source};
pub use viewer::{PageViewController, ViewerConfig};
