use std::sync::Arc;
use std::time::{Duration, Instant};

use comicview::test_utils::test_helpers::*;
use comicview::viewer::{
    LOAD_ERROR_MESSAGE, LayoutMode, PageViewController, Quality, RETRY_POLL_INTERVAL, Slot,
    TransitionKind, ViewerConfig,
};

const SETTLE: Duration = Duration::from_secs(5);

fn config(layout: LayoutMode) -> ViewerConfig {
    ViewerConfig {
        layout_mode: layout,
        transition: Duration::ZERO,
        ..ViewerConfig::default()
    }
}

fn open_with(
    pages: usize,
    config: ViewerConfig,
) -> (PageViewController<RecordingSurface>, ScriptedBackend) {
    let backend = ScriptedBackend::new(pages);
    let mut viewer = PageViewController::new(RecordingSurface::new(), config);
    viewer.open(Arc::new(backend.clone()), "memory").unwrap();
    assert!(viewer.is_loaded());
    assert!(viewer.wait_until_idle(SETTLE));
    (viewer, backend)
}

/// Spin until `done` holds, without touching the controller
fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + SETTLE;
    while !done() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn open(
    pages: usize,
    layout: LayoutMode,
) -> (PageViewController<RecordingSurface>, ScriptedBackend) {
    open_with(pages, config(layout))
}

#[test]
fn test_ten_page_walk_in_single_mode() {
    let (mut viewer, _) = open(10, LayoutMode::Single);
    assert_eq!(viewer.surface().last_pages(), Some(vec![1]));
    assert_eq!(viewer.surface().last_label(), Some("1 / 10"));

    viewer.go_to_previous();
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.state().current_page, 1);

    for expected in 2..=10 {
        viewer.go_to_next();
        assert!(viewer.wait_until_settled(SETTLE));
        assert_eq!(viewer.state().current_page, expected);
        assert_eq!(viewer.surface().last_pages(), Some(vec![expected]));
    }
    assert_eq!(viewer.surface().last_label(), Some("10 / 10"));
    assert!(viewer.wait_until_idle(SETTLE));

    let shown = viewer.surface().spread_count();
    viewer.go_to_next();
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.state().current_page, 10);
    assert_eq!(viewer.surface().spread_count(), shown);
}

#[test]
fn test_next_then_previous_returns_to_start() {
    let (mut viewer, _) = open(10, LayoutMode::Single);

    for start in 1..=9 {
        viewer.go_to_page(start);
        assert!(viewer.wait_until_settled(SETTLE));
        viewer.go_to_next();
        assert!(viewer.wait_until_settled(SETTLE));
        viewer.go_to_previous();
        assert!(viewer.wait_until_settled(SETTLE));
        assert_eq!(viewer.state().current_page, start);
    }
}

#[test]
fn test_double_mode_advances_by_spread() {
    let (mut viewer, _) = open(10, LayoutMode::Double);
    assert_eq!(viewer.surface().last_pages(), Some(vec![1, 2]));

    viewer.go_to_page(4);
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.surface().last_pages(), Some(vec![4, 5]));
    assert_eq!(viewer.surface().last_label(), Some("4-5 / 10"));

    viewer.go_to_next();
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.surface().last_pages(), Some(vec![6, 7]));
    assert_eq!(viewer.surface().last_label(), Some("6-7 / 10"));
}

#[test]
fn test_toggle_layout_rerenders_with_fade() {
    let (mut viewer, _) = open(10, LayoutMode::Single);
    viewer.go_to_page(3);
    assert!(viewer.wait_until_settled(SETTLE));

    viewer.toggle_layout_mode();
    assert!(viewer.wait_until_settled(SETTLE));

    assert_eq!(viewer.state().layout, LayoutMode::Double);
    assert_eq!(viewer.surface().last_pages(), Some(vec![3, 4]));
    let first_double = viewer.surface().calls.iter().find_map(|call| match call {
        SurfaceCall::Spread {
            pages, transition, ..
        } if pages == &vec![3, 4] => Some(*transition),
        _ => None,
    });
    assert_eq!(first_double, Some(TransitionKind::Fade));
}

#[test]
fn test_zoom_invalidates_cache() {
    let (mut viewer, backend) = open(10, LayoutMode::Single);
    assert!(viewer.is_cached(1));
    assert!(viewer.cached_len() > 0);

    backend.hold_page(1);
    viewer.zoom_in();

    assert!(!viewer.is_cached(1));
    assert_eq!(viewer.cached_len(), 0);
    assert!((viewer.state().scale() - 1.7).abs() < 1e-6);

    backend.release(1);
    assert!(viewer.wait_until_settled(SETTLE));
    assert!(viewer.is_cached(1));
}

#[test]
fn test_zoom_at_bound_keeps_cache() {
    let config = ViewerConfig {
        initial_scale: 3.0,
        ..config(LayoutMode::Single)
    };
    let (mut viewer, _) = open_with(4, config);
    let cached = viewer.cached_len();

    viewer.zoom_in();

    assert_eq!(viewer.state().scale(), 3.0);
    assert_eq!(viewer.cached_len(), cached);
}

#[test]
fn test_partial_spread_is_never_shown() {
    let (mut viewer, backend) = open(10, LayoutMode::Double);
    let shown = viewer.surface().spread_count();

    backend.hold_page(5);
    viewer.go_to_page(4);
    assert!(!viewer.wait_until_settled(Duration::from_millis(200)));

    assert_eq!(viewer.surface().spread_count(), shown);
    assert_eq!(viewer.surface().last_pages(), Some(vec![1, 2]));

    backend.release(5);
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.surface().last_pages(), Some(vec![4, 5]));

    for spread in &viewer.surface().spreads {
        assert!(spread.is_complete(), "incomplete spread {:?}", spread.pages());
    }
}

#[test]
fn test_rapid_navigation_coalesces_to_last_target() {
    let config = ViewerConfig {
        preload_radius: 0,
        ..config(LayoutMode::Single)
    };
    let (mut viewer, backend) = open_with(10, config);
    let shown = viewer.surface().spread_count();

    backend.hold_page(6);
    viewer.go_to_page(6);
    viewer.go_to_page(7);
    viewer.go_to_page(8);
    viewer.go_to_page(9);
    assert_eq!(viewer.state().current_page, 9);
    assert_eq!(viewer.state().pending_page, Some(9));

    backend.release(6);
    assert!(viewer.wait_until_settled(SETTLE));

    let later: Vec<Vec<usize>> = viewer.surface().spreads[shown..]
        .iter()
        .map(|s| s.pages().to_vec())
        .collect();
    assert_eq!(later, vec![vec![9]]);
    assert_eq!(backend.render_count(7), 0);
    assert_eq!(backend.render_count(8), 0);
    assert_eq!(viewer.state().pending_page, None);
}

#[test]
fn test_failed_page_shows_error_tile_beside_good_page() {
    let config = ViewerConfig {
        preload_radius: 0,
        ..config(LayoutMode::Double)
    };
    let (mut viewer, backend) = open_with(10, config);
    backend.fail_page(5);

    viewer.go_to_page(4);
    assert!(viewer.wait_until_settled(SETTLE));

    let spread = viewer.displayed_spread().unwrap();
    assert_eq!(spread.pages(), &[4, 5]);
    assert!(matches!(spread.slot(4), Some(Slot::Ready(_))));
    assert!(matches!(spread.slot(5), Some(Slot::Failed(_))));

    // Failures are not cached, coming back renders the page again
    viewer.go_to_next();
    assert!(viewer.wait_until_settled(SETTLE));
    viewer.go_to_previous();
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(backend.render_count(5), 2);
}

#[test]
fn test_load_failure_shows_banner_and_ignores_input() {
    let mut viewer = PageViewController::new(RecordingSurface::new(), config(LayoutMode::Single));
    let result = viewer.open(Arc::new(ScriptedBackend::unavailable()), "missing.cbz");

    assert!(result.is_err());
    assert!(viewer.load_failed());
    assert!(!viewer.is_loaded());
    assert_eq!(viewer.surface().load_error(), Some(LOAD_ERROR_MESSAGE));

    viewer.go_to_next();
    viewer.zoom_in();
    assert_eq!(viewer.state().current_page, 1);
    assert_eq!(viewer.surface().spread_count(), 0);
}

#[test]
fn test_empty_document_is_a_load_failure() {
    let mut viewer = PageViewController::new(RecordingSurface::new(), config(LayoutMode::Single));
    assert!(viewer.open(Arc::new(ScriptedBackend::new(0)), "empty").is_err());
    assert_eq!(viewer.surface().load_error(), Some(LOAD_ERROR_MESSAGE));
}

#[test]
fn test_navigation_ignored_during_flip() {
    let config = ViewerConfig {
        transition: Duration::from_secs(30),
        preload_radius: 0,
        ..config(LayoutMode::Single)
    };
    let (mut viewer, _) = open_with(10, config);

    viewer.go_to_next();
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.state().current_page, 2);
    assert!(viewer.state().flipping);

    viewer.go_to_next();
    viewer.go_to_previous();
    viewer.go_to_page(7);
    assert_eq!(viewer.state().current_page, 2);
}

#[test]
fn test_preload_warms_neighbours() {
    let (mut viewer, _) = open(10, LayoutMode::Single);

    viewer.go_to_page(5);
    assert!(viewer.wait_until_idle(SETTLE));

    for page in [3, 4, 6, 7] {
        assert!(viewer.is_cached(page), "page {page} should be preloaded");
    }
    assert!(!viewer.is_cached(9));
}

#[test]
fn test_preview_is_upgraded_in_place() {
    let (mut viewer, _) = open(10, LayoutMode::Single);

    // Page 2 was preloaded at preview quality
    viewer.go_to_next();
    assert!(viewer.wait_until_idle(SETTLE));

    let surface = viewer
        .displayed_spread()
        .and_then(|s| s.slot(2))
        .and_then(Slot::surface)
        .cloned()
        .unwrap();
    assert_eq!(surface.quality, Quality::Full);

    let transitions: Vec<TransitionKind> = viewer
        .surface()
        .calls
        .iter()
        .filter_map(|call| match call {
            SurfaceCall::Spread {
                pages, transition, ..
            } if pages == &vec![2] => Some(*transition),
            _ => None,
        })
        .collect();
    assert_eq!(transitions.last(), Some(&TransitionKind::None));
}

#[test]
fn test_header_hides_after_inactivity() {
    let config = ViewerConfig {
        header_timeout: Duration::from_millis(20),
        ..config(LayoutMode::Single)
    };
    let (mut viewer, _) = open_with(3, config);

    std::thread::sleep(Duration::from_millis(40));
    viewer.tick(std::time::Instant::now());
    assert!(viewer.surface().calls.contains(&SurfaceCall::Header(false)));

    viewer.record_activity(std::time::Instant::now());
    assert_eq!(
        viewer.surface().calls.last(),
        Some(&SurfaceCall::Header(true))
    );
}

#[test]
fn test_explicit_preload_stays_near_view() {
    let (mut viewer, backend) = open(10, LayoutMode::Single);

    viewer.preload(8);
    assert!(viewer.wait_until_idle(SETTLE));

    // The requested page is warmed, the walk past it is bounded by the view
    assert!(viewer.is_cached(8));
    assert!(!viewer.is_cached(9));
    assert_eq!(backend.render_count(9), 0);

    // Already cached pages are not rendered again
    let rendered = backend.render_count(1);
    viewer.render_current_view();
    assert!(viewer.wait_until_idle(SETTLE));
    assert_eq!(backend.render_count(1), rendered);
    assert_eq!(viewer.surface().last_pages(), Some(vec![1]));
}

#[test]
fn test_preload_walk_stops_after_navigating_away() {
    let (mut viewer, backend) = open(10, LayoutMode::Single);

    backend.hold_page(5);
    viewer.go_to_page(4);
    assert!(viewer.wait_until_settled(SETTLE));

    viewer.go_to_page(1);
    assert!(viewer.wait_until_settled(SETTLE));
    assert_eq!(viewer.surface().last_pages(), Some(vec![1]));

    // Page 5 finishes after the view moved back to page 1
    backend.release(5);
    assert!(viewer.wait_until_idle(SETTLE));

    assert!(viewer.is_cached(5));
    assert_eq!(backend.render_count(6), 0);
    assert!(!viewer.is_cached(6));
}

#[test]
fn test_retry_poll_fills_slot_from_cache() {
    let config = ViewerConfig {
        preload_radius: 0,
        ..config(LayoutMode::Single)
    };
    let (mut viewer, backend) = open_with(10, config);

    viewer.go_to_page(3);
    // The worker caches the page; its answer is never pumped
    wait_for(|| viewer.is_cached(3));
    assert_eq!(viewer.surface().last_pages(), Some(vec![1]));

    viewer.tick(Instant::now() + RETRY_POLL_INTERVAL);

    assert_eq!(viewer.surface().last_pages(), Some(vec![3]));
    assert_eq!(viewer.state().current_page, 3);
    assert_eq!(backend.render_count(3), 1);
}

#[test]
fn test_retry_poll_reissues_lost_render() {
    let config = ViewerConfig {
        preload_radius: 0,
        render_timeout: Duration::from_millis(100),
        ..config(LayoutMode::Single)
    };
    let (mut viewer, backend) = open_with(10, config);
    let shown = viewer.surface().spread_count();

    backend.crash_page(4);
    viewer.go_to_page(4);
    wait_for(|| backend.has_crashed(4));

    // The request died with its worker: nothing rendered, nothing shown
    viewer.pump();
    assert_eq!(backend.render_count(4), 0);
    assert_eq!(viewer.surface().spread_count(), shown);

    viewer.tick(Instant::now() + Duration::from_millis(100) + RETRY_POLL_INTERVAL);
    assert!(viewer.wait_until_settled(SETTLE));

    assert_eq!(backend.render_count(4), 1);
    assert_eq!(viewer.surface().last_pages(), Some(vec![4]));
    for spread in &viewer.surface().spreads[shown..] {
        assert!(spread.is_complete());
    }
}
