//! Core types for page view rendering

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::PREVIEW_SCALE_FACTOR;

/// Resolution a surface was rendered at
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quality {
    /// Reduced resolution render used to warm the cache
    Preview,
    /// Render at the full view scale
    Full,
}

impl Quality {
    /// Multiplier applied on top of the view scale when rendering
    #[must_use]
    pub fn scale_factor(self) -> f32 {
        match self {
            Self::Preview => PREVIEW_SCALE_FACTOR,
            Self::Full => 1.0,
        }
    }
}

/// Navigation direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Neighbour of `page` in this direction, `None` when it would leave the document
    #[must_use]
    pub fn step(self, page: usize, page_count: usize) -> Option<usize> {
        match self {
            Self::Forward => (page < page_count).then(|| page + 1),
            Self::Backward => (page > 1).then(|| page - 1),
        }
    }
}

/// Single or double page layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Single,
    Double,
}

impl LayoutMode {
    /// Number of pages shown together
    #[must_use]
    pub fn pages_per_spread(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Single => Self::Double,
            Self::Double => Self::Single,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

/// Page dimensions at a given scale.
///
/// Pages are 1-based. `scale` is the effective scale the page is rasterized
/// at, which for previews is smaller than the view scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub page: usize,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Viewport {
    /// Scale a page's natural size, never collapsing below one pixel
    #[must_use]
    pub fn from_page_size(page: usize, width: f32, height: f32, scale: f32) -> Self {
        Self {
            page,
            width: (width * scale).round().max(1.0) as u32,
            height: (height * scale).round().max(1.0) as u32,
            scale,
        }
    }
}

/// Rendered page surface.
///
/// Holds RGB pixels (3 bytes per pixel) as produced by a backend.
#[derive(Clone)]
pub struct Surface {
    /// Page number (1-based)
    pub page: usize,
    /// Raw RGB pixel data
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width_px: u32,
    /// Height in pixels
    pub height_px: u32,
    /// Effective scale used for rasterization
    pub render_scale: f32,
    /// Preview or full resolution
    pub quality: Quality,
}

impl Surface {
    /// Create a full quality surface for the given viewport
    #[must_use]
    pub fn new(viewport: &Viewport, width_px: u32, height_px: u32, pixels: Vec<u8>) -> Self {
        Self {
            page: viewport.page,
            pixels,
            width_px,
            height_px,
            render_scale: viewport.scale,
            quality: Quality::Full,
        }
    }

    /// RGB value at a pixel, `None` outside the surface
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width_px || y >= self.height_px {
            return None;
        }
        let idx = (y as usize * self.width_px as usize + x as usize) * 3;
        self.pixels
            .get(idx..idx + 3)
            .map(|px| [px[0], px[1], px[2]])
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("page", &self.page)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("render_scale", &self.render_scale)
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

/// Content of one page slot in a spread
#[derive(Clone, Debug)]
pub enum Slot {
    /// Render requested, not yet available
    Waiting,
    /// Rendered surface ready to display
    Ready(Arc<Surface>),
    /// Render failed; shown as an error tile
    Failed(String),
}

impl Slot {
    /// Ready or failed slots need no more work
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Waiting)
    }

    #[must_use]
    pub fn surface(&self) -> Option<&Arc<Surface>> {
        match self {
            Self::Ready(surface) => Some(surface),
            _ => None,
        }
    }
}

/// The one or two pages shown together for a navigation position
#[derive(Clone, Debug)]
pub struct Spread {
    pages: Vec<usize>,
    slots: Vec<Slot>,
}

impl Spread {
    /// Pages visible when positioned at `page`.
    ///
    /// Double layout shows `page` and `page + 1` unless `page` is the last page.
    #[must_use]
    pub fn pages_for(page: usize, page_count: usize, layout: LayoutMode) -> Vec<usize> {
        if page_count == 0 {
            return Vec::new();
        }
        let first = page.clamp(1, page_count);
        let last = (first + layout.pages_per_spread() - 1).min(page_count);
        (first..=last).collect()
    }

    /// Spread with every slot waiting
    #[must_use]
    pub fn new(pages: Vec<usize>) -> Self {
        let slots = vec![Slot::Waiting; pages.len()];
        Self { pages, slots }
    }

    #[must_use]
    pub fn pages(&self) -> &[usize] {
        &self.pages
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Pages paired with their slots, in display order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.pages.iter().copied().zip(self.slots.iter())
    }

    #[must_use]
    pub fn first_page(&self) -> Option<usize> {
        self.pages.first().copied()
    }

    #[must_use]
    pub fn last_page(&self) -> Option<usize> {
        self.pages.last().copied()
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.pages.contains(&page)
    }

    /// True once every slot is ready or failed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(Slot::is_settled)
    }

    /// Pages whose slot is still waiting
    #[must_use]
    pub fn waiting_pages(&self) -> Vec<usize> {
        self.iter()
            .filter(|(_, slot)| !slot.is_settled())
            .map(|(page, _)| page)
            .collect()
    }

    #[must_use]
    pub fn slot(&self, page: usize) -> Option<&Slot> {
        let idx = self.pages.iter().position(|&p| p == page)?;
        self.slots.get(idx)
    }

    /// Fill a waiting slot. Returns false if the page is not part of the
    /// spread or its slot is already settled.
    pub fn fill(&mut self, page: usize, slot: Slot) -> bool {
        let Some(idx) = self.pages.iter().position(|&p| p == page) else {
            return false;
        };
        if self.slots[idx].is_settled() {
            return false;
        }
        self.slots[idx] = slot;
        true
    }

    /// Replace a slot regardless of its state
    pub fn replace(&mut self, page: usize, slot: Slot) -> bool {
        match self.pages.iter().position(|&p| p == page) {
            Some(idx) => {
                self.slots[idx] = slot;
                true
            }
            None => false,
        }
    }
}

/// Page number display for the header (`page-num` / `page-count`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLabel {
    pub first: usize,
    pub last: usize,
    pub count: usize,
}

impl PageLabel {
    #[must_use]
    pub fn for_spread(spread: &Spread, count: usize) -> Self {
        let first = spread.first_page().unwrap_or(0);
        Self {
            first,
            last: spread.last_page().unwrap_or(first),
            count,
        }
    }

    /// Text for the `page-num` element
    #[must_use]
    pub fn page_num(&self) -> String {
        if self.last > self.first {
            format!("{}-{}", self.first, self.last)
        } else {
            self.first.to_string()
        }
    }
}

impl fmt::Display for PageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.page_num(), self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(page: usize) -> Arc<Surface> {
        let viewport = Viewport::from_page_size(page, 2.0, 2.0, 1.0);
        Arc::new(Surface::new(&viewport, 2, 2, vec![0; 12]))
    }

    #[test]
    fn double_spread_pairs_pages() {
        assert_eq!(Spread::pages_for(4, 10, LayoutMode::Double), vec![4, 5]);
        assert_eq!(Spread::pages_for(10, 10, LayoutMode::Double), vec![10]);
        assert_eq!(Spread::pages_for(4, 10, LayoutMode::Single), vec![4]);
        assert!(Spread::pages_for(1, 0, LayoutMode::Double).is_empty());
    }

    #[test]
    fn spread_completes_only_when_all_slots_settle() {
        let mut spread = Spread::new(vec![4, 5]);
        assert!(!spread.is_complete());

        assert!(spread.fill(4, Slot::Ready(surface(4))));
        assert!(!spread.is_complete());
        assert_eq!(spread.waiting_pages(), vec![5]);

        assert!(spread.fill(5, Slot::Failed("boom".into())));
        assert!(spread.is_complete());
    }

    #[test]
    fn fill_ignores_foreign_and_settled_slots() {
        let mut spread = Spread::new(vec![1]);
        assert!(!spread.fill(2, Slot::Ready(surface(2))));
        assert!(spread.fill(1, Slot::Failed("x".into())));
        assert!(!spread.fill(1, Slot::Ready(surface(1))));
        assert!(matches!(spread.slot(1), Some(Slot::Failed(_))));
    }

    #[test]
    fn page_label_formats_ranges() {
        let label = PageLabel {
            first: 4,
            last: 5,
            count: 10,
        };
        assert_eq!(label.to_string(), "4-5 / 10");

        let single = PageLabel {
            first: 7,
            last: 7,
            count: 10,
        };
        assert_eq!(single.page_num(), "7");
    }

    #[test]
    fn direction_step_respects_bounds() {
        assert_eq!(Direction::Forward.step(9, 10), Some(10));
        assert_eq!(Direction::Forward.step(10, 10), None);
        assert_eq!(Direction::Backward.step(1, 10), None);
        assert_eq!(Direction::Backward.step(2, 10), Some(1));
    }

    #[test]
    fn surface_pixel_lookup() {
        let viewport = Viewport::from_page_size(1, 2.0, 1.0, 1.0);
        let surface = Surface::new(&viewport, 2, 1, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(surface.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(surface.pixel(2, 0), None);
    }
}
