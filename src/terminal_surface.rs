//! Terminal front end for the viewer
//!
//! Pages are drawn with upper half-block characters so every terminal cell
//! carries two vertically stacked pixels. The header row doubles as the
//! button bar; its element rects are kept from the last draw for mouse
//! hit-testing.

use std::time::Instant;

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

use crate::viewer::{
    Direction, LAYOUT_TOGGLE_ID, NEXT_PAGE_ID, PAGE_NUM_ID, PREV_PAGE_ID, PageLabel, Slot,
    Spread, Surface, Transition, TransitionKind, ViewSurface, ZOOM_IN_ID, ZOOM_OUT_ID,
};

/// Pixels a terminal cell stands for horizontally
pub const CELL_WIDTH_PX: u32 = 8;
/// Pixels a terminal cell stands for vertically
pub const CELL_HEIGHT_PX: u32 = 16;

const BACKGROUND_RGB: (u8, u8, u8) = (0x1b, 0x2b, 0x34);
const BACKGROUND: Color = Color::Rgb(BACKGROUND_RGB.0, BACKGROUND_RGB.1, BACKGROUND_RGB.2);
const HEADER_BG: Color = Color::Rgb(0x34, 0x3d, 0x46);
const FOREGROUND: Color = Color::Rgb(0xc0, 0xc5, 0xce);
const DIM: Color = Color::Rgb(0x65, 0x73, 0x7e);
const ERROR: Color = Color::Rgb(0xec, 0x5f, 0x67);

/// Header buttons in display order: element id and caption
const HEADER_BUTTONS: [(&str, &str); 5] = [
    (PREV_PAGE_ID, " ◀ "),
    (NEXT_PAGE_ID, " ▶ "),
    (ZOOM_OUT_ID, " - "),
    (ZOOM_IN_ID, " + "),
    (LAYOUT_TOGGLE_ID, " ▯▯ "),
];

/// Size in pixels of a terminal area, as seen by the controller
#[must_use]
pub fn viewport_px(columns: u16, rows: u16) -> (u32, u32) {
    (
        u32::from(columns) * CELL_WIDTH_PX,
        u32::from(rows) * CELL_HEIGHT_PX,
    )
}

#[derive(Default)]
pub struct TerminalSurface {
    spread: Option<Spread>,
    label: Option<PageLabel>,
    load_error: Option<String>,
    header_visible: bool,
    transition: TransitionKind,
    buttons: Vec<(&'static str, Rect)>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            header_visible: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn spread(&self) -> Option<&Spread> {
        self.spread.as_ref()
    }

    #[must_use]
    pub fn is_header_visible(&self) -> bool {
        self.header_visible
    }

    /// Element id of the header button under a terminal cell
    #[must_use]
    pub fn button_at(&self, column: u16, row: u16) -> Option<&'static str> {
        if !self.header_visible {
            return None;
        }
        self.buttons
            .iter()
            .find(|(_, rect)| {
                column >= rect.x && column < rect.right() && row >= rect.y && row < rect.bottom()
            })
            .map(|(id, _)| *id)
    }

    /// Draw into `area`. `transition` is the controller's running
    /// transition, used to animate the incoming spread.
    pub fn render(&mut self, f: &mut Frame, area: Rect, transition: Option<&Transition>) {
        f.render_widget(Clear, area);
        f.render_widget(Block::default().style(Style::default().bg(BACKGROUND)), area);
        self.buttons.clear();

        if let Some(message) = &self.load_error {
            render_banner(f, area, message);
            return;
        }

        let body = if self.header_visible && area.height > 1 {
            let chunks = Layout::default()
                .direction(LayoutDirection::Vertical)
                .constraints([Constraint::Length(1), Constraint::Min(0)])
                .split(area);
            self.render_header(f, chunks[0]);
            chunks[1]
        } else {
            area
        };

        let Some(spread) = &self.spread else {
            let loading = Paragraph::new("Loading…")
                .alignment(Alignment::Center)
                .style(Style::default().fg(DIM));
            f.render_widget(loading, centered_row(body));
            return;
        };

        let progress = transition
            .filter(|t| t.kind() == self.transition)
            .map_or(1.0, |t| t.progress(Instant::now()));
        let effect = match self.transition {
            TransitionKind::Fade => Effect::Fade(progress),
            TransitionKind::Flip(direction) => Effect::Reveal(direction, progress),
            TransitionKind::None => Effect::Fade(1.0),
        };

        let slots = spread.slots().len().max(1) as u32;
        let slot_areas = Layout::default()
            .direction(LayoutDirection::Horizontal)
            .constraints(vec![Constraint::Ratio(1, slots); slots as usize])
            .split(body);

        for ((page, slot), slot_area) in spread.iter().zip(slot_areas.iter()) {
            match slot {
                Slot::Ready(surface) => f.render_widget(
                    PageImage {
                        surface: surface.as_ref(),
                        effect,
                    },
                    *slot_area,
                ),
                Slot::Failed(reason) => render_error_tile(f, *slot_area, page, reason),
                Slot::Waiting => {}
            }
        }
    }

    fn render_header(&mut self, f: &mut Frame, area: Rect) {
        f.render_widget(Block::default().style(Style::default().bg(HEADER_BG)), area);

        let mut x = area.x;
        for (id, caption) in HEADER_BUTTONS {
            let width = caption.chars().count() as u16;
            if x + width > area.right() {
                break;
            }
            let rect = Rect::new(x, area.y, width, 1);
            f.render_widget(
                Paragraph::new(caption).style(
                    Style::default()
                        .fg(FOREGROUND)
                        .bg(HEADER_BG)
                        .add_modifier(Modifier::BOLD),
                ),
                rect,
            );
            self.buttons.push((id, rect));
            x += width + 1;
        }

        if let Some(label) = &self.label {
            let text = Line::from(vec![
                Span::styled(label.page_num(), Style::default().fg(FOREGROUND)),
                Span::styled(format!(" / {}", label.count), Style::default().fg(DIM)),
            ]);
            let width = text.width() as u16;
            if area.width > width {
                let rect = Rect::new(area.right() - width - 1, area.y, width, 1);
                f.render_widget(Paragraph::new(text), rect);
                self.buttons.push((PAGE_NUM_ID, rect));
            }
        }
    }
}

impl ViewSurface for TerminalSurface {
    fn show_spread(&mut self, spread: &Spread, transition: TransitionKind) {
        self.spread = Some(spread.clone());
        self.transition = transition;
    }

    fn set_page_label(&mut self, label: &PageLabel) {
        self.label = Some(label.clone());
    }

    fn show_load_error(&mut self, message: &str) {
        self.spread = None;
        self.label = None;
        self.load_error = Some(message.to_string());
    }

    fn set_header_visible(&mut self, visible: bool) {
        self.header_visible = visible;
    }

    fn finish_transition(&mut self) {
        self.transition = TransitionKind::None;
    }
}

#[derive(Clone, Copy, Debug)]
enum Effect {
    /// Colors scaled toward the background
    Fade(f32),
    /// Only the part already turned is drawn
    Reveal(Direction, f32),
}

/// A page surface scaled to fit its area, aspect ratio kept
struct PageImage<'a> {
    surface: &'a Surface,
    effect: Effect,
}

impl PageImage<'_> {
    /// Cells used by the image inside `area`, centered
    fn fit(&self, area: Rect) -> Rect {
        // Products of page and area sizes overflow u32 at large zoom
        let (w, h) = (
            u64::from(self.surface.width_px.max(1)),
            u64::from(self.surface.height_px.max(1)),
        );
        // Each cell holds one pixel column and two pixel rows
        let avail_w = u64::from(area.width);
        let avail_h = u64::from(area.height) * 2;
        let (cols, rows) = if avail_w * h <= avail_h * w {
            (avail_w, (avail_w * h / w).div_ceil(2))
        } else {
            ((avail_h * w / h).max(1), u64::from(area.height))
        };
        let cols = cols.clamp(1, u64::from(area.width).max(1)) as u16;
        let rows = rows.clamp(1, u64::from(area.height).max(1)) as u16;
        Rect::new(
            area.x + (area.width.saturating_sub(cols)) / 2,
            area.y + (area.height.saturating_sub(rows)) / 2,
            cols,
            rows,
        )
    }

    fn sample(&self, col: u16, pixel_row: u32, target: Rect) -> Color {
        let x = u64::from(col) * u64::from(self.surface.width_px)
            / u64::from(target.width).max(1);
        let y = u64::from(pixel_row) * u64::from(self.surface.height_px)
            / (u64::from(target.height) * 2).max(1);
        // Both are below the surface size, which is a u32
        let [r, g, b] = self
            .surface
            .pixel(x as u32, y as u32)
            .unwrap_or([0, 0, 0]);
        match self.effect {
            Effect::Fade(progress) => fade(r, g, b, progress),
            Effect::Reveal(..) => Color::Rgb(r, g, b),
        }
    }

    fn visible(&self, col: u16, width: u16) -> bool {
        match self.effect {
            Effect::Fade(_) => true,
            Effect::Reveal(direction, progress) => {
                let shown = (f32::from(width) * progress).ceil() as u16;
                match direction {
                    Direction::Forward => col >= width.saturating_sub(shown),
                    Direction::Backward => col < shown,
                }
            }
        }
    }
}

impl Widget for PageImage<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        let target = self.fit(area).intersection(buf.area);

        for row in 0..target.height {
            for col in 0..target.width {
                if !self.visible(col, target.width) {
                    continue;
                }
                let top = self.sample(col, u32::from(row) * 2, target);
                let bottom = self.sample(col, u32::from(row) * 2 + 1, target);
                if let Some(cell) = buf.cell_mut((target.x + col, target.y + row)) {
                    cell.set_symbol("▀").set_fg(top).set_bg(bottom);
                }
            }
        }
    }
}

fn fade(r: u8, g: u8, b: u8, progress: f32) -> Color {
    let t = progress.clamp(0.0, 1.0);
    let mix = |c: u8, bg: u8| (f32::from(bg) + (f32::from(c) - f32::from(bg)) * t).round() as u8;
    let (br, bg, bb) = BACKGROUND_RGB;
    Color::Rgb(mix(r, br), mix(g, bg), mix(b, bb))
}

fn render_error_tile(f: &mut Frame, area: Rect, page: usize, reason: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Page {page} "))
        .border_style(Style::default().fg(ERROR));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = vec![
        Line::from(Span::styled(
            "Page failed to render",
            Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(reason.to_string(), Style::default().fg(DIM))),
    ];
    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        centered_rows(inner, 2),
    );
}

fn render_banner(f: &mut Frame, area: Rect, message: &str) {
    f.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(ERROR).add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true }),
        centered_row(area),
    );
}

fn centered_row(area: Rect) -> Rect {
    centered_rows(area, 1)
}

fn centered_rows(area: Rect, rows: u16) -> Rect {
    let rows = rows.min(area.height);
    Rect::new(area.x, area.y + (area.height - rows) / 2, area.width, rows)
}
