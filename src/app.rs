use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use log::debug;
use ratatui::{Frame, Terminal};

use crate::event_source::EventSource;
use crate::input::{SwipeTracker, action_for_button, action_for_key};
use crate::terminal_surface::{CELL_HEIGHT_PX, CELL_WIDTH_PX, TerminalSurface, viewport_px};
use crate::viewer::{
    DispatchOutcome, PageBackend, PageViewController, RenderFault, ViewerAction, ViewerConfig,
};

/// Why the event loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    /// Escape: hand control back to the document details view
    ExitToDetails,
}

pub struct ViewerApp {
    controller: PageViewController<TerminalSurface>,
    swipe: SwipeTracker,
    exit: Option<AppAction>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            controller: PageViewController::new(TerminalSurface::new(), config),
            swipe: SwipeTracker::new(),
            exit: None,
        }
    }

    /// Open a document. A failure leaves the error banner on screen.
    pub fn open(
        &mut self,
        backend: Arc<dyn PageBackend>,
        location: &str,
    ) -> Result<(), RenderFault> {
        self.controller.open(backend, location)
    }

    pub fn controller(&self) -> &PageViewController<TerminalSurface> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PageViewController<TerminalSurface> {
        &mut self.controller
    }

    /// Set once the event loop has been asked to stop
    pub fn exit_reason(&self) -> Option<AppAction> {
        self.exit
    }

    /// Tell the controller how large the terminal is
    pub fn resize(&mut self, columns: u16, rows: u16) {
        let (width, height) = viewport_px(columns, rows);
        self.dispatch(ViewerAction::Resize { width, height });
    }

    pub fn handle_event(&mut self, event: &Event) -> Option<AppAction> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(*key),
            Event::Mouse(mouse) => {
                let (x, y) = (
                    (u32::from(mouse.column) * CELL_WIDTH_PX) as f32,
                    (u32::from(mouse.row) * CELL_HEIGHT_PX) as f32,
                );
                match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left) => {
                        let button = self
                            .controller
                            .surface()
                            .button_at(mouse.column, mouse.row)
                            .and_then(action_for_button);
                        match button {
                            Some(action) => self.dispatch(action),
                            None => {
                                self.swipe.touch_start(x, y);
                                self.dispatch(ViewerAction::Activity)
                            }
                        }
                    }
                    MouseEventKind::Up(MouseButton::Left) => {
                        let action = self.swipe.touch_end(x, y);
                        self.dispatch(action)
                    }
                    _ => self.dispatch(ViewerAction::Activity),
                }
            }
            Event::Resize(columns, rows) => {
                self.resize(*columns, *rows);
                None
            }
            _ => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(AppAction::Quit);
            }
            _ => {}
        }
        let action = action_for_key(key.code).unwrap_or(ViewerAction::Activity);
        self.dispatch(action)
    }

    fn dispatch(&mut self, action: ViewerAction) -> Option<AppAction> {
        match self.controller.dispatch(action) {
            DispatchOutcome::Continue => None,
            DispatchOutcome::ExitToDetails => Some(AppAction::ExitToDetails),
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let transition = self.controller.transition().copied();
        let area = f.area();
        self.controller
            .surface_mut()
            .render(f, area, transition.as_ref());
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut ViewerApp,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(16);
    let size = terminal.size()?;
    app.resize(size.width, size.height);

    loop {
        let mut events_processed = 0;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            if let Some(action) = app.handle_event(&event) {
                debug!("Leaving viewer: {action:?}");
                app.exit = Some(action);
                break;
            }
        }

        app.controller.pump();
        app.controller.tick(Instant::now());
        terminal.draw(|f| app.draw(f))?;

        if app.exit.is_some() {
            return Ok(());
        }

        // If no events were processed, wait a bit to avoid busy-waiting
        if events_processed == 0 {
            let _ = event_source.poll(tick_rate);
        }
    }
}
