pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Condvar, Mutex};

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::event_source::{Event, KeyCode, MouseButton, MouseEventKind, SimulatedEventSource};
    use crate::viewer::{
        PageBackend, PageDocument, PageLabel, RenderFault, Slot, Spread, Surface, TransitionKind,
        ViewSurface, Viewport,
    };

    /// Builder for creating test scenarios with simulated user input
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl Default for TestScenarioBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self { events: Vec::new() }
        }

        /// Add a character key press
        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        /// Press the right arrow n times
        pub fn next_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::key(KeyCode::Right));
            }
            self
        }

        /// Press the left arrow n times
        pub fn previous_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::key(KeyCode::Left));
            }
            self
        }

        pub fn press_escape(mut self) -> Self {
            self.events.push(SimulatedEventSource::key(KeyCode::Esc));
            self
        }

        /// Drag with the left mouse button between two cells
        pub fn drag(mut self, from: (u16, u16), to: (u16, u16)) -> Self {
            self.events.push(SimulatedEventSource::mouse(
                MouseEventKind::Down(MouseButton::Left),
                from.0,
                from.1,
            ));
            self.events.push(SimulatedEventSource::mouse(
                MouseEventKind::Up(MouseButton::Left),
                to.0,
                to.1,
            ));
            self
        }

        /// Terminal resize event
        pub fn resize(mut self, columns: u16, rows: u16) -> Self {
            self.events.push(Event::Resize(columns, rows));
            self
        }

        /// Quit the application (press 'q')
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::char_key('q'));
            self
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }

    /// Everything a surface was asked to show
    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceCall {
        Spread {
            pages: Vec<usize>,
            failed: Vec<usize>,
            transition: TransitionKind,
        },
        Label(String),
        LoadError(String),
        Header(bool),
        TransitionDone,
    }

    /// Surface that records calls instead of drawing
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub calls: Vec<SurfaceCall>,
        /// Every spread shown, complete with slots
        pub spreads: Vec<Spread>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pages of the most recent spread
        pub fn last_pages(&self) -> Option<Vec<usize>> {
            self.spreads.last().map(|s| s.pages().to_vec())
        }

        pub fn last_label(&self) -> Option<&str> {
            self.calls.iter().rev().find_map(|call| match call {
                SurfaceCall::Label(label) => Some(label.as_str()),
                _ => None,
            })
        }

        pub fn load_error(&self) -> Option<&str> {
            self.calls.iter().find_map(|call| match call {
                SurfaceCall::LoadError(message) => Some(message.as_str()),
                _ => None,
            })
        }

        pub fn spread_count(&self) -> usize {
            self.spreads.len()
        }
    }

    impl ViewSurface for RecordingSurface {
        fn show_spread(&mut self, spread: &Spread, transition: TransitionKind) {
            let failed = spread
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Failed(_)))
                .map(|(page, _)| page)
                .collect();
            self.calls.push(SurfaceCall::Spread {
                pages: spread.pages().to_vec(),
                failed,
                transition,
            });
            self.spreads.push(spread.clone());
        }

        fn set_page_label(&mut self, label: &PageLabel) {
            self.calls.push(SurfaceCall::Label(label.to_string()));
        }

        fn show_load_error(&mut self, message: &str) {
            self.calls.push(SurfaceCall::LoadError(message.to_string()));
        }

        fn set_header_visible(&mut self, visible: bool) {
            self.calls.push(SurfaceCall::Header(visible));
        }

        fn finish_transition(&mut self) {
            self.calls.push(SurfaceCall::TransitionDone);
        }
    }

    /// Shared knobs for [`ScriptedBackend`] documents
    #[derive(Debug, Default)]
    struct Script {
        failing: HashSet<usize>,
        held: HashSet<usize>,
        crashing: HashSet<usize>,
        crashed: HashSet<usize>,
        renders: HashMap<usize, usize>,
        fail_open: bool,
    }

    /// In-memory backend with solid-color pages.
    ///
    /// Pages can be made to fail, to take down the worker rendering them,
    /// or be held until released so tests can observe a partially rendered
    /// spread.
    #[derive(Clone)]
    pub struct ScriptedBackend {
        page_count: usize,
        script: Arc<(Mutex<Script>, Condvar)>,
    }

    impl ScriptedBackend {
        pub fn new(page_count: usize) -> Self {
            Self {
                page_count,
                script: Arc::new((Mutex::new(Script::default()), Condvar::new())),
            }
        }

        /// Backend whose documents never open
        pub fn unavailable() -> Self {
            let backend = Self::new(0);
            backend.script.0.lock().unwrap().fail_open = true;
            backend
        }

        pub fn fail_page(&self, page: usize) {
            self.script.0.lock().unwrap().failing.insert(page);
        }

        /// The next render of `page` panics, killing its worker thread
        /// without an answer
        pub fn crash_page(&self, page: usize) {
            self.script.0.lock().unwrap().crashing.insert(page);
        }

        pub fn has_crashed(&self, page: usize) -> bool {
            self.script.0.lock().unwrap().crashed.contains(&page)
        }

        /// Block renders of `page` until [`release`](Self::release)
        pub fn hold_page(&self, page: usize) {
            self.script.0.lock().unwrap().held.insert(page);
        }

        pub fn release(&self, page: usize) {
            let (lock, cvar) = &*self.script;
            lock.lock().unwrap().held.remove(&page);
            cvar.notify_all();
        }

        /// Times `page` was rasterized, any quality
        pub fn render_count(&self, page: usize) -> usize {
            self.script
                .0
                .lock()
                .unwrap()
                .renders
                .get(&page)
                .copied()
                .unwrap_or(0)
        }
    }

    impl PageBackend for ScriptedBackend {
        fn open(&self, location: &str) -> Result<Box<dyn PageDocument>, RenderFault> {
            if self.script.0.lock().unwrap().fail_open {
                return Err(RenderFault::generic(format!("cannot open {location}")));
            }
            Ok(Box::new(ScriptedDocument {
                page_count: self.page_count,
                script: Arc::clone(&self.script),
            }))
        }
    }

    struct ScriptedDocument {
        page_count: usize,
        script: Arc<(Mutex<Script>, Condvar)>,
    }

    impl PageDocument for ScriptedDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn viewport(&self, page: usize, scale: f32) -> Result<Viewport, RenderFault> {
            if page == 0 || page > self.page_count {
                return Err(RenderFault::PageOutOfRange {
                    page,
                    page_count: self.page_count,
                });
            }
            Ok(Viewport::from_page_size(page, 8.0, 12.0, scale))
        }

        fn render(&self, viewport: &Viewport) -> Result<Surface, RenderFault> {
            let (lock, cvar) = &*self.script;
            let mut script = lock.lock().unwrap();
            while script.held.contains(&viewport.page) {
                script = cvar.wait(script).unwrap();
            }
            if script.crashing.remove(&viewport.page) {
                script.crashed.insert(viewport.page);
                drop(script);
                panic!("renderer crashed on page {}", viewport.page);
            }
            *script.renders.entry(viewport.page).or_insert(0) += 1;
            if script.failing.contains(&viewport.page) {
                return Err(RenderFault::generic(format!(
                    "page {} is damaged",
                    viewport.page
                )));
            }
            drop(script);

            let shade = (viewport.page * 20 % 256) as u8;
            let pixels = vec![shade; (viewport.width * viewport.height * 3) as usize];
            Ok(Surface::new(
                viewport,
                viewport.width,
                viewport.height,
                pixels,
            ))
        }
    }
}
