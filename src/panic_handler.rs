use crossterm::{
    event::DisableMouseCapture,
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use std::io::{self, Write};
use std::panic;

pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}

/// Restore terminal to a clean state
///
/// Disables raw mode and mouse capture, leaves the alternate screen and
/// shows the cursor again.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
    let _ = execute!(io::stderr(), crossterm::cursor::Show);
    let _ = writeln!(io::stderr());
}

/// Runs a restore action when dropped, so every exit path after raw mode is
/// enabled leaves the terminal usable
pub struct TerminalGuard<F: FnOnce()> {
    restore: Option<F>,
}

impl<F: FnOnce()> TerminalGuard<F> {
    pub fn with(restore: F) -> Self {
        Self {
            restore: Some(restore),
        }
    }
}

impl<F: FnOnce()> Drop for TerminalGuard<F> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn start(restored: &Cell<u32>, fail: bool) -> anyhow::Result<()> {
        let _guard = TerminalGuard::with(|| restored.set(restored.get() + 1));
        if fail {
            anyhow::bail!("terminal size unavailable");
        }
        Ok(())
    }

    #[test]
    fn guard_restores_on_early_return() {
        let restored = Cell::new(0);
        assert!(start(&restored, true).is_err());
        assert_eq!(restored.get(), 1);

        start(&restored, false).unwrap();
        assert_eq!(restored.get(), 2);
    }
}
