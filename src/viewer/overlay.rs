use std::time::{Duration, Instant};

/// Header overlay that hides after a period without user activity
#[derive(Debug, Clone)]
pub struct HeaderOverlay {
    visible: bool,
    last_activity: Instant,
    timeout: Duration,
}

impl HeaderOverlay {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            visible: true,
            last_activity: now,
            timeout,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Restart the inactivity timer; returns true if the header was hidden
    pub fn record_activity(&mut self, now: Instant) -> bool {
        self.last_activity = now;
        let was_hidden = !self.visible;
        self.visible = true;
        was_hidden
    }

    /// Hide once the timeout elapses; returns true when this call hid it
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.visible && now.saturating_duration_since(self.last_activity) >= self.timeout {
            self.visible = false;
            return true;
        }
        false
    }
}
