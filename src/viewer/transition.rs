//! Fade and flip transitions between spreads

use std::time::{Duration, Instant};

use super::types::Direction;

/// Animation used when a spread is swapped in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionKind {
    /// Swap immediately
    #[default]
    None,
    /// Cross-fade, used for zoom and layout changes
    Fade,
    /// Page flip in the navigation direction
    Flip(Direction),
}

impl TransitionKind {
    /// Flip matching the direction of travel from `from` to `to`
    #[must_use]
    pub fn flip_between(from: usize, to: usize) -> Self {
        if to >= from {
            Self::Flip(Direction::Forward)
        } else {
            Self::Flip(Direction::Backward)
        }
    }

    #[must_use]
    pub fn is_flip(self) -> bool {
        matches!(self, Self::Flip(_))
    }
}

/// A running transition
#[derive(Clone, Copy, Debug)]
pub struct Transition {
    kind: TransitionKind,
    started_at: Instant,
    duration: Duration,
}

impl Transition {
    #[must_use]
    pub fn start(kind: TransitionKind, now: Instant, duration: Duration) -> Self {
        Self {
            kind,
            started_at: now,
            duration,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    fn linear(&self, now: Instant) -> f32 {
        if self.kind == TransitionKind::None || self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Eased progress in `[0, 1]`
    #[must_use]
    pub fn progress(&self, now: Instant) -> f32 {
        let t = self.linear(now);
        t * t * (3.0 - 2.0 * t)
    }

    #[must_use]
    pub fn is_running(&self, now: Instant) -> bool {
        self.linear(now) < 1.0
    }

    /// True while a page flip animation is still playing
    #[must_use]
    pub fn is_flipping(&self, now: Instant) -> bool {
        self.kind.is_flip() && self.is_running(now)
    }
}
