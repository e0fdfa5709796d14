//! Zoom state for page rendering
//!
//! Keeps the view scale within bounds that depend on whether the viewer
//! runs in a narrow (mobile) viewport.

/// Zoom state for page viewing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    scale: f32,
    mobile: bool,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            scale: Self::DEFAULT_SCALE,
            mobile: false,
        }
    }
}

impl Zoom {
    /// Scale used for a freshly opened document
    pub const DEFAULT_SCALE: f32 = 1.5;
    /// Amount added or removed per zoom step
    pub const STEP: f32 = 0.2;
    /// Desktop lower bound
    pub const DESKTOP_MIN_SCALE: f32 = 0.5;
    /// Desktop upper bound
    pub const DESKTOP_MAX_SCALE: f32 = 3.0;
    /// Mobile lower bound; mobile has no upper bound
    pub const MOBILE_MIN_SCALE: f32 = 0.8;

    #[must_use]
    pub fn new(scale: f32, mobile: bool) -> Self {
        Self {
            scale: Self::clamp_scale(scale, mobile),
            mobile,
        }
    }

    /// Returns the current scale factor
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.mobile
    }

    /// Inclusive `(min, max)` bounds for the current mode
    #[must_use]
    pub fn bounds(mobile: bool) -> (f32, f32) {
        if mobile {
            (Self::MOBILE_MIN_SCALE, f32::INFINITY)
        } else {
            (Self::DESKTOP_MIN_SCALE, Self::DESKTOP_MAX_SCALE)
        }
    }

    /// Add `delta` to the scale. Returns true if the scale changed.
    pub fn adjust(&mut self, delta: f32) -> bool {
        let next = Self::clamp_scale(self.scale + delta, self.mobile);
        self.replace_scale(next)
    }

    /// Switch between mobile and desktop bounds, re-clamping the scale.
    /// Returns true if the mode changed.
    pub fn set_mobile(&mut self, mobile: bool) -> bool {
        if self.mobile == mobile {
            return false;
        }
        self.mobile = mobile;
        self.scale = Self::clamp_scale(self.scale, mobile);
        true
    }

    /// Clamp to the mode's bounds, handling NaN/Inf and float drift
    #[must_use]
    pub fn clamp_scale(scale: f32, mobile: bool) -> f32 {
        if !scale.is_finite() {
            return Self::DEFAULT_SCALE;
        }
        let (min, max) = Self::bounds(mobile);
        let rounded = (scale * 100.0).round() / 100.0;
        rounded.clamp(min, max)
    }

    fn replace_scale(&mut self, next: f32) -> bool {
        if (self.scale - next).abs() > f32::EPSILON {
            self.scale = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_zoom_is_bounded() {
        let mut zoom = Zoom::new(2.9, false);
        assert!(zoom.adjust(Zoom::STEP));
        assert_eq!(zoom.scale(), 3.0);
        assert!(!zoom.adjust(Zoom::STEP));

        let mut zoom = Zoom::new(0.6, false);
        assert!(zoom.adjust(-Zoom::STEP));
        assert_eq!(zoom.scale(), 0.5);
        assert!(!zoom.adjust(-Zoom::STEP));
    }

    #[test]
    fn mobile_zoom_has_no_upper_bound() {
        let mut zoom = Zoom::new(3.0, true);
        assert!(zoom.adjust(Zoom::STEP));
        assert_eq!(zoom.scale(), 3.2);

        let mut zoom = Zoom::new(0.9, true);
        zoom.adjust(-Zoom::STEP);
        assert_eq!(zoom.scale(), 0.8);
    }

    #[test]
    fn repeated_steps_do_not_drift() {
        let mut zoom = Zoom::default();
        for _ in 0..3 {
            zoom.adjust(Zoom::STEP);
        }
        assert_eq!(zoom.scale(), 2.1);
        for _ in 0..3 {
            zoom.adjust(-Zoom::STEP);
        }
        assert_eq!(zoom.scale(), Zoom::DEFAULT_SCALE);
    }

    #[test]
    fn switching_to_desktop_reclamps() {
        let mut zoom = Zoom::new(5.0, true);
        assert!(zoom.set_mobile(false));
        assert_eq!(zoom.scale(), 3.0);
        assert!(!zoom.set_mobile(false));
    }

    #[test]
    fn non_finite_scale_resets() {
        assert_eq!(Zoom::clamp_scale(f32::NAN, false), Zoom::DEFAULT_SCALE);
        assert_eq!(Zoom::clamp_scale(f32::INFINITY, true), Zoom::DEFAULT_SCALE);
    }
}
