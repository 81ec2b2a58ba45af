//! Animated viewport transitions.
//!
//! A transition interpolates pan and zoom between two transforms over wall
//! clock time. It starts on the first frame it is sampled, so callers do not
//! need a clock when requesting one.

use super::transform::Transform;
use std::time::{Duration, Instant};

/// Easing function: maps `t` in [0, 1] to progress in [0, 1].
pub type EasingFn = fn(f64) -> f64;

#[inline]
pub fn linear(t: f64) -> f64 {
    t.clamp(0.0, 1.0)
}

/// Cubic ease-in-out (slow start and end).
#[inline]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[inline]
fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// One in-flight viewport animation.
#[derive(Debug, Clone)]
pub struct Transition {
    from: Transform,
    to: Transform,
    duration: Duration,
    started_at: Option<Instant>,
    easing: EasingFn,
}

impl Transition {
    pub fn new(from: Transform, to: Transform, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            started_at: None,
            easing: ease_in_out_cubic,
        }
    }

    pub fn with_easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    pub fn target(&self) -> Transform {
        self.to
    }

    /// Transform at `now` and whether the transition is finished.
    pub fn sample(&mut self, now: Instant) -> (Transform, bool) {
        let started_at = *self.started_at.get_or_insert(now);
        if self.duration.is_zero() {
            return (self.to, true);
        }

        let elapsed = now.saturating_duration_since(started_at);
        let t = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0);
        if t >= 1.0 {
            return (self.to, true);
        }

        let eased = (self.easing)(t);
        let transform = Transform::new(
            lerp(self.from.x, self.to.x, eased),
            lerp(self.from.y, self.to.y, eased),
            lerp(self.from.k, self.to.k, eased),
        );
        (transform, false)
    }
}
