//! Edge auto-pan.
//!
//! While a drag or connection gesture keeps the pointer near the container
//! edge, the viewport scrolls every frame. Velocity grows with how deep the
//! pointer sits inside the margin, capped at `speed`.

use crate::geometry::{Dimensions, XYPosition, clamp};

/// Velocity factor in [-1, 1] along one axis.
///
/// Positive inside the leading margin (`value < min`), negative inside the
/// trailing margin (`value > max`), zero elsewhere. Margins under one pixel
/// pan at full speed.
fn axis_velocity(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        clamp((value - min).abs(), 1.0, min) / min
    } else if value > max {
        -(clamp((value - max).abs(), 1.0, min) / min)
    } else {
        0.0
    }
}

/// Screen-space pan for one frame, or zero when the pointer is away from the
/// edges.
pub fn calc_auto_pan(
    pointer: XYPosition,
    container: Dimensions,
    speed: f64,
    margin: f64,
) -> XYPosition {
    if margin <= 0.0 {
        return XYPosition::default();
    }
    let x = axis_velocity(pointer.x, margin, container.width - margin) * speed;
    let y = axis_velocity(pointer.y, margin, container.height - margin) * speed;
    XYPosition::new(x, y)
}

/// Auto-pan loop state shared by the drag and connection gestures.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AutoPan {
    /// Latest pointer position in screen space.
    pub pointer: XYPosition,
    pub enabled: bool,
}

impl AutoPan {
    pub fn new(pointer: XYPosition, enabled: bool) -> Self {
        Self { pointer, enabled }
    }

    pub fn velocity(&self, container: Dimensions, speed: f64, margin: f64) -> XYPosition {
        if !self.enabled {
            return XYPosition::default();
        }
        calc_auto_pan(self.pointer, container, speed, margin)
    }
}
