//! Toolkit-independent input events.
//!
//! The host translates its windowing toolkit's pointer, wheel and touch
//! callbacks into these values. Positions are in screen pixels relative to the
//! top-left corner of the flow container.

use crate::geometry::XYPosition;
use serde::{Deserialize, Serialize};

pub use crate::viewport::panzoom::{DeltaMode, WheelEvent};

/// Identifies one pointer stream (mouse, pen, or a single touch point).
pub type PointerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerType {
    #[default]
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

/// One pointer notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointerEvent {
    pub pointer_id: PointerId,
    pub position: XYPosition,
    pub pointer_type: PointerType,
    pub button: MouseButton,
    /// Touch points currently on the surface, including this one.
    pub active_touches: u32,
    /// Extends the selection instead of replacing it.
    pub multi_select: bool,
}

impl Default for PointerEvent {
    fn default() -> Self {
        Self {
            pointer_id: 0,
            position: XYPosition::default(),
            pointer_type: PointerType::Mouse,
            button: MouseButton::Left,
            active_touches: 0,
            multi_select: false,
        }
    }
}

impl PointerEvent {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: XYPosition::new(x, y),
            ..Default::default()
        }
    }

    pub fn with_pointer(mut self, pointer_id: PointerId) -> Self {
        self.pointer_id = pointer_id;
        self
    }

    /// A second finger landed while this stream was active.
    pub fn is_multi_touch(&self) -> bool {
        self.pointer_type == PointerType::Touch && self.active_touches > 1
    }
}

/// Incremental two-finger pinch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinchEvent {
    /// Midpoint between the two touches.
    pub center: XYPosition,
    /// Scale factor relative to the previous pinch event.
    pub scale: f64,
}

/// Direction for keyboard nudging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl NudgeDirection {
    pub fn unit(self) -> XYPosition {
        match self {
            NudgeDirection::Left => XYPosition::new(-1.0, 0.0),
            NudgeDirection::Right => XYPosition::new(1.0, 0.0),
            NudgeDirection::Up => XYPosition::new(0.0, -1.0),
            NudgeDirection::Down => XYPosition::new(0.0, 1.0),
        }
    }
}
