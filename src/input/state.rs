//! Per-pointer gesture state machine.
//!
//! Each pointer stream owns at most one gesture; a pointer with no entry is
//! idle. Gestures on different pointers run side by side.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> NodeDrag      (pointer down on a node; drags once past the threshold)
//! Idle -> Resize        (pointer down on a resize control)
//! Idle -> Connect       (pointer down on a handle or an edge end)
//! Idle -> Pan           (pointer down on the empty pane)
//!
//! Any -> Idle           (pointer up, cancel, second touch, node removed)
//! ```

use super::drag::DragGesture;
use super::handle::ConnectionGesture;
use super::resize::ResizeGesture;
use crate::geometry::XYPosition;

/// Pointer drag on the empty pane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanGesture {
    pub start_screen: XYPosition,
    /// Flow point under the pointer at pointer-down; it stays under the
    /// pointer while panning.
    pub anchor: XYPosition,
    /// Past the click distance.
    pub started: bool,
}

/// Active gesture of one pointer.
#[derive(Debug, Clone)]
pub enum GestureState {
    NodeDrag(DragGesture),
    Resize(ResizeGesture),
    Connect(ConnectionGesture),
    Pan(PanGesture),
}

impl GestureState {
    /// Returns true if nodes are being moved
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::NodeDrag(drag) if drag.started)
    }

    pub fn is_resizing(&self) -> bool {
        matches!(self, Self::Resize(_))
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    pub fn is_panning(&self) -> bool {
        matches!(self, Self::Pan(pan) if pan.started)
    }

    /// Whether the gesture wants the auto-pan loop this frame.
    pub fn wants_auto_pan(&self) -> bool {
        match self {
            Self::NodeDrag(drag) => drag.started && drag.auto_pan.enabled,
            Self::Connect(connect) => connect.auto_pan.enabled,
            _ => false,
        }
    }

    /// Node ids the gesture depends on.
    pub fn node_ids(&self) -> Vec<&str> {
        match self {
            Self::NodeDrag(drag) if drag.started => drag.items.keys().map(String::as_str).collect(),
            Self::NodeDrag(drag) => vec![drag.node_id.as_str()],
            Self::Resize(resize) => vec![resize.node_id.as_str()],
            Self::Connect(connect) => vec![connect.state.from_node.as_str()],
            Self::Pan(_) => Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeDrag(_) => "node_drag",
            Self::Resize(_) => "resize",
            Self::Connect(_) => "connect",
            Self::Pan(_) => "pan",
        }
    }
}
