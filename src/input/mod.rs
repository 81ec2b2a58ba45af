//! Pointer, wheel and touch input for the flow.
//!
//! This module implements the gesture state machines that turn pointer
//! streams into node moves, resizes, new connections and viewport pans.
//!
//! ## Architecture
//!
//! Each pointer carries an explicit [`GestureState`]. The engine routes every
//! event to the gesture of its pointer, so a drag on one touch point and a
//! viewport transition can be in flight at the same time.
//!
//! ## Modules
//!
//! - `event` - Toolkit-independent pointer, wheel and pinch events
//! - `state` - Per-pointer gesture enum and helper methods
//! - `drag` - Node drag (threshold, multi-select extent, nudge)
//! - `autopan` - Edge auto-pan velocity
//! - `resize` - Node resize with clamp composition
//! - `handle` - Handle targeting and connection validity

pub mod autopan;
pub mod drag;
pub mod event;
pub mod handle;
pub mod resize;
mod state;

pub use event::{MouseButton, NudgeDirection, PinchEvent, PointerEvent, PointerId, PointerType};
pub use handle::{ConnectionState, ConnectionStatus, FinalConnectionState};
pub use resize::{ControlPosition, ResizeValues};
pub use state::{GestureState, PanGesture};
