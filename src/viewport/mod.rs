//! Viewport: the pan/zoom transform between flow and screen space.
//!
//! - `transform` - Transform math, constraint and coordinate conversion
//! - `transition` - Animated transitions between transforms
//! - `panzoom` - The controller every viewport change goes through

pub mod panzoom;
pub mod transform;
pub mod transition;

pub use panzoom::{DeltaMode, PanZoom, WheelEvent};
pub use transform::{Transform, Viewport, constrain, flow_to_screen, screen_to_flow, viewport_for_bounds};
pub use transition::Transition;
