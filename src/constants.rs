//! Engine-wide constants.
//!
//! Defaults for the configuration surface and the tuning values used by the
//! gesture engines.

// ============================================================================
// Viewport Defaults
// ============================================================================

/// Smallest zoom level allowed by default
pub const DEFAULT_MIN_ZOOM: f64 = 0.5;

/// Largest zoom level allowed by default
pub const DEFAULT_MAX_ZOOM: f64 = 2.0;

/// Wheel delta multiplier for pixel-mode wheel events
pub const WHEEL_DELTA_PIXEL: f64 = 0.002;

/// Wheel delta multiplier for line-mode wheel events
pub const WHEEL_DELTA_LINE: f64 = 0.05;

/// Wheel delta multiplier for page-mode wheel events
pub const WHEEL_DELTA_PAGE: f64 = 1.0;

/// Extra wheel multiplier applied while the platform modifier is held (trackpad pinch)
pub const PINCH_WHEEL_FACTOR: f64 = 10.0;

/// Pixels per line when normalising line-mode scroll deltas for pan-on-scroll
pub const SCROLL_LINE_HEIGHT: f64 = 20.0;

/// Default pan-on-scroll speed
pub const DEFAULT_PAN_ON_SCROLL_SPEED: f64 = 0.5;

/// Default padding used by fit-view
pub const DEFAULT_FIT_VIEW_PADDING: f64 = 0.1;

// ============================================================================
// Node Defaults
// ============================================================================

/// Z offset added to selected nodes when elevation is enabled
pub const SELECTED_NODE_Z_OFFSET: i32 = 1000;

/// Default snap grid spacing
pub const DEFAULT_SNAP_GRID: [f64; 2] = [15.0, 15.0];

/// Keyboard nudge distance in flow units (multiplied by the step factor)
pub const KEYBOARD_NUDGE_DISTANCE: f64 = 5.0;

// ============================================================================
// Gesture Tuning
// ============================================================================

/// Pointer distance in screen pixels before a press becomes a node drag
pub const DEFAULT_NODE_DRAG_THRESHOLD: f64 = 1.0;

/// Default auto-pan speed in pixels per frame at full strength
pub const DEFAULT_AUTO_PAN_SPEED: f64 = 15.0;

/// Default distance from the container edge where auto-pan kicks in
pub const DEFAULT_AUTO_PAN_MARGIN: f64 = 40.0;

/// Default radius around the pointer for handle snapping
pub const DEFAULT_CONNECTION_RADIUS: f64 = 20.0;

/// Extra margin around the pointer when collecting candidate nodes for handle snapping
pub const CONNECTION_SEARCH_MARGIN: f64 = 250.0;

/// Default minimum width/height for resized nodes
pub const DEFAULT_MIN_RESIZE_SIZE: f64 = 10.0;

// ============================================================================
// Animation
// ============================================================================

/// Default duration of an animated viewport change in milliseconds
pub const DEFAULT_TRANSITION_MS: u64 = 300;

/// Zoom factor applied by a single zoom-in / zoom-out step
pub const ZOOM_STEP: f64 = 1.2;
