//! Engine configuration
//!
//! Plain value objects. Every value is defensively validated by
//! [`EngineConfig::validated`]: malformed input is replaced by a safe value
//! and reported once instead of being rejected.

use crate::constants::*;
use crate::error::{EngineError, ErrorReporter};
use crate::geometry::CoordinateExtent;
use crate::types::NodeOrigin;
use serde::{Deserialize, Serialize};

/// Which handle pairs may be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Only source-to-target.
    #[default]
    Strict,
    /// Any two distinct handles.
    Loose,
}

/// Axes that pan-on-scroll may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanOnScrollMode {
    #[default]
    Free,
    Vertical,
    Horizontal,
}

/// Global engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Area the visible viewport must stay inside. None is unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_extent: Option<CoordinateExtent>,
    /// Area every root node must stay inside. None is unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_extent: Option<CoordinateExtent>,
    pub node_origin: NodeOrigin,
    pub snap_to_grid: bool,
    pub snap_grid: [f64; 2],
    pub connection_radius: f64,
    pub connection_mode: ConnectionMode,
    pub auto_pan_on_node_drag: bool,
    pub auto_pan_on_connect: bool,
    pub auto_pan_speed: f64,
    pub auto_pan_margin: f64,
    pub node_drag_threshold: f64,
    pub node_click_distance: f64,
    pub pane_click_distance: f64,
    pub elevate_nodes_on_select: bool,
    pub nodes_draggable: bool,
    pub nodes_connectable: bool,
    pub select_nodes_on_drag: bool,
    pub zoom_on_scroll: bool,
    pub pan_on_scroll: bool,
    pub pan_on_scroll_speed: f64,
    pub pan_on_scroll_mode: PanOnScrollMode,
    pub zoom_on_pinch: bool,
    pub pan_on_drag: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            translate_extent: None,
            node_extent: None,
            node_origin: [0.0, 0.0],
            snap_to_grid: false,
            snap_grid: DEFAULT_SNAP_GRID,
            connection_radius: DEFAULT_CONNECTION_RADIUS,
            connection_mode: ConnectionMode::Strict,
            auto_pan_on_node_drag: true,
            auto_pan_on_connect: true,
            auto_pan_speed: DEFAULT_AUTO_PAN_SPEED,
            auto_pan_margin: DEFAULT_AUTO_PAN_MARGIN,
            node_drag_threshold: DEFAULT_NODE_DRAG_THRESHOLD,
            node_click_distance: 0.0,
            pane_click_distance: 0.0,
            elevate_nodes_on_select: true,
            nodes_draggable: true,
            nodes_connectable: true,
            select_nodes_on_drag: true,
            zoom_on_scroll: true,
            pan_on_scroll: false,
            pan_on_scroll_speed: DEFAULT_PAN_ON_SCROLL_SPEED,
            pan_on_scroll_mode: PanOnScrollMode::Free,
            zoom_on_pinch: true,
            pan_on_drag: true,
        }
    }
}

/// Replace a non-finite value with `default` and a negative one with 0.
fn non_negative(field: &str, value: f64, default: f64, reporter: &mut ErrorReporter) -> f64 {
    if !value.is_finite() {
        reporter.report(EngineError::InvalidConfig {
            field: field.to_string(),
            reason: format!("{value} is not finite, using {default}"),
        });
        return default;
    }
    if value < 0.0 {
        reporter.report(EngineError::InvalidConfig {
            field: field.to_string(),
            reason: format!("{value} is negative, using 0"),
        });
        return 0.0;
    }
    value
}

fn positive(field: &str, value: f64, default: f64, reporter: &mut ErrorReporter) -> f64 {
    if value.is_finite() && value > 0.0 {
        return value;
    }
    reporter.report(EngineError::InvalidConfig {
        field: field.to_string(),
        reason: format!("{value} must be a positive number, using {default}"),
    });
    default
}

fn valid_extent(
    field: &str,
    extent: Option<CoordinateExtent>,
    reporter: &mut ErrorReporter,
) -> Option<CoordinateExtent> {
    let extent = extent?;
    if extent.is_valid() {
        return Some(extent);
    }
    reporter.report(EngineError::InvalidConfig {
        field: field.to_string(),
        reason: "min corner must not exceed max corner, ignoring extent".to_string(),
    });
    None
}

impl EngineConfig {
    /// Normalise every value into a usable range, reporting each fix.
    pub fn validated(mut self, reporter: &mut ErrorReporter) -> Self {
        self.min_zoom = positive("minZoom", self.min_zoom, DEFAULT_MIN_ZOOM, reporter);
        self.max_zoom = positive("maxZoom", self.max_zoom, DEFAULT_MAX_ZOOM, reporter);
        if self.min_zoom > self.max_zoom {
            reporter.report(EngineError::ContradictoryBounds {
                what: "zoom".to_string(),
                min: self.min_zoom,
                max: self.max_zoom,
            });
            self.max_zoom = self.min_zoom;
        }

        self.translate_extent = valid_extent("translateExtent", self.translate_extent, reporter);
        self.node_extent = valid_extent("nodeExtent", self.node_extent, reporter);

        for (i, axis) in ["snapGrid[0]", "snapGrid[1]"].iter().enumerate() {
            self.snap_grid[i] = positive(axis, self.snap_grid[i], DEFAULT_SNAP_GRID[i], reporter);
        }
        for (i, axis) in ["nodeOrigin[0]", "nodeOrigin[1]"].iter().enumerate() {
            if !self.node_origin[i].is_finite() {
                reporter.report(EngineError::InvalidConfig {
                    field: axis.to_string(),
                    reason: "not finite, using 0".to_string(),
                });
                self.node_origin[i] = 0.0;
            }
        }

        self.connection_radius = non_negative(
            "connectionRadius",
            self.connection_radius,
            DEFAULT_CONNECTION_RADIUS,
            reporter,
        );
        self.auto_pan_speed =
            non_negative("autoPanSpeed", self.auto_pan_speed, DEFAULT_AUTO_PAN_SPEED, reporter);
        self.auto_pan_margin =
            non_negative("autoPanMargin", self.auto_pan_margin, DEFAULT_AUTO_PAN_MARGIN, reporter);
        self.node_drag_threshold = non_negative(
            "nodeDragThreshold",
            self.node_drag_threshold,
            DEFAULT_NODE_DRAG_THRESHOLD,
            reporter,
        );
        self.node_click_distance =
            non_negative("nodeClickDistance", self.node_click_distance, 0.0, reporter);
        self.pane_click_distance =
            non_negative("paneClickDistance", self.pane_click_distance, 0.0, reporter);
        self.pan_on_scroll_speed = non_negative(
            "panOnScrollSpeed",
            self.pan_on_scroll_speed,
            DEFAULT_PAN_ON_SCROLL_SPEED,
            reporter,
        );

        self
    }

    /// Global node extent, unbounded when unset.
    pub fn node_extent_or_infinite(&self) -> CoordinateExtent {
        self.node_extent.unwrap_or(CoordinateExtent::INFINITE)
    }

    pub fn translate_extent_or_infinite(&self) -> CoordinateExtent {
        self.translate_extent.unwrap_or(CoordinateExtent::INFINITE)
    }
}

// ============================================================================
// Resize parameters
// ============================================================================

/// Axis a resize is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeDirection {
    Horizontal,
    Vertical,
}

/// Per-gesture resize bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResizeParams {
    pub min_width: f64,
    pub min_height: f64,
    pub max_width: f64,
    pub max_height: f64,
    pub keep_aspect_ratio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_direction: Option<ResizeDirection>,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_RESIZE_SIZE,
            min_height: DEFAULT_MIN_RESIZE_SIZE,
            max_width: f64::MAX,
            max_height: f64::MAX,
            keep_aspect_ratio: false,
            resize_direction: None,
        }
    }
}

impl ResizeParams {
    /// Contradictory min/max pairs collapse onto the minimum.
    pub fn validated(mut self, reporter: &mut ErrorReporter) -> Self {
        self.min_width = non_negative("minWidth", self.min_width, DEFAULT_MIN_RESIZE_SIZE, reporter);
        self.min_height =
            non_negative("minHeight", self.min_height, DEFAULT_MIN_RESIZE_SIZE, reporter);
        if self.max_width.is_nan() {
            self.max_width = f64::MAX;
        }
        if self.max_height.is_nan() {
            self.max_height = f64::MAX;
        }
        if self.min_width > self.max_width {
            reporter.report(EngineError::ContradictoryBounds {
                what: "width".to_string(),
                min: self.min_width,
                max: self.max_width,
            });
            self.max_width = self.min_width;
        }
        if self.min_height > self.max_height {
            reporter.report(EngineError::ContradictoryBounds {
                what: "height".to_string(),
                min: self.min_height,
                max: self.max_height,
            });
            self.max_height = self.min_height;
        }
        self
    }
}

// ============================================================================
// Padding
// ============================================================================

/// A single padding value: a fraction of the viewport, or `"Npx"` / `"N%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaddingValue {
    Fraction(f64),
    Unit(String),
}

impl Default for PaddingValue {
    fn default() -> Self {
        PaddingValue::Fraction(0.0)
    }
}

/// Per-side padding; `x`/`y` fill in unset sides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingSides {
    pub top: Option<PaddingValue>,
    pub right: Option<PaddingValue>,
    pub bottom: Option<PaddingValue>,
    pub left: Option<PaddingValue>,
    pub x: Option<PaddingValue>,
    pub y: Option<PaddingValue>,
}

/// Padding around fitted bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Padding {
    Uniform(PaddingValue),
    Sides(PaddingSides),
}

impl Default for Padding {
    fn default() -> Self {
        Padding::Uniform(PaddingValue::Fraction(DEFAULT_FIT_VIEW_PADDING))
    }
}

impl From<f64> for Padding {
    fn from(value: f64) -> Self {
        Padding::Uniform(PaddingValue::Fraction(value))
    }
}

impl From<&str> for Padding {
    fn from(value: &str) -> Self {
        Padding::Uniform(PaddingValue::Unit(value.to_string()))
    }
}

/// Resolved padding in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedPadding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl ResolvedPadding {
    pub fn x(&self) -> f64 {
        self.left + self.right
    }

    pub fn y(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Leading number of a string like `"12.5px"`, ignoring the unit.
fn parse_leading_number(value: &str) -> Option<f64> {
    let trimmed = value.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse::<f64>().ok()
}

impl PaddingValue {
    /// Pixels for a viewport side of length `viewport`. Invalid values resolve to 0.
    pub fn resolve(&self, viewport: f64, reporter: &mut ErrorReporter) -> f64 {
        match self {
            PaddingValue::Fraction(p) if p.is_finite() => {
                ((viewport - viewport / (1.0 + p)) * 0.5).floor()
            }
            PaddingValue::Unit(s) if s.ends_with("px") => match parse_leading_number(s) {
                Some(v) => v.floor(),
                None => invalid_padding(s, reporter),
            },
            PaddingValue::Unit(s) if s.ends_with('%') => match parse_leading_number(s) {
                Some(v) => (viewport * v * 0.01).floor(),
                None => invalid_padding(s, reporter),
            },
            PaddingValue::Unit(s) => invalid_padding(s, reporter),
            PaddingValue::Fraction(p) => invalid_padding(&p.to_string(), reporter),
        }
    }
}

fn invalid_padding(value: &str, reporter: &mut ErrorReporter) -> f64 {
    reporter.report(EngineError::InvalidPadding {
        value: value.to_string(),
    });
    0.0
}

impl Padding {
    pub fn resolve(&self, width: f64, height: f64, reporter: &mut ErrorReporter) -> ResolvedPadding {
        match self {
            Padding::Uniform(value) => {
                let py = value.resolve(height, reporter);
                let px = value.resolve(width, reporter);
                ResolvedPadding {
                    top: py,
                    right: px,
                    bottom: py,
                    left: px,
                }
            }
            Padding::Sides(sides) => {
                let zero = PaddingValue::default();
                let side = |v: &Option<PaddingValue>, axis: &Option<PaddingValue>| {
                    v.clone().or_else(|| axis.clone()).unwrap_or_else(|| zero.clone())
                };
                ResolvedPadding {
                    top: side(&sides.top, &sides.y).resolve(height, reporter),
                    bottom: side(&sides.bottom, &sides.y).resolve(height, reporter),
                    left: side(&sides.left, &sides.x).resolve(width, reporter),
                    right: side(&sides.right, &sides.x).resolve(width, reporter),
                }
            }
        }
    }
}
