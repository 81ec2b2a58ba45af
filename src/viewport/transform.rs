//! Pan/zoom transform math.
//!
//! A [`Transform`] maps flow coordinates to screen coordinates:
//! `screen = flow * k + (x, y)`. All viewport changes funnel through
//! [`constrain`], which clamps zoom and keeps the visible area inside the
//! translate extent.

use crate::config::Padding;
use crate::error::ErrorReporter;
use crate::geometry::{CoordinateExtent, Dimensions, Rect, XYPosition, clamp, snap_position};
use serde::{Deserialize, Serialize};

/// Pan and zoom of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub const fn new(x: f64, y: f64, zoom: f64) -> Self {
        Self { x, y, zoom }
    }
}

/// Affine pan/zoom transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Viewport> for Transform {
    fn from(viewport: Viewport) -> Self {
        Self {
            x: viewport.x,
            y: viewport.y,
            k: viewport.zoom,
        }
    }
}

impl From<Transform> for Viewport {
    fn from(transform: Transform) -> Self {
        Viewport::new(transform.x, transform.y, transform.k)
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub const fn new(x: f64, y: f64, k: f64) -> Self {
        Self { x, y, k }
    }

    /// Flow point to screen point.
    #[inline]
    pub fn apply(&self, point: XYPosition) -> XYPosition {
        XYPosition::new(point.x * self.k + self.x, point.y * self.k + self.y)
    }

    /// Screen point to flow point.
    #[inline]
    pub fn invert(&self, point: XYPosition) -> XYPosition {
        XYPosition::new(self.invert_x(point.x), self.invert_y(point.y))
    }

    #[inline]
    pub fn invert_x(&self, x: f64) -> f64 {
        (x - self.x) / self.k
    }

    #[inline]
    pub fn invert_y(&self, y: f64) -> f64 {
        (y - self.y) / self.k
    }

    /// Pan by a distance measured in flow units.
    pub fn translate(&self, dx: f64, dy: f64) -> Transform {
        Transform::new(self.x + self.k * dx, self.y + self.k * dy, self.k)
    }

    /// Same translation, new scale.
    pub fn with_scale(&self, k: f64) -> Transform {
        Transform::new(self.x, self.y, k)
    }

    /// Transform with scale `k` that maps `flow_point` onto `screen_point`.
    pub fn anchored(k: f64, screen_point: XYPosition, flow_point: XYPosition) -> Transform {
        Transform::new(
            screen_point.x - flow_point.x * k,
            screen_point.y - flow_point.y * k,
            k,
        )
    }

    /// Area of the flow visible inside a container of `size`.
    pub fn visible_rect(&self, size: Dimensions) -> Rect {
        let min = self.invert(XYPosition::new(0.0, 0.0));
        Rect::new(min.x, min.y, size.width / self.k, size.height / self.k)
    }
}

/// Offset that moves `[d0, d1]` back inside the extent along one axis.
///
/// `d0` is how far the visible start lies past the extent start, `d1` how far
/// the visible end lies past the extent end. When the visible span is wider
/// than the extent it gets centred.
fn axis_correction(d0: f64, d1: f64) -> f64 {
    if d1 > d0 {
        return (d0 + d1) / 2.0;
    }
    let low = d0.min(0.0);
    if low != 0.0 { low } else { d1.max(0.0) }
}

/// Clamp zoom into `[min_zoom, max_zoom]` and shift the transform so the
/// visible part of `container` stays inside `translate_extent`.
pub fn constrain(
    transform: Transform,
    container: Dimensions,
    translate_extent: &CoordinateExtent,
    min_zoom: f64,
    max_zoom: f64,
) -> Transform {
    let k = clamp(transform.k, min_zoom, max_zoom);
    let transform = if k == transform.k {
        transform
    } else {
        // Keep the container centre fixed while clamping the scale.
        let center = XYPosition::new(container.width / 2.0, container.height / 2.0);
        Transform::anchored(k, center, transform.invert(center))
    };

    let dx0 = transform.invert_x(0.0) - translate_extent.min.x;
    let dx1 = transform.invert_x(container.width) - translate_extent.max.x;
    let dy0 = transform.invert_y(0.0) - translate_extent.min.y;
    let dy1 = transform.invert_y(container.height) - translate_extent.max.y;

    let corrected = transform.translate(axis_correction(dx0, dx1), axis_correction(dy0, dy1));
    if corrected.x.is_finite() && corrected.y.is_finite() {
        corrected
    } else {
        transform
    }
}

/// Screen point (relative to the container) to flow point, optionally snapped.
pub fn screen_to_flow(
    point: XYPosition,
    transform: &Transform,
    snap_grid: Option<[f64; 2]>,
) -> XYPosition {
    let position = transform.invert(point);
    match snap_grid {
        Some(grid) => snap_position(position, grid),
        None => position,
    }
}

/// Flow point to screen point (relative to the container).
pub fn flow_to_screen(point: XYPosition, transform: &Transform) -> XYPosition {
    transform.apply(point)
}

/// Viewport that centres `bounds` in a `width` x `height` container, zoomed
/// as far as the padding and the zoom range allow.
pub fn viewport_for_bounds(
    bounds: Rect,
    width: f64,
    height: f64,
    min_zoom: f64,
    max_zoom: f64,
    padding: &Padding,
    reporter: &mut ErrorReporter,
) -> Viewport {
    let p = padding.resolve(width, height, reporter);
    let x_zoom = (width - p.x()) / bounds.width;
    let y_zoom = (height - p.y()) / bounds.height;
    let zoom = x_zoom.min(y_zoom);
    let zoom = if zoom.is_finite() { zoom } else { max_zoom };
    let clamped_zoom = clamp(zoom, min_zoom, max_zoom);

    let center = bounds.center();
    let x = width / 2.0 - center.x * clamped_zoom;
    let y = height / 2.0 - center.y * clamped_zoom;

    // Respect asymmetric paddings: shift only where the applied padding falls short.
    let top_left = Transform::new(x, y, clamped_zoom).apply(XYPosition::new(bounds.x, bounds.y));
    let bottom_right =
        Transform::new(x, y, clamped_zoom).apply(XYPosition::new(bounds.right(), bounds.bottom()));
    let offset_left = (top_left.x.floor() - p.left).min(0.0);
    let offset_top = (top_left.y.floor() - p.top).min(0.0);
    let offset_right = ((width - bottom_right.x).floor() - p.right).min(0.0);
    let offset_bottom = ((height - bottom_right.y).floor() - p.bottom).min(0.0);

    Viewport::new(
        x - offset_left + offset_right,
        y - offset_top + offset_bottom,
        clamped_zoom,
    )
}
