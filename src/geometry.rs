//! Geometry primitives for the flow coordinate space.
//!
//! Everything here works in `f64` flow units. Rects are `x, y, width, height`;
//! `Bounds` are the same area expressed as two corners, which makes unions
//! and overlap math cheaper.

use serde::{Deserialize, Serialize};

/// A point in flow (or screen) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct XYPosition {
    pub x: f64,
    pub y: f64,
}

impl XYPosition {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance_to(&self, other: XYPosition) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

impl std::ops::Add for XYPosition {
    type Output = XYPosition;

    fn add(self, rhs: XYPosition) -> XYPosition {
        XYPosition::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for XYPosition {
    type Output = XYPosition;

    fn sub(self, rhs: XYPosition) -> XYPosition {
        XYPosition::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Width and height of a node or container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_position(position: XYPosition, dimensions: Dimensions) -> Self {
        Self::new(position.x, position.y, dimensions.width, dimensions.height)
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains_point(&self, point: XYPosition) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Rect grown by `amount` on every side.
    pub fn expanded(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    pub fn to_bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            x2: self.right(),
            y2: self.bottom(),
        }
    }

    pub fn center(&self) -> XYPosition {
        XYPosition::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Two-corner box representation of a rect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Bounds {
    /// Identity element for `union`: contains nothing.
    pub const EMPTY: Bounds = Bounds {
        x: f64::INFINITY,
        y: f64::INFINITY,
        x2: f64::NEG_INFINITY,
        y2: f64::NEG_INFINITY,
    };

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x2 - self.x, self.y2 - self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.x > self.x2 || self.y > self.y2
    }
}

/// Bounding rect of two rects.
pub fn bounds_of_rects(a: &Rect, b: &Rect) -> Rect {
    a.to_bounds().union(&b.to_bounds()).to_rect()
}

/// Area shared by two rects, rounded up; 0 when they do not overlap.
pub fn overlapping_area(a: &Rect, b: &Rect) -> f64 {
    let x_overlap = (a.right().min(b.right()) - a.x.max(b.x)).max(0.0);
    let y_overlap = (a.bottom().min(b.bottom()) - a.y.max(b.y)).max(0.0);
    (x_overlap * y_overlap).ceil()
}

/// A coordinate box constraining where something may sit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateExtent {
    pub min: XYPosition,
    pub max: XYPosition,
}

impl CoordinateExtent {
    pub const INFINITE: CoordinateExtent = CoordinateExtent {
        min: XYPosition {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        },
        max: XYPosition {
            x: f64::INFINITY,
            y: f64::INFINITY,
        },
    };

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: XYPosition { x: min_x, y: min_y },
            max: XYPosition { x: max_x, y: max_y },
        }
    }

    pub fn from_rect(rect: &Rect) -> Self {
        Self::new(rect.x, rect.y, rect.right(), rect.bottom())
    }

    /// Same extent shifted by `offset`.
    pub fn translate(&self, offset: XYPosition) -> Self {
        Self::new(
            self.min.x + offset.x,
            self.min.y + offset.y,
            self.max.x + offset.x,
            self.max.y + offset.y,
        )
    }

    pub fn is_infinite(&self) -> bool {
        !self.min.x.is_finite()
            && !self.min.y.is_finite()
            && !self.max.x.is_finite()
            && !self.max.y.is_finite()
    }

    /// True when the box is well-formed (min <= max on both axes, no NaN).
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

impl Default for CoordinateExtent {
    fn default() -> Self {
        Self::INFINITE
    }
}

/// `min(max(value, min), max)`: with contradictory bounds the upper bound wins.
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Clamp a top-left position so a box of `dimensions` stays inside `extent`.
pub fn clamp_position(
    position: XYPosition,
    extent: &CoordinateExtent,
    dimensions: Dimensions,
) -> XYPosition {
    XYPosition::new(
        clamp(position.x, extent.min.x, extent.max.x - dimensions.width),
        clamp(position.y, extent.min.y, extent.max.y - dimensions.height),
    )
}

/// Round a position to the nearest grid point.
pub fn snap_position(position: XYPosition, snap_grid: [f64; 2]) -> XYPosition {
    XYPosition::new(
        snap_grid[0] * (position.x / snap_grid[0]).round(),
        snap_grid[1] * (position.y / snap_grid[1]).round(),
    )
}
