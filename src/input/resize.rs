//! Node resize gesture.
//!
//! The control the user grabs decides which axes change and which edge stays
//! put. Every constraint (size bounds, the parent's box, the box the children
//! need, and the aspect ratio) is turned into a shrink amount per axis; the
//! largest one wins, so no constraint is ever violated.

use crate::changes::NodeChange;
use crate::config::{ResizeDirection, ResizeParams};
use crate::error::{EngineError, EngineResult};
use crate::geometry::{CoordinateExtent, Dimensions, Rect, XYPosition};
use crate::resolver::{NodeResolver, ParentExpandChild};
use crate::types::{NodeId, NodeOrigin};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Which control of the resizer is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlPosition {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Axes a control moves, and whether it moves the top/left edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlDirection {
    pub is_horizontal: bool,
    pub is_vertical: bool,
    pub affects_x: bool,
    pub affects_y: bool,
}

impl ControlPosition {
    pub fn direction(self) -> ControlDirection {
        use ControlPosition::*;
        let left = matches!(self, Left | TopLeft | BottomLeft);
        let right = matches!(self, Right | TopRight | BottomRight);
        let top = matches!(self, Top | TopLeft | TopRight);
        let bottom = matches!(self, Bottom | BottomLeft | BottomRight);
        ControlDirection {
            is_horizontal: left || right,
            is_vertical: top || bottom,
            affects_x: left,
            affects_y: top,
        }
    }
}

/// Position (relative to the parent) and size of the node being resized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResizeValues {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Values captured at pointer-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeStart {
    pub values: ResizeValues,
    pub pointer: XYPosition,
    pub aspect_ratio: f64,
}

fn lower_extent_clamp(lower_extent: f64, lower_bound: f64) -> f64 {
    (lower_bound - lower_extent).max(0.0)
}

fn upper_extent_clamp(upper_extent: f64, upper_bound: f64) -> f64 {
    (upper_extent - upper_bound).max(0.0)
}

fn size_clamp(size: f64, min_size: f64, max_size: f64) -> f64 {
    0f64.max(min_size - size).max(size - max_size)
}

/// New position and size for a resize control dragged to `pointer`.
///
/// `extent` is the parent's box and `child_extent` the box the children
/// need, both in the parent's coordinate space.
#[allow(clippy::too_many_arguments)]
pub fn get_dimensions_after_resize(
    start: &ResizeStart,
    direction: ControlDirection,
    pointer: XYPosition,
    params: &ResizeParams,
    node_origin: NodeOrigin,
    extent: Option<&CoordinateExtent>,
    child_extent: Option<&CoordinateExtent>,
) -> ResizeValues {
    let ControlDirection {
        is_horizontal,
        is_vertical,
        mut affects_x,
        mut affects_y,
    } = direction;
    let is_diagonal = is_horizontal && is_vertical;
    let ResizeValues {
        x: start_x,
        y: start_y,
        width: start_width,
        height: start_height,
    } = start.values;
    let ratio = start.aspect_ratio;

    let mut dist_x = if is_horizontal {
        (pointer.x - start.pointer.x).floor()
    } else {
        0.0
    };
    let mut dist_y = if is_vertical {
        (pointer.y - start.pointer.y).floor()
    } else {
        0.0
    };

    let new_width = start_width + if affects_x { -dist_x } else { dist_x };
    let new_height = start_height + if affects_y { -dist_y } else { dist_y };
    let origin_offset_x = -node_origin[0] * start_width;
    let origin_offset_y = -node_origin[1] * start_height;

    let mut clamp_x = size_clamp(new_width, params.min_width, params.max_width);
    let mut clamp_y = size_clamp(new_height, params.min_height, params.max_height);

    if let Some(extent) = extent {
        let x_clamp = if affects_x && dist_x < 0.0 {
            lower_extent_clamp(start_x + dist_x + origin_offset_x, extent.min.x)
        } else if !affects_x && dist_x > 0.0 {
            upper_extent_clamp(start_x + new_width + origin_offset_x, extent.max.x)
        } else {
            0.0
        };
        let y_clamp = if affects_y && dist_y < 0.0 {
            lower_extent_clamp(start_y + dist_y + origin_offset_y, extent.min.y)
        } else if !affects_y && dist_y > 0.0 {
            upper_extent_clamp(start_y + new_height + origin_offset_y, extent.max.y)
        } else {
            0.0
        };
        clamp_x = clamp_x.max(x_clamp);
        clamp_y = clamp_y.max(y_clamp);
    }

    if let Some(child_extent) = child_extent {
        let x_clamp = if affects_x && dist_x > 0.0 {
            upper_extent_clamp(start_x + dist_x, child_extent.min.x)
        } else if !affects_x && dist_x < 0.0 {
            lower_extent_clamp(start_x + new_width, child_extent.max.x)
        } else {
            0.0
        };
        let y_clamp = if affects_y && dist_y > 0.0 {
            upper_extent_clamp(start_y + dist_y, child_extent.min.y)
        } else if !affects_y && dist_y < 0.0 {
            lower_extent_clamp(start_y + new_height, child_extent.max.y)
        } else {
            0.0
        };
        clamp_x = clamp_x.max(x_clamp);
        clamp_y = clamp_y.max(y_clamp);
    }

    if params.keep_aspect_ratio {
        // Which edge of the orthogonal axis the ratio drags along.
        let grows_far_y = (!affects_x && !affects_y) || (affects_x && !affects_y && is_diagonal);
        let grows_far_x = (!affects_x && !affects_y) || (affects_y && !affects_x && is_diagonal);

        if is_horizontal {
            clamp_x = clamp_x
                .max(size_clamp(new_width / ratio, params.min_height, params.max_height) * ratio);

            if let Some(extent) = extent {
                let aspect_clamp = if grows_far_y {
                    upper_extent_clamp(start_y + origin_offset_y + new_width / ratio, extent.max.y)
                } else {
                    let d = if affects_x { dist_x } else { -dist_x };
                    lower_extent_clamp(start_y + origin_offset_y + d / ratio, extent.min.y)
                };
                clamp_x = clamp_x.max(aspect_clamp * ratio);
            }
            if let Some(child_extent) = child_extent {
                let aspect_clamp = if grows_far_y {
                    lower_extent_clamp(start_y + new_width / ratio, child_extent.max.y)
                } else {
                    let d = if affects_x { dist_x } else { -dist_x };
                    upper_extent_clamp(start_y + d / ratio, child_extent.min.y)
                };
                clamp_x = clamp_x.max(aspect_clamp * ratio);
            }
        }

        if is_vertical {
            clamp_y = clamp_y
                .max(size_clamp(new_height * ratio, params.min_width, params.max_width) / ratio);

            if let Some(extent) = extent {
                let aspect_clamp = if grows_far_x {
                    upper_extent_clamp(start_x + new_height * ratio + origin_offset_x, extent.max.x)
                } else {
                    let d = if affects_y { dist_y } else { -dist_y };
                    lower_extent_clamp(start_x + d * ratio + origin_offset_x, extent.min.x)
                };
                clamp_y = clamp_y.max(aspect_clamp / ratio);
            }
            if let Some(child_extent) = child_extent {
                let aspect_clamp = if grows_far_x {
                    lower_extent_clamp(start_x + new_height * ratio, child_extent.max.x)
                } else {
                    let d = if affects_y { dist_y } else { -dist_y };
                    upper_extent_clamp(start_x + d * ratio, child_extent.min.x)
                };
                clamp_y = clamp_y.max(aspect_clamp / ratio);
            }
        }
    }

    dist_y += if dist_y < 0.0 { clamp_y } else { -clamp_y };
    dist_x += if dist_x < 0.0 { clamp_x } else { -clamp_x };

    if params.keep_aspect_ratio {
        if is_diagonal {
            let mirrored = affects_x != affects_y;
            if new_width > new_height * ratio {
                dist_y = (if mirrored { -dist_x } else { dist_x }) / ratio;
            } else {
                dist_x = (if mirrored { -dist_y } else { dist_y }) * ratio;
            }
        } else if is_horizontal {
            dist_y = dist_x / ratio;
            affects_y = affects_x;
        } else {
            dist_x = dist_y * ratio;
            affects_x = affects_y;
        }
    }

    let x = if affects_x { start_x + dist_x } else { start_x };
    let y = if affects_y { start_y + dist_y } else { start_y };

    ResizeValues {
        width: start_width + if affects_x { -dist_x } else { dist_x },
        height: start_height + if affects_y { -dist_y } else { dist_y },
        x: node_origin[0] * dist_x * (if affects_x { -1.0 } else { 1.0 }) + x,
        y: node_origin[1] * dist_y * (if affects_y { -1.0 } else { 1.0 }) + y,
    }
}

/// Sign of the size change per axis, flipped when the top/left edge moves.
pub fn resize_direction(
    values: &ResizeValues,
    prev_width: f64,
    prev_height: f64,
    direction: ControlDirection,
) -> [i8; 2] {
    let sign = |d: f64| -> i8 {
        if d > 0.0 {
            1
        } else if d < 0.0 {
            -1
        } else {
            0
        }
    };
    let dw = values.width - prev_width;
    let dh = values.height - prev_height;
    let mut result = [sign(dw), sign(dh)];
    if dw != 0.0 && direction.affects_x {
        result[0] = -result[0];
    }
    if dh != 0.0 && direction.affects_y {
        result[1] = -result[1];
    }
    result
}

/// One resize step: the new values and the change records that apply them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeStep {
    pub values: ResizeValues,
    pub direction: [i8; 2],
    pub changes: Vec<NodeChange>,
}

/// A child of the node being resized, with its working relative position.
#[derive(Debug, Clone, PartialEq)]
struct ResizeChild {
    id: NodeId,
    position: XYPosition,
}

/// Per-pointer resize state.
#[derive(Debug, Clone)]
pub struct ResizeGesture {
    pub node_id: NodeId,
    pub params: ResizeParams,
    pub control: ControlPosition,
    start: ResizeStart,
    prev: ResizeValues,
    node_origin: NodeOrigin,
    parent_id: Option<NodeId>,
    expand_parent: bool,
    parent_extent: Option<CoordinateExtent>,
    child_extent: Option<CoordinateExtent>,
    children: Vec<ResizeChild>,
}

impl ResizeGesture {
    /// Capture the start values of `node_id`. `pointer` is in flow space.
    ///
    /// A node without a positive size has no aspect ratio to keep and cannot
    /// be resized yet.
    pub fn start(
        resolver: &NodeResolver,
        node_id: &str,
        control: ControlPosition,
        params: ResizeParams,
        pointer: XYPosition,
        default_origin: NodeOrigin,
    ) -> EngineResult<Self> {
        let node = resolver.get(node_id).ok_or_else(|| EngineError::UnknownNode {
            node_id: node_id.to_string(),
        })?;
        let dimensions = node.dimensions();
        if dimensions.width <= 0.0 || dimensions.height <= 0.0 {
            return Err(EngineError::NodeNotMeasured {
                node_id: node_id.to_string(),
            });
        }
        let values = ResizeValues {
            x: node.user_node.position.x,
            y: node.user_node.position.y,
            width: dimensions.width,
            height: dimensions.height,
        };

        let user_node = &node.user_node;
        let bound_to_parent = user_node.has_parent_extent() || user_node.expand_parent;
        let parent = user_node
            .parent_id
            .as_deref()
            .filter(|_| bound_to_parent)
            .and_then(|id| resolver.get(id));
        let parent_extent = parent.filter(|_| user_node.has_parent_extent()).map(|p| {
            let d = p.dimensions();
            CoordinateExtent::new(0.0, 0.0, d.width, d.height)
        });

        let mut children = Vec::new();
        let mut child_extent: Option<CoordinateExtent> = None;
        for child in resolver.children(node_id) {
            children.push(ResizeChild {
                id: child.id().to_string(),
                position: child.user_node.position,
            });
            if !(child.user_node.has_parent_extent() || child.user_node.expand_parent) {
                continue;
            }
            let origin = child.origin(default_origin);
            let d = child.dimensions();
            let x = values.x + child.user_node.position.x - origin[0] * d.width;
            let y = values.y + child.user_node.position.y - origin[1] * d.height;
            let extent = CoordinateExtent::new(x, y, x + d.width, y + d.height);
            child_extent = Some(match child_extent {
                Some(acc) => CoordinateExtent::new(
                    acc.min.x.min(extent.min.x),
                    acc.min.y.min(extent.min.y),
                    acc.max.x.max(extent.max.x),
                    acc.max.y.max(extent.max.y),
                ),
                None => extent,
            });
        }

        debug!(node_id, ?control, "Resize started");
        Ok(Self {
            node_id: node_id.to_string(),
            params,
            control,
            start: ResizeStart {
                values,
                pointer,
                aspect_ratio: values.width / values.height,
            },
            prev: values,
            node_origin: node.origin(default_origin),
            parent_id: parent.map(|p| p.id().to_string()),
            expand_parent: user_node.expand_parent,
            parent_extent,
            child_extent,
            children,
        })
    }

    pub fn values(&self) -> ResizeValues {
        self.prev
    }

    /// Follow the pointer. Returns None when nothing changed.
    pub fn update(&mut self, resolver: &NodeResolver, pointer: XYPosition) -> Option<ResizeStep> {
        let direction = self.control.direction();
        let prev = self.prev;
        let next = get_dimensions_after_resize(
            &self.start,
            direction,
            pointer,
            &self.params,
            self.node_origin,
            self.parent_extent.as_ref(),
            self.child_extent.as_ref(),
        );

        let width_change = next.width != prev.width;
        let height_change = next.height != prev.height;
        let x_change = next.x != prev.x && width_change;
        let y_change = next.y != prev.y && height_change;
        if !x_change && !y_change && !width_change && !height_change {
            return None;
        }

        let origin = self.node_origin;
        let mut position: Option<XYPosition> = None;
        let mut child_changes = Vec::new();
        if x_change || y_change || origin[0] == 1.0 || origin[1] == 1.0 {
            let x = if x_change { next.x } else { self.prev.x };
            let y = if y_change { next.y } else { self.prev.y };
            self.prev.x = x;
            self.prev.y = y;
            position = Some(XYPosition::new(x, y));

            // Counter-shift children so they keep their absolute position.
            let dx = next.x - prev.x;
            let dy = next.y - prev.y;
            for child in &mut self.children {
                child.position = XYPosition::new(
                    child.position.x - dx + origin[0] * (next.width - prev.width),
                    child.position.y - dy + origin[1] * (next.height - prev.height),
                );
                child_changes.push(NodeChange::position(&child.id, Some(child.position), None));
            }
        }

        if width_change || height_change {
            let horizontal_allowed = self.params.resize_direction != Some(ResizeDirection::Vertical);
            let vertical_allowed = self.params.resize_direction != Some(ResizeDirection::Horizontal);
            if width_change && horizontal_allowed {
                self.prev.width = next.width;
            }
            if height_change && vertical_allowed {
                self.prev.height = next.height;
            }
        }

        if self.parent_id.is_some() && self.expand_parent {
            let x_limit = origin[0] * self.prev.width;
            if position.is_some_and(|p| p.x != 0.0 && p.x < x_limit) {
                self.start.values.x -= self.prev.x - x_limit;
                self.prev.x = x_limit;
            }
            let y_limit = origin[1] * self.prev.height;
            if position.is_some_and(|p| p.y != 0.0 && p.y < y_limit) {
                self.start.values.y -= self.prev.y - y_limit;
                self.prev.y = y_limit;
            }
        }

        let direction = resize_direction(&self.prev, prev.width, prev.height, direction);
        trace!(node_id = %self.node_id, values = ?self.prev, "Resize step");

        let mut changes = Vec::new();
        changes.extend(self.expand_parent_changes(resolver, position));
        if let Some(p) = position {
            let p = if self.expand_parent && self.parent_id.is_some() {
                XYPosition::new(
                    p.x.max(origin[0] * self.prev.width),
                    p.y.max(origin[1] * self.prev.height),
                )
            } else {
                p
            };
            changes.push(NodeChange::position(&self.node_id, Some(p), None));
        }
        if width_change || height_change {
            changes.push(NodeChange::Dimensions {
                id: self.node_id.clone(),
                dimensions: Some(Dimensions::new(self.prev.width, self.prev.height)),
                resizing: Some(true),
                set_attributes: true,
            });
        }
        changes.extend(child_changes);

        Some(ResizeStep {
            values: self.prev,
            direction,
            changes,
        })
    }

    fn expand_parent_changes(&self, resolver: &NodeResolver, position: Option<XYPosition>) -> Vec<NodeChange> {
        let Some(parent_id) = self.parent_id.as_deref().filter(|_| self.expand_parent) else {
            return Vec::new();
        };
        let Some(parent) = resolver.get(parent_id) else {
            return Vec::new();
        };
        let relative = position.unwrap_or(XYPosition::new(self.prev.x, self.prev.y));
        let parent_abs = parent.internals.position_absolute;
        let rect = Rect::new(
            parent_abs.x + relative.x - self.node_origin[0] * self.prev.width,
            parent_abs.y + relative.y - self.node_origin[1] * self.prev.height,
            self.prev.width,
            self.prev.height,
        );
        resolver.expand_parents(
            &[ParentExpandChild {
                id: self.node_id.clone(),
                parent_id: parent_id.to_string(),
                rect,
            }],
            self.node_origin,
        )
    }

    /// Final change record marking the node as no longer resizing.
    pub fn end(&self) -> NodeChange {
        debug!(node_id = %self.node_id, values = ?self.prev, "Resize ended");
        NodeChange::Dimensions {
            id: self.node_id.clone(),
            dimensions: Some(Dimensions::new(self.prev.width, self.prev.height)),
            resizing: Some(false),
            set_attributes: true,
        }
    }
}
