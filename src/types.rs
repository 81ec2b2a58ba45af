//! Core types for the flow data model.
//!
//! `Node` and `Edge` are host-owned values. `InternalNode` is derived by the
//! resolver and wraps the host node behind an `Arc` so unchanged nodes can be
//! detected by pointer identity.

use crate::geometry::{CoordinateExtent, Dimensions, Rect, XYPosition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type NodeId = String;
pub type EdgeId = String;
pub type HandleId = String;

/// Fractional anchor of a node box relative to its stated position.
pub type NodeOrigin = [f64; 2];

fn default_true() -> bool {
    true
}

// ============================================================================
// Handles
// ============================================================================

/// Which end of a connection a handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleType {
    Source,
    Target,
}

impl HandleType {
    pub fn opposite(self) -> Self {
        match self {
            HandleType::Source => HandleType::Target,
            HandleType::Target => HandleType::Source,
        }
    }
}

/// Side of the node box a handle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Left,
    Top,
    Right,
    Bottom,
}

impl Position {
    pub fn opposite(self) -> Self {
        match self {
            Position::Left => Position::Right,
            Position::Right => Position::Left,
            Position::Top => Position::Bottom,
            Position::Bottom => Position::Top,
        }
    }
}

/// A connection point, positioned relative to the node's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handle {
    #[serde(default)]
    pub id: Option<HandleId>,
    #[serde(default)]
    pub node_id: NodeId,
    #[serde(rename = "type")]
    pub handle_type: HandleType,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "Handle::default_extent")]
    pub width: f64,
    #[serde(default = "Handle::default_extent")]
    pub height: f64,
    /// Accepts connections at all.
    #[serde(default = "default_true")]
    pub connectable: bool,
    /// A connection gesture may begin here.
    #[serde(default = "default_true")]
    pub connectable_start: bool,
    /// A connection gesture may end here.
    #[serde(default = "default_true")]
    pub connectable_end: bool,
}

impl Handle {
    fn default_extent() -> f64 {
        1.0
    }

    pub fn new(
        id: Option<&str>,
        node_id: &str,
        handle_type: HandleType,
        position: Position,
        rect: Rect,
    ) -> Self {
        Self {
            id: id.map(str::to_string),
            node_id: node_id.to_string(),
            handle_type,
            position,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            connectable: true,
            connectable_start: true,
            connectable_end: true,
        }
    }

    /// Identity of a handle: node, role and id.
    pub fn same_handle(&self, other: &Handle) -> bool {
        self.node_id == other.node_id && self.handle_type == other.handle_type && self.id == other.id
    }
}

/// Resolved handle positions of a node, split by role.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandleBounds {
    pub source: Vec<Handle>,
    pub target: Vec<Handle>,
}

impl HandleBounds {
    /// Split declared handles by role, stamping the owning node id.
    pub fn from_handles(node_id: &str, handles: &[Handle]) -> Option<Self> {
        if handles.is_empty() {
            return None;
        }
        let mut bounds = HandleBounds::default();
        for handle in handles {
            let mut handle = handle.clone();
            handle.node_id = node_id.to_string();
            match handle.handle_type {
                HandleType::Source => bounds.source.push(handle),
                HandleType::Target => bounds.target.push(handle),
            }
        }
        Some(bounds)
    }

    pub fn of_type(&self, handle_type: HandleType) -> &[Handle] {
        match handle_type {
            HandleType::Source => &self.source,
            HandleType::Target => &self.target,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.source.iter().chain(self.target.iter())
    }

    /// First handle when `handle_id` is None, otherwise the matching one.
    pub fn find(&self, handle_type: HandleType, handle_id: Option<&str>) -> Option<&Handle> {
        let handles = self.of_type(handle_type);
        match handle_id {
            None => handles.first(),
            Some(id) => handles.iter().find(|h| h.id.as_deref() == Some(id)),
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Where a node may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeExtent {
    /// Stay inside the parent's box.
    Parent,
    /// Stay inside this box (relative to the parent when there is one).
    Coordinates(CoordinateExtent),
}

/// A positioned, sizeable entity owned by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Position relative to the parent (or the flow when there is none).
    pub position: XYPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Size reported by the measurement provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<NodeOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<NodeExtent>,
    /// Grow the parent instead of being clamped by it.
    pub expand_parent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    pub selected: bool,
    pub hidden: bool,
    pub dragging: bool,
    pub resizing: bool,
    /// Dragging this node drags its parent instead.
    pub drag_parent: bool,
    /// Nodes that always move along with this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drag_children: Vec<NodeId>,
    /// Statically declared handles, used until the node is measured.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub handles: Vec<Handle>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            position: XYPosition::new(x, y),
            ..Default::default()
        }
    }

    /// Measured size first, then explicit width/height, then zero.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(
            self.measured
                .map(|m| m.width)
                .or(self.width)
                .unwrap_or(0.0),
            self.measured
                .map(|m| m.height)
                .or(self.height)
                .unwrap_or(0.0),
        )
    }

    pub fn has_dimensions(&self) -> bool {
        self.measured.is_some() || (self.width.is_some() && self.height.is_some())
    }

    pub fn has_parent_extent(&self) -> bool {
        matches!(self.extent, Some(NodeExtent::Parent))
    }
}

/// Engine-derived per-node values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeInternals {
    pub position_absolute: XYPosition,
    pub z: i32,
    pub handle_bounds: Option<HandleBounds>,
}

/// A host node plus everything the engine derived for it.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalNode {
    pub user_node: Arc<Node>,
    pub measured: Option<Dimensions>,
    pub internals: NodeInternals,
}

impl InternalNode {
    #[inline]
    pub fn id(&self) -> &str {
        &self.user_node.id
    }

    #[inline]
    pub fn parent_id(&self) -> Option<&str> {
        self.user_node.parent_id.as_deref()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.measured.unwrap_or_else(|| self.user_node.dimensions())
    }

    pub fn has_dimensions(&self) -> bool {
        self.measured.is_some() || self.user_node.has_dimensions()
    }

    pub fn origin(&self, default_origin: NodeOrigin) -> NodeOrigin {
        self.user_node.origin.unwrap_or(default_origin)
    }

    /// Absolute box of the node.
    pub fn rect(&self) -> Rect {
        Rect::from_position(self.internals.position_absolute, self.dimensions())
    }

    pub fn is_draggable(&self, nodes_draggable: bool) -> bool {
        self.user_node.draggable.unwrap_or(nodes_draggable)
    }

    pub fn is_selectable(&self) -> bool {
        self.user_node.selectable.unwrap_or(true)
    }

    pub fn is_connectable(&self, nodes_connectable: bool) -> bool {
        self.user_node.connectable.unwrap_or(nodes_connectable)
    }

    /// Absolute position of a handle: its centre, or the midpoint of the side
    /// it sits on.
    pub fn handle_position(&self, handle: &Handle, center: bool) -> XYPosition {
        let x = handle.x + self.internals.position_absolute.x;
        let y = handle.y + self.internals.position_absolute.y;
        let (w, h) = (handle.width, handle.height);
        if center {
            return XYPosition::new(x + w / 2.0, y + h / 2.0);
        }
        match handle.position {
            Position::Top => XYPosition::new(x + w / 2.0, y),
            Position::Right => XYPosition::new(x + w, y + h / 2.0),
            Position::Bottom => XYPosition::new(x + w / 2.0, y + h),
            Position::Left => XYPosition::new(x, y + h / 2.0),
        }
    }

    /// Absolute rect of a handle, for hit testing.
    pub fn handle_rect(&self, handle: &Handle) -> Rect {
        Rect::new(
            handle.x + self.internals.position_absolute.x,
            handle.y + self.internals.position_absolute.y,
            handle.width,
            handle.height,
        )
    }
}

// ============================================================================
// Edges
// ============================================================================

/// A connection between two node handles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<HandleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<HandleId>,
    pub selected: bool,
    pub hidden: bool,
}

impl Edge {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_string);
        self.target_handle = target_handle.map(str::to_string);
        self
    }
}

/// Endpoints of a new or rewired edge, roles already normalised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: NodeId,
    pub source_handle: Option<HandleId>,
    pub target: NodeId,
    pub target_handle: Option<HandleId>,
}
