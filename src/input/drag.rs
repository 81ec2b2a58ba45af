//! Node drag gesture.
//!
//! ## Performance Notes
//!
//! Pointer moves arrive at 60+ events per second during a drag. Per move:
//! - Moves that do not change the snapped pointer are skipped
//! - Only nodes whose clamped position actually changed produce updates
//! - The drag set is built once at gesture start, not per move
//!
//! Enable profiling with `cargo build --features profiling` to see timing.

use super::autopan::AutoPan;
use super::event::NudgeDirection;
use crate::config::EngineConfig;
use crate::constants::KEYBOARD_NUDGE_DISTANCE;
use crate::error::ErrorReporter;
use crate::geometry::{Bounds, CoordinateExtent, Dimensions, Rect, XYPosition, snap_position};
use crate::profile_scope;
use crate::resolver::{NodeResolver, PositionUpdate};
use crate::types::{InternalNode, Node, NodeExtent, NodeId};
use crate::viewport::{Transform, screen_to_flow};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// One node taking part in a drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragItem {
    pub id: NodeId,
    /// Position relative to the parent, origin applied.
    pub position: XYPosition,
    pub position_absolute: XYPosition,
    /// Pointer minus the node's absolute position at drag start.
    pub distance: XYPosition,
    pub extent: Option<NodeExtent>,
    pub parent_id: Option<NodeId>,
    pub expand_parent: bool,
    pub measured: Dimensions,
}

impl DragItem {
    fn rect(&self) -> Rect {
        Rect::from_position(self.position_absolute, self.measured)
    }
}

/// Topmost ancestor this node hands its drags to.
fn drag_replacement<'a>(resolver: &'a NodeResolver, node: &'a Arc<InternalNode>) -> &'a Arc<InternalNode> {
    let mut current = node;
    // Bounded by the node count in case of a malformed chain.
    for _ in 0..resolver.len() {
        if !current.user_node.drag_parent {
            break;
        }
        match current.parent_id().and_then(|id| resolver.get(id)) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// Collect the nodes a drag on `node_id` moves.
///
/// Participants are the target plus, when `include_selected`, every selected
/// node. Each is swapped for its drag-parent ancestor and joined by its
/// drag children. Nodes whose parent also moves are left out, since they
/// follow the parent anyway.
pub fn get_drag_items(
    resolver: &NodeResolver,
    nodes_draggable: bool,
    pointer: XYPosition,
    node_id: Option<&str>,
    include_selected: bool,
) -> IndexMap<NodeId, DragItem> {
    let mut ids: Vec<&str> = Vec::new();
    for node in resolver.iter() {
        let participates = Some(node.id()) == node_id || (include_selected && node.user_node.selected);
        if !participates {
            continue;
        }
        let node = drag_replacement(resolver, node);
        ids.push(node.id());
        ids.extend(node.user_node.drag_children.iter().map(String::as_str));
    }

    let mut items = IndexMap::new();
    for node in resolver.iter() {
        if !ids.contains(&node.id()) {
            continue;
        }
        if node.parent_id().is_some_and(|p| ids.contains(&p)) {
            continue;
        }
        if !node.is_draggable(nodes_draggable) {
            continue;
        }

        let position_absolute = node.internals.position_absolute;
        items.insert(
            node.id().to_string(),
            DragItem {
                id: node.id().to_string(),
                position: node.user_node.position,
                position_absolute,
                distance: pointer - position_absolute,
                extent: node.user_node.extent,
                parent_id: node.user_node.parent_id.clone(),
                expand_parent: node.user_node.expand_parent,
                measured: node.dimensions(),
            },
        );
    }
    items
}

/// Flow position of a screen point, snapped when grid snapping is on.
pub fn pointer_position(screen: XYPosition, transform: &Transform, config: &EngineConfig) -> XYPosition {
    let snap_grid = config.snap_to_grid.then_some(config.snap_grid);
    screen_to_flow(screen, transform, snap_grid)
}

/// Per-pointer node drag state.
#[derive(Debug, Clone)]
pub struct DragGesture {
    /// Node under the pointer at pointer-down.
    pub node_id: NodeId,
    /// Flow position at pointer-down.
    pub start: XYPosition,
    /// Flow position the last update was computed from.
    pub last_pos: XYPosition,
    pub items: IndexMap<NodeId, DragItem>,
    pub started: bool,
    /// Drag every selected node, not just the target.
    pub include_selected: bool,
    pub auto_pan: AutoPan,
}

impl DragGesture {
    pub fn new(node_id: &str, start: XYPosition, screen: XYPosition, include_selected: bool) -> Self {
        Self {
            node_id: node_id.to_string(),
            start,
            last_pos: start,
            items: IndexMap::new(),
            started: false,
            include_selected,
            auto_pan: AutoPan::new(screen, false),
        }
    }

    /// Whether the pointer travelled further than `threshold` from
    /// pointer-down. Distance is Euclidean and cumulative.
    pub fn exceeds_threshold(&self, pointer: XYPosition, threshold: f64) -> bool {
        pointer.distance_to(self.start) > threshold
    }

    /// Build the drag set at `pointer`. Returns false when nothing can move.
    pub fn start(&mut self, resolver: &NodeResolver, config: &EngineConfig, pointer: XYPosition) -> bool {
        self.items = get_drag_items(
            resolver,
            config.nodes_draggable,
            pointer,
            Some(&self.node_id),
            self.include_selected,
        );
        self.last_pos = pointer;
        self.started = true;
        self.auto_pan.enabled = config.auto_pan_on_node_drag;
        debug!(
            node_id = %self.node_id,
            items = self.items.len(),
            "Node drag started"
        );
        !self.items.is_empty()
    }

    fn items_bounds(&self) -> Bounds {
        self.items
            .values()
            .fold(Bounds::EMPTY, |acc, item| acc.union(&item.rect().to_bounds()))
    }

    /// Move every item to follow `pointer`.
    ///
    /// With several items and a node extent, the extent is shrunk per item so
    /// the selection box as a whole stays inside it. Returns the updates for
    /// items whose position changed, or None when nothing moved.
    pub fn update(
        &mut self,
        resolver: &NodeResolver,
        config: &EngineConfig,
        pointer: XYPosition,
        reporter: &mut ErrorReporter,
    ) -> Option<Vec<PositionUpdate>> {
        profile_scope!("drag_update");
        self.last_pos = pointer;

        let node_extent = config.node_extent_or_infinite();
        let group = self.items.len() > 1 && !node_extent.is_infinite();
        let nodes_box = if group { self.items_bounds() } else { Bounds::EMPTY };

        let mut changed = false;
        for item in self.items.values_mut() {
            if !resolver.contains(&item.id) {
                continue;
            }
            let mut next = pointer - item.distance;
            if config.snap_to_grid {
                next = snap_position(next, config.snap_grid);
            }

            let extent = if group && item.extent.is_none() {
                let abs = item.position_absolute;
                CoordinateExtent::new(
                    abs.x - nodes_box.x + node_extent.min.x,
                    abs.y - nodes_box.y + node_extent.min.y,
                    abs.x + item.measured.width - nodes_box.x2 + node_extent.max.x,
                    abs.y + item.measured.height - nodes_box.y2 + node_extent.max.y,
                )
            } else {
                node_extent
            };

            let Some((position, position_absolute)) = resolver.calculate_node_position(
                &item.id,
                next,
                extent,
                config.node_origin,
                reporter,
            ) else {
                continue;
            };

            changed |= position != item.position;
            item.position = position;
            item.position_absolute = position_absolute;
        }

        if !changed {
            trace!("Drag move produced no position change");
            return None;
        }
        Some(self.position_updates())
    }

    /// Current positions of all items.
    pub fn position_updates(&self) -> Vec<PositionUpdate> {
        self.items
            .values()
            .map(|item| PositionUpdate {
                id: item.id.clone(),
                position: item.position,
                rect: item.rect(),
            })
            .collect()
    }

    /// Shift the drag anchor by one auto-pan frame. `velocity` is the screen
    /// pan about to be applied.
    pub fn shift_for_auto_pan(&mut self, velocity: XYPosition, zoom: f64) -> XYPosition {
        self.last_pos = XYPosition::new(
            self.last_pos.x - velocity.x / zoom,
            self.last_pos.y - velocity.y / zoom,
        );
        self.last_pos
    }

    /// Host nodes carrying the drag positions: the dragged node and all items.
    pub fn snapshot(&self, resolver: &NodeResolver, dragging: bool) -> (Option<Node>, Vec<Node>) {
        let with_position = |node: &Node, position: XYPosition| Node {
            position,
            dragging,
            ..node.clone()
        };

        let nodes: Vec<Node> = self
            .items
            .values()
            .filter_map(|item| {
                resolver
                    .get(&item.id)
                    .map(|n| with_position(&n.user_node, item.position))
            })
            .collect();

        let node = resolver
            .get(&self.node_id)
            .map(|n| {
                let position = self
                    .items
                    .get(&self.node_id)
                    .map_or(n.user_node.position, |item| item.position);
                with_position(&n.user_node, position)
            })
            .or_else(|| nodes.first().cloned());
        (node, nodes)
    }
}

/// Position updates moving every selected draggable node one nudge step.
///
/// A step is 5px, or one grid cell when snapping, times `factor`.
pub fn nudge_updates(
    resolver: &NodeResolver,
    config: &EngineConfig,
    direction: NudgeDirection,
    factor: f64,
    reporter: &mut ErrorReporter,
) -> Vec<PositionUpdate> {
    let (step_x, step_y) = if config.snap_to_grid {
        (config.snap_grid[0], config.snap_grid[1])
    } else {
        (KEYBOARD_NUDGE_DISTANCE, KEYBOARD_NUDGE_DISTANCE)
    };
    let unit = direction.unit();
    let delta = XYPosition::new(unit.x * step_x * factor, unit.y * step_y * factor);

    let mut updates = Vec::new();
    for node in resolver.iter() {
        if !node.user_node.selected || !node.is_draggable(config.nodes_draggable) {
            continue;
        }
        let mut next = node.internals.position_absolute + delta;
        if config.snap_to_grid {
            next = snap_position(next, config.snap_grid);
        }
        let Some((position, position_absolute)) = resolver.calculate_node_position(
            node.id(),
            next,
            config.node_extent_or_infinite(),
            config.node_origin,
            reporter,
        ) else {
            continue;
        };
        updates.push(PositionUpdate {
            id: node.id().to_string(),
            position,
            rect: Rect::from_position(position_absolute, node.dimensions()),
        });
    }
    updates
}
