//! Node position resolver
//!
//! Turns the host's node list into [`InternalNode`]s: absolute positions
//! clamped into each node's effective extent, resolved z and handle bounds.
//! Parents must come before their children in the node list. A node whose
//! parent is absent, later in the list, or part of a parent cycle is reported
//! and resolved as a root.
//!
//! Resolution is lazy: [`NodeResolver::set_nodes`] only marks the store
//! dirty, and every update landing before the next read is coalesced into a
//! single pass.

use crate::changes::NodeChange;
use crate::config::EngineConfig;
use crate::constants::SELECTED_NODE_Z_OFFSET;
use crate::error::{EngineError, ErrorReporter};
use crate::geometry::{CoordinateExtent, Dimensions, Rect, XYPosition, bounds_of_rects, clamp_position};
use crate::types::{Handle, HandleBounds, InternalNode, Node, NodeExtent, NodeId, NodeInternals, NodeOrigin};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// The subset of [`EngineConfig`] the resolver depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOptions {
    pub node_origin: NodeOrigin,
    pub node_extent: CoordinateExtent,
    pub elevate_nodes_on_select: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ResolveOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            node_origin: config.node_origin,
            node_extent: config.node_extent_or_infinite(),
            elevate_nodes_on_select: config.elevate_nodes_on_select,
        }
    }

    fn selected_z(&self) -> i32 {
        if self.elevate_nodes_on_select {
            SELECTED_NODE_Z_OFFSET
        } else {
            0
        }
    }
}

// ============================================================================
// Measurement
// ============================================================================

/// Size and handle layout of one node as reported by the rendering layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeMeasurement {
    pub dimensions: Dimensions,
    /// Handles positioned relative to the node's top-left corner.
    pub handles: Vec<Handle>,
}

/// Injected capability that measures nodes on request.
pub trait MeasurementProvider {
    fn measure(&mut self, node_id: &str) -> Option<NodeMeasurement>;
}

impl<F> MeasurementProvider for F
where
    F: FnMut(&str) -> Option<NodeMeasurement>,
{
    fn measure(&mut self, node_id: &str) -> Option<NodeMeasurement> {
        self(node_id)
    }
}

/// A size-change notification for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUpdate {
    pub id: NodeId,
    /// Re-read the handles even if the size did not change.
    pub force: bool,
}

impl NodeUpdate {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            force: false,
        }
    }
}

/// A child whose parent should grow to enclose `rect`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentExpandChild {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub rect: Rect,
}

/// A node's new position, relative to its parent, plus its absolute rect.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub id: NodeId,
    pub position: XYPosition,
    pub rect: Rect,
}

// ============================================================================
// Extent and z
// ============================================================================

fn calculate_z(node: &Node, selected_z: i32) -> i32 {
    node.z_index.unwrap_or(0) + if node.selected { selected_z } else { 0 }
}

/// Box a node has to stay inside.
///
/// The parent's box for `extent: parent` (unless the node grows its parent),
/// the node's own box shifted by the parent's position, or `fallback`.
pub fn effective_extent(
    node: &Node,
    parent: Option<&InternalNode>,
    fallback: CoordinateExtent,
) -> CoordinateExtent {
    match (node.extent, parent) {
        (Some(NodeExtent::Parent), Some(parent)) if !node.expand_parent => {
            if parent.has_dimensions() {
                CoordinateExtent::from_rect(&parent.rect())
            } else {
                fallback
            }
        }
        (Some(NodeExtent::Coordinates(extent)), Some(parent)) => {
            extent.translate(parent.internals.position_absolute)
        }
        (Some(NodeExtent::Coordinates(extent)), None) => extent,
        _ => fallback,
    }
}

/// Ids of nodes whose parent chain leads back to themselves.
fn cyclic_nodes(nodes: &[Arc<Node>]) -> HashSet<NodeId> {
    let parents: HashMap<&str, &str> = nodes
        .iter()
        .filter_map(|n| n.parent_id.as_deref().map(|p| (n.id.as_str(), p)))
        .collect();

    let mut cyclic = HashSet::new();
    for node in nodes {
        let mut visited = HashSet::new();
        visited.insert(node.id.as_str());
        let mut current = node.id.as_str();
        while let Some(&parent) = parents.get(current) {
            if !visited.insert(parent) {
                if parent == node.id {
                    cyclic.insert(node.id.clone());
                }
                break;
            }
            current = parent;
        }
    }
    cyclic
}

// ============================================================================
// Resolver
// ============================================================================

/// Owns the node list and its resolved lookup.
#[derive(Debug, Default)]
pub struct NodeResolver {
    nodes: Vec<Arc<Node>>,
    lookup: IndexMap<NodeId, Arc<InternalNode>>,
    /// Children per parent id, in node order.
    parent_lookup: HashMap<NodeId, Vec<NodeId>>,
    dirty: bool,
    initialized: bool,
}

impl NodeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node list. Resolution happens on the next read.
    pub fn set_nodes(&mut self, nodes: Vec<Arc<Node>>) {
        self.nodes = nodes;
        self.dirty = true;
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Force a pass on the next read, e.g. after a configuration change.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True once every visible node has dimensions.
    pub fn nodes_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the pending pass, if any. Returns whether a pass ran.
    pub fn ensure_resolved(&mut self, options: &ResolveOptions, reporter: &mut ErrorReporter) -> bool {
        if !self.dirty {
            return false;
        }
        self.resolve(options, reporter);
        true
    }

    /// Resolve every node. Nodes whose backing `Node`, position and z are
    /// unchanged keep their previous `Arc<InternalNode>`.
    pub fn resolve(&mut self, options: &ResolveOptions, reporter: &mut ErrorReporter) {
        crate::profile_scope!("resolve_nodes");

        let previous = std::mem::take(&mut self.lookup);
        self.parent_lookup.clear();

        let all_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let cyclic = cyclic_nodes(&self.nodes);
        let selected_z = options.selected_z();
        let mut initialized = !self.nodes.is_empty();
        let mut reused = 0usize;

        for node in &self.nodes {
            let prev = previous.get(&node.id);

            // Measurements survive as long as the host node is the same object.
            let (measured, handle_bounds) = match prev {
                Some(prev) if Arc::ptr_eq(&prev.user_node, node) => {
                    (prev.measured, prev.internals.handle_bounds.clone())
                }
                _ => {
                    let measured = node.measured.or_else(|| prev.and_then(|p| p.measured));
                    let kept = prev
                        .filter(|_| measured.is_some())
                        .and_then(|p| p.internals.handle_bounds.clone());
                    (
                        measured,
                        kept.or_else(|| HandleBounds::from_handles(&node.id, &node.handles)),
                    )
                }
            };

            let parent = match node.parent_id.as_deref() {
                None => None,
                Some(_) if cyclic.contains(&node.id) => {
                    reporter.report(EngineError::ParentCycle {
                        node_id: node.id.clone(),
                    });
                    None
                }
                Some(parent_id) => match self.lookup.get(parent_id) {
                    Some(parent) => Some(parent.clone()),
                    None if all_ids.contains(parent_id) => {
                        reporter.report(EngineError::ParentNotResolved {
                            node_id: node.id.clone(),
                            parent_id: parent_id.to_string(),
                        });
                        None
                    }
                    None => {
                        reporter.report(EngineError::MissingParent {
                            node_id: node.id.clone(),
                            parent_id: parent_id.to_string(),
                        });
                        None
                    }
                },
            };

            if node.parent_id.is_none() && node.has_parent_extent() {
                reporter.report(EngineError::ParentExtentWithoutParent {
                    node_id: node.id.clone(),
                });
            }

            let dimensions = measured.unwrap_or_else(|| node.dimensions());
            let origin = node.origin.unwrap_or(options.node_origin);
            let relative = XYPosition::new(
                node.position.x - dimensions.width * origin[0],
                node.position.y - dimensions.height * origin[1],
            );
            let own_z = calculate_z(node, selected_z);

            let (position_absolute, z) = match parent.as_deref() {
                Some(parent) => {
                    self.parent_lookup
                        .entry(parent.id().to_string())
                        .or_default()
                        .push(node.id.clone());
                    let extent = effective_extent(node, Some(parent), options.node_extent);
                    let candidate = parent.internals.position_absolute + relative;
                    (
                        clamp_position(candidate, &extent, dimensions),
                        parent.internals.z.max(own_z),
                    )
                }
                None => {
                    let extent = effective_extent(node, None, options.node_extent);
                    (clamp_position(relative, &extent, dimensions), own_z)
                }
            };

            let internal = match prev {
                Some(prev)
                    if Arc::ptr_eq(&prev.user_node, node)
                        && prev.internals.position_absolute == position_absolute
                        && prev.internals.z == z
                        && prev.measured == measured
                        && prev.internals.handle_bounds == handle_bounds =>
                {
                    reused += 1;
                    prev.clone()
                }
                _ => Arc::new(InternalNode {
                    user_node: node.clone(),
                    measured,
                    internals: NodeInternals {
                        position_absolute,
                        z,
                        handle_bounds,
                    },
                }),
            };

            if !internal.has_dimensions() && !node.hidden {
                initialized = false;
            }
            self.lookup.insert(node.id.clone(), internal);
        }

        self.dirty = false;
        self.initialized = initialized;
        trace!(nodes = self.lookup.len(), reused, "Resolved node positions");
    }

    pub fn get(&self, node_id: &str) -> Option<&Arc<InternalNode>> {
        self.lookup.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.lookup.contains_key(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InternalNode>> {
        self.lookup.values()
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Resolved children of `parent_id`, in node order.
    pub fn children(&self, parent_id: &str) -> impl Iterator<Item = &Arc<InternalNode>> {
        self.parent_lookup
            .get(parent_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.lookup.get(id))
    }

    fn parent_of(&self, node: &InternalNode) -> Option<&Arc<InternalNode>> {
        node.parent_id().and_then(|id| self.lookup.get(id))
    }

    /// Clamp a proposed absolute top-left position for `node_id`.
    ///
    /// Returns the position relative to the parent (origin re-applied) and
    /// the clamped absolute position. `fallback` is the extent used when the
    /// node has no extent of its own.
    pub fn calculate_node_position(
        &self,
        node_id: &str,
        next_position: XYPosition,
        fallback: CoordinateExtent,
        node_origin: NodeOrigin,
        reporter: &mut ErrorReporter,
    ) -> Option<(XYPosition, XYPosition)> {
        let node = self.lookup.get(node_id)?;
        let parent = self.parent_of(node);
        let parent_position = parent
            .map(|p| p.internals.position_absolute)
            .unwrap_or_default();

        if node.user_node.has_parent_extent() && !node.user_node.expand_parent && parent.is_none() {
            reporter.report(EngineError::ParentExtentWithoutParent {
                node_id: node_id.to_string(),
            });
        }
        if !node.has_dimensions() {
            reporter.report(EngineError::NodeNotMeasured {
                node_id: node_id.to_string(),
            });
        }

        let extent = effective_extent(&node.user_node, parent.map(|p| p.as_ref()), fallback);
        let dimensions = node.dimensions();
        let position_absolute = clamp_position(next_position, &extent, dimensions);
        let origin = node.origin(node_origin);

        let position = XYPosition::new(
            position_absolute.x - parent_position.x + dimensions.width * origin[0],
            position_absolute.y - parent_position.y + dimensions.height * origin[1],
        );
        Some((position, position_absolute))
    }

    /// Position change records for moved nodes.
    ///
    /// Children that grow their parent are kept at non-negative relative
    /// positions and the parents are expanded to enclose them.
    pub fn position_changes(
        &self,
        updates: &[PositionUpdate],
        dragging: Option<bool>,
        node_origin: NodeOrigin,
    ) -> Vec<NodeChange> {
        let mut changes = Vec::with_capacity(updates.len());
        let mut expand_children = Vec::new();

        for update in updates {
            let node = self.lookup.get(&update.id);
            let expand_parent = node
                .and_then(|n| n.parent_id().filter(|_| n.user_node.expand_parent))
                .map(str::to_string);

            let position = if expand_parent.is_some() {
                XYPosition::new(update.position.x.max(0.0), update.position.y.max(0.0))
            } else {
                update.position
            };
            changes.push(NodeChange::position(&update.id, Some(position), dragging));

            if let Some(parent_id) = expand_parent {
                expand_children.push(ParentExpandChild {
                    id: update.id.clone(),
                    parent_id,
                    rect: update.rect,
                });
            }
        }

        if !expand_children.is_empty() {
            changes.extend(self.expand_parents(&expand_children, node_origin));
        }
        changes
    }

    /// Grow parents so they enclose the given child rects.
    ///
    /// Parents growing up or left are moved, and their other children are
    /// shifted back so they keep their absolute position.
    pub fn expand_parents(
        &self,
        children: &[ParentExpandChild],
        node_origin: NodeOrigin,
    ) -> Vec<NodeChange> {
        let mut expansions: IndexMap<&str, (Rect, &Arc<InternalNode>)> = IndexMap::new();
        for child in children {
            let Some(parent) = self.lookup.get(&child.parent_id) else {
                continue;
            };
            let parent_rect = expansions
                .get(child.parent_id.as_str())
                .map(|(rect, _)| *rect)
                .unwrap_or_else(|| parent.rect());
            let expanded = bounds_of_rects(&parent_rect, &child.rect);
            expansions.insert(child.parent_id.as_str(), (expanded, parent));
        }

        let mut changes = Vec::new();
        for (parent_id, (expanded, parent)) in expansions {
            let position_absolute = parent.internals.position_absolute;
            let dimensions = parent.dimensions();
            let origin = parent.origin(node_origin);

            let x_change = if expanded.x < position_absolute.x {
                (position_absolute.x - expanded.x).abs().round()
            } else {
                0.0
            };
            let y_change = if expanded.y < position_absolute.y {
                (position_absolute.y - expanded.y).abs().round()
            } else {
                0.0
            };
            let new_width = dimensions.width.max(expanded.width.round());
            let new_height = dimensions.height.max(expanded.height.round());
            let width_change = (new_width - dimensions.width) * origin[0];
            let height_change = (new_height - dimensions.height) * origin[1];

            if x_change > 0.0 || y_change > 0.0 || width_change != 0.0 || height_change != 0.0 {
                let parent_position = parent.user_node.position;
                changes.push(NodeChange::position(
                    parent_id,
                    Some(XYPosition::new(
                        parent_position.x - x_change + width_change,
                        parent_position.y - y_change + height_change,
                    )),
                    None,
                ));

                for sibling in self.children(parent_id) {
                    if children.iter().any(|c| c.id == sibling.id()) {
                        continue;
                    }
                    let position = sibling.user_node.position;
                    changes.push(NodeChange::position(
                        sibling.id(),
                        Some(XYPosition::new(position.x + x_change, position.y + y_change)),
                        None,
                    ));
                }
            }

            if dimensions.width < expanded.width
                || dimensions.height < expanded.height
                || x_change != 0.0
                || y_change != 0.0
            {
                let width = new_width
                    + if x_change != 0.0 {
                        origin[0] * x_change - width_change
                    } else {
                        0.0
                    };
                let height = new_height
                    + if y_change != 0.0 {
                        origin[1] * y_change - height_change
                    } else {
                        0.0
                    };
                debug!(parent_id, width, height, "Expanding parent node");
                changes.push(NodeChange::Dimensions {
                    id: parent_id.to_string(),
                    dimensions: Some(Dimensions::new(width, height)),
                    resizing: None,
                    set_attributes: true,
                });
            }
        }
        changes
    }

    /// Apply size-change notifications through `provider`.
    ///
    /// Re-measures each node, clamps it back into its extent, drops handle
    /// bounds of hidden nodes and returns the resulting dimension and
    /// parent-expansion changes.
    pub fn update_node_internals(
        &mut self,
        updates: &[NodeUpdate],
        provider: &mut dyn MeasurementProvider,
        options: &ResolveOptions,
        reporter: &mut ErrorReporter,
    ) -> Vec<NodeChange> {
        self.ensure_resolved(options, reporter);

        let mut changes = Vec::new();
        let mut expand_children = Vec::new();
        let mut updated = false;

        for update in updates {
            let Some(node) = self.lookup.get(&update.id).cloned() else {
                continue;
            };

            if node.user_node.hidden {
                let mut hidden = (*node).clone();
                hidden.internals.handle_bounds = None;
                self.lookup.insert(update.id.clone(), Arc::new(hidden));
                updated = true;
                continue;
            }

            let Some(measurement) = provider.measure(&update.id) else {
                trace!(node_id = %update.id, "No measurement available");
                continue;
            };
            let dimensions = measurement.dimensions;
            let dimension_changed = node.measured != Some(dimensions);
            let do_update = dimensions.width > 0.0
                && dimensions.height > 0.0
                && (dimension_changed || node.internals.handle_bounds.is_none() || update.force);
            if !do_update {
                continue;
            }

            let parent = self.parent_of(&node);
            let extent = effective_extent(&node.user_node, parent.map(|p| p.as_ref()), options.node_extent);
            let position_absolute =
                clamp_position(node.internals.position_absolute, &extent, dimensions);

            let handle_bounds = if measurement.handles.is_empty() {
                HandleBounds::from_handles(&update.id, &node.user_node.handles)
            } else {
                HandleBounds::from_handles(&update.id, &measurement.handles)
            };

            let measured_node = InternalNode {
                user_node: node.user_node.clone(),
                measured: Some(dimensions),
                internals: NodeInternals {
                    position_absolute,
                    z: node.internals.z,
                    handle_bounds,
                },
            };
            updated = true;

            if dimension_changed {
                changes.push(NodeChange::Dimensions {
                    id: update.id.clone(),
                    dimensions: Some(dimensions),
                    resizing: None,
                    set_attributes: false,
                });
                if let Some(parent_id) = node.parent_id().filter(|_| node.user_node.expand_parent) {
                    expand_children.push(ParentExpandChild {
                        id: update.id.clone(),
                        parent_id: parent_id.to_string(),
                        rect: measured_node.rect(),
                    });
                }
            }
            self.lookup.insert(update.id.clone(), Arc::new(measured_node));
        }

        if !expand_children.is_empty() {
            changes.extend(self.expand_parents(&expand_children, options.node_origin));
        }
        if updated {
            // Children of re-measured parents need new extents.
            self.dirty = true;
        }
        changes
    }
}
