//! Change records and the host-side reducer.
//!
//! The engine never edits host data directly. It emits change records; the
//! host (or [`crate::Engine::apply_pending_changes`]) folds them into its
//! node and edge lists with [`apply_node_changes`] / [`apply_edge_changes`].

use crate::geometry::{Dimensions, XYPosition};
use crate::types::{Edge, EdgeId, Node, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A change to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    #[serde(rename_all = "camelCase")]
    Position {
        id: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<XYPosition>,
        #[serde(skip_serializing_if = "Option::is_none")]
        dragging: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    Dimensions {
        id: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        dimensions: Option<Dimensions>,
        #[serde(skip_serializing_if = "Option::is_none")]
        resizing: Option<bool>,
        /// Also write the new size to the node's explicit width/height.
        #[serde(default)]
        set_attributes: bool,
    },
    Select {
        id: NodeId,
        selected: bool,
    },
    Remove {
        id: NodeId,
    },
    Add {
        item: Node,
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    Replace {
        id: NodeId,
        item: Node,
    },
}

impl NodeChange {
    /// Id of the node this change targets.
    pub fn id(&self) -> &str {
        match self {
            NodeChange::Position { id, .. }
            | NodeChange::Dimensions { id, .. }
            | NodeChange::Select { id, .. }
            | NodeChange::Remove { id }
            | NodeChange::Replace { id, .. } => id,
            NodeChange::Add { item, .. } => &item.id,
        }
    }

    pub fn position(id: &str, position: Option<XYPosition>, dragging: Option<bool>) -> Self {
        NodeChange::Position {
            id: id.to_string(),
            position,
            dragging,
        }
    }
}

/// A change to one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeChange {
    Select {
        id: EdgeId,
        selected: bool,
    },
    Remove {
        id: EdgeId,
    },
    Add {
        item: Edge,
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    Replace {
        id: EdgeId,
        item: Edge,
    },
}

impl EdgeChange {
    pub fn id(&self) -> &str {
        match self {
            EdgeChange::Select { id, .. } | EdgeChange::Remove { id } | EdgeChange::Replace { id, .. } => {
                id
            }
            EdgeChange::Add { item, .. } => &item.id,
        }
    }
}

/// Shared reducer plumbing for nodes and edges.
trait ChangeRecord {
    type Item: Clone;

    fn target_id(&self) -> &str;
    /// `Some((item, index))` for insertions.
    fn as_add(&self) -> Option<(&Self::Item, Option<usize>)>;
    /// Remove or replace: supersedes every other change for the id.
    fn is_exclusive(&self) -> bool;
    /// Replacement item, or None for a removal.
    fn replacement(&self) -> Option<&Self::Item>;
    fn apply_to(&self, item: &mut Self::Item);
}

impl ChangeRecord for NodeChange {
    type Item = Node;

    fn target_id(&self) -> &str {
        self.id()
    }

    fn as_add(&self) -> Option<(&Node, Option<usize>)> {
        match self {
            NodeChange::Add { item, index } => Some((item, *index)),
            _ => None,
        }
    }

    fn is_exclusive(&self) -> bool {
        matches!(self, NodeChange::Remove { .. } | NodeChange::Replace { .. })
    }

    fn replacement(&self) -> Option<&Node> {
        match self {
            NodeChange::Replace { item, .. } => Some(item),
            _ => None,
        }
    }

    fn apply_to(&self, node: &mut Node) {
        match self {
            NodeChange::Select { selected, .. } => node.selected = *selected,
            NodeChange::Position {
                position, dragging, ..
            } => {
                if let Some(position) = position {
                    node.position = *position;
                }
                if let Some(dragging) = dragging {
                    node.dragging = *dragging;
                }
            }
            NodeChange::Dimensions {
                dimensions,
                resizing,
                set_attributes,
                ..
            } => {
                if let Some(dimensions) = dimensions {
                    node.measured = Some(*dimensions);
                    if *set_attributes {
                        node.width = Some(dimensions.width);
                        node.height = Some(dimensions.height);
                    }
                }
                if let Some(resizing) = resizing {
                    node.resizing = *resizing;
                }
            }
            NodeChange::Remove { .. } | NodeChange::Add { .. } | NodeChange::Replace { .. } => {}
        }
    }
}

impl ChangeRecord for EdgeChange {
    type Item = Edge;

    fn target_id(&self) -> &str {
        self.id()
    }

    fn as_add(&self) -> Option<(&Edge, Option<usize>)> {
        match self {
            EdgeChange::Add { item, index } => Some((item, *index)),
            _ => None,
        }
    }

    fn is_exclusive(&self) -> bool {
        matches!(self, EdgeChange::Remove { .. } | EdgeChange::Replace { .. })
    }

    fn replacement(&self) -> Option<&Edge> {
        match self {
            EdgeChange::Replace { item, .. } => Some(item),
            _ => None,
        }
    }

    fn apply_to(&self, edge: &mut Edge) {
        if let EdgeChange::Select { selected, .. } = self {
            edge.selected = *selected;
        }
    }
}

trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Node {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Edge {
    fn key(&self) -> &str {
        &self.id
    }
}

fn apply_changes<C>(changes: &[C], elements: &[Arc<C::Item>]) -> Vec<Arc<C::Item>>
where
    C: ChangeRecord,
    C::Item: Keyed,
{
    let mut by_id: IndexMap<&str, Vec<&C>> = IndexMap::new();
    let mut additions = Vec::new();

    for change in changes {
        if let Some(add) = change.as_add() {
            additions.push(add);
            continue;
        }
        let queued = by_id.entry(change.target_id()).or_default();
        if change.is_exclusive() {
            *queued = vec![change];
        } else if !queued.first().is_some_and(|c| c.is_exclusive()) {
            queued.push(change);
        }
    }

    let mut updated = Vec::with_capacity(elements.len() + additions.len());
    for element in elements {
        let Some(queued) = by_id.get(element.key()) else {
            updated.push(element.clone());
            continue;
        };
        let first = queued[0];
        if first.is_exclusive() {
            if let Some(item) = first.replacement() {
                updated.push(Arc::new(item.clone()));
            }
            continue;
        }
        let mut item = (**element).clone();
        for change in queued {
            change.apply_to(&mut item);
        }
        updated.push(Arc::new(item));
    }

    for (item, index) in additions {
        let item = Arc::new(item.clone());
        match index {
            Some(index) if index <= updated.len() => updated.insert(index, item),
            _ => updated.push(item),
        }
    }

    updated
}

/// Fold node changes into a node list. Untouched nodes keep their `Arc`.
pub fn apply_node_changes(changes: &[NodeChange], nodes: &[Arc<Node>]) -> Vec<Arc<Node>> {
    apply_changes(changes, nodes)
}

/// Fold edge changes into an edge list. Untouched edges keep their `Arc`.
pub fn apply_edge_changes(changes: &[EdgeChange], edges: &[Arc<Edge>]) -> Vec<Arc<Edge>> {
    apply_changes(changes, edges)
}
