//! Spatial Index Module
//!
//! R-tree over the absolute node rects. The engine rebuilds it after every
//! resolution pass that changed something; the handle engine uses it to
//! collect the nodes near the pointer without scanning the whole flow.

use crate::geometry::{Rect, XYPosition};
use rstar::{AABB, RTree, RTreeObject};

/// A node's absolute bounding box.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub node_id: String,
    pub rect: Rect,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.x, self.rect.y],
            [self.rect.right(), self.rect.bottom()],
        )
    }
}

/// Proximity lookup over visible nodes.
#[derive(Default)]
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index with `items`.
    pub fn rebuild<'a, I>(&mut self, items: I)
    where
        I: Iterator<Item = (&'a str, Rect)>,
    {
        let entries: Vec<SpatialEntry> = items
            .map(|(id, rect)| SpatialEntry {
                node_id: id.to_string(),
                rect,
            })
            .collect();
        self.tree = RTree::bulk_load(entries);
    }

    /// Nodes whose rect contains `point`, edges included.
    pub fn query_point(&self, point: XYPosition) -> Vec<&str> {
        let envelope = AABB::from_point([point.x, point.y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| entry.rect.contains_point(point))
            .map(|entry| entry.node_id.as_str())
            .collect()
    }

    /// Nodes whose rect intersects `rect`.
    pub fn query_rect(&self, rect: Rect) -> Vec<&str> {
        let envelope = AABB::from_corners([rect.x, rect.y], [rect.right(), rect.bottom()]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.node_id.as_str())
            .collect()
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.tree.size())
            .finish()
    }
}
