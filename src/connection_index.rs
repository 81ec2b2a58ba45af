//! Connection index
//!
//! Bidirectional lookup of edges by endpoint. Every edge is registered from
//! both of its endpoints at three scopes: the node, the node plus role, and
//! the node plus role plus handle id. The index is rebuilt from scratch
//! whenever the edge set changes.

use crate::error::{EngineError, ErrorReporter};
use crate::types::{Edge, EdgeId, HandleId, HandleType, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// One edge as seen from one of its endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleConnection {
    pub edge_id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<HandleId>,
    pub target_handle: Option<HandleId>,
}

impl HandleConnection {
    fn from_edge(edge: &Edge) -> Self {
        Self {
            edge_id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            source_handle: edge.source_handle.clone(),
            target_handle: edge.target_handle.clone(),
        }
    }
}

/// Lookup granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScopeKey {
    Node(NodeId),
    Role(NodeId, HandleType),
    Handle(NodeId, HandleType, HandleId),
}

/// Connections keyed by edge id, in edge order.
pub type ConnectionMap = IndexMap<EdgeId, HandleConnection>;

/// Edge lookup by id plus the endpoint-scoped connection lookup.
#[derive(Debug, Default)]
pub struct ConnectionIndex {
    scopes: HashMap<ScopeKey, ConnectionMap>,
    edges: IndexMap<EdgeId, Arc<Edge>>,
}

impl ConnectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over `edges`.
    pub fn from_edges(edges: &[Arc<Edge>], reporter: &mut ErrorReporter) -> Self {
        let mut index = Self::new();
        index.rebuild(edges, reporter);
        index
    }

    /// Clear and re-register every edge. Edges without a source or target are
    /// reported and skipped.
    pub fn rebuild(&mut self, edges: &[Arc<Edge>], reporter: &mut ErrorReporter) {
        self.scopes.clear();
        self.edges.clear();

        for edge in edges {
            if edge.source.is_empty() || edge.target.is_empty() {
                reporter.report(EngineError::IncompleteEdge {
                    edge_id: edge.id.clone(),
                });
                continue;
            }

            let connection = HandleConnection::from_edge(edge);
            self.register(
                HandleType::Source,
                &connection,
                &edge.source,
                edge.source_handle.as_deref(),
            );
            self.register(
                HandleType::Target,
                &connection,
                &edge.target,
                edge.target_handle.as_deref(),
            );
            self.edges.insert(edge.id.clone(), edge.clone());
        }

        trace!(edges = self.edges.len(), scopes = self.scopes.len(), "Connection index rebuilt");
    }

    fn register(
        &mut self,
        handle_type: HandleType,
        connection: &HandleConnection,
        node_id: &str,
        handle_id: Option<&str>,
    ) {
        let mut keys = vec![
            ScopeKey::Node(node_id.to_string()),
            ScopeKey::Role(node_id.to_string(), handle_type),
        ];
        if let Some(handle_id) = handle_id {
            keys.push(ScopeKey::Handle(
                node_id.to_string(),
                handle_type,
                handle_id.to_string(),
            ));
        }
        for key in keys {
            self.scopes
                .entry(key)
                .or_default()
                .insert(connection.edge_id.clone(), connection.clone());
        }
    }

    /// All connections touching `node_id`.
    pub fn by_node(&self, node_id: &str) -> Option<&ConnectionMap> {
        self.scopes.get(&ScopeKey::Node(node_id.to_string()))
    }

    /// Connections where `node_id` plays `handle_type`.
    pub fn by_role(&self, node_id: &str, handle_type: HandleType) -> Option<&ConnectionMap> {
        self.scopes
            .get(&ScopeKey::Role(node_id.to_string(), handle_type))
    }

    /// Connections attached to one handle of `node_id`.
    pub fn by_handle(
        &self,
        node_id: &str,
        handle_type: HandleType,
        handle_id: &str,
    ) -> Option<&ConnectionMap> {
        self.scopes.get(&ScopeKey::Handle(
            node_id.to_string(),
            handle_type,
            handle_id.to_string(),
        ))
    }

    /// Scope chosen by which arguments are present.
    pub fn query(
        &self,
        node_id: &str,
        handle_type: Option<HandleType>,
        handle_id: Option<&str>,
    ) -> Option<&ConnectionMap> {
        match (handle_type, handle_id) {
            (None, _) => self.by_node(node_id),
            (Some(t), None) => self.by_role(node_id, t),
            (Some(t), Some(h)) => self.by_handle(node_id, t, h),
        }
    }

    pub fn edge(&self, edge_id: &str) -> Option<&Arc<Edge>> {
        self.edges.get(edge_id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Arc<Edge>> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
