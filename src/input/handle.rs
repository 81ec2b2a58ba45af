//! Connection gesture: handle targeting and validity.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Tracking       (pointer down on a handle)
//! Tracking -> Tracking   (pointer move: closest handle + validity)
//! Tracking -> Idle       (pointer up: connect when valid, always end)
//! ```
//!
//! Validity is tri-state while tracking: unknown when no handle is in range,
//! valid or invalid once a handle is targeted.

use super::autopan::AutoPan;
use crate::config::ConnectionMode;
use crate::constants::CONNECTION_SEARCH_MARGIN;
use crate::geometry::{Rect, XYPosition};
use crate::resolver::NodeResolver;
use crate::spatial_index::SpatialIndex;
use crate::types::{Connection, EdgeId, Handle, HandleType, NodeId, Position};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Caller-supplied connection predicate.
pub type ConnectionValidator = Box<dyn FnMut(&Connection) -> bool>;

/// Look up a handle of `node_id`.
///
/// In strict mode only handles of `handle_type` are searched; loose mode
/// searches both roles. With `absolute`, `x`/`y` become the handle's centre
/// in flow space.
pub fn get_handle(
    resolver: &NodeResolver,
    node_id: &str,
    handle_type: HandleType,
    handle_id: Option<&str>,
    mode: ConnectionMode,
    absolute: bool,
) -> Option<Handle> {
    let node = resolver.get(node_id)?;
    let bounds = node.internals.handle_bounds.as_ref()?;
    let handle = match mode {
        ConnectionMode::Strict => bounds.find(handle_type, handle_id),
        ConnectionMode::Loose => match handle_id {
            Some(id) => bounds.iter().find(|h| h.id.as_deref() == Some(id)),
            None => bounds.iter().next(),
        },
    }?;

    let mut handle = handle.clone();
    if absolute {
        let center = node.handle_position(&handle, true);
        handle.x = center.x;
        handle.y = center.y;
    }
    Some(handle)
}

/// Nodes whose rect touches the search window around `position`.
fn nodes_near<'a>(spatial: &'a SpatialIndex, position: XYPosition, distance: f64) -> Vec<&'a str> {
    let window = Rect::new(
        position.x - distance,
        position.y - distance,
        distance * 2.0,
        distance * 2.0,
    );
    spatial.query_rect(window)
}

/// Closest handle within `radius` of `position`, excluding `from`.
///
/// Ties prefer a handle of the opposite role. The returned handle carries its
/// absolute centre in `x`/`y`.
pub fn closest_handle(
    resolver: &NodeResolver,
    spatial: &SpatialIndex,
    position: XYPosition,
    radius: f64,
    from: &Handle,
) -> Option<Handle> {
    let mut closest: Vec<Handle> = Vec::new();
    let mut min_distance = f64::INFINITY;

    for node_id in nodes_near(spatial, position, radius + CONNECTION_SEARCH_MARGIN) {
        let Some(node) = resolver.get(node_id) else {
            continue;
        };
        let Some(bounds) = node.internals.handle_bounds.as_ref() else {
            continue;
        };
        for handle in bounds.iter() {
            if handle.same_handle(from) {
                continue;
            }
            let center = node.handle_position(handle, true);
            let distance = center.distance_to(position);
            if distance > radius {
                continue;
            }
            let absolute = Handle {
                x: center.x,
                y: center.y,
                ..handle.clone()
            };
            if distance < min_distance {
                closest = vec![absolute];
                min_distance = distance;
            } else if distance == min_distance {
                closest.push(absolute);
            }
        }
    }

    if closest.len() > 1 {
        let opposite = from.handle_type.opposite();
        if let Some(index) = closest.iter().position(|h| h.handle_type == opposite) {
            return Some(closest.swap_remove(index));
        }
    }
    closest.into_iter().next()
}

/// Handle whose rect contains `position`, with its absolute centre.
pub fn handle_at(resolver: &NodeResolver, spatial: &SpatialIndex, position: XYPosition) -> Option<Handle> {
    for node_id in spatial.query_point(position) {
        let Some(node) = resolver.get(node_id) else {
            continue;
        };
        let Some(bounds) = node.internals.handle_bounds.as_ref() else {
            continue;
        };
        if let Some(handle) = bounds
            .iter()
            .find(|h| node.handle_rect(h).contains_point(position))
        {
            let center = node.handle_position(handle, true);
            return Some(Handle {
                x: center.x,
                y: center.y,
                ..handle.clone()
            });
        }
    }
    None
}

/// Outcome of checking one candidate handle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandleCheck {
    pub is_valid: bool,
    pub connection: Option<Connection>,
    pub to_handle: Option<Handle>,
}

/// Whether a connection from `from` may end at `candidate`.
///
/// The candidate must accept incoming connections, the role pairing must fit
/// `mode` (strict: opposite roles only; loose: anything but the start handle),
/// and `validator` must accept the normalised connection.
pub fn is_valid_handle(
    resolver: &NodeResolver,
    candidate: Option<&Handle>,
    from: &Handle,
    mode: ConnectionMode,
    nodes_connectable: bool,
    validator: &mut dyn FnMut(&Connection) -> bool,
) -> HandleCheck {
    let Some(candidate) = candidate else {
        return HandleCheck::default();
    };
    let from_is_target = from.handle_type == HandleType::Target;
    let connection = if from_is_target {
        Connection {
            source: candidate.node_id.clone(),
            source_handle: candidate.id.clone(),
            target: from.node_id.clone(),
            target_handle: from.id.clone(),
        }
    } else {
        Connection {
            source: from.node_id.clone(),
            source_handle: from.id.clone(),
            target: candidate.node_id.clone(),
            target_handle: candidate.id.clone(),
        }
    };

    let node_connectable = resolver
        .get(&candidate.node_id)
        .is_some_and(|n| n.is_connectable(nodes_connectable));
    let connectable = node_connectable && candidate.connectable && candidate.connectable_end;
    let role_ok = match mode {
        ConnectionMode::Strict => candidate.handle_type != from.handle_type,
        ConnectionMode::Loose => candidate.node_id != from.node_id || candidate.id != from.id,
    };
    let is_valid = connectable && role_ok && validator(&connection);

    let to_handle = get_handle(
        resolver,
        &candidate.node_id,
        candidate.handle_type,
        candidate.id.as_deref(),
        mode,
        true,
    );
    HandleCheck {
        is_valid,
        connection: Some(connection),
        to_handle,
    }
}

/// Tri-state validity: unknown when no handle is in range.
pub fn connection_validity(inside_radius: bool, handle_valid: bool) -> Option<bool> {
    if handle_valid {
        Some(true)
    } else if inside_radius {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    None,
    Valid,
    Invalid,
}

/// Snapshot of an in-progress connection. Points are in flow space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub in_progress: bool,
    pub is_valid: Option<bool>,
    pub from: XYPosition,
    pub from_handle: Handle,
    pub from_position: Position,
    pub from_node: NodeId,
    pub to: XYPosition,
    pub to_handle: Option<Handle>,
    pub to_position: Position,
    pub to_node: Option<NodeId>,
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self.is_valid {
            None => ConnectionStatus::None,
            Some(true) => ConnectionStatus::Valid,
            Some(false) => ConnectionStatus::Invalid,
        }
    }
}

/// Connection state handed to the host when the gesture ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalConnectionState {
    pub is_valid: Option<bool>,
    pub from: XYPosition,
    pub from_handle: Handle,
    pub from_position: Position,
    pub from_node: NodeId,
    pub to: XYPosition,
    pub to_handle: Option<Handle>,
    /// Side of the reached handle; None when no handle was reached.
    pub to_position: Option<Position>,
    pub to_node: Option<NodeId>,
}

impl From<ConnectionState> for FinalConnectionState {
    fn from(state: ConnectionState) -> Self {
        let to_position = state.to_handle.as_ref().map(|_| state.to_position);
        Self {
            is_valid: state.is_valid,
            from: state.from,
            from_handle: state.from_handle,
            from_position: state.from_position,
            from_node: state.from_node,
            to: state.to,
            to_handle: state.to_handle,
            to_position,
            to_node: state.to_node,
        }
    }
}

/// Everything the targeting step reads.
pub struct TargetContext<'a> {
    pub resolver: &'a NodeResolver,
    pub spatial: &'a SpatialIndex,
    pub mode: ConnectionMode,
    pub radius: f64,
    pub nodes_connectable: bool,
}

/// Per-pointer connection state.
#[derive(Debug, Clone)]
pub struct ConnectionGesture {
    pub state: ConnectionState,
    /// Screen position at pointer-down.
    pub start_screen: XYPosition,
    /// Connection to create if the pointer is released now.
    pub connection: Option<Connection>,
    /// Edge being rewired, if this gesture started on an edge end.
    pub reconnecting: Option<EdgeId>,
    pub auto_pan: AutoPan,
}

impl ConnectionGesture {
    /// Begin at a handle. Returns None when the handle does not exist or does
    /// not allow starting a connection.
    pub fn start(
        resolver: &NodeResolver,
        from: (&str, HandleType, Option<&str>),
        mode: ConnectionMode,
        screen: XYPosition,
        reconnecting: Option<EdgeId>,
    ) -> Option<Self> {
        let (node_id, handle_type, handle_id) = from;
        let handle = get_handle(resolver, node_id, handle_type, handle_id, mode, false)?;
        if reconnecting.is_none() && !(handle.connectable && handle.connectable_start) {
            debug!(node_id, ?handle_id, "Handle does not start connections");
            return None;
        }
        let node = resolver.get(node_id)?;
        let from_point = node.handle_position(&handle, true);
        let from_position = handle.position;

        debug!(node_id, ?handle_type, ?handle_id, "Connection started");
        Some(Self {
            state: ConnectionState {
                in_progress: true,
                is_valid: None,
                from: from_point,
                from_handle: handle,
                from_position,
                from_node: node_id.to_string(),
                to: from_point,
                to_handle: None,
                to_position: from_position.opposite(),
                to_node: None,
            },
            start_screen: screen,
            connection: None,
            reconnecting,
            auto_pan: AutoPan::new(screen, false),
        })
    }

    /// Retarget for a pointer at `pointer` (flow space). Returns whether the
    /// visible state changed.
    pub fn update(
        &mut self,
        ctx: &TargetContext<'_>,
        pointer: XYPosition,
        validator: &mut dyn FnMut(&Connection) -> bool,
    ) -> bool {
        let from = &self.state.from_handle;
        let closest = closest_handle(ctx.resolver, ctx.spatial, pointer, ctx.radius, from);
        let under_pointer = handle_at(ctx.resolver, ctx.spatial, pointer).filter(|h| !h.same_handle(from));
        let candidate = under_pointer.or(closest);

        let check = is_valid_handle(
            ctx.resolver,
            candidate.as_ref(),
            from,
            ctx.mode,
            ctx.nodes_connectable,
            validator,
        );
        let is_valid = connection_validity(candidate.is_some(), check.is_valid);
        self.connection = check.connection.filter(|_| check.is_valid);

        let to_handle = check.to_handle;
        let (to, to_position) = match to_handle.as_ref() {
            Some(h) if is_valid == Some(true) => (XYPosition::new(h.x, h.y), h.position),
            _ => (pointer, self.state.from_position.opposite()),
        };

        let next = ConnectionState {
            is_valid,
            to,
            to_node: to_handle.as_ref().map(|h| h.node_id.clone()),
            to_handle,
            to_position,
            ..self.state.clone()
        };
        if next == self.state {
            return false;
        }
        trace!(status = ?next.status(), "Connection retargeted");
        self.state = next;
        true
    }

    /// End the gesture. Yields the connection to create, if valid, and the
    /// final state.
    pub fn finish(self) -> (Option<Connection>, FinalConnectionState) {
        let connection = self.connection.filter(|_| self.state.is_valid == Some(true));
        debug!(connected = connection.is_some(), "Connection ended");
        (connection, self.state.into())
    }
}
