//! The engine context.
//!
//! [`Engine`] owns the resolved node lookup, the edge index, the viewport and
//! one gesture per active pointer. The host pushes data and input into it and
//! pulls two outboxes back out: node change records (to apply to its own
//! node list) and [`EngineEvent`]s (callbacks it would otherwise register).
//!
//! ## Flow
//!
//! ```text
//! set_nodes / set_edges / set_config      -> mark the resolver dirty
//! pointer_down / move / up, wheel, pinch  -> gestures, viewport
//! frame(now)                              -> transition + auto-pan
//! take_node_changes / take_events         -> host applies and reacts
//! ```
//!
//! Resolution is lazy: any number of data updates between two reads cost a
//! single resolution pass.

use crate::changes::{NodeChange, apply_node_changes};
use crate::config::{EngineConfig, Padding, ResizeParams};
use crate::connection_index::{ConnectionIndex, ConnectionMap};
use crate::constants::ZOOM_STEP;
use crate::error::{EngineError, EngineResult, ErrorReporter};
use crate::geometry::{Dimensions, Rect, XYPosition};
use crate::graph;
use crate::input::drag::{DragGesture, nudge_updates, pointer_position};
use crate::input::handle::{
    ConnectionGesture, ConnectionValidator, TargetContext, get_handle, is_valid_handle,
};
use crate::input::resize::ResizeGesture;
use crate::input::{
    ConnectionState, ControlPosition, FinalConnectionState, GestureState, NudgeDirection, PanGesture,
    PinchEvent, PointerEvent, PointerId, ResizeValues,
};
use crate::perf::FrameMonitor;
use crate::profile_scope;
use crate::resolver::{MeasurementProvider, NodeResolver, NodeUpdate, ResolveOptions};
use crate::spatial_index::SpatialIndex;
use crate::types::{Connection, Edge, EdgeId, Handle, HandleId, HandleType, InternalNode, Node, NodeId};
use crate::viewport::{PanZoom, Transform, Viewport, WheelEvent, flow_to_screen, screen_to_flow, viewport_for_bounds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Veto for a resize step: gets the next values and the resize direction.
pub type ResizeFilter = Box<dyn FnMut(&ResizeValues, [i8; 2]) -> bool>;

/// Notifications for the host, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    NodeDragStart {
        node: Option<Node>,
        nodes: Vec<Node>,
    },
    NodeDrag {
        node: Option<Node>,
        nodes: Vec<Node>,
    },
    NodeDragStop {
        node: Option<Node>,
        nodes: Vec<Node>,
    },
    /// Pointer went down and up on a node without starting a drag.
    NodeClick {
        node_id: NodeId,
    },
    /// Pointer went down and up on the pane without panning. Flow space.
    PaneClick {
        position: XYPosition,
    },
    ResizeStart {
        node_id: NodeId,
        params: ResizeValues,
    },
    Resize {
        node_id: NodeId,
        params: ResizeValues,
        direction: [i8; 2],
    },
    ResizeEnd {
        node_id: NodeId,
        params: ResizeValues,
    },
    ConnectStart {
        node_id: NodeId,
        handle_id: Option<HandleId>,
        handle_type: HandleType,
    },
    ConnectionUpdate {
        state: ConnectionState,
    },
    Connect {
        connection: Connection,
    },
    Reconnect {
        edge_id: EdgeId,
        connection: Connection,
    },
    ConnectEnd {
        state: FinalConnectionState,
    },
    ReconnectEnd {
        edge_id: EdgeId,
        state: FinalConnectionState,
    },
    ViewportChange {
        viewport: Viewport,
    },
    PanZoomStart {
        viewport: Viewport,
    },
    PanZoomEnd {
        viewport: Viewport,
    },
}

/// Options for [`Engine::fit_view`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FitViewOptions {
    pub padding: Padding,
    pub include_hidden_nodes: bool,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    /// Animate over this many milliseconds.
    pub duration: Option<u64>,
    /// Fit only these nodes.
    pub nodes: Option<Vec<NodeId>>,
}

/// Interaction engine for one flow.
pub struct Engine {
    config: EngineConfig,
    resolve_options: ResolveOptions,
    reporter: ErrorReporter,
    resolver: NodeResolver,
    edges: Vec<Arc<Edge>>,
    connections: ConnectionIndex,
    panzoom: PanZoom,
    spatial: SpatialIndex,
    gestures: BTreeMap<PointerId, GestureState>,
    /// First handle of a click-to-connect pair.
    click_start: Option<Handle>,
    validator: Option<ConnectionValidator>,
    should_resize: Option<ResizeFilter>,
    node_changes: Vec<NodeChange>,
    events: Vec<EngineEvent>,
    frame_monitor: FrameMonitor,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("nodes", &self.resolver.len())
            .field("edges", &self.edges.len())
            .field("viewport", &self.panzoom.viewport())
            .field("gestures", &self.gestures)
            .field("pending_changes", &self.node_changes.len())
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_reporter(config, ErrorReporter::new())
    }

    /// Create an engine that reports errors through `reporter`. The config is
    /// validated first, so its own problems reach the reporter too.
    pub fn with_reporter(config: EngineConfig, mut reporter: ErrorReporter) -> Self {
        let config = config.validated(&mut reporter);
        info!(
            min_zoom = config.min_zoom,
            max_zoom = config.max_zoom,
            mode = ?config.connection_mode,
            "Engine created"
        );
        Self {
            resolve_options: ResolveOptions::from_config(&config),
            panzoom: PanZoom::new(&config, Viewport::default()),
            config,
            reporter,
            resolver: NodeResolver::new(),
            edges: Vec::new(),
            connections: ConnectionIndex::new(),
            spatial: SpatialIndex::new(),
            gestures: BTreeMap::new(),
            click_start: None,
            validator: None,
            should_resize: None,
            node_changes: Vec::new(),
            events: Vec::new(),
            frame_monitor: FrameMonitor::new(),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Route reported errors to `sink`.
    pub fn set_error_sink(&mut self, sink: impl FnMut(&EngineError) + 'static) {
        self.reporter.set_sink(Some(Box::new(sink)));
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration. Positions are re-resolved on the next read
    /// and the viewport is re-constrained right away.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config.validated(&mut self.reporter);
        self.resolve_options = ResolveOptions::from_config(&self.config);
        self.resolver.mark_dirty();

        let scale = self
            .panzoom
            .set_scale_extent(self.config.min_zoom, self.config.max_zoom);
        let translate = self
            .panzoom
            .set_translate_extent(self.config.translate_extent_or_infinite());
        self.emit_viewport(scale || translate);
        debug!("Engine config updated");
    }

    /// Custom check run on every candidate connection.
    pub fn set_connection_validator(&mut self, validator: impl FnMut(&Connection) -> bool + 'static) {
        self.validator = Some(Box::new(validator));
    }

    /// Custom veto run before each resize step is emitted.
    pub fn set_should_resize(&mut self, filter: impl FnMut(&ResizeValues, [i8; 2]) -> bool + 'static) {
        self.should_resize = Some(Box::new(filter));
    }

    // ========================================================================
    // Nodes and edges
    // ========================================================================

    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.set_node_arcs(nodes.into_iter().map(Arc::new).collect());
    }

    /// Replace the node list. Nodes whose `Arc` is unchanged keep their
    /// resolved entry.
    pub fn set_node_arcs(&mut self, nodes: Vec<Arc<Node>>) {
        trace!(count = nodes.len(), "Nodes replaced");
        self.resolver.set_nodes(nodes);
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        self.resolver.nodes()
    }

    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.set_edge_arcs(edges.into_iter().map(Arc::new).collect());
    }

    pub fn set_edge_arcs(&mut self, edges: Vec<Arc<Edge>>) {
        self.connections.rebuild(&edges, &mut self.reporter);
        self.edges = edges;
    }

    pub fn edges(&self) -> &[Arc<Edge>] {
        &self.edges
    }

    /// Add an edge for `connection` unless an identical one exists.
    pub fn add_edge(&mut self, connection: &Connection) -> EngineResult<()> {
        let edges = graph::add_edge(connection, &self.edges)?;
        self.set_edge_arcs(edges);
        Ok(())
    }

    /// Rewire `edge_id` to `connection`.
    pub fn reconnect_edge(&mut self, edge_id: &str, connection: &Connection, replace_id: bool) -> EngineResult<()> {
        let edges = graph::reconnect_edge(edge_id, connection, &self.edges, replace_id)?;
        self.set_edge_arcs(edges);
        Ok(())
    }

    /// Resolved entry for `node_id`.
    pub fn internal_node(&mut self, node_id: &str) -> Option<Arc<InternalNode>> {
        self.sync();
        self.resolver.get(node_id).cloned()
    }

    /// The resolved lookup, brought up to date first.
    pub fn resolver(&mut self) -> &NodeResolver {
        self.sync();
        &self.resolver
    }

    pub fn connection_index(&self) -> &ConnectionIndex {
        &self.connections
    }

    /// Edges at `node_id`, optionally narrowed to one role and handle.
    pub fn connections(
        &self,
        node_id: &str,
        handle_type: Option<HandleType>,
        handle_id: Option<&str>,
    ) -> Option<&ConnectionMap> {
        self.connections.query(node_id, handle_type, handle_id)
    }

    /// Feed measurements for `updates` from `provider`. The resulting
    /// dimension changes join the change outbox.
    pub fn update_node_internals(&mut self, updates: &[NodeUpdate], provider: &mut dyn MeasurementProvider) {
        profile_scope!("update_node_internals");
        let changes =
            self.resolver
                .update_node_internals(updates, provider, &self.resolve_options, &mut self.reporter);
        self.rebuild_spatial();
        self.node_changes.extend(changes);
    }

    /// Drain the pending node change records.
    pub fn take_node_changes(&mut self) -> Vec<NodeChange> {
        std::mem::take(&mut self.node_changes)
    }

    /// Apply the pending node changes to the engine's own node list, as a host
    /// holding no separate copy would. Returns the applied changes.
    pub fn apply_pending_changes(&mut self) -> Vec<NodeChange> {
        let changes = self.take_node_changes();
        if !changes.is_empty() {
            let next = apply_node_changes(&changes, self.resolver.nodes());
            self.resolver.set_nodes(next);
        }
        changes
    }

    /// Drain the pending events.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run a resolution pass if anything changed since the last one.
    fn sync(&mut self) {
        if self.resolver.ensure_resolved(&self.resolve_options, &mut self.reporter) {
            self.rebuild_spatial();
            self.abort_stale_gestures();
        }
    }

    fn rebuild_spatial(&mut self) {
        self.spatial.rebuild(
            self.resolver
                .iter()
                .filter(|node| !node.user_node.hidden)
                .map(|node| (node.id(), node.rect())),
        );
    }

    // ========================================================================
    // Viewport
    // ========================================================================

    pub fn viewport(&self) -> Viewport {
        self.panzoom.viewport()
    }

    pub fn transform(&self) -> Transform {
        self.panzoom.transform()
    }

    pub fn container(&self) -> Dimensions {
        self.panzoom.container()
    }

    /// Whether the host should keep calling [`Engine::frame`].
    pub fn needs_frame(&self) -> bool {
        self.panzoom.is_animating() || self.gestures.values().any(GestureState::wants_auto_pan)
    }

    fn emit_viewport(&mut self, changed: bool) -> bool {
        if changed {
            let viewport = self.panzoom.viewport();
            trace!(?viewport, "Viewport changed");
            self.events.push(EngineEvent::ViewportChange { viewport });
        }
        changed
    }

    pub fn set_container_size(&mut self, size: Dimensions) -> bool {
        let changed = self.panzoom.set_container_size(size);
        self.emit_viewport(changed)
    }

    /// Move to `viewport`, animated when `duration` is non-zero. Returns
    /// whether the viewport changed immediately.
    pub fn set_viewport(&mut self, viewport: Viewport, duration: Option<Duration>) -> bool {
        let changed = self.panzoom.set_viewport(viewport, duration);
        self.emit_viewport(changed)
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, delta: XYPosition) -> bool {
        let changed = self.panzoom.pan_by(delta);
        self.emit_viewport(changed)
    }

    pub fn zoom_in(&mut self, duration: Option<Duration>) -> bool {
        self.scale_by(ZOOM_STEP, duration)
    }

    pub fn zoom_out(&mut self, duration: Option<Duration>) -> bool {
        self.scale_by(1.0 / ZOOM_STEP, duration)
    }

    pub fn zoom_to(&mut self, zoom: f64, duration: Option<Duration>) -> bool {
        let changed = self.panzoom.scale_to(zoom, duration);
        self.emit_viewport(changed)
    }

    pub fn scale_by(&mut self, factor: f64, duration: Option<Duration>) -> bool {
        let changed = self.panzoom.scale_by(factor, duration);
        self.emit_viewport(changed)
    }

    /// Fit the listed nodes (or every visible one) into the container.
    /// Returns false when there is nothing to fit or no container yet.
    pub fn fit_view(&mut self, options: &FitViewOptions) -> bool {
        self.sync();
        let container = self.panzoom.container();
        if container.width <= 0.0 || container.height <= 0.0 {
            debug!("Fit view skipped, container has no size");
            return false;
        }

        let nodes: Vec<&Arc<InternalNode>> = self
            .resolver
            .iter()
            .filter(|node| options.include_hidden_nodes || !node.user_node.hidden)
            .filter(|node| {
                options
                    .nodes
                    .as_ref()
                    .is_none_or(|ids| ids.iter().any(|id| id == node.id()))
            })
            .collect();
        if nodes.is_empty() {
            debug!("Fit view skipped, no nodes");
            return false;
        }

        let bounds = graph::nodes_bounds(nodes);
        let min_zoom = options.min_zoom.unwrap_or(self.panzoom.min_zoom());
        let max_zoom = options.max_zoom.unwrap_or(self.panzoom.max_zoom());
        let viewport = viewport_for_bounds(
            bounds,
            container.width,
            container.height,
            min_zoom,
            max_zoom,
            &options.padding,
            &mut self.reporter,
        );
        debug!(?bounds, ?viewport, "Fit view");
        self.set_viewport(viewport, options.duration.map(Duration::from_millis))
    }

    /// Flow position of a screen point, snapped to the grid when `snap`.
    pub fn screen_to_flow(&self, position: XYPosition, snap: bool) -> XYPosition {
        let grid = (snap && self.config.snap_to_grid).then_some(self.config.snap_grid);
        screen_to_flow(position, &self.panzoom.transform(), grid)
    }

    pub fn flow_to_screen(&self, position: XYPosition) -> XYPosition {
        flow_to_screen(position, &self.panzoom.transform())
    }

    pub fn wheel(&mut self, event: &WheelEvent) -> bool {
        let changed = self.panzoom.wheel(event, &self.config);
        self.emit_viewport(changed)
    }

    /// Touch pinch: zoom by `scale` around the pinch centre.
    pub fn pinch(&mut self, event: &PinchEvent) -> bool {
        if !self.config.zoom_on_pinch {
            return false;
        }
        let zoom = self.panzoom.transform().k * event.scale;
        let changed = self.panzoom.zoom_at(zoom, event.center);
        self.emit_viewport(changed)
    }

    // ========================================================================
    // Gestures
    // ========================================================================

    /// Active gesture of `pointer_id`.
    pub fn gesture(&self, pointer_id: PointerId) -> Option<&GestureState> {
        self.gestures.get(&pointer_id)
    }

    /// In-progress connection of `pointer_id`.
    pub fn connection_state(&self, pointer_id: PointerId) -> Option<&ConnectionState> {
        match self.gestures.get(&pointer_id) {
            Some(GestureState::Connect(connect)) => Some(&connect.state),
            _ => None,
        }
    }

    /// A second touch point turns the interaction into a pinch.
    fn second_touch(&mut self, event: &PointerEvent) -> bool {
        if event.is_multi_touch() {
            debug!(touches = event.active_touches, "Multi-touch, aborting gestures");
            self.cancel_all();
            return true;
        }
        false
    }

    /// Pointer down on a node. The drag begins once the pointer moves past
    /// the drag threshold.
    pub fn begin_node_drag(&mut self, event: &PointerEvent, node_id: &str) -> EngineResult<()> {
        self.sync();
        if self.second_touch(event) {
            return Ok(());
        }
        if !self.resolver.contains(node_id) {
            return Err(EngineError::UnknownNode {
                node_id: node_id.to_string(),
            });
        }

        self.panzoom.cancel_transition();
        let pointer = pointer_position(event.position, &self.panzoom.transform(), &self.config);
        let mut drag = DragGesture::new(node_id, pointer, event.position, true);
        if self.config.node_drag_threshold == 0.0 {
            self.start_drag(&mut drag, pointer, event.multi_select);
        }
        self.gestures.insert(event.pointer_id, GestureState::NodeDrag(drag));
        Ok(())
    }

    /// Select the dragged node if needed. Returns whether other selected nodes
    /// come along.
    fn select_for_drag(&mut self, node_id: &str, multi_select: bool) -> bool {
        let Some(node) = self.resolver.get(node_id) else {
            return true;
        };
        if node.user_node.selected || !self.config.select_nodes_on_drag || !node.is_selectable() {
            return true;
        }
        if !multi_select {
            for other in self.resolver.iter().filter(|n| n.user_node.selected) {
                self.node_changes.push(NodeChange::Select {
                    id: other.id().to_string(),
                    selected: false,
                });
            }
        }
        self.node_changes.push(NodeChange::Select {
            id: node_id.to_string(),
            selected: true,
        });
        multi_select
    }

    fn start_drag(&mut self, drag: &mut DragGesture, pointer: XYPosition, multi_select: bool) {
        drag.include_selected = self.select_for_drag(&drag.node_id, multi_select);
        if !drag.start(&self.resolver, &self.config, pointer) {
            debug!(node_id = %drag.node_id, "Nothing to drag");
            return;
        }
        let (node, nodes) = drag.snapshot(&self.resolver, true);
        self.events.push(EngineEvent::NodeDragStart { node, nodes });
    }

    fn update_drag(&mut self, drag: &mut DragGesture, pointer: XYPosition) {
        let Some(updates) = drag.update(&self.resolver, &self.config, pointer, &mut self.reporter) else {
            return;
        };
        let changes = self
            .resolver
            .position_changes(&updates, Some(true), self.config.node_origin);
        self.node_changes.extend(changes);
        let (node, nodes) = drag.snapshot(&self.resolver, true);
        self.events.push(EngineEvent::NodeDrag { node, nodes });
    }

    /// Pointer down on a resize control of `node_id`.
    pub fn begin_resize(
        &mut self,
        event: &PointerEvent,
        node_id: &str,
        control: ControlPosition,
        params: ResizeParams,
    ) -> EngineResult<()> {
        self.sync();
        if self.second_touch(event) {
            return Ok(());
        }
        let params = params.validated(&mut self.reporter);
        let pointer = pointer_position(event.position, &self.panzoom.transform(), &self.config);
        let resize = ResizeGesture::start(
            &self.resolver,
            node_id,
            control,
            params,
            pointer,
            self.config.node_origin,
        )
        .inspect_err(|error| {
            if matches!(error, EngineError::NodeNotMeasured { .. }) {
                self.reporter.report(error.clone());
            }
        })?;

        self.events.push(EngineEvent::ResizeStart {
            node_id: node_id.to_string(),
            params: resize.values(),
        });
        self.gestures.insert(event.pointer_id, GestureState::Resize(resize));
        Ok(())
    }

    /// Pointer down on a handle.
    pub fn begin_connection(
        &mut self,
        event: &PointerEvent,
        node_id: &str,
        handle_type: HandleType,
        handle_id: Option<&str>,
    ) -> EngineResult<()> {
        self.sync();
        if self.second_touch(event) {
            return Ok(());
        }
        let node = self.resolver.get(node_id).ok_or_else(|| EngineError::UnknownNode {
            node_id: node_id.to_string(),
        })?;
        if !node.is_connectable(self.config.nodes_connectable) {
            debug!(node_id, "Node is not connectable");
            return Ok(());
        }
        self.start_connection(event, node_id, handle_type, handle_id, None)
    }

    /// Pointer down on the `end` of edge `edge_id`. The connection line starts
    /// at the opposite end, which stays put.
    pub fn begin_reconnect(&mut self, event: &PointerEvent, edge_id: &str, end: HandleType) -> EngineResult<()> {
        self.sync();
        if self.second_touch(event) {
            return Ok(());
        }
        let edge = self
            .connections
            .edge(edge_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownEdge {
                edge_id: edge_id.to_string(),
            })?;

        let (node_id, handle_id, from_type) = match end {
            HandleType::Source => (&edge.target, edge.target_handle.as_deref(), HandleType::Target),
            HandleType::Target => (&edge.source, edge.source_handle.as_deref(), HandleType::Source),
        };
        self.start_connection(event, node_id, from_type, handle_id, Some(edge_id.to_string()))
    }

    fn start_connection(
        &mut self,
        event: &PointerEvent,
        node_id: &str,
        handle_type: HandleType,
        handle_id: Option<&str>,
        reconnecting: Option<EdgeId>,
    ) -> EngineResult<()> {
        let mode = self.config.connection_mode;
        if get_handle(&self.resolver, node_id, handle_type, handle_id, mode, false).is_none() {
            return Err(EngineError::MissingHandle {
                node_id: node_id.to_string(),
                handle_id: handle_id.map(str::to_string),
            });
        }
        let Some(mut connect) = ConnectionGesture::start(
            &self.resolver,
            (node_id, handle_type, handle_id),
            mode,
            event.position,
            reconnecting,
        ) else {
            return Ok(());
        };

        self.panzoom.cancel_transition();
        connect.auto_pan.enabled = self.config.auto_pan_on_connect;
        self.events.push(EngineEvent::ConnectStart {
            node_id: node_id.to_string(),
            handle_id: handle_id.map(str::to_string),
            handle_type,
        });
        self.events.push(EngineEvent::ConnectionUpdate {
            state: connect.state.clone(),
        });
        self.gestures.insert(event.pointer_id, GestureState::Connect(connect));
        Ok(())
    }

    fn retarget(&mut self, connect: &mut ConnectionGesture, pointer: XYPosition) {
        let ctx = TargetContext {
            resolver: &self.resolver,
            spatial: &self.spatial,
            mode: self.config.connection_mode,
            radius: self.config.connection_radius,
            nodes_connectable: self.config.nodes_connectable,
        };
        let changed = match self.validator.as_mut() {
            Some(validator) => connect.update(&ctx, pointer, &mut **validator),
            None => connect.update(&ctx, pointer, &mut |_| true),
        };
        if changed {
            self.events.push(EngineEvent::ConnectionUpdate {
                state: connect.state.clone(),
            });
        }
    }

    fn finish_connection(&mut self, connect: ConnectionGesture) {
        let reconnecting = connect.reconnecting.clone();
        let (connection, state) = connect.finish();
        if let Some(connection) = connection {
            self.events.push(match &reconnecting {
                Some(edge_id) => EngineEvent::Reconnect {
                    edge_id: edge_id.clone(),
                    connection,
                },
                None => EngineEvent::Connect { connection },
            });
        }
        self.events.push(EngineEvent::ConnectEnd { state: state.clone() });
        if let Some(edge_id) = reconnecting {
            self.events.push(EngineEvent::ReconnectEnd { edge_id, state });
        }
    }

    /// Click-to-connect: the first click picks the start handle, the second
    /// one completes (or rejects) the connection.
    pub fn click_connect(
        &mut self,
        node_id: &str,
        handle_type: HandleType,
        handle_id: Option<&str>,
    ) -> EngineResult<Option<Connection>> {
        self.sync();
        let mode = self.config.connection_mode;
        let handle = get_handle(&self.resolver, node_id, handle_type, handle_id, mode, false).ok_or_else(|| {
            EngineError::MissingHandle {
                node_id: node_id.to_string(),
                handle_id: handle_id.map(str::to_string),
            }
        })?;

        let Some(from) = self.click_start.take() else {
            let startable = handle.connectable
                && handle.connectable_start
                && self
                    .resolver
                    .get(node_id)
                    .is_some_and(|n| n.is_connectable(self.config.nodes_connectable));
            if startable {
                debug!(node_id, ?handle_id, "Click connection started");
                self.events.push(EngineEvent::ConnectStart {
                    node_id: node_id.to_string(),
                    handle_id: handle_id.map(str::to_string),
                    handle_type,
                });
                self.click_start = Some(handle);
            }
            return Ok(None);
        };

        let candidate = get_handle(&self.resolver, node_id, handle_type, handle_id, mode, true);
        let check = match self.validator.as_mut() {
            Some(validator) => is_valid_handle(
                &self.resolver,
                candidate.as_ref(),
                &from,
                mode,
                self.config.nodes_connectable,
                &mut **validator,
            ),
            None => is_valid_handle(
                &self.resolver,
                candidate.as_ref(),
                &from,
                mode,
                self.config.nodes_connectable,
                &mut |_| true,
            ),
        };
        let connection = check.connection.filter(|_| check.is_valid);

        let from_point = self
            .resolver
            .get(&from.node_id)
            .map_or_else(XYPosition::default, |n| n.handle_position(&from, true));
        let to_handle = check.to_handle;
        let state = FinalConnectionState {
            is_valid: Some(check.is_valid),
            from: from_point,
            from_position: from.position,
            from_node: from.node_id.clone(),
            to: to_handle
                .as_ref()
                .map_or(from_point, |h| XYPosition::new(h.x, h.y)),
            to_position: to_handle.as_ref().map(|h| h.position),
            to_node: to_handle.as_ref().map(|h| h.node_id.clone()),
            to_handle,
            from_handle: from,
        };

        if let Some(connection) = &connection {
            self.events.push(EngineEvent::Connect {
                connection: connection.clone(),
            });
        }
        self.events.push(EngineEvent::ConnectEnd { state });
        debug!(connected = connection.is_some(), "Click connection ended");
        Ok(connection)
    }

    /// Start handle of a pending click connection.
    pub fn click_connect_start(&self) -> Option<&Handle> {
        self.click_start.as_ref()
    }

    /// Pointer down on the empty pane. Returns false when pan-on-drag is off.
    pub fn begin_pan(&mut self, event: &PointerEvent) -> bool {
        if self.second_touch(event) || !self.config.pan_on_drag {
            return false;
        }
        self.panzoom.cancel_transition();
        let anchor = self.panzoom.transform().invert(event.position);
        self.gestures.insert(
            event.pointer_id,
            GestureState::Pan(PanGesture {
                start_screen: event.position,
                anchor,
                started: false,
            }),
        );
        true
    }

    fn move_pan(&mut self, pan: &mut PanGesture, event: &PointerEvent) {
        if !pan.started {
            if event.position.distance_to(pan.start_screen) <= self.config.pane_click_distance {
                return;
            }
            pan.started = true;
            self.events.push(EngineEvent::PanZoomStart {
                viewport: self.panzoom.viewport(),
            });
        }
        let changed = self.panzoom.pan_to_anchor(event.position, pan.anchor);
        self.emit_viewport(changed);
    }

    /// Route a pointer move to the gesture of its pointer.
    pub fn pointer_move(&mut self, event: &PointerEvent) {
        profile_scope!("pointer_move");
        self.sync();
        if event.is_multi_touch() && !self.gestures.is_empty() {
            self.cancel_all();
            return;
        }
        let Some(mut gesture) = self.gestures.remove(&event.pointer_id) else {
            return;
        };

        match &mut gesture {
            GestureState::NodeDrag(drag) => {
                let pointer = pointer_position(event.position, &self.panzoom.transform(), &self.config);
                drag.auto_pan.pointer = event.position;
                if !drag.started {
                    if drag.exceeds_threshold(pointer, self.config.node_drag_threshold) {
                        self.start_drag(drag, pointer, event.multi_select);
                    }
                } else if pointer != drag.last_pos {
                    self.update_drag(drag, pointer);
                }
            }
            GestureState::Resize(resize) => {
                let pointer = pointer_position(event.position, &self.panzoom.transform(), &self.config);
                if let Some(step) = resize.update(&self.resolver, pointer) {
                    let allowed = self
                        .should_resize
                        .as_mut()
                        .is_none_or(|filter| filter(&step.values, step.direction));
                    if allowed {
                        self.node_changes.extend(step.changes);
                        self.events.push(EngineEvent::Resize {
                            node_id: resize.node_id.clone(),
                            params: step.values,
                            direction: step.direction,
                        });
                    } else {
                        trace!(node_id = %resize.node_id, "Resize step vetoed");
                    }
                }
            }
            GestureState::Connect(connect) => {
                connect.auto_pan.pointer = event.position;
                let pointer = self.panzoom.transform().invert(event.position);
                self.retarget(connect, pointer);
            }
            GestureState::Pan(pan) => self.move_pan(pan, event),
        }
        self.gestures.insert(event.pointer_id, gesture);
    }

    /// End the gesture of the event's pointer.
    pub fn pointer_up(&mut self, event: &PointerEvent) {
        self.sync();
        let Some(gesture) = self.gestures.remove(&event.pointer_id) else {
            return;
        };

        match gesture {
            GestureState::NodeDrag(drag) if !drag.started => {
                self.events.push(EngineEvent::NodeClick { node_id: drag.node_id });
            }
            GestureState::NodeDrag(drag) => {
                let updates = drag.position_updates();
                if !updates.is_empty() {
                    let changes = self
                        .resolver
                        .position_changes(&updates, Some(false), self.config.node_origin);
                    self.node_changes.extend(changes);
                }
                let (node, nodes) = drag.snapshot(&self.resolver, false);
                debug!(node_id = %drag.node_id, "Node drag stopped");
                self.events.push(EngineEvent::NodeDragStop { node, nodes });
            }
            GestureState::Resize(resize) => {
                self.node_changes.push(resize.end());
                self.events.push(EngineEvent::ResizeEnd {
                    node_id: resize.node_id.clone(),
                    params: resize.values(),
                });
            }
            GestureState::Connect(mut connect) => {
                let pointer = self.panzoom.transform().invert(event.position);
                self.retarget(&mut connect, pointer);
                self.finish_connection(connect);
            }
            GestureState::Pan(pan) if pan.started => {
                self.events.push(EngineEvent::PanZoomEnd {
                    viewport: self.panzoom.viewport(),
                });
            }
            GestureState::Pan(_) => {
                let position = self.screen_to_flow(event.position, false);
                self.events.push(EngineEvent::PaneClick { position });
            }
        }
    }

    /// Abort the gesture of `pointer_id` without any terminal event.
    pub fn cancel(&mut self, pointer_id: PointerId) {
        if let Some(gesture) = self.gestures.remove(&pointer_id) {
            self.abort_gesture(gesture);
        }
    }

    /// Abort every gesture.
    pub fn cancel_all(&mut self) {
        let gestures = std::mem::take(&mut self.gestures);
        for gesture in gestures.into_values() {
            self.abort_gesture(gesture);
        }
        self.click_start = None;
    }

    /// Reset the transient flags a gesture set on its nodes.
    fn abort_gesture(&mut self, gesture: GestureState) {
        debug!(gesture = gesture.name(), "Gesture aborted");
        match gesture {
            GestureState::NodeDrag(drag) if drag.started => {
                for id in drag.items.keys().filter(|id| self.resolver.contains(id)) {
                    self.node_changes.push(NodeChange::position(id, None, Some(false)));
                }
            }
            GestureState::Resize(resize) if self.resolver.contains(&resize.node_id) => {
                self.node_changes.push(NodeChange::Dimensions {
                    id: resize.node_id,
                    dimensions: None,
                    resizing: Some(false),
                    set_attributes: false,
                });
            }
            GestureState::Pan(pan) if pan.started => {
                self.events.push(EngineEvent::PanZoomEnd {
                    viewport: self.panzoom.viewport(),
                });
            }
            _ => {}
        }
    }

    /// Abort gestures whose nodes disappeared in the last resolution pass.
    fn abort_stale_gestures(&mut self) {
        let stale: Vec<(PointerId, String)> = self
            .gestures
            .iter()
            .filter_map(|(pointer, gesture)| {
                gesture
                    .node_ids()
                    .into_iter()
                    .find(|id| !self.resolver.contains(id))
                    .map(|id| (*pointer, id.to_string()))
            })
            .collect();

        for (pointer, node_id) in stale {
            self.reporter.report(EngineError::StaleNode { node_id });
            if let Some(gesture) = self.gestures.remove(&pointer) {
                self.abort_gesture(gesture);
            }
        }
        let start_gone = self
            .click_start
            .as_ref()
            .is_some_and(|start| !self.resolver.contains(&start.node_id));
        if start_gone {
            self.click_start = None;
        }
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Advance the viewport transition and run one auto-pan step for every
    /// gesture near the container edge.
    pub fn frame(&mut self, now: Instant) {
        profile_scope!("frame");
        self.frame_monitor.begin_frame();
        self.sync();

        let changed = self.panzoom.tick(now);
        self.emit_viewport(changed);

        let pointers: Vec<PointerId> = self
            .gestures
            .iter()
            .filter(|(_, gesture)| gesture.wants_auto_pan())
            .map(|(pointer, _)| *pointer)
            .collect();
        for pointer in pointers {
            if let Some(mut gesture) = self.gestures.remove(&pointer) {
                self.auto_pan_step(&mut gesture);
                self.gestures.insert(pointer, gesture);
            }
        }
        self.frame_monitor.end_frame();
    }

    fn auto_pan_step(&mut self, gesture: &mut GestureState) {
        let container = self.panzoom.container();
        let speed = self.config.auto_pan_speed;
        let margin = self.config.auto_pan_margin;

        match gesture {
            GestureState::NodeDrag(drag) => {
                let velocity = drag.auto_pan.velocity(container, speed, margin);
                if velocity == XYPosition::default() {
                    return;
                }
                let zoom = self.panzoom.transform().k;
                // Only move the drag anchor when the viewport actually moved,
                // otherwise nodes would creep at the translate extent.
                if !self.pan_by(velocity) {
                    return;
                }
                let pointer = drag.shift_for_auto_pan(velocity, zoom);
                self.update_drag(drag, pointer);
            }
            GestureState::Connect(connect) => {
                let velocity = connect.auto_pan.velocity(container, speed, margin);
                if velocity == XYPosition::default() || !self.pan_by(velocity) {
                    return;
                }
                let pointer = self.panzoom.transform().invert(connect.auto_pan.pointer);
                self.retarget(connect, pointer);
            }
            GestureState::Resize(_) | GestureState::Pan(_) => {}
        }
    }

    pub fn frame_monitor(&self) -> &FrameMonitor {
        &self.frame_monitor
    }

    // ========================================================================
    // Selection helpers
    // ========================================================================

    /// Move every selected node one keyboard step in `direction`.
    pub fn move_selected_nodes(&mut self, direction: NudgeDirection, factor: f64) {
        self.sync();
        let updates = nudge_updates(&self.resolver, &self.config, direction, factor, &mut self.reporter);
        if updates.is_empty() {
            return;
        }
        let changes = self
            .resolver
            .position_changes(&updates, None, self.config.node_origin);
        self.node_changes.extend(changes);
    }

    /// Ids of selectable nodes inside a screen-space selection rect.
    pub fn nodes_inside(&mut self, rect: Rect, partially: bool) -> Vec<NodeId> {
        self.sync();
        graph::nodes_inside(&self.resolver, rect, &self.panzoom.transform(), partially, true)
    }

    /// Bounding rect of the given nodes in flow space.
    pub fn nodes_bounds(&mut self, node_ids: &[&str]) -> Rect {
        self.sync();
        graph::nodes_bounds(node_ids.iter().filter_map(|id| self.resolver.get(id)))
    }
}
