//! Flowboard - coordinate and interaction engine for node-and-edge diagram editors.
//!
//! The engine owns no rendering. A host feeds it nodes, edges, configuration
//! and pointer/wheel/size notifications; the engine resolves absolute
//! positions, runs the drag / resize / connect gesture state machines, keeps
//! the pan/zoom viewport inside its bounds, and emits change records for the
//! host to apply.
//!
//! ## Modules
//!
//! - `geometry` - Rect/box math, extents, clamping, snapping
//! - `types` - Node, Edge, Handle and the engine-owned `InternalNode`
//! - `resolver` - Absolute position + z resolution over the parent tree
//! - `connection_index` - Edge lookup by node, role and handle
//! - `viewport` - Pan/zoom transform, constrained apply, transitions
//! - `input` - Pointer gesture state machines (drag, resize, connect)
//! - `engine` - The engine context tying everything together
//! - `changes` - Change records and the host-side reducer

pub mod changes;
pub mod config;
pub mod connection_index;
pub mod constants;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod input;
pub mod perf;
pub mod resolver;
pub mod spatial_index;
pub mod types;
pub mod viewport;

pub use changes::{EdgeChange, NodeChange, apply_edge_changes, apply_node_changes};
pub use config::EngineConfig;
pub use engine::{Engine, EngineEvent, FitViewOptions};
pub use error::{EngineError, EngineResult, ErrorKind, ErrorReporter};
pub use geometry::{CoordinateExtent, Dimensions, Rect, XYPosition};
pub use types::{Connection, Edge, Handle, HandleType, InternalNode, Node, NodeExtent, Position};
pub use viewport::{PanZoom, Viewport};
