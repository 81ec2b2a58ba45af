//! flowboard-replay: drive the engine from a JSON scenario.
//!
//! ```text
//! flowboard-replay scenario.json      # or `-` for stdin
//! ```
//!
//! Every step prints one JSON line to stdout with the node changes, events
//! and errors it produced. Logs go to stderr (`RUST_LOG`, default
//! `flowboard=info`).

use anyhow::{Context, Result};
use flowboard::config::ResizeParams;
use flowboard::engine::FitViewOptions;
use flowboard::input::{ControlPosition, NudgeDirection, PinchEvent, PointerEvent, PointerId};
use flowboard::resolver::{NodeMeasurement, NodeUpdate};
use flowboard::viewport::WheelEvent;
use flowboard::{
    Dimensions, Edge, Engine, EngineConfig, EngineEvent, Handle, HandleType, Node, NodeChange, Viewport,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    #[serde(default)]
    config: EngineConfig,
    #[serde(default)]
    container: Option<Dimensions>,
    #[serde(default)]
    viewport: Option<Viewport>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
    /// Apply node changes to the engine's own node list after every step.
    #[serde(default = "default_true")]
    apply_changes: bool,
    #[serde(default)]
    steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

/// What a pointer-down landed on.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Target {
    Node {
        id: String,
    },
    ResizeControl {
        id: String,
        control: ControlPosition,
        #[serde(default)]
        params: ResizeParams,
    },
    Handle {
        node_id: String,
        handle_type: HandleType,
        #[serde(default)]
        handle_id: Option<String>,
    },
    EdgeEnd {
        edge_id: String,
        end: HandleType,
    },
    Pane,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Measurement {
    id: String,
    width: f64,
    height: f64,
    #[serde(default)]
    handles: Vec<Handle>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Step {
    PointerDown {
        event: PointerEvent,
        target: Target,
    },
    PointerMove {
        event: PointerEvent,
    },
    PointerUp {
        event: PointerEvent,
    },
    Cancel {
        pointer_id: PointerId,
    },
    Wheel {
        event: WheelEvent,
    },
    Pinch {
        event: PinchEvent,
    },
    /// Animation frame at this many milliseconds after the replay started.
    Frame {
        at_ms: u64,
    },
    SetViewport {
        viewport: Viewport,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    FitView {
        #[serde(default)]
        options: FitViewOptions,
    },
    Nudge {
        direction: NudgeDirection,
        #[serde(default = "default_factor")]
        factor: f64,
    },
    ClickHandle {
        node_id: String,
        handle_type: HandleType,
        #[serde(default)]
        handle_id: Option<String>,
    },
    Measure {
        nodes: Vec<Measurement>,
    },
    SetNodes {
        nodes: Vec<Node>,
    },
}

fn default_factor() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepOutput {
    step: usize,
    changes: Vec<NodeChange>,
    events: Vec<EngineEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    viewport: Viewport,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowboard=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_scenario(path: &str) -> Result<Scenario> {
    let text = if path == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read scenario from stdin")?;
        text
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read scenario {path}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("Failed to parse scenario {path}"))
}

fn pointer_down(engine: &mut Engine, event: &PointerEvent, target: Target) -> Result<()> {
    match target {
        Target::Node { id } => engine
            .begin_node_drag(event, &id)
            .with_context(|| format!("Pointer down on node {id}"))?,
        Target::ResizeControl { id, control, params } => engine
            .begin_resize(event, &id, control, params)
            .with_context(|| format!("Pointer down on resize control of {id}"))?,
        Target::Handle {
            node_id,
            handle_type,
            handle_id,
        } => engine
            .begin_connection(event, &node_id, handle_type, handle_id.as_deref())
            .with_context(|| format!("Pointer down on handle of {node_id}"))?,
        Target::EdgeEnd { edge_id, end } => engine
            .begin_reconnect(event, &edge_id, end)
            .with_context(|| format!("Pointer down on edge {edge_id}"))?,
        Target::Pane => {
            engine.begin_pan(event);
        }
    }
    Ok(())
}

fn measure(engine: &mut Engine, nodes: Vec<Measurement>) {
    let updates: Vec<NodeUpdate> = nodes.iter().map(|m| NodeUpdate::new(m.id.clone())).collect();
    let mut measurements: HashMap<String, NodeMeasurement> = nodes
        .into_iter()
        .map(|m| {
            let measurement = NodeMeasurement {
                dimensions: Dimensions::new(m.width, m.height),
                handles: m.handles,
            };
            (m.id, measurement)
        })
        .collect();
    let mut provider = |id: &str| measurements.remove(id);
    engine.update_node_internals(&updates, &mut provider);
}

fn run_step(engine: &mut Engine, step: Step, started: Instant) -> Result<()> {
    match step {
        Step::PointerDown { event, target } => pointer_down(engine, &event, target)?,
        Step::PointerMove { event } => engine.pointer_move(&event),
        Step::PointerUp { event } => engine.pointer_up(&event),
        Step::Cancel { pointer_id } => engine.cancel(pointer_id),
        Step::Wheel { event } => {
            engine.wheel(&event);
        }
        Step::Pinch { event } => {
            engine.pinch(&event);
        }
        Step::Frame { at_ms } => engine.frame(started + Duration::from_millis(at_ms)),
        Step::SetViewport { viewport, duration_ms } => {
            engine.set_viewport(viewport, duration_ms.map(Duration::from_millis));
        }
        Step::FitView { options } => {
            engine.fit_view(&options);
        }
        Step::Nudge { direction, factor } => engine.move_selected_nodes(direction, factor),
        Step::ClickHandle {
            node_id,
            handle_type,
            handle_id,
        } => {
            engine
                .click_connect(&node_id, handle_type, handle_id.as_deref())
                .with_context(|| format!("Click on handle of {node_id}"))?;
        }
        Step::Measure { nodes } => measure(engine, nodes),
        Step::SetNodes { nodes } => engine.set_nodes(nodes),
    }
    Ok(())
}

fn replay(scenario: Scenario, out: &mut impl Write) -> Result<()> {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(scenario.config);
    let sink = errors.clone();
    engine.set_error_sink(move |error| sink.borrow_mut().push(error.to_string()));

    if let Some(container) = scenario.container {
        engine.set_container_size(container);
    }
    if let Some(viewport) = scenario.viewport {
        engine.set_viewport(viewport, None);
    }
    engine.set_nodes(scenario.nodes);
    engine.set_edges(scenario.edges);
    engine.take_events();

    info!(steps = scenario.steps.len(), "Replaying scenario");
    let started = Instant::now();
    for (index, step) in scenario.steps.into_iter().enumerate() {
        debug!(step = index, ?step, "Step");
        run_step(&mut engine, step, started).with_context(|| format!("Step {index} failed"))?;

        let changes = if scenario.apply_changes {
            engine.apply_pending_changes()
        } else {
            engine.take_node_changes()
        };
        let output = StepOutput {
            step: index,
            changes,
            events: engine.take_events(),
            errors: errors.borrow_mut().drain(..).collect(),
            viewport: engine.viewport(),
        };
        serde_json::to_writer(&mut *out, &output).context("Failed to write step output")?;
        writeln!(out).context("Failed to write step output")?;
    }
    out.flush().context("Failed to flush output")?;
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let path = std::env::args()
        .nth(1)
        .context("usage: flowboard-replay <scenario.json | ->")?;
    let scenario = read_scenario(&path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay(scenario, &mut out)
}
