//! Pan/zoom controller.
//!
//! Owns the current transform and applies every change through
//! [`constrain`]: programmatic calls, wheel, pinch and drag-pan all share the
//! same path, so zoom stays within bounds and the visible area stays inside
//! the translate extent.

use super::transform::{Transform, Viewport, constrain};
use super::transition::Transition;
use crate::config::{EngineConfig, PanOnScrollMode};
use crate::constants::{
    PINCH_WHEEL_FACTOR, SCROLL_LINE_HEIGHT, WHEEL_DELTA_LINE, WHEEL_DELTA_PAGE, WHEEL_DELTA_PIXEL,
};
use crate::geometry::{CoordinateExtent, Dimensions, XYPosition};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Unit of wheel deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

/// A wheel or trackpad scroll notification.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WheelEvent {
    /// Pointer position relative to the container.
    pub position: XYPosition,
    pub delta_x: f64,
    pub delta_y: f64,
    pub delta_mode: DeltaMode,
    /// Set by trackpads for pinch gestures.
    pub ctrl_key: bool,
    pub shift_key: bool,
}

impl WheelEvent {
    /// Zoom exponent for this event: `new_k = k * 2^delta`.
    pub fn zoom_delta(&self) -> f64 {
        let factor = if self.ctrl_key { PINCH_WHEEL_FACTOR } else { 1.0 };
        let mode = match self.delta_mode {
            DeltaMode::Pixel => WHEEL_DELTA_PIXEL,
            DeltaMode::Line => WHEEL_DELTA_LINE,
            DeltaMode::Page => WHEEL_DELTA_PAGE,
        };
        -self.delta_y * mode * factor
    }

    fn is_trackpad(&self) -> bool {
        self.delta_mode == DeltaMode::Pixel && self.delta_y.abs() < 50.0
    }
}

/// Pan and zoom state plus the in-flight transition.
#[derive(Debug, Clone)]
pub struct PanZoom {
    transform: Transform,
    min_zoom: f64,
    max_zoom: f64,
    translate_extent: CoordinateExtent,
    container: Dimensions,
    transition: Option<Transition>,
}

impl Default for PanZoom {
    fn default() -> Self {
        Self::new(&EngineConfig::default(), Viewport::default())
    }
}

impl PanZoom {
    pub fn new(config: &EngineConfig, viewport: Viewport) -> Self {
        let mut panzoom = Self {
            transform: Transform::IDENTITY,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            translate_extent: config.translate_extent_or_infinite(),
            container: Dimensions::default(),
            transition: None,
        };
        panzoom.transform = panzoom.constrained(viewport.into());
        panzoom
    }

    pub fn viewport(&self) -> Viewport {
        self.transform.into()
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn container(&self) -> Dimensions {
        self.container
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn translate_extent(&self) -> CoordinateExtent {
        self.translate_extent
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    fn constrained(&self, transform: Transform) -> Transform {
        constrain(
            transform,
            self.container,
            &self.translate_extent,
            self.min_zoom,
            self.max_zoom,
        )
    }

    /// Apply an already requested transform. Returns whether it changed.
    fn apply(&mut self, transform: Transform) -> bool {
        let next = self.constrained(transform);
        let changed = next != self.transform;
        self.transform = next;
        changed
    }

    fn center(&self) -> XYPosition {
        XYPosition::new(self.container.width / 2.0, self.container.height / 2.0)
    }

    /// Re-apply the current transform after the bounds changed. Transition
    /// frames are constrained as they are sampled.
    fn reconstrain(&mut self) -> bool {
        let changed = self.apply(self.transform);
        if changed {
            trace!(transform = ?self.transform, "Viewport re-constrained");
        }
        changed
    }

    pub fn set_container_size(&mut self, size: Dimensions) -> bool {
        self.container = size;
        self.reconstrain()
    }

    pub fn set_scale_extent(&mut self, min_zoom: f64, max_zoom: f64) -> bool {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.reconstrain()
    }

    pub fn set_translate_extent(&mut self, extent: CoordinateExtent) -> bool {
        self.translate_extent = extent;
        self.reconstrain()
    }

    /// Stop any running transition; the current transform is already valid.
    pub fn cancel_transition(&mut self) {
        if self.transition.take().is_some() {
            debug!("Viewport transition cancelled");
        }
    }

    /// Jump to `viewport` immediately, cancelling any transition.
    pub fn set_viewport_constrained(&mut self, viewport: Viewport) -> bool {
        self.cancel_transition();
        self.apply(viewport.into())
    }

    /// Move to `viewport`, animated when `duration` is non-zero. A new request
    /// replaces any transition in flight.
    pub fn set_viewport(&mut self, viewport: Viewport, duration: Option<Duration>) -> bool {
        self.transition_to(viewport.into(), duration)
    }

    fn transition_to(&mut self, target: Transform, duration: Option<Duration>) -> bool {
        match duration.filter(|d| !d.is_zero()) {
            Some(duration) => {
                let target = self.constrained(target);
                self.transition = Some(Transition::new(self.transform, target, duration));
                false
            }
            None => self.set_viewport_constrained(target.into()),
        }
    }

    /// Zoom to `zoom` around the container centre.
    pub fn scale_to(&mut self, zoom: f64, duration: Option<Duration>) -> bool {
        let center = self.center();
        let k = zoom.clamp(self.min_zoom, self.max_zoom.max(self.min_zoom));
        let target = Transform::anchored(k, center, self.transform.invert(center));
        self.transition_to(target, duration)
    }

    pub fn scale_by(&mut self, factor: f64, duration: Option<Duration>) -> bool {
        self.scale_to(self.transform.k * factor, duration)
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, delta: XYPosition) -> bool {
        if delta.x == 0.0 && delta.y == 0.0 {
            return false;
        }
        self.cancel_transition();
        let t = self.transform;
        self.apply(Transform::new(t.x + delta.x, t.y + delta.y, t.k))
    }

    /// Zoom to `zoom` keeping the flow point under `screen_point` fixed.
    pub fn zoom_at(&mut self, zoom: f64, screen_point: XYPosition) -> bool {
        self.cancel_transition();
        let k = zoom.clamp(self.min_zoom, self.max_zoom.max(self.min_zoom));
        let target = Transform::anchored(k, screen_point, self.transform.invert(screen_point));
        self.apply(target)
    }

    /// Pan so the flow point `flow_anchor` sits under `screen_point`.
    pub fn pan_to_anchor(&mut self, screen_point: XYPosition, flow_anchor: XYPosition) -> bool {
        self.cancel_transition();
        self.apply(Transform::anchored(self.transform.k, screen_point, flow_anchor))
    }

    /// Handle a wheel event according to the scroll settings.
    pub fn wheel(&mut self, event: &WheelEvent, config: &EngineConfig) -> bool {
        let k = self.transform.k;
        let pinch = event.ctrl_key && config.zoom_on_pinch;

        if config.pan_on_scroll && event.is_trackpad() && !pinch {
            let normalize = if event.delta_mode == DeltaMode::Line {
                SCROLL_LINE_HEIGHT
            } else {
                1.0
            };
            let mode = config.pan_on_scroll_mode;
            let (mut dx, mut dy) = (
                if mode == PanOnScrollMode::Vertical { 0.0 } else { event.delta_x * normalize },
                if mode == PanOnScrollMode::Horizontal { 0.0 } else { event.delta_y * normalize },
            );
            if event.shift_key && mode != PanOnScrollMode::Vertical {
                dx = event.delta_y * normalize;
                dy = 0.0;
            }
            let speed = config.pan_on_scroll_speed;
            self.cancel_transition();
            return self.apply(self.transform.translate(-(dx / k) * speed, -(dy / k) * speed));
        }

        if event.ctrl_key && !config.zoom_on_pinch {
            return false;
        }
        if !event.ctrl_key && !config.zoom_on_scroll {
            return false;
        }
        self.zoom_at(k * 2f64.powf(event.zoom_delta()), event.position)
    }

    /// Advance the running transition. Returns whether the transform changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(transition) = self.transition.as_mut() else {
            return false;
        };
        let (transform, done) = transition.sample(now);
        if done {
            self.transition = None;
        }
        self.apply(transform)
    }
}
