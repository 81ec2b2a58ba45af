//! Single test binary entry point.
//!
//! This consolidates all tests into a single binary following matklad's best practices,
//! reducing linking overhead.
//!
//! Structure:
//! - helpers: `TestFlowBuilder` and pointer helpers
//! - unit: Single-component tests (resolver, index, viewport, resize, config)
//! - integration: Gesture workflows driven through the `Engine`

mod unit;
