//! Monitoring Module
//!
//! Execution telemetry for workflow bursts.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Per-order step, suspension and resume events

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
