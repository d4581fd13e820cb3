//! Workflow Execution Module
//!
//! Provides the orchestration engine that runs order workflows,
//! including detached execution bursts and suspend/resume on
//! external decisions.
//!
//! # Architecture
//!
//! - [`engine`]: Orchestration engine and per-order state machine
//! - [`registry`]: Live workflow instances, one per order
//! - [`step`]: Step executor capability and built-in executors

pub mod engine;
pub mod registry;
pub mod step;

pub use engine::{BurstOutcome, OrchestrationEngine, ResumeOutcome, StartOutcome};
pub use registry::InstanceRegistry;
pub use step::{DccOfferExecutor, Offer, PaymentExecutor, StepExecutor, StepExecutors};
