//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, loading and
//! matching order workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowStep, WorkflowTemplate)
//! - [`catalog`]: Immutable template set and order matching
//! - [`parser`]: YAML catalog loading
//! - [`validator`]: Structural validation of templates
//! - [`state`]: Per-order workflow instance and state

pub mod catalog;
pub mod model;
pub mod parser;
pub mod state;
pub mod validator;

pub use catalog::{WorkflowCatalog, DCC_EXECUTOR, PAYMENT_EXECUTOR};
pub use model::{StepKind, WorkflowStep, WorkflowTemplate};
pub use parser::{load_catalog, parse_catalog};
pub use state::{WorkflowInstance, WorkflowState};
pub use validator::ValidationError;
