//! Workflow Instance State
//!
//! A workflow instance is the live cursor of one order into its
//! template's step list. Its presence in the instance registry is the
//! only signal that an order is waiting on something; absence means
//! the workflow never started or already finished.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{WorkflowStep, WorkflowTemplate};

/// Per-order workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// No instance: never started or completed
    None,
    /// A burst is executing steps
    Running,
    /// Waiting on an external decision
    Suspended,
    /// A step failed; the instance is kept for inspection, never resumed
    Failed(String),
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Running => write!(f, "running"),
            Self::Suspended => write!(f, "suspended"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Live cursor into a workflow template for one order.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInstance {
    pub order_id: String,

    /// Shared, read-only template
    #[serde(serialize_with = "serialize_template_id", rename = "workflow_id")]
    pub template: Arc<WorkflowTemplate>,

    /// Index of the next step to execute
    pub cursor: usize,

    pub state: WorkflowState,

    pub started_at: DateTime<Utc>,

    /// Set when the instance last entered `Suspended`
    pub suspended_at: Option<DateTime<Utc>>,
}

fn serialize_template_id<S>(template: &Arc<WorkflowTemplate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&template.id)
}

impl WorkflowInstance {
    /// Creates a running instance positioned at the first step.
    pub fn new(order_id: impl Into<String>, template: Arc<WorkflowTemplate>) -> Self {
        Self {
            order_id: order_id.into(),
            template,
            cursor: 0,
            state: WorkflowState::Running,
            started_at: Utc::now(),
            suspended_at: None,
        }
    }

    /// Step at the cursor, or `None` once every step has run.
    pub fn next_step(&self) -> Option<&WorkflowStep> {
        self.template.steps.get(self.cursor)
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.template.steps.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.state == WorkflowState::Suspended
    }

    /// Returns true if the instance has been suspended since before `cutoff`.
    pub fn suspended_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_suspended() && self.suspended_at.is_some_and(|at| at < cutoff)
    }
}
