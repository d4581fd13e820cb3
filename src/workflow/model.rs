//! Workflow Data Model
//!
//! Static workflow templates: an ordered list of steps plus the
//! criteria an order must satisfy for the template to be selected.
//!
//! # Example YAML Format
//!
//! ```yaml
//! workflows:
//!   - id: wf-payment-dcc-proposal
//!     criteria:
//!       payment_type: credit_card
//!       currency: USD
//!     steps:
//!       - id: dcc_proposal
//!         executor: PBC_DCC
//!         kind: pause
//!       - id: payment_processing
//!         executor: PBC_Payment
//!         kind: settlement
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::order::Order;

/// How the engine treats a step once its executor has run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Runs the decision-offer executor, then suspends the instance
    Pause,
    /// Runs to completion and moves on
    Settlement,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Settlement => write!(f, "settlement"),
        }
    }
}

/// A single step of a workflow template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    /// Unique identifier within the template
    pub id: String,

    /// Name of the executor that runs this step (e.g. "PBC_DCC")
    pub executor: String,

    pub kind: StepKind,
}

impl WorkflowStep {
    /// Creates a new step.
    ///
    /// # Example
    ///
    /// ```
    /// use orderflow::workflow::{StepKind, WorkflowStep};
    ///
    /// let step = WorkflowStep::pause("dcc_proposal", "PBC_DCC");
    /// assert_eq!(step.kind, StepKind::Pause);
    /// ```
    pub fn new(id: impl Into<String>, executor: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into().trim().to_string(),
            executor: executor.into().trim().to_string(),
            kind,
        }
    }

    pub fn pause(id: impl Into<String>, executor: impl Into<String>) -> Self {
        Self::new(id, executor, StepKind::Pause)
    }

    pub fn settlement(id: impl Into<String>, executor: impl Into<String>) -> Self {
        Self::new(id, executor, StepKind::Settlement)
    }

    pub fn is_pause(&self) -> bool {
        self.kind == StepKind::Pause
    }
}

/// A static workflow definition.
///
/// Templates are loaded once and shared read-only (behind `Arc`) by
/// every instance created from them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    pub id: String,

    /// Attribute name -> required value, matched against an order's
    /// original fields
    #[serde(default)]
    pub criteria: BTreeMap<String, String>,

    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            criteria: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    /// Adds a required attribute value.
    pub fn with_criterion(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.insert(key.into(), value.into());
        self
    }

    /// Appends a step.
    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns true when every criterion equals the order's original
    /// field of the same name. Unknown keys never match.
    pub fn matches(&self, order: &Order) -> bool {
        self.criteria.iter().all(|(key, expected)| {
            order
                .search_attribute(key)
                .is_some_and(|actual| actual == *expected)
        })
    }

    /// Index of the first pause step, if any.
    pub fn pause_index(&self) -> Option<usize> {
        self.steps.iter().position(WorkflowStep::is_pause)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Top-level shape of a catalog YAML document.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CatalogDocument {
    #[serde(default)]
    pub workflows: Vec<WorkflowTemplate>,
}
