//! Workflow Catalog
//!
//! Immutable, ordered set of workflow templates. Matching walks the
//! templates in registration order and returns the first whose
//! criteria all equal the order's original fields.

use std::sync::Arc;

use log::{debug, info};

use super::model::{WorkflowStep, WorkflowTemplate};
use super::validator::validate_catalog;
use crate::error::CatalogError;
use crate::order::Order;

/// Executor name of the built-in currency-conversion offer step.
pub const DCC_EXECUTOR: &str = "PBC_DCC";

/// Executor name of the built-in payment settlement step.
pub const PAYMENT_EXECUTOR: &str = "PBC_Payment";

/// Read-only collection of workflow templates.
///
/// Shared across tasks without locking; templates are handed out as
/// `Arc` so instances can hold them for as long as they live.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    templates: Vec<Arc<WorkflowTemplate>>,
}

impl WorkflowCatalog {
    /// Builds a catalog, validating every template.
    pub fn new(templates: Vec<WorkflowTemplate>) -> Result<Self, CatalogError> {
        validate_catalog(&templates).map_err(CatalogError::Invalid)?;

        info!("Workflow catalog ready: {} templates", templates.len());
        Ok(Self {
            templates: templates.into_iter().map(Arc::new).collect(),
        })
    }

    /// The two reference payment workflows.
    ///
    /// - `wf-payment-dcc-proposal`: USD credit-card orders get a currency
    ///   conversion offer, then settle.
    /// - `wf-payment-generic`: BRL credit-card orders settle directly.
    pub fn builtin() -> Self {
        let templates = vec![
            WorkflowTemplate::new("wf-payment-dcc-proposal")
                .with_criterion("payment_type", "credit_card")
                .with_criterion("currency", "USD")
                .with_step(WorkflowStep::pause("dcc_proposal", DCC_EXECUTOR))
                .with_step(WorkflowStep::settlement("payment_processing", PAYMENT_EXECUTOR)),
            WorkflowTemplate::new("wf-payment-generic")
                .with_criterion("payment_type", "credit_card")
                .with_criterion("currency", "BRL")
                .with_step(WorkflowStep::settlement("payment_processing", PAYMENT_EXECUTOR)),
        ];

        Self {
            templates: templates.into_iter().map(Arc::new).collect(),
        }
    }

    /// Returns the first template matching the order, if any.
    pub fn find_match(&self, order: &Order) -> Option<Arc<WorkflowTemplate>> {
        let found = self
            .templates
            .iter()
            .find(|template| template.matches(order))
            .cloned();

        match &found {
            Some(template) => debug!(
                "[Orchestrator] {} matched workflow '{}'",
                order.order_id, template.id
            ),
            None => debug!("[Orchestrator] {} matched no workflow", order.order_id),
        }

        found
    }

    /// Looks up a template by ID.
    pub fn get(&self, template_id: &str) -> Option<Arc<WorkflowTemplate>> {
        self.templates.iter().find(|t| t.id == template_id).cloned()
    }

    /// Templates in registration order.
    pub fn templates(&self) -> impl Iterator<Item = &WorkflowTemplate> {
        self.templates.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
