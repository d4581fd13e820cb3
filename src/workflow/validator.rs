//! Catalog Validation
//!
//! Structural checks run once when a catalog is built:
//! - Template and step field validation
//! - Unique template IDs across the catalog
//! - Unique step IDs within a template
//! - At most one pause step per template

use std::collections::HashSet;

use log::{debug, info, warn};

use super::model::WorkflowTemplate;

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTemplateId,
    DuplicateTemplateId(String),
    EmptyStepId(String),
    EmptyExecutor { template: String, step: String },
    DuplicateStepId { template: String, step: String },
    MultiplePauseSteps(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTemplateId => write!(f, "Workflow has empty or whitespace-only ID"),
            Self::DuplicateTemplateId(id) => write!(f, "Duplicate workflow ID: '{}'", id),
            Self::EmptyStepId(template) => {
                write!(f, "Workflow '{}' has a step with an empty ID", template)
            }
            Self::EmptyExecutor { template, step } => {
                write!(f, "Workflow '{}': step '{}' has no executor specified", template, step)
            }
            Self::DuplicateStepId { template, step } => {
                write!(f, "Workflow '{}': duplicate step ID '{}'", template, step)
            }
            Self::MultiplePauseSteps(template) => {
                write!(f, "Workflow '{}' has more than one pause step", template)
            }
        }
    }
}

/// Validates a single template.
pub fn validate_template(template: &WorkflowTemplate) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if template.id.trim().is_empty() {
        errors.push(ValidationError::EmptyTemplateId);
        return errors; // Nothing to attribute further errors to
    }

    let mut seen_steps: HashSet<&str> = HashSet::new();
    for step in &template.steps {
        if step.id.trim().is_empty() {
            errors.push(ValidationError::EmptyStepId(template.id.clone()));
            continue;
        }

        if !seen_steps.insert(step.id.as_str()) {
            errors.push(ValidationError::DuplicateStepId {
                template: template.id.clone(),
                step: step.id.clone(),
            });
        }

        if step.executor.trim().is_empty() {
            errors.push(ValidationError::EmptyExecutor {
                template: template.id.clone(),
                step: step.id.clone(),
            });
        }
    }

    let pause_steps = template.steps.iter().filter(|s| s.is_pause()).count();
    if pause_steps > 1 {
        errors.push(ValidationError::MultiplePauseSteps(template.id.clone()));
    }

    if template.steps.is_empty() {
        warn!("Workflow '{}' has no steps and completes immediately", template.id);
    }

    if template.criteria.is_empty() {
        warn!("Workflow '{}' has no criteria and matches every order", template.id);
    }

    if let Some(index) = template.pause_index() {
        if index > 0 {
            debug!(
                "Workflow '{}' pauses at step {} (not the first step)",
                template.id, index
            );
        }
    }

    errors
}

/// Validates a full set of templates.
///
/// Returns every error found rather than stopping at the first one.
pub fn validate_catalog(templates: &[WorkflowTemplate]) -> Result<(), Vec<ValidationError>> {
    info!("Validating catalog with {} workflows", templates.len());

    let mut errors = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for template in templates {
        if !template.id.trim().is_empty() && !seen_ids.insert(template.id.as_str()) {
            errors.push(ValidationError::DuplicateTemplateId(template.id.clone()));
        }
        errors.extend(validate_template(template));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
