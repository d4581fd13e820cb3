//! Workflow Instance Registry
//!
//! Owns the live workflow instances, at most one per order. Every
//! operation takes the registry lock, so `start`, `advance`, `suspend`
//! and `remove` on the same order always serialize.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::workflow::{WorkflowInstance, WorkflowState, WorkflowTemplate};

/// Concurrency-safe mapping of order ID to active workflow instance.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: Mutex<HashMap<String, WorkflowInstance>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a running instance at cursor 0.
    ///
    /// Fails if the order already has an instance.
    pub async fn start(
        &self,
        order_id: &str,
        template: Arc<WorkflowTemplate>,
    ) -> Result<WorkflowInstance, EngineError> {
        let mut instances = self.instances.lock().await;
        if instances.contains_key(order_id) {
            return Err(EngineError::InstanceAlreadyActive(order_id.to_string()));
        }

        let instance = WorkflowInstance::new(order_id, template);
        instances.insert(order_id.to_string(), instance.clone());
        debug!(
            "[Orchestrator] Registered instance of '{}' for {}",
            instance.template.id, order_id
        );

        Ok(instance)
    }

    /// Returns a copy of the order's instance, if any.
    pub async fn get(&self, order_id: &str) -> Option<WorkflowInstance> {
        self.instances.lock().await.get(order_id).cloned()
    }

    /// Moves the cursor forward. Cursors never move backwards.
    pub async fn advance(&self, order_id: &str, cursor: usize) -> Result<(), EngineError> {
        self.with_instance(order_id, |instance| {
            if cursor < instance.cursor {
                return Err(EngineError::CursorRegression {
                    order_id: order_id.to_string(),
                    current: instance.cursor,
                    requested: cursor,
                });
            }
            instance.cursor = cursor;
            Ok(())
        })
        .await
    }

    /// Moves the cursor forward and enters `Suspended` in one step.
    pub async fn suspend(&self, order_id: &str, cursor: usize) -> Result<(), EngineError> {
        self.with_instance(order_id, |instance| {
            if cursor < instance.cursor {
                return Err(EngineError::CursorRegression {
                    order_id: order_id.to_string(),
                    current: instance.cursor,
                    requested: cursor,
                });
            }
            instance.cursor = cursor;
            instance.state = WorkflowState::Suspended;
            instance.suspended_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Replaces the instance state.
    pub async fn set_state(&self, order_id: &str, state: WorkflowState) -> Result<(), EngineError> {
        self.with_instance(order_id, |instance| {
            instance.state = state;
            Ok(())
        })
        .await
    }

    /// Deletes the instance, returning it if it existed.
    pub async fn remove(&self, order_id: &str) -> Option<WorkflowInstance> {
        let removed = self.instances.lock().await.remove(order_id);
        if removed.is_some() {
            debug!("[Orchestrator] Removed instance for {}", order_id);
        }
        removed
    }

    /// Orders whose instance has been suspended since before `cutoff`.
    pub async fn suspended_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let instances = self.instances.lock().await;
        let mut order_ids: Vec<String> = instances
            .values()
            .filter(|instance| instance.suspended_before(cutoff))
            .map(|instance| instance.order_id.clone())
            .collect();
        order_ids.sort();
        order_ids
    }

    pub async fn len(&self) -> usize {
        self.instances.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn with_instance<F>(&self, order_id: &str, f: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut WorkflowInstance) -> Result<(), EngineError>,
    {
        let mut instances = self.instances.lock().await;
        let instance = instances
            .get_mut(order_id)
            .ok_or_else(|| EngineError::InstanceNotFound(order_id.to_string()))?;
        f(instance)
    }
}
