//! Orchestration Engine
//!
//! Selects a workflow for each new order and drives its steps:
//! - Template matching against the order's original fields
//! - Detached execution bursts (`tokio::spawn`), never awaited by callers
//! - Suspension after a pause step, resumption on a decision signal
//! - Optional expiry of instances left suspended too long
//!
//! # Per-order ordering
//!
//! Every burst holds the order's gate (an owned async lock) from the
//! moment it is scheduled until it suspends, fails or finishes. A
//! decision takes the same gate before it inspects the instance, so a
//! resume can never overlap the burst that precedes it, and a duplicate
//! decision observes the state the previous burst left behind.
//! Different orders never share a gate and run fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::registry::InstanceRegistry;
use super::step::{Offer, StepExecutors};
use crate::error::EngineError;
use crate::monitoring::{EventType, ExecutionTimeline, TimelineEvent};
use crate::order::{Decision, Order, OrderDraft, OrderStore};
use crate::workflow::{StepKind, WorkflowCatalog, WorkflowInstance, WorkflowState};

/// Result of trying to start a workflow for a new order.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// An instance was registered and its first burst scheduled
    Started { workflow_id: String },
    /// No template matched; the order simply has no workflow
    NoMatchingTemplate,
}

/// Result of a decision signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// Payment terms updated and a resume burst scheduled
    Resumed { cursor: usize },
    /// No suspended instance for the order; nothing changed
    NotAwaiting,
}

/// How a single burst ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BurstOutcome {
    Suspended { cursor: usize, offer: Offer },
    Finished,
    Failed { cursor: usize, reason: String },
}

/// Per-order burst locks.
#[derive(Debug, Default)]
struct BurstGates {
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BurstGates {
    async fn acquire(&self, order_id: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().await;
            Arc::clone(gates.entry(order_id.to_string()).or_default())
        };
        gate.lock_owned().await
    }

    async fn existing(&self, order_id: &str) -> Option<Arc<Mutex<()>>> {
        self.gates.lock().await.get(order_id).cloned()
    }

    async fn all(&self) -> Vec<Arc<Mutex<()>>> {
        self.gates.lock().await.values().cloned().collect()
    }

    /// Drops the gate of an order that can have no further bursts.
    async fn forget(&self, order_id: &str) {
        self.gates.lock().await.remove(order_id);
    }
}

/// Workflow orchestration engine.
///
/// Cheap to clone; clones share the same stores, so a clone can be
/// moved into each detached burst.
///
/// # Example
///
/// ```rust,no_run
/// use orderflow::execution::{OrchestrationEngine, StepExecutors};
/// use orderflow::order::OrderDraft;
/// use orderflow::workflow::WorkflowCatalog;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = OrchestrationEngine::new(WorkflowCatalog::builtin(), StepExecutors::builtin());
///
///     let order = engine
///         .create_order(OrderDraft::new("cust-1", 100.0, "USD", "visa"))
///         .await?;
///     engine.wait_idle(&order.order_id).await;
///
///     engine
///         .submit_decision(&order.order_id, true, Some(85.0), Some("BRL".into()))
///         .await?;
///     engine.wait_idle(&order.order_id).await;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OrchestrationEngine {
    catalog: Arc<WorkflowCatalog>,
    orders: Arc<OrderStore>,
    instances: Arc<InstanceRegistry>,
    executors: Arc<StepExecutors>,
    gates: Arc<BurstGates>,
    timeline: Arc<Mutex<ExecutionTimeline>>,
    suspend_ttl: Option<Duration>,
}

impl OrchestrationEngine {
    /// Creates an engine with empty order and instance stores.
    pub fn new(catalog: WorkflowCatalog, executors: StepExecutors) -> Self {
        for template in catalog.templates() {
            for step in &template.steps {
                if !executors.contains(&step.executor) {
                    warn!(
                        "Workflow '{}': step '{}' uses unregistered executor '{}'",
                        template.id, step.id, step.executor
                    );
                }
            }
        }

        Self {
            catalog: Arc::new(catalog),
            orders: Arc::new(OrderStore::new()),
            instances: Arc::new(InstanceRegistry::new()),
            executors: Arc::new(executors),
            gates: Arc::new(BurstGates::default()),
            timeline: Arc::new(Mutex::new(ExecutionTimeline::new())),
            suspend_ttl: None,
        }
    }

    /// Drops suspended instances older than `ttl` on each expiry sweep.
    pub fn set_suspend_ttl(&mut self, ttl: Duration) {
        self.suspend_ttl = Some(ttl);
    }

    pub fn suspend_ttl(&self) -> Option<Duration> {
        self.suspend_ttl
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Stores a new order and starts its workflow, if one matches.
    ///
    /// Returns as soon as the first burst is scheduled.
    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, EngineError> {
        draft.validate()?;

        let order = self.orders.create(draft).await;
        self.start_workflow(&order).await?;

        Ok(order)
    }

    /// Matches a template and schedules the first burst.
    pub async fn start_workflow(&self, order: &Order) -> Result<StartOutcome, EngineError> {
        let Some(template) = self.catalog.find_match(order) else {
            info!("[Orchestrator] No workflow found for {}", order.order_id);
            return Ok(StartOutcome::NoMatchingTemplate);
        };

        let guard = self.gates.acquire(&order.order_id).await;
        let instance = self.instances.start(&order.order_id, template).await?;
        let workflow_id = instance.template.id.clone();

        info!(
            "[Orchestrator] Starting workflow '{}' for {}",
            workflow_id, order.order_id
        );
        self.spawn_burst(order.clone(), instance, guard);

        Ok(StartOutcome::Started { workflow_id })
    }

    /// Boundary form of [`resume_workflow`](Self::resume_workflow).
    ///
    /// An acceptance must carry the new amount and currency.
    pub async fn submit_decision(
        &self,
        order_id: &str,
        accepted: bool,
        new_amount: Option<f64>,
        new_currency: Option<String>,
    ) -> Result<ResumeOutcome, EngineError> {
        let decision = Decision::from_parts(accepted, new_amount, new_currency)?;
        self.resume_workflow(order_id, decision).await
    }

    /// Applies a decision to a suspended order and schedules the resume burst.
    ///
    /// Late or duplicate decisions (no suspended instance) are reported
    /// as [`ResumeOutcome::NotAwaiting`] and leave the order untouched.
    pub async fn resume_workflow(
        &self,
        order_id: &str,
        decision: Decision,
    ) -> Result<ResumeOutcome, EngineError> {
        if self.orders.get(order_id).await.is_none() {
            warn!("[Orchestrator] Decision for unknown order {}", order_id);
            return Err(EngineError::OrderNotFound(order_id.to_string()));
        }

        if self.instances.get(order_id).await.is_none() {
            info!("[Orchestrator] No workflow awaiting resume for {}", order_id);
            return Ok(ResumeOutcome::NotAwaiting);
        }

        let guard = self.gates.acquire(order_id).await;

        let instance = match self.instances.get(order_id).await {
            Some(instance) if instance.is_suspended() => instance,
            Some(instance) => {
                warn!(
                    "[Orchestrator] Workflow for {} is {}, not awaiting a decision",
                    order_id, instance.state
                );
                return Ok(ResumeOutcome::NotAwaiting);
            }
            None => {
                info!("[Orchestrator] No workflow awaiting resume for {}", order_id);
                self.gates.forget(order_id).await;
                return Ok(ResumeOutcome::NotAwaiting);
            }
        };

        let order = self
            .orders
            .update(order_id, |terms| decision.apply(terms))
            .await?;

        match &decision {
            Decision::Accepted { amount, currency } => info!(
                "[PBC_DCC] Customer accepted DCC for {}: new value {:.2} {}",
                order_id, amount, currency
            ),
            Decision::Rejected => info!(
                "[PBC_DCC] Customer declined DCC for {}: keeping {:.2} {}",
                order_id, order.payment.amount, order.payment.currency
            ),
        }

        self.instances
            .set_state(order_id, WorkflowState::Running)
            .await?;
        let cursor = instance.cursor;
        let instance = WorkflowInstance {
            state: WorkflowState::Running,
            ..instance
        };

        let detail = if decision.is_accepted() { "accepted" } else { "rejected" };
        self.record(order_id, None, EventType::Resumed, Some(detail.to_string()))
            .await;

        info!("[Orchestrator] Resuming workflow for {} at step {}", order_id, cursor);
        self.spawn_burst(order, instance, guard);

        Ok(ResumeOutcome::Resumed { cursor })
    }

    fn spawn_burst(&self, order: Order, instance: WorkflowInstance, guard: OwnedMutexGuard<()>) {
        let engine = self.clone();
        tokio::spawn(async move {
            let outcome = engine.execute_from(order, instance).await;
            debug!("[Orchestrator] Burst ended: {:?}", outcome);
            drop(guard);
        });
    }

    /// Runs one burst from the instance cursor until a pause step
    /// suspends it, a step fails, or every step has run.
    ///
    /// Callers must hold the order's gate.
    async fn execute_from(&self, order: Order, instance: WorkflowInstance) -> BurstOutcome {
        let order_id = order.order_id.as_str();
        let steps = &instance.template.steps;

        for (index, step) in steps.iter().enumerate().skip(instance.cursor) {
            info!(
                "[Orchestrator] Executing step {} with {} for {}",
                step.id, step.executor, order_id
            );
            self.record(order_id, Some(step.id.as_str()), EventType::Started, None)
                .await;

            let result = match step.kind {
                StepKind::Pause => self.executors.run_pause(step, &order).map(Some),
                StepKind::Settlement => self.executors.run_settlement(step, &order).map(|()| None),
            };

            match result {
                Ok(Some(offer)) => {
                    let cursor = index + 1;
                    if let Err(e) = self.instances.suspend(order_id, cursor).await {
                        error!("[Orchestrator] Could not suspend {}: {}", order_id, e);
                        return BurstOutcome::Failed {
                            cursor: index,
                            reason: e.to_string(),
                        };
                    }

                    self.record(
                        order_id,
                        Some(step.id.as_str()),
                        EventType::Suspended,
                        Some(offer.to_string()),
                    )
                    .await;
                    info!(
                        "[Orchestrator] Workflow for {} suspended after '{}', awaiting decision",
                        order_id, step.id
                    );
                    return BurstOutcome::Suspended { cursor, offer };
                }
                Ok(None) => {
                    self.record(order_id, Some(step.id.as_str()), EventType::Completed, None)
                        .await;
                }
                Err(e) => {
                    let reason = e.to_string();
                    error!(
                        "[Orchestrator] Step '{}' failed for {}: {}",
                        step.id, order_id, reason
                    );
                    self.fail(order_id, index, &reason).await;
                    self.record(order_id, Some(step.id.as_str()), EventType::Failed, Some(reason.clone()))
                        .await;
                    return BurstOutcome::Failed {
                        cursor: index,
                        reason,
                    };
                }
            }
        }

        self.instances.remove(order_id).await;
        self.gates.forget(order_id).await;
        self.record(order_id, None, EventType::Finished, None).await;
        info!("[Orchestrator] Workflow completed for {}", order_id);

        BurstOutcome::Finished
    }

    /// Parks a failed instance at the failing step.
    async fn fail(&self, order_id: &str, cursor: usize, reason: &str) {
        if let Err(e) = self.instances.advance(order_id, cursor).await {
            error!("[Orchestrator] Could not record failure cursor for {}: {}", order_id, e);
        }
        if let Err(e) = self
            .instances
            .set_state(order_id, WorkflowState::Failed(reason.to_string()))
            .await
        {
            error!("[Orchestrator] Could not mark {} as failed: {}", order_id, e);
        }
    }

    /// Removes instances suspended for longer than the configured TTL.
    ///
    /// Returns the order IDs whose instances were dropped. Does nothing
    /// when no TTL is set.
    pub async fn expire_suspended(&self) -> Vec<String> {
        self.expire_suspended_at(Utc::now()).await
    }

    /// Expiry sweep evaluated as if the current time were `now`.
    pub async fn expire_suspended_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let Some(ttl) = self.suspend_ttl else {
            return Vec::new();
        };
        let cutoff = now - ttl;

        let mut expired = Vec::new();
        for order_id in self.instances.suspended_before(cutoff).await {
            let _guard = self.gates.acquire(&order_id).await;

            let still_stale = self
                .instances
                .get(&order_id)
                .await
                .is_some_and(|instance| instance.suspended_before(cutoff));
            if !still_stale {
                continue;
            }

            self.instances.remove(&order_id).await;
            self.gates.forget(&order_id).await;
            self.record(&order_id, None, EventType::Expired, None).await;
            warn!("[Orchestrator] Suspended workflow for {} expired", order_id);
            expired.push(order_id);
        }

        expired
    }

    /// Waits until no burst is running for the order.
    pub async fn wait_idle(&self, order_id: &str) {
        if let Some(gate) = self.gates.existing(order_id).await {
            let _ = gate.lock().await;
        }
    }

    /// Waits until no burst is running for any order.
    pub async fn wait_all_idle(&self) {
        for gate in self.gates.all().await {
            let _ = gate.lock().await;
        }
    }

    /// Returns a copy of the order.
    pub async fn order(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).await
    }

    /// Returns a copy of the order's live instance.
    pub async fn instance(&self, order_id: &str) -> Option<WorkflowInstance> {
        self.instances.get(order_id).await
    }

    pub async fn workflow_state(&self, order_id: &str) -> WorkflowState {
        self.instances
            .get(order_id)
            .await
            .map(|instance| instance.state)
            .unwrap_or(WorkflowState::None)
    }

    /// Number of live instances (suspended, running or failed).
    pub async fn active_instances(&self) -> usize {
        self.instances.len().await
    }

    pub async fn timeline_for(&self, order_id: &str) -> Vec<TimelineEvent> {
        self.timeline.lock().await.events_for(order_id)
    }

    pub async fn timeline_report(&self, order_id: &str) -> String {
        self.timeline.lock().await.report(order_id)
    }

    async fn record(
        &self,
        order_id: &str,
        step_id: Option<&str>,
        event_type: EventType,
        detail: Option<String>,
    ) {
        self.timeline
            .lock()
            .await
            .add_event(order_id, step_id, event_type, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::execution::step::StepExecutor;
    use crate::workflow::{WorkflowStep, WorkflowTemplate, DCC_EXECUTOR, PAYMENT_EXECUTOR};
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        order_id: String,
        step_id: String,
        amount: f64,
        currency: String,
    }

    /// Executor that records every invocation with the terms it saw.
    struct RecordingExecutor {
        name: String,
        calls: StdMutex<Vec<Call>>,
        fail: bool,
    }

    impl RecordingExecutor {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                calls: StdMutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                calls: StdMutex::new(Vec::new()),
                fail: true,
            })
        }

        fn record(&self, step: &WorkflowStep, order: &Order) {
            self.calls.lock().unwrap().push(Call {
                order_id: order.order_id.clone(),
                step_id: step.id.clone(),
                amount: order.payment.amount,
                currency: order.payment.currency.clone(),
            });
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_for(&self, order_id: &str) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| c.order_id == order_id)
                .collect()
        }
    }

    impl StepExecutor for RecordingExecutor {
        fn name(&self) -> &str {
            &self.name
        }

        fn run_pause_step(&self, step: &WorkflowStep, order: &Order) -> Result<Offer, StepError> {
            self.record(step, order);
            Ok(Offer {
                order_id: order.order_id.clone(),
                amount: order.payment.amount,
                currency: order.payment.currency.clone(),
                offered_amount: order.payment.amount * 0.85,
                offered_currency: "BRL".into(),
                rate: 0.85,
            })
        }

        fn run_settlement_step(&self, step: &WorkflowStep, order: &Order) -> Result<(), StepError> {
            self.record(step, order);
            if self.fail {
                return Err(StepError::Failed {
                    step: step.id.clone(),
                    reason: "acquirer unavailable".into(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        engine: OrchestrationEngine,
        dcc: Arc<RecordingExecutor>,
        payment: Arc<RecordingExecutor>,
    }

    fn harness_with(catalog: WorkflowCatalog, payment: Arc<RecordingExecutor>) -> Harness {
        let dcc = RecordingExecutor::new(DCC_EXECUTOR);
        let mut executors = StepExecutors::new();
        executors.register(dcc.clone());
        executors.register(payment.clone());

        Harness {
            engine: OrchestrationEngine::new(catalog, executors),
            dcc,
            payment,
        }
    }

    fn harness() -> Harness {
        harness_with(WorkflowCatalog::builtin(), RecordingExecutor::new(PAYMENT_EXECUTOR))
    }

    fn usd_order() -> OrderDraft {
        OrderDraft::new("cust-1", 100.0, "USD", "visa")
    }

    async fn suspended_usd_order(h: &Harness) -> Order {
        let order = h.engine.create_order(usd_order()).await.unwrap();
        h.engine.wait_idle(&order.order_id).await;
        order
    }

    #[tokio::test]
    async fn test_create_order_copies_payment_terms() {
        let h = harness();
        let order = h
            .engine
            .create_order(OrderDraft::new("cust-1", 42.5, "EUR", "amex"))
            .await
            .unwrap();

        assert_eq!(order.payment.amount, 42.5);
        assert_eq!(order.payment.currency, "EUR");
        assert!(!order.payment.decision_accepted);
    }

    #[tokio::test]
    async fn test_create_order_rejects_malformed_draft() {
        let h = harness();
        let result = h
            .engine
            .create_order(OrderDraft::new("cust-1", -5.0, "USD", "visa"))
            .await;

        assert!(matches!(result, Err(EngineError::MalformedInput(_))));
        assert!(h.engine.order("order-1").await.is_none());
    }

    #[tokio::test]
    async fn test_pause_step_suspends_before_settlement() {
        let h = harness();
        let order = suspended_usd_order(&h).await;

        let instance = h.engine.instance(&order.order_id).await.unwrap();
        assert_eq!(instance.template.id, "wf-payment-dcc-proposal");
        assert_eq!(instance.cursor, 1);
        assert_eq!(instance.state, WorkflowState::Suspended);

        assert_eq!(h.dcc.calls_for(&order.order_id).len(), 1);
        assert!(h.payment.calls().is_empty());
    }

    #[tokio::test]
    async fn test_template_without_pause_runs_to_completion() {
        let h = harness();
        let order = h
            .engine
            .create_order(OrderDraft::new("cust-2", 300.0, "BRL", "elo"))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        assert_eq!(h.engine.workflow_state(&order.order_id).await, WorkflowState::None);
        assert!(h.dcc.calls().is_empty());
        assert_eq!(
            h.payment.calls(),
            vec![Call {
                order_id: order.order_id.clone(),
                step_id: "payment_processing".into(),
                amount: 300.0,
                currency: "BRL".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_no_matching_template_is_not_an_error() {
        let h = harness();
        let order = h
            .engine
            .create_order(OrderDraft::new("cust-3", 10.0, "JPY", "jcb"))
            .await
            .unwrap();

        assert!(h.engine.order(&order.order_id).await.is_some());
        assert!(h.engine.instance(&order.order_id).await.is_none());
        assert_eq!(h.engine.active_instances().await, 0);

        let outcome = h.engine.start_workflow(&order).await.unwrap();
        assert_eq!(outcome, StartOutcome::NoMatchingTemplate);
    }

    #[tokio::test]
    async fn test_accepted_decision_settles_in_new_terms() {
        let h = harness();
        let order = suspended_usd_order(&h).await;

        let outcome = h
            .engine
            .submit_decision(&order.order_id, true, Some(85.0), Some("BRL".into()))
            .await
            .unwrap();
        assert_eq!(outcome, ResumeOutcome::Resumed { cursor: 1 });
        h.engine.wait_idle(&order.order_id).await;

        let updated = h.engine.order(&order.order_id).await.unwrap();
        assert_eq!(updated.payment.amount, 85.0);
        assert_eq!(updated.payment.currency, "BRL");
        assert!(updated.payment.decision_accepted);
        assert_eq!(updated.amount, 100.0);
        assert_eq!(updated.currency, "USD");

        let settled = h.payment.calls_for(&order.order_id);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].amount, 85.0);
        assert_eq!(settled[0].currency, "BRL");

        assert!(h.engine.instance(&order.order_id).await.is_none());
        assert_eq!(h.dcc.calls_for(&order.order_id).len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_decision_settles_in_original_terms() {
        let h = harness();
        let order = suspended_usd_order(&h).await;

        h.engine
            .submit_decision(&order.order_id, false, Some(85.0), Some("BRL".into()))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        let updated = h.engine.order(&order.order_id).await.unwrap();
        assert_eq!(updated.payment.amount, 100.0);
        assert_eq!(updated.payment.currency, "USD");
        assert!(!updated.payment.decision_accepted);

        let settled = h.payment.calls_for(&order.order_id);
        assert_eq!(settled.len(), 1);
        assert_eq!((settled[0].amount, settled[0].currency.as_str()), (100.0, "USD"));
        assert_eq!(h.engine.workflow_state(&order.order_id).await, WorkflowState::None);
    }

    #[tokio::test]
    async fn test_duplicate_decision_is_ignored() {
        let h = harness();
        let order = suspended_usd_order(&h).await;

        h.engine
            .submit_decision(&order.order_id, true, Some(85.0), Some("BRL".into()))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;
        let before = h.engine.order(&order.order_id).await.unwrap();

        let outcome = h
            .engine
            .submit_decision(&order.order_id, true, Some(1.0), Some("EUR".into()))
            .await
            .unwrap();

        assert_eq!(outcome, ResumeOutcome::NotAwaiting);
        assert_eq!(h.engine.order(&order.order_id).await.unwrap(), before);
        assert_eq!(h.payment.calls_for(&order.order_id).len(), 1);
    }

    #[tokio::test]
    async fn test_decision_for_unknown_order() {
        let h = harness();
        let result = h.engine.submit_decision("order-404", false, None, None).await;
        assert!(matches!(result, Err(EngineError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_decision_for_order_without_workflow() {
        let h = harness();
        let order = h
            .engine
            .create_order(OrderDraft::new("cust-4", 10.0, "GBP", "visa"))
            .await
            .unwrap();

        let outcome = h
            .engine
            .submit_decision(&order.order_id, true, Some(9.0), Some("EUR".into()))
            .await
            .unwrap();

        assert_eq!(outcome, ResumeOutcome::NotAwaiting);
        let unchanged = h.engine.order(&order.order_id).await.unwrap();
        assert_eq!(unchanged.payment.amount, 10.0);
        assert!(!unchanged.payment.decision_accepted);
    }

    #[tokio::test]
    async fn test_accepted_decision_requires_terms() {
        let h = harness();
        let order = suspended_usd_order(&h).await;

        let result = h
            .engine
            .submit_decision(&order.order_id, true, None, Some("BRL".into()))
            .await;

        assert!(matches!(result, Err(EngineError::MalformedInput(_))));
        assert_eq!(h.engine.workflow_state(&order.order_id).await, WorkflowState::Suspended);
    }

    #[tokio::test]
    async fn test_decision_right_after_create_waits_for_first_burst() {
        let h = harness();
        let order = h.engine.create_order(usd_order()).await.unwrap();

        // No wait: the decision must queue behind the initial burst.
        let outcome = h
            .engine
            .submit_decision(&order.order_id, true, Some(85.0), Some("BRL".into()))
            .await
            .unwrap();
        assert_eq!(outcome, ResumeOutcome::Resumed { cursor: 1 });
        h.engine.wait_idle(&order.order_id).await;

        assert_eq!(h.dcc.calls_for(&order.order_id).len(), 1);
        let settled = h.payment.calls_for(&order.order_id);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].currency, "BRL");
        assert!(h.engine.instance(&order.order_id).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_settlement_parks_instance() {
        let h = harness_with(
            WorkflowCatalog::builtin(),
            RecordingExecutor::failing(PAYMENT_EXECUTOR),
        );
        let order = h
            .engine
            .create_order(OrderDraft::new("cust-5", 50.0, "BRL", "visa"))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        let instance = h.engine.instance(&order.order_id).await.unwrap();
        assert_eq!(instance.cursor, 0);
        assert!(matches!(instance.state, WorkflowState::Failed(_)));

        let outcome = h
            .engine
            .submit_decision(&order.order_id, false, None, None)
            .await
            .unwrap();
        assert_eq!(outcome, ResumeOutcome::NotAwaiting);
        assert_eq!(h.payment.calls_for(&order.order_id).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_executor_fails_burst() {
        let catalog = WorkflowCatalog::new(vec![WorkflowTemplate::new("wf-wire")
            .with_criterion("currency", "CHF")
            .with_step(WorkflowStep::settlement("wire", "PBC_Wire"))])
        .unwrap();
        let h = harness_with(catalog, RecordingExecutor::new(PAYMENT_EXECUTOR));

        let order = h
            .engine
            .create_order(OrderDraft::new("cust-6", 10.0, "CHF", "visa"))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        match h.engine.workflow_state(&order.order_id).await {
            WorkflowState::Failed(reason) => assert!(reason.contains("PBC_Wire")),
            other => panic!("expected failed state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pause_step_in_the_middle() {
        let catalog = WorkflowCatalog::new(vec![WorkflowTemplate::new("wf-mid")
            .with_criterion("currency", "USD")
            .with_step(WorkflowStep::settlement("pre_auth", PAYMENT_EXECUTOR))
            .with_step(WorkflowStep::pause("dcc_proposal", DCC_EXECUTOR))
            .with_step(WorkflowStep::settlement("capture", PAYMENT_EXECUTOR))])
        .unwrap();
        let h = harness_with(catalog, RecordingExecutor::new(PAYMENT_EXECUTOR));

        let order = suspended_usd_order(&h).await;
        let instance = h.engine.instance(&order.order_id).await.unwrap();
        assert_eq!(instance.cursor, 2);
        assert_eq!(instance.state, WorkflowState::Suspended);

        let steps: Vec<String> = h.payment.calls().into_iter().map(|c| c.step_id).collect();
        assert_eq!(steps, vec!["pre_auth".to_string()]);

        h.engine
            .submit_decision(&order.order_id, false, None, None)
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        let steps: Vec<String> = h.payment.calls().into_iter().map(|c| c.step_id).collect();
        assert_eq!(steps, vec!["pre_auth".to_string(), "capture".to_string()]);
        assert!(h.engine.instance(&order.order_id).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_template_completes_immediately() {
        let catalog = WorkflowCatalog::new(vec![
            WorkflowTemplate::new("wf-noop").with_criterion("currency", "ARS")
        ])
        .unwrap();
        let h = harness_with(catalog, RecordingExecutor::new(PAYMENT_EXECUTOR));

        let order = h
            .engine
            .create_order(OrderDraft::new("cust-7", 1.0, "ARS", "visa"))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        assert_eq!(h.engine.workflow_state(&order.order_id).await, WorkflowState::None);
        let events = h.engine.timeline_for(&order.order_id).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Finished);
    }

    #[tokio::test]
    async fn test_timeline_records_offer_and_resume() {
        let h = harness();
        let order = suspended_usd_order(&h).await;
        h.engine
            .submit_decision(&order.order_id, true, Some(85.0), Some("BRL".into()))
            .await
            .unwrap();
        h.engine.wait_idle(&order.order_id).await;

        let kinds: Vec<EventType> = h
            .engine
            .timeline_for(&order.order_id)
            .await
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventType::Started,
                EventType::Suspended,
                EventType::Resumed,
                EventType::Started,
                EventType::Completed,
                EventType::Finished,
            ]
        );

        let report = h.engine.timeline_report(&order.order_id).await;
        assert!(report.contains("85.00 BRL"));
    }

    #[tokio::test]
    async fn test_expire_suspended_instances() {
        let mut h = harness();
        h.engine.set_suspend_ttl(Duration::seconds(60));
        let order = suspended_usd_order(&h).await;

        assert!(h.engine.expire_suspended().await.is_empty());

        let later = Utc::now() + Duration::seconds(120);
        let expired = h.engine.expire_suspended_at(later).await;
        assert_eq!(expired, vec![order.order_id.clone()]);
        assert_eq!(h.engine.workflow_state(&order.order_id).await, WorkflowState::None);

        let outcome = h
            .engine
            .submit_decision(&order.order_id, false, None, None)
            .await
            .unwrap();
        assert_eq!(outcome, ResumeOutcome::NotAwaiting);
    }

    #[tokio::test]
    async fn test_expiry_disabled_without_ttl() {
        let h = harness();
        suspended_usd_order(&h).await;

        let far_future = Utc::now() + Duration::days(365);
        assert!(h.engine.expire_suspended_at(far_future).await.is_empty());
        assert_eq!(h.engine.active_instances().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_get_distinct_ids() {
        let h = harness();
        let mut handles = Vec::new();

        for i in 0..50 {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .create_order(OrderDraft::new(format!("cust-{}", i), 100.0, "USD", "visa"))
                    .await
                    .unwrap()
                    .order_id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 50);

        h.engine.wait_all_idle().await;
        assert_eq!(h.engine.active_instances().await, 50);
        assert_eq!(h.dcc.calls().len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decisions_complete_every_order() {
        let h = harness();
        let mut order_ids = Vec::new();
        for i in 0..20 {
            let order = h
                .engine
                .create_order(OrderDraft::new(format!("cust-{}", i), 100.0, "USD", "visa"))
                .await
                .unwrap();
            order_ids.push(order.order_id);
        }

        let mut handles = Vec::new();
        for order_id in order_ids.clone() {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .submit_decision(&order_id, true, Some(85.0), Some("BRL".into()))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), ResumeOutcome::Resumed { cursor: 1 });
        }

        for order_id in &order_ids {
            h.engine.wait_idle(order_id).await;
        }
        assert_eq!(h.engine.active_instances().await, 0);
        assert_eq!(h.payment.calls().len(), 20);
        assert!(h.payment.calls().iter().all(|c| c.amount == 85.0 && c.currency == "BRL"));
    }
}
