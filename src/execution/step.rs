//! Step Executors
//!
//! Concrete step behavior lives behind the [`StepExecutor`] trait. The
//! engine looks executors up by the name a step declares and calls the
//! entry point matching the step kind:
//! - pause steps produce an [`Offer`] that is only reported, never applied
//! - settlement steps run to completion
//!
//! Executors must not touch order state; decisions are applied by the
//! engine when a resume signal arrives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::error::StepError;
use crate::order::Order;
use crate::workflow::{StepKind, WorkflowStep, DCC_EXECUTOR, PAYMENT_EXECUTOR};

/// Default conversion rate offered by the DCC executor.
pub const DEFAULT_DCC_RATE: f64 = 0.85;

/// Default currency offered by the DCC executor.
pub const DEFAULT_DCC_CURRENCY: &str = "BRL";

/// A currency-conversion offer produced by a pause step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    pub order_id: String,
    pub amount: f64,
    pub currency: String,
    pub offered_amount: f64,
    pub offered_currency: String,
    pub rate: f64,
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "convert {:.2} {} to {:.2} {} (rate {})",
            self.amount, self.currency, self.offered_amount, self.offered_currency, self.rate
        )
    }
}

/// Capability the engine invokes to run a step.
///
/// Both entry points default to [`StepError::Unsupported`], so an
/// executor only implements the kind it handles.
pub trait StepExecutor: Send + Sync {
    /// Name steps use to address this executor.
    fn name(&self) -> &str;

    /// Computes and reports a decision offer for the order's current
    /// payment terms.
    fn run_pause_step(&self, step: &WorkflowStep, order: &Order) -> Result<Offer, StepError> {
        let _ = (step, order);
        Err(StepError::Unsupported {
            executor: self.name().to_string(),
            kind: StepKind::Pause.to_string(),
        })
    }

    /// Settles the order's current payment terms.
    fn run_settlement_step(&self, step: &WorkflowStep, order: &Order) -> Result<(), StepError> {
        let _ = (step, order);
        Err(StepError::Unsupported {
            executor: self.name().to_string(),
            kind: StepKind::Settlement.to_string(),
        })
    }
}

/// Offers dynamic currency conversion at a fixed rate.
#[derive(Debug, Clone)]
pub struct DccOfferExecutor {
    rate: f64,
    currency: String,
}

impl DccOfferExecutor {
    pub fn new(rate: f64, currency: impl Into<String>) -> Self {
        Self {
            rate,
            currency: currency.into(),
        }
    }
}

impl Default for DccOfferExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_DCC_RATE, DEFAULT_DCC_CURRENCY)
    }
}

impl StepExecutor for DccOfferExecutor {
    fn name(&self) -> &str {
        DCC_EXECUTOR
    }

    fn run_pause_step(&self, _step: &WorkflowStep, order: &Order) -> Result<Offer, StepError> {
        let offer = Offer {
            order_id: order.order_id.clone(),
            amount: order.payment.amount,
            currency: order.payment.currency.clone(),
            offered_amount: order.payment.amount * self.rate,
            offered_currency: self.currency.clone(),
            rate: self.rate,
        };

        info!("[PBC_DCC] Offering conversion for {}: {}", order.order_id, offer);
        Ok(offer)
    }
}

/// Reports payment settlement.
#[derive(Debug, Clone, Default)]
pub struct PaymentExecutor;

impl StepExecutor for PaymentExecutor {
    fn name(&self) -> &str {
        PAYMENT_EXECUTOR
    }

    fn run_settlement_step(&self, _step: &WorkflowStep, order: &Order) -> Result<(), StepError> {
        info!(
            "[PBC_Payment] Processing payment for {}: {:.2} {}",
            order.order_id, order.payment.amount, order.payment.currency
        );
        Ok(())
    }
}

/// Registry of step executors by name.
#[derive(Clone, Default)]
pub struct StepExecutors {
    executors: HashMap<String, Arc<dyn StepExecutor>>,
}

impl StepExecutors {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in DCC and payment executors.
    pub fn builtin() -> Self {
        Self::with_dcc(DccOfferExecutor::default())
    }

    /// Built-in registry with a custom DCC offer.
    pub fn with_dcc(dcc: DccOfferExecutor) -> Self {
        let mut executors = Self::new();
        executors.register(Arc::new(dcc));
        executors.register(Arc::new(PaymentExecutor));
        executors
    }

    /// Registers an executor under its own name, replacing any previous one.
    pub fn register(&mut self, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(executor.name().to_string(), executor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StepExecutor>> {
        self.executors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// Runs a pause step through the executor it names.
    pub fn run_pause(&self, step: &WorkflowStep, order: &Order) -> Result<Offer, StepError> {
        self.resolve(step)?.run_pause_step(step, order)
    }

    /// Runs a settlement step through the executor it names.
    pub fn run_settlement(&self, step: &WorkflowStep, order: &Order) -> Result<(), StepError> {
        self.resolve(step)?.run_settlement_step(step, order)
    }

    fn resolve(&self, step: &WorkflowStep) -> Result<Arc<dyn StepExecutor>, StepError> {
        self.get(&step.executor)
            .ok_or_else(|| StepError::UnknownExecutor(step.executor.clone()))
    }
}

impl fmt::Debug for StepExecutors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.executors.keys().collect();
        names.sort();
        f.debug_struct("StepExecutors").field("executors", &names).finish()
    }
}
