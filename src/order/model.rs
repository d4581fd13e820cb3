//! Order Data Model
//!
//! An order is split into two halves:
//!
//! - search fields (customer, original amount/currency, card brand,
//!   payment type) used for workflow matching and frozen at creation;
//! - [`PaymentTerms`], the amount/currency actually settled plus the
//!   decision flag, the only part a decision may change.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "order_id": "order-1",
//!   "customer_id": "cust-42",
//!   "amount": 100.0,
//!   "currency": "USD",
//!   "card_brand": "visa",
//!   "payment_type": "credit_card",
//!   "dcc_accepted": false,
//!   "payment_amount": 100.0,
//!   "payment_currency": "USD",
//!   "created_at": "2026-10-19T12:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Payment type assumed when a draft does not name one.
pub const DEFAULT_PAYMENT_TYPE: &str = "credit_card";

fn default_payment_type() -> String {
    DEFAULT_PAYMENT_TYPE.to_string()
}

/// Order as submitted, before the store assigns an identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub card_brand: String,
    #[serde(default = "default_payment_type")]
    pub payment_type: String,
}

impl OrderDraft {
    /// Creates a credit-card draft.
    pub fn new(
        customer_id: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        card_brand: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            amount,
            currency: currency.into().trim().to_string(),
            card_brand: card_brand.into(),
            payment_type: default_payment_type(),
        }
    }

    /// Overrides the payment type.
    pub fn with_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_type = payment_type.into();
        self
    }

    /// Rejects drafts that can never be settled.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(EngineError::MalformedInput(format!(
                "amount must be a non-negative number, got {}",
                self.amount
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(EngineError::MalformedInput("currency is required".into()));
        }
        Ok(())
    }
}

/// Mutable execution half of an order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentTerms {
    #[serde(rename = "payment_amount")]
    pub amount: f64,
    #[serde(rename = "payment_currency")]
    pub currency: String,
    #[serde(rename = "dcc_accepted")]
    pub decision_accepted: bool,
}

/// A stored order.
///
/// Search fields are public for reading; the store only ever hands
/// mutators a `&mut PaymentTerms`, so they cannot drift after creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub card_brand: String,
    pub payment_type: String,
    #[serde(flatten)]
    pub payment: PaymentTerms,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materializes a draft under the given identity. Payment terms start
    /// out equal to the original amount and currency.
    pub fn from_draft(order_id: impl Into<String>, draft: OrderDraft) -> Self {
        let payment = PaymentTerms {
            amount: draft.amount,
            currency: draft.currency.clone(),
            decision_accepted: false,
        };

        Self {
            order_id: order_id.into(),
            customer_id: draft.customer_id,
            amount: draft.amount,
            currency: draft.currency,
            card_brand: draft.card_brand,
            payment_type: draft.payment_type,
            payment,
            created_at: Utc::now(),
        }
    }

    /// Looks up a search attribute by criteria key.
    ///
    /// Only original fields are exposed; payment terms never take part
    /// in workflow matching.
    pub fn search_attribute(&self, key: &str) -> Option<String> {
        match key {
            "customer_id" => Some(self.customer_id.clone()),
            "amount" => Some(self.amount.to_string()),
            "currency" => Some(self.currency.clone()),
            "card_brand" => Some(self.card_brand.clone()),
            "payment_type" => Some(self.payment_type.clone()),
            _ => None,
        }
    }
}

/// Outcome of an external currency-conversion decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Customer accepted the offer; settle in the offered terms.
    Accepted { amount: f64, currency: String },
    /// Customer declined; keep the current payment terms.
    Rejected,
}

impl Decision {
    /// Builds a decision from boundary fields.
    ///
    /// An acceptance must carry both the new amount and currency.
    pub fn from_parts(
        accepted: bool,
        new_amount: Option<f64>,
        new_currency: Option<String>,
    ) -> Result<Self, EngineError> {
        if !accepted {
            return Ok(Self::Rejected);
        }

        let amount = new_amount.ok_or_else(|| {
            EngineError::MalformedInput("accepted decision requires new_amount".into())
        })?;
        let currency = new_currency
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                EngineError::MalformedInput("accepted decision requires new_currency".into())
            })?;

        if !amount.is_finite() || amount < 0.0 {
            return Err(EngineError::MalformedInput(format!(
                "new_amount must be a non-negative number, got {}",
                amount
            )));
        }

        Ok(Self::Accepted { amount, currency })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Applies the decision to payment terms.
    pub fn apply(&self, terms: &mut PaymentTerms) {
        match self {
            Self::Accepted { amount, currency } => {
                terms.amount = *amount;
                terms.currency = currency.clone();
                terms.decision_accepted = true;
            }
            Self::Rejected => {
                terms.decision_accepted = false;
            }
        }
    }
}
