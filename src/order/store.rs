//! In-Memory Order Store
//!
//! Owns every order record. All access goes through async accessors
//! guarded by a single `RwLock`, so ID assignment never collides and a
//! reader never sees a half-applied update.

use std::collections::HashMap;

use log::{debug, info};
use tokio::sync::RwLock;

use super::model::{Order, OrderDraft, PaymentTerms};
use crate::error::EngineError;

/// Prefix for store-assigned order identities.
const ORDER_ID_PREFIX: &str = "order-";

#[derive(Debug, Default)]
struct OrderTable {
    next_id: u64,
    orders: HashMap<String, Order>,
}

/// Concurrency-safe mapping of order ID to order state.
#[derive(Debug, Default)]
pub struct OrderStore {
    inner: RwLock<OrderTable>,
}

impl OrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new order and returns a copy of it.
    pub async fn create(&self, draft: OrderDraft) -> Order {
        let order = {
            let mut table = self.inner.write().await;
            table.next_id += 1;
            let order_id = format!("{}{}", ORDER_ID_PREFIX, table.next_id);
            let order = Order::from_draft(order_id.clone(), draft);
            table.orders.insert(order_id, order.clone());
            order
        };

        info!(
            "[Orders] Created {}: {:.2} {} ({}, {})",
            order.order_id, order.amount, order.currency, order.payment_type, order.card_brand
        );
        order
    }

    /// Returns a copy of the order, if it exists.
    pub async fn get(&self, order_id: &str) -> Option<Order> {
        self.inner.read().await.orders.get(order_id).cloned()
    }

    /// Applies `mutator` to the order's payment terms under exclusive
    /// access and returns the updated order.
    pub async fn update<F>(&self, order_id: &str, mutator: F) -> Result<Order, EngineError>
    where
        F: FnOnce(&mut PaymentTerms),
    {
        let mut table = self.inner.write().await;
        let order = table
            .orders
            .get_mut(order_id)
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        mutator(&mut order.payment);
        debug!(
            "[Orders] Updated {}: payment {:.2} {} (accepted: {})",
            order_id, order.payment.amount, order.payment.currency, order.payment.decision_accepted
        );

        Ok(order.clone())
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
