//! Order Module
//!
//! Order records and the store that owns them.
//!
//! - [`model`]: Order, draft, payment terms and decisions
//! - [`store`]: Concurrency-safe in-memory order store

pub mod model;
pub mod store;

pub use model::{Decision, Order, OrderDraft, PaymentTerms};
pub use store::OrderStore;
