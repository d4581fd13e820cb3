//! Orderflow - Order Workflow Orchestration Engine
//!
//! Selects a multi-step processing workflow for each incoming order and
//! runs it, pausing when a step needs an external decision (a currency
//! conversion offer) and resuming once the decision arrives.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`workflow`]: Workflow templates, catalog matching and YAML loading
//! - [`order`]: Order records and the concurrency-safe order store
//! - [`execution`]: Orchestration engine, instance registry and step executors
//! - [`monitoring`]: Per-order execution timeline
//! - [`api`]: Line-oriented JSON request boundary
//!
//! # Example
//!
//! ```rust,no_run
//! use orderflow::execution::{OrchestrationEngine, StepExecutors};
//! use orderflow::order::OrderDraft;
//! use orderflow::workflow::load_catalog;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load workflow templates from YAML
//!     let catalog = load_catalog("workflows.yaml")?;
//!
//!     // Create the engine with the built-in executors
//!     let engine = OrchestrationEngine::new(catalog, StepExecutors::builtin());
//!
//!     // Create an order; its workflow runs in the background
//!     let order = engine
//!         .create_order(OrderDraft::new("cust-1", 100.0, "USD", "visa"))
//!         .await?;
//!     engine.wait_idle(&order.order_id).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod order;
pub mod workflow;

// Re-export commonly used types
pub use error::{CatalogError, EngineError, StepError};
pub use execution::engine::OrchestrationEngine;
pub use order::{Order, OrderDraft};
pub use workflow::model::{WorkflowStep, WorkflowTemplate};
pub use workflow::parser::load_catalog;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Orderflow";
