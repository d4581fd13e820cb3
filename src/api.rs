//! Request Boundary
//!
//! Line-oriented JSON boundary in front of the engine. Each input line
//! is one request; each produces one response carrying an HTTP-style
//! status code:
//!
//! ```json
//! {"action":"create_order","customer_id":"c1","amount":100.0,"currency":"USD","card_brand":"visa"}
//! {"action":"submit_decision","order_id":"order-1","accepted":true,"new_amount":85.0,"new_currency":"BRL"}
//! ```
//!
//! Decoding failures are rejected here, before reaching the engine.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::execution::{OrchestrationEngine, ResumeOutcome};
use crate::order::OrderDraft;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_ACCEPTED: u16 = 202;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// A decoded boundary request.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    CreateOrder(OrderDraft),
    SubmitDecision(DecisionRequest),
}

/// Customer answer to a currency-conversion offer.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub order_id: String,
    pub accepted: bool,
    #[serde(default)]
    pub new_amount: Option<f64>,
    #[serde(default)]
    pub new_currency: Option<String>,
}

/// Response written back for one request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into() }))
    }

    fn from_engine_error(err: &EngineError) -> Self {
        let status = match err {
            EngineError::OrderNotFound(_) | EngineError::InstanceNotFound(_) => STATUS_NOT_FOUND,
            EngineError::MalformedInput(_) => STATUS_BAD_REQUEST,
            EngineError::InstanceAlreadyActive(_) | EngineError::CursorRegression { .. } => {
                STATUS_CONFLICT
            }
        };
        Self::error(status, err.to_string())
    }
}

/// Decodes one request line, returning a ready 400 response on failure.
pub fn decode_request(line: &str) -> Result<Request, Response> {
    serde_json::from_str(line).map_err(|e| {
        warn!("[API] Invalid request: {}", e);
        Response::error(STATUS_BAD_REQUEST, format!("Invalid request: {}", e))
    })
}

/// Runs a decoded request against the engine.
pub async fn dispatch(engine: &OrchestrationEngine, request: Request) -> Response {
    match request {
        Request::CreateOrder(draft) => match engine.create_order(draft).await {
            Ok(order) => match serde_json::to_value(&order) {
                Ok(body) => Response::new(STATUS_CREATED, body),
                Err(e) => Response::error(STATUS_INTERNAL_ERROR, e.to_string()),
            },
            Err(e) => Response::from_engine_error(&e),
        },
        Request::SubmitDecision(decision) => {
            let result = engine
                .submit_decision(
                    &decision.order_id,
                    decision.accepted,
                    decision.new_amount,
                    decision.new_currency,
                )
                .await;

            match result {
                Ok(ResumeOutcome::Resumed { cursor }) => Response::new(
                    STATUS_ACCEPTED,
                    json!({ "order_id": decision.order_id, "resumed": true, "cursor": cursor }),
                ),
                Ok(ResumeOutcome::NotAwaiting) => Response::new(
                    STATUS_OK,
                    json!({
                        "order_id": decision.order_id,
                        "resumed": false,
                        "message": "no workflow awaiting resume",
                    }),
                ),
                Err(e) => Response::from_engine_error(&e),
            }
        }
    }
}

/// Decodes and dispatches one input line.
pub async fn handle_line(engine: &OrchestrationEngine, line: &str) -> Response {
    match decode_request(line) {
        Ok(request) => dispatch(engine, request).await,
        Err(response) => response,
    }
}
