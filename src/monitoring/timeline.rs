//! Execution Timeline
//!
//! Records what each burst did, per order: steps started and
//! completed, suspensions, resumes, failures and completion. Offers
//! produced by pause steps are only visible here and in the logs.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of events retained before the oldest are dropped.
pub const DEFAULT_TIMELINE_CAPACITY: usize = 10_000;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Instance suspended after a pause step
    Suspended,
    /// Instance resumed by a decision
    Resumed,
    /// Step failed
    Failed,
    /// All steps ran; instance removed
    Finished,
    /// Suspended instance dropped after its expiry
    Expired,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Suspended => "suspended",
            Self::Resumed => "resumed",
            Self::Failed => "failed",
            Self::Finished => "finished",
            Self::Expired => "expired",
        };
        write!(f, "{}", label)
    }
}

/// A single event in the execution timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub order_id: String,
    /// Step the event refers to; `None` for workflow-level events
    pub step_id: Option<String>,
    pub event_type: EventType,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded log of execution events across all orders.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: VecDeque<TimelineEvent>,
    capacity: usize,
}

impl ExecutionTimeline {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TIMELINE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records a step-level event.
    pub fn add_step_event(&mut self, order_id: &str, step_id: &str, event_type: EventType) {
        self.push(order_id, Some(step_id.to_string()), event_type, None);
    }

    /// Records an event with free-form detail (e.g. an offer).
    pub fn add_event(
        &mut self,
        order_id: &str,
        step_id: Option<&str>,
        event_type: EventType,
        detail: Option<String>,
    ) {
        self.push(order_id, step_id.map(str::to_string), event_type, detail);
    }

    fn push(
        &mut self,
        order_id: &str,
        step_id: Option<String>,
        event_type: EventType,
        detail: Option<String>,
    ) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(TimelineEvent {
            order_id: order_id.to_string(),
            step_id,
            event_type,
            detail,
            timestamp: Utc::now(),
        });
    }

    /// Events recorded for one order, oldest first.
    pub fn events_for(&self, order_id: &str) -> Vec<TimelineEvent> {
        self.events
            .iter()
            .filter(|event| event.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Renders one line per event for an order.
    pub fn report(&self, order_id: &str) -> String {
        let mut output = format!("Timeline for {}:\n", order_id);

        for event in self.events.iter().filter(|e| e.order_id == order_id) {
            output.push_str(&format!(
                "  {} {:10} {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.event_type.to_string(),
                event.step_id.as_deref().unwrap_or("-")
            ));
            if let Some(detail) = &event.detail {
                output.push_str(&format!(" ({})", detail));
            }
            output.push('\n');
        }

        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}
