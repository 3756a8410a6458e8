//! Everything that crosses an agent boundary.
//!
//! Agents never touch each other's queues or memory. A handler leaves
//! [`Envelope`]s for other agents and [`Report`]s for the executor; the
//! executor delivers envelopes as [`Inbound`] messages after the tick.

use crate::quality::QualityIssue;
use crate::staffing::Urgency;
use crate::types::{AgentId, OrderId, Task};
use brigade_core::Event;

/// A message waiting in an agent's inbox.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Take ownership of a task.
    Task(Task),
    /// Append an event to memory.
    Note(Event),
}

/// A message addressed to another agent.
#[derive(Debug, Clone)]
pub enum Envelope {
    Assign { to: AgentId, task: Task },
    Note { to: AgentId, event: Event },
}

impl Envelope {
    pub fn recipient(&self) -> AgentId {
        match self {
            Envelope::Assign { to, .. } | Envelope::Note { to, .. } => *to,
        }
    }

    pub fn into_inbound(self) -> Inbound {
        match self {
            Envelope::Assign { task, .. } => Inbound::Task(task),
            Envelope::Note { event, .. } => Inbound::Note(event),
        }
    }
}

/// Facts a handler hands to the executor, which owns orders, inventory and
/// the staffing desk.
#[derive(Debug, Clone)]
pub enum Report {
    OrderAssigned {
        order_id: OrderId,
        supervisor: AgentId,
    },
    StepCompleted {
        order_id: OrderId,
        item_index: usize,
        step_type: String,
    },
    /// A step nobody could take.
    StepFailed {
        order_id: Option<OrderId>,
        task_type: String,
        reason: String,
    },
    /// A step handed up the hierarchy.
    Escalated {
        task_type: String,
        to: AgentId,
    },
    QualityPassed {
        order_id: OrderId,
        warnings: Vec<QualityIssue>,
    },
    QualityRejected {
        order_id: OrderId,
        failures: Vec<String>,
    },
    StaffRequested {
        station: String,
        requester: AgentId,
        required: usize,
        current: usize,
        urgency: Urgency,
    },
    ReleaseRequested {
        station: String,
        requester: AgentId,
        excess: usize,
    },
    InventoryConsumed {
        ingredients: Vec<String>,
    },
    /// Dishes that cannot be served with current stock and equipment.
    MenuRestricted {
        dishes: Vec<String>,
    },
    /// The top of the hierarchy could not place work.
    AssignmentExhausted {
        task_type: String,
        detail: String,
    },
}
