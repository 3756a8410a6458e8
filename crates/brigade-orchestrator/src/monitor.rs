use crate::agent::{AgentCard, StepOutcome};
use crate::metrics::{MetricsSnapshot, ResolutionKind};
use crate::types::{AgentId, AgentRole, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What an agent was doing at the end of the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Working,
    /// Only blocked work in the last tick.
    Blocked,
    /// Left the kitchen.
    Released,
}

/// Per-agent view kept for dashboards and the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub name: String,
    pub role: AgentRole,
    pub station: Option<String>,
    pub status: WorkerStatus,
    /// Last task touched.
    pub current_task: Option<TaskId>,
    pub completed: u32,
    pub failed: u32,
    pub events: u32,
}

/// One line of the human-readable run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub agent: String,
    pub kind: String,
    pub message: String,
}

/// Streamed to the caller while a scenario runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunUpdate {
    Tick {
        tick: u32,
        phase: String,
        clock: DateTime<Utc>,
        metrics: MetricsSnapshot,
        log: Vec<LogLine>,
    },
    Final(MetricsSnapshot),
}

/// Tracks state for all agents in the kitchen.
#[derive(Clone, Default)]
pub struct AgentMonitor {
    states: Arc<RwLock<HashMap<AgentId, AgentState>>>,
}

impl AgentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an agent as idle.
    pub async fn register(&self, card: &AgentCard) {
        let mut states = self.states.write().await;
        states.insert(
            card.id,
            AgentState {
                id: card.id,
                name: card.name.clone(),
                role: card.role,
                station: card.station.clone(),
                status: WorkerStatus::Idle,
                current_task: None,
                completed: 0,
                failed: 0,
                events: 0,
            },
        );
    }

    /// Fold one tick's outcome into the agent's state.
    pub async fn observe(&self, outcome: &StepOutcome) {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(&outcome.agent) else {
            return;
        };
        if state.status == WorkerStatus::Released {
            return;
        }
        state.events += outcome.events.len() as u32;
        for attempt in &outcome.attempts {
            match attempt.kind {
                ResolutionKind::Completed => state.completed += 1,
                ResolutionKind::Failed | ResolutionKind::Unsupported | ResolutionKind::Denied => {
                    state.failed += 1
                }
                ResolutionKind::Requeued | ResolutionKind::Blocked => {}
            }
        }
        state.current_task = outcome.attempts.last().map(|a| a.task_id);
        state.status = if outcome.attempts.is_empty() {
            WorkerStatus::Idle
        } else if outcome
            .attempts
            .iter()
            .all(|a| a.kind == ResolutionKind::Blocked)
        {
            WorkerStatus::Blocked
        } else {
            WorkerStatus::Working
        };
    }

    /// Mark an agent as gone. Its history stays visible.
    pub async fn release(&self, id: AgentId) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&id) {
            state.status = WorkerStatus::Released;
            state.current_task = None;
        }
    }

    /// All agents, ordered by name.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let states = self.states.read().await;
        let mut all: Vec<AgentState> = states.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn get_state(&self, id: AgentId) -> Option<AgentState> {
        let states = self.states.read().await;
        states.get(&id).cloned()
    }

    /// Serialize the current state as JSON (for a dashboard).
    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let on_shift = states
            .iter()
            .filter(|s| s.status != WorkerStatus::Released)
            .count();
        serde_json::json!({
            "agents": states,
            "on_shift": on_shift,
        })
    }
}
