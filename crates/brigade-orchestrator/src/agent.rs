use crate::assignment::{Assigner, CandidateProfile, Roster};
use crate::config::KitchenConfig;
use crate::messages::{Envelope, Inbound, Report};
use crate::metrics::{BackendUse, Degradation, DegradationKind, ResolutionKind};
use crate::order::OrderBook;
use crate::policy::KitchenPolicy;
use crate::profiles::RoleProfile;
use crate::roles;
use crate::task_queue::TaskQueue;
use crate::types::{AgentId, AgentRole, BlockReason, OrderId, Task, TaskId, TaskStatus};
use brigade_agent::{LlmBackend, RoleContext};
use brigade_core::{BackendError, BrigadeError, BrigadeResult, Event, EventKind};
use brigade_memory::{AgentMemory, Recall};
use brigade_security::{Permission, PermissionSet};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Who an agent is. Cheap to copy into handlers.
#[derive(Debug, Clone)]
pub struct AgentCard {
    pub id: AgentId,
    pub name: String,
    pub role: AgentRole,
    pub station: Option<String>,
    pub supervisor: Option<AgentId>,
}

/// Shared, read-only view of the kitchen for one tick.
pub struct StepContext<'a> {
    pub now: DateTime<Utc>,
    pub roster: &'a Roster,
    pub orders: &'a OrderBook,
    pub config: &'a KitchenConfig,
    pub policy: &'a dyn KitchenPolicy,
    /// Task ids completed anywhere in the kitchen before this tick.
    pub completed_steps: &'a HashSet<TaskId>,
    pub cancelled_orders: &'a HashSet<OrderId>,
    /// Whether the clock is inside a peak window.
    pub peak: bool,
}

/// Scratch space handed to a role handler.
///
/// Handlers never touch other agents directly: they leave envelopes and
/// reports here and the executor delivers them after the tick.
pub struct Workbench<'a> {
    pub me: &'a AgentCard,
    pub ctx: &'a StepContext<'a>,
    /// The backend's answer for this task.
    pub decision: String,
    events: Vec<Event>,
    outbox: Vec<Envelope>,
    reports: Vec<Report>,
    own_tasks: Vec<Task>,
}

impl<'a> Workbench<'a> {
    pub fn new(me: &'a AgentCard, ctx: &'a StepContext<'a>, decision: String) -> Self {
        Self {
            me,
            ctx,
            decision,
            events: Vec::new(),
            outbox: Vec::new(),
            reports: Vec::new(),
            own_tasks: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.now
    }

    /// Record an event in this agent's memory.
    pub fn record(&mut self, kind: EventKind, content: impl Into<String>) -> &mut Event {
        self.events.push(Event::new(kind, content, self.ctx.now));
        let last = self.events.len() - 1;
        &mut self.events[last]
    }

    /// Hand a task to another agent.
    pub fn assign(&mut self, to: AgentId, task: Task) {
        self.record(
            EventKind::TaskAssignment,
            format!("assigned {} '{}' to {to}", task.task_type, task.description),
        );
        self.outbox.push(Envelope::Assign { to, task });
    }

    /// Send an event to another agent's memory.
    pub fn notify(&mut self, to: AgentId, event: Event) {
        self.outbox.push(Envelope::Note { to, event });
    }

    pub fn report(&mut self, report: Report) {
        self.reports.push(report);
    }

    /// Queue a follow-up task for this agent.
    pub fn add_own_task(&mut self, task: Task) {
        self.own_tasks.push(task);
    }

    /// A fresh assigner over the tick's weights and policy.
    pub fn assigner(&self) -> Assigner<'a> {
        let ctx: &'a StepContext<'a> = self.ctx;
        Assigner::new(&ctx.config.assignment, ctx.policy)
    }

    pub(crate) fn finish(self) -> HandlerOutput {
        HandlerOutput {
            events: self.events,
            outbox: self.outbox,
            reports: self.reports,
            own_tasks: self.own_tasks,
        }
    }
}

/// What a handler left on its workbench.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    pub events: Vec<Event>,
    pub outbox: Vec<Envelope>,
    pub reports: Vec<Report>,
    pub own_tasks: Vec<Task>,
}

/// Result of handling one task, before the status is written back.
#[derive(Debug)]
pub enum Handled {
    Completed,
    Blocked(BlockReason),
}

/// One attempt at one task.
#[derive(Debug, Clone)]
pub struct TaskAttempt {
    pub task_id: TaskId,
    pub task_type: String,
    pub kind: ResolutionKind,
    pub backend: BackendUse,
}

/// Everything an agent produced in one tick.
#[derive(Debug)]
pub struct StepOutcome {
    pub agent: AgentId,
    pub role: AgentRole,
    pub attempts: Vec<TaskAttempt>,
    pub outbox: Vec<Envelope>,
    pub reports: Vec<Report>,
    /// Events appended to memory this tick, in order.
    pub events: Vec<Event>,
    pub degradations: Vec<Degradation>,
    /// Task ids completed this tick.
    pub completed: Vec<TaskId>,
}

/// Where an agent works and what it can use there.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    pub station: Option<String>,
    pub supervisor: Option<AgentId>,
    /// Skills learned at the station, added to the role's base skills.
    pub skills: Vec<String>,
    pub equipment: Vec<String>,
}

/// A kitchen agent: a role, a permission set, its own memory and task queue.
pub struct Agent {
    card: AgentCard,
    permissions: PermissionSet,
    skills: BTreeSet<String>,
    equipment: BTreeSet<String>,
    system_prompt: &'static str,
    memory: AgentMemory,
    queue: TaskQueue,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    backend: Arc<dyn LlmBackend>,
    completed: usize,
    failed: usize,
}

impl Agent {
    /// Build an agent and the sender that feeds its inbox.
    pub fn new(
        name: impl Into<String>,
        profile: &RoleProfile,
        placement: Placement,
        memory: AgentMemory,
        backend: Arc<dyn LlmBackend>,
    ) -> (Self, mpsc::UnboundedSender<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let Placement {
            station,
            supervisor,
            skills: station_skills,
            equipment,
        } = placement;
        let mut skills: BTreeSet<String> = profile.base_skills.iter().cloned().collect();
        skills.extend(station_skills);
        if let Some(s) = &station {
            skills.insert(s.clone());
        }
        let agent = Self {
            card: AgentCard {
                id: Uuid::new_v4(),
                name: name.into(),
                role: profile.role,
                station,
                supervisor,
            },
            permissions: profile.permissions.clone(),
            skills,
            equipment: equipment.into_iter().collect(),
            system_prompt: profile.system_prompt,
            memory,
            queue: TaskQueue::new(),
            inbox: rx,
            backend,
            completed: 0,
            failed: 0,
        };
        (agent, tx)
    }

    pub fn id(&self) -> AgentId {
        self.card.id
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    pub fn role(&self) -> AgentRole {
        self.card.role
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.has(permission)
    }

    pub fn add_task(&mut self, task: Task) -> TaskId {
        self.queue.add(task)
    }

    /// The highest-priority pending task.
    pub fn next_task(&self) -> Option<&Task> {
        self.queue.next_pending()
    }

    /// Append an event to memory. Returns whether it reached long-term memory.
    pub async fn add_memory(&mut self, event: Event) -> bool {
        self.memory.add(event).await
    }

    pub async fn query_memory(&self, query: &str, k: usize) -> BrigadeResult<Vec<Recall>> {
        self.memory.query(query, k).await
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Move everything waiting in the inbox into the queue or memory.
    pub async fn drain_inbox(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(message) = self.inbox.try_recv() {
            drained += 1;
            match message {
                Inbound::Task(task) => {
                    debug!(agent = %self.card.name, task_type = %task.task_type, "Task received");
                    self.queue.add(task);
                }
                Inbound::Note(event) => {
                    self.memory.add(event).await;
                }
            }
        }
        drained
    }

    /// Copies of every task still awaiting work.
    pub fn unresolved_tasks(&self) -> Vec<Task> {
        self.queue.unresolved().cloned().collect()
    }

    /// Give up every pending or blocked task, for transfer to other agents.
    pub fn surrender(&mut self) -> Vec<Task> {
        self.queue.surrender()
    }

    /// Snapshot used by assigners this tick.
    pub async fn profile(&self, config: &KitchenConfig) -> CandidateProfile {
        let mut experience = BTreeSet::new();
        for task_type in roles::task_types(self.card.role) {
            match self
                .memory
                .has_completed(task_type, config.assignment.experience_lookback)
                .await
            {
                Ok(true) => {
                    experience.insert(task_type.to_string());
                }
                Ok(false) => {}
                Err(e) => warn!(agent = %self.card.name, error = %e, "Experience lookup failed"),
            }
        }
        CandidateProfile {
            id: self.card.id,
            name: self.card.name.clone(),
            role: self.card.role,
            station: self.card.station.clone(),
            supervisor: self.card.supervisor,
            active_tasks: self.queue.active_count(),
            unresolved_tasks: self.queue.unresolved().count(),
            skills: self.skills.clone(),
            equipment: self.equipment.clone(),
            experience,
            completed: self.completed,
            failed: self.failed,
        }
    }

    /// Run one tick: take in messages, refresh task states, then work through
    /// up to `tasks_per_step` pending tasks.
    pub async fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        self.drain_inbox().await;
        self.queue.refresh_dependencies(ctx.completed_steps);
        self.queue.release_blocked(|reason| ctx.policy.still_blocked(reason));
        let cancelled = self.queue.cancel_for_orders(ctx.cancelled_orders);
        if cancelled > 0 {
            debug!(agent = %self.card.name, cancelled, "Dropped tasks of cancelled orders");
        }

        let mut outcome = StepOutcome {
            agent: self.card.id,
            role: self.card.role,
            attempts: Vec::new(),
            outbox: Vec::new(),
            reports: Vec::new(),
            events: Vec::new(),
            degradations: Vec::new(),
            completed: Vec::new(),
        };

        for _ in 0..ctx.config.agents.tasks_per_step {
            let Some(task) = self.queue.next_pending().cloned() else {
                break;
            };
            self.queue.set_status(task.id, TaskStatus::InProgress);
            self.work_on(task, ctx, &mut outcome).await;
        }
        outcome
    }

    async fn work_on(&mut self, task: Task, ctx: &StepContext<'_>, outcome: &mut StepOutcome) {
        let (result, output, backend) = self.handle_task(&task, ctx).await;
        for t in output.own_tasks {
            self.queue.add(t);
        }
        outcome.outbox.extend(output.outbox);
        outcome.reports.extend(output.reports);
        let mut events = output.events;

        let kind = match result {
            Ok(Handled::Completed) => {
                self.queue.set_status(task.id, TaskStatus::Completed);
                self.completed += 1;
                outcome.completed.push(task.id);
                let mut done = Event::new(
                    EventKind::TaskCompletion,
                    format!("task_completion {}: {}", task.task_type, task.description),
                    ctx.now,
                )
                .with_meta("task_type", task.task_type.clone());
                if let Some(order_id) = task.order_id {
                    done = done.with_meta("order_id", order_id.to_string());
                }
                events.push(done);
                ResolutionKind::Completed
            }
            Ok(Handled::Blocked(reason)) => {
                debug!(agent = %self.card.name, task_type = %task.task_type, %reason, "Task blocked");
                self.queue
                    .set_status(task.id, TaskStatus::Blocked { reason });
                ResolutionKind::Blocked
            }
            Err(BrigadeError::Backend(e)) => {
                let attempts = task.attempts + 1;
                if let Some(t) = self.queue.get_mut(task.id) {
                    t.attempts = attempts;
                }
                if attempts > ctx.config.agents.max_task_retries {
                    warn!(agent = %self.card.name, task_type = %task.task_type, error = %e, "Backend retries exhausted");
                    self.fail(&task, format!("backend: {e}"), ctx, &mut events);
                    outcome.degradations.push(Degradation {
                        kind: DegradationKind::BackendExhausted,
                        source: self.card.name.clone(),
                        detail: format!("{} after {attempts} attempts: {e}", task.task_type),
                    });
                    ResolutionKind::Failed
                } else {
                    info!(agent = %self.card.name, task_type = %task.task_type, attempts, error = %e, "Backend failed, task requeued");
                    self.queue.set_status(task.id, TaskStatus::Pending);
                    ResolutionKind::Requeued
                }
            }
            Err(e @ BrigadeError::UnsupportedTaskType { .. }) => {
                warn!(agent = %self.card.name, error = %e, "Unsupported task type");
                self.fail(&task, e.to_string(), ctx, &mut events);
                ResolutionKind::Unsupported
            }
            Err(e @ BrigadeError::PermissionDenied { .. }) => {
                warn!(agent = %self.card.name, error = %e, "Permission denied");
                self.fail(&task, e.to_string(), ctx, &mut events);
                ResolutionKind::Denied
            }
            Err(e) => {
                warn!(agent = %self.card.name, task_type = %task.task_type, error = %e, "Task failed");
                if task.order_id.is_some() {
                    outcome.reports.push(Report::StepFailed {
                        order_id: task.order_id,
                        task_type: task.task_type.clone(),
                        reason: e.to_string(),
                    });
                }
                self.fail(&task, e.to_string(), ctx, &mut events);
                ResolutionKind::Failed
            }
        };

        for event in events {
            self.memory.add(event.clone()).await;
            outcome.events.push(event);
        }
        outcome.attempts.push(TaskAttempt {
            task_id: task.id,
            task_type: task.task_type.clone(),
            kind,
            backend,
        });
    }

    fn fail(&mut self, task: &Task, reason: String, ctx: &StepContext<'_>, events: &mut Vec<Event>) {
        self.failed += 1;
        events.push(
            Event::new(
                EventKind::Error,
                format!("error in {}: {reason}", task.task_type),
                ctx.now,
            )
            .with_meta("task_type", task.task_type.clone()),
        );
        self.queue
            .set_status(task.id, TaskStatus::Failed { reason });
    }

    /// Gate, consult memory and the backend, then run the role handler.
    pub async fn handle_task(
        &self,
        task: &Task,
        ctx: &StepContext<'_>,
    ) -> (BrigadeResult<Handled>, HandlerOutput, BackendUse) {
        let entry = match roles::lookup(self.card.role, &task.task_type) {
            Some(entry) => entry,
            None => {
                let err = BrigadeError::UnsupportedTaskType {
                    role: self.card.role.to_string(),
                    task_type: task.task_type.clone(),
                };
                return (Err(err), HandlerOutput::default(), BackendUse::NotCalled);
            }
        };
        if !self.permissions.has(entry.permission) {
            let err = BrigadeError::PermissionDenied {
                role: self.card.role.to_string(),
                permission: entry.permission.to_string(),
            };
            return (Err(err), HandlerOutput::default(), BackendUse::NotCalled);
        }
        if let Some(reason) = ctx.policy.blocking_reason(task) {
            return (
                Ok(Handled::Blocked(reason)),
                HandlerOutput::default(),
                BackendUse::NotCalled,
            );
        }

        let decision = match self.decide(task, ctx).await {
            Ok(text) => text,
            Err(e) => {
                return (
                    Err(BrigadeError::Backend(e)),
                    HandlerOutput::default(),
                    BackendUse::Failed,
                )
            }
        };

        let mut bench = Workbench::new(&self.card, ctx, decision);
        let decision_note = format!("decided on {}: {}", task.task_type, bench.decision);
        bench.record(EventKind::Decision, decision_note);
        let result = (entry.handler)(&mut bench, task).map(|()| Handled::Completed);
        (result, bench.finish(), BackendUse::Answered)
    }

    async fn decide(&self, task: &Task, ctx: &StepContext<'_>) -> Result<String, BackendError> {
        let recalled = match self
            .memory
            .query(&task.description, ctx.config.agents.memory_context)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(agent = %self.card.name, error = %e, "Memory query failed");
                Vec::new()
            }
        };
        let prompt = self.build_prompt(task, &recalled);
        let role_context = RoleContext {
            role: self.card.role.to_string(),
            agent: self.card.name.clone(),
            station: self.card.station.clone(),
            task_type: task.task_type.clone(),
        };
        let limit = Duration::from_millis(ctx.config.agents.backend_timeout_ms);
        match tokio::time::timeout(limit, self.backend.complete(&prompt, &role_context)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }

    fn build_prompt(&self, task: &Task, recalled: &[Recall]) -> String {
        let mut prompt = format!(
            "{}\nYou are {}.\n\nTask ({}, priority {}): {}\n",
            self.system_prompt, self.card.name, task.task_type, task.priority, task.description
        );
        if !recalled.is_empty() {
            prompt.push_str("\nRelevant memories:\n");
            for r in recalled {
                prompt.push_str(&format!("- [{}] {}\n", r.event.kind, r.event.content));
            }
        }
        prompt
    }
}
