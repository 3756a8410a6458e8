use crate::agent::{Agent, StepContext, StepOutcome};
use crate::assignment::{Assigner, Roster};
use crate::config::KitchenConfig;
use crate::messages::{Envelope, Inbound, Report};
use crate::metrics::{CrisisPhase, Degradation, DegradationKind, MetricsAccumulator, MetricsSnapshot};
use crate::monitor::{AgentMonitor, LogLine, RunUpdate};
use crate::order::{CancelReason, ItemStage, MenuItem, OrderBook, OrderStatus};
use crate::persistence::{InMemoryOrderStore, OrderStore};
use crate::policy::InventoryPolicy;
use crate::scenario::{CrisisKind, Phase, Scenario};
use crate::scheduler::{JobAction, ScheduledJob, Scheduler, SimClock};
use crate::spawner::{role_title, AgentSpawner, SpawnRequest, Spawned};
use crate::staffing::{is_peak, plan_release, RequestStatus, StaffRequest, StaffingDesk};
use crate::types::{AgentId, AgentRole, OrderId, Task, TaskId};

use brigade_agent::LlmBackend;
use brigade_core::{BrigadeError, BrigadeResult, Event, EventKind};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs one scenario against one model and scores it.
///
/// The executor owns the clock, the order book, inventory and the staffing
/// desk. Agents own their queues and memories; the executor only reaches
/// them through their inboxes.
pub struct ScenarioExecutor {
    scenario: Scenario,
    model: String,
    backend: Arc<dyn LlmBackend>,
    config: KitchenConfig,
    store: Arc<dyn OrderStore>,
    monitor: AgentMonitor,
    memory_dir: Option<PathBuf>,
}

impl ScenarioExecutor {
    pub fn new(
        scenario: Scenario,
        model: impl Into<String>,
        backend: Arc<dyn LlmBackend>,
        config: KitchenConfig,
    ) -> BrigadeResult<Self> {
        scenario.validate()?;
        config.validate()?;
        Ok(Self {
            scenario,
            model: model.into(),
            backend,
            config,
            store: Arc::new(InMemoryOrderStore::new()),
            monitor: AgentMonitor::new(),
            memory_dir: None,
        })
    }

    /// Persist orders and inventory through `store`.
    pub fn with_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.store = store;
        self
    }

    /// Keep each agent's long-term memory in a JSONL file under `dir`.
    pub fn with_memory_dir(mut self, dir: PathBuf) -> Self {
        self.memory_dir = Some(dir);
        self
    }

    pub fn monitor(&self) -> &AgentMonitor {
        &self.monitor
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Run the scenario to the end, streaming one [`RunUpdate::Tick`] per tick
    /// and exactly one [`RunUpdate::Final`].
    ///
    /// Never fails: problems are carried as degradations in the snapshot.
    pub async fn run(&self, updates: &mpsc::UnboundedSender<RunUpdate>) -> MetricsSnapshot {
        info!(scenario = %self.scenario.name, model = %self.model, "Scenario starting");
        let snapshot = match Kitchen::open(self).await {
            Ok(mut kitchen) => {
                let duration = self.scenario.duration_ticks;
                for tick in 1..=duration {
                    kitchen.tick(tick).await;
                    let update = RunUpdate::Tick {
                        tick,
                        phase: Phase::at(tick, duration).to_string(),
                        clock: kitchen.clock.now(),
                        metrics: kitchen.snapshot(),
                        log: std::mem::take(&mut kitchen.log),
                    };
                    if updates.send(update).is_err() {
                        debug!("Update receiver dropped");
                    }
                    if kitchen.aborted {
                        error!(tick, "Assignment exhausted, stopping the run");
                        break;
                    }
                }
                kitchen.snapshot()
            }
            Err(e) => {
                error!(error = %e, "Kitchen setup failed");
                let mut metrics = MetricsAccumulator::new();
                metrics.record_degradation(Degradation {
                    kind: DegradationKind::PersistenceFailure,
                    source: "setup".into(),
                    detail: e.to_string(),
                });
                metrics.finalize(&self.model, &self.scenario.name, Default::default())
            }
        };
        info!(
            scenario = %self.scenario.name,
            completion = snapshot.task_completion_rate,
            degraded = snapshot.degraded,
            "Scenario finished"
        );
        if updates.send(RunUpdate::Final(snapshot.clone())).is_err() {
            debug!("Update receiver dropped");
        }
        snapshot
    }
}

struct Member {
    agent: Agent,
    inbox: mpsc::UnboundedSender<Inbound>,
}

struct PendingRelease {
    station: String,
    requester: AgentId,
    excess: usize,
}

/// Mutable state of one run.
struct Kitchen<'e> {
    exec: &'e ScenarioExecutor,
    spawner: AgentSpawner,
    menu: Vec<MenuItem>,
    members: Vec<Member>,
    orders: OrderBook,
    /// Generated order index to order id.
    stream: HashMap<usize, OrderId>,
    policy: InventoryPolicy,
    clock: SimClock,
    scheduler: Scheduler,
    desk: StaffingDesk,
    metrics: MetricsAccumulator,
    completed_steps: HashSet<TaskId>,
    cancelled: HashSet<OrderId>,
    restricted: BTreeSet<String>,
    qc_requested: HashSet<OrderId>,
    releases: Vec<PendingRelease>,
    time_pressure: f64,
    hired: usize,
    log: Vec<LogLine>,
    aborted: bool,
}

impl<'e> Kitchen<'e> {
    async fn open(exec: &'e ScenarioExecutor) -> BrigadeResult<Kitchen<'e>> {
        let scenario = &exec.scenario;
        let menu = scenario.menu();
        let mut spawner = AgentSpawner::new(exec.backend.clone(), &exec.config, menu.clone());
        if let Some(dir) = &exec.memory_dir {
            spawner = spawner.with_memory_dir(dir.clone());
        }
        let staff = spawner
            .brigade(&scenario.stations, scenario.staff_count)
            .await?;

        let mut metrics = MetricsAccumulator::new();
        for role in AgentRole::ALL {
            metrics.register_role(role);
        }
        for (ingredient, level) in &scenario.inventory {
            exec.store
                .update_inventory(ingredient, i64::from(*level))
                .await?;
        }

        let mut kitchen = Kitchen {
            exec,
            spawner,
            menu,
            members: Vec::with_capacity(staff.len()),
            orders: OrderBook::new(),
            stream: HashMap::new(),
            policy: InventoryPolicy::new(scenario.inventory.clone()),
            clock: SimClock::new(scenario.start_time, scenario.tick_minutes),
            scheduler: Scheduler::new(),
            desk: StaffingDesk::new(scenario.reserve_staff),
            metrics,
            completed_steps: HashSet::new(),
            cancelled: HashSet::new(),
            restricted: BTreeSet::new(),
            qc_requested: HashSet::new(),
            releases: Vec::new(),
            time_pressure: scenario.constraints.time_pressure,
            hired: scenario.staff_count,
            log: Vec::new(),
            aborted: false,
        };
        for spawned in staff {
            kitchen.enlist(spawned).await;
        }
        info!(agents = kitchen.members.len(), "Brigade on shift");
        Ok(kitchen)
    }

    async fn enlist(&mut self, (agent, inbox): Spawned) {
        self.exec.monitor.register(agent.card()).await;
        self.members.push(Member { agent, inbox });
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.finalize(
            &self.exec.model,
            &self.exec.scenario.name,
            self.orders.summary(),
        )
    }

    async fn tick(&mut self, tick: u32) {
        let mut delta = MetricsAccumulator::new();
        delta.record_tick();
        let now = self.clock.advance();
        let exec = self.exec;
        let scenario = &exec.scenario;

        if let Some(crisis) = scenario.crisis.as_ref().filter(|c| c.at_tick == tick) {
            self.start_crisis(&crisis.kind, crisis.recovery_ticks, now, &mut delta)
                .await;
        }
        for job in self.scheduler.due(now) {
            self.run_job(job, now, &mut delta).await;
        }
        for index in scenario.arrivals(tick) {
            self.admit(index, now, &mut delta).await;
        }
        for cancellation in scenario.cancellations.iter().filter(|c| c.at_tick == tick) {
            if let Some(id) = self.stream.get(&cancellation.order_index).copied() {
                self.cancel_order(id, CancelReason::Customer, now, &mut delta)
                    .await;
            }
        }
        if tick % scenario.constraints.supervision_interval == 0 {
            self.send_to_role(
                AgentRole::ExecutiveChef,
                Task::new("kitchen_supervision", format!("walk the kitchen at tick {tick}"))
                    .with_priority(6),
            );
        }

        let roster = self.roster().await;
        let outcomes = self.step_agents(&roster, now).await;
        delta.observe_agents(self.members.len());
        let phase = self.crisis_phase(tick);
        for outcome in outcomes {
            self.absorb(outcome, phase, now, &mut delta).await;
        }

        self.review_orders(&roster, now, &mut delta).await;
        self.process_releases(now, &mut delta).await;
        self.metrics.merge(&delta);
    }

    async fn roster(&self) -> Roster {
        let mut profiles = Vec::with_capacity(self.members.len());
        for member in &self.members {
            profiles.push(member.agent.profile(&self.exec.config).await);
        }
        Roster::new(profiles)
    }

    /// Advance every agent one step, concurrently.
    async fn step_agents(&mut self, roster: &Roster, now: DateTime<Utc>) -> Vec<StepOutcome> {
        let ctx = StepContext {
            now,
            roster,
            orders: &self.orders,
            config: &self.exec.config,
            policy: &self.policy,
            completed_steps: &self.completed_steps,
            cancelled_orders: &self.cancelled,
            peak: is_peak(now, &self.exec.config.staffing.peak_windows),
        };
        let ctx = &ctx;
        join_all(self.members.iter_mut().map(|m| m.agent.step(ctx))).await
    }

    fn crisis_phase(&self, tick: u32) -> CrisisPhase {
        match &self.exec.scenario.crisis {
            None => CrisisPhase::NoCrisis,
            Some(c) if tick < c.at_tick => CrisisPhase::Before,
            Some(_) => CrisisPhase::After,
        }
    }

    /// Fold one agent's tick into the run: metrics, log, messages, reports.
    async fn absorb(
        &mut self,
        outcome: StepOutcome,
        phase: CrisisPhase,
        now: DateTime<Utc>,
        delta: &mut MetricsAccumulator,
    ) {
        self.exec.monitor.observe(&outcome).await;
        for attempt in &outcome.attempts {
            delta.record_resolution(outcome.role, attempt.kind, attempt.backend, phase);
        }
        let name = self.name_of(outcome.agent);
        for event in &outcome.events {
            delta.record_event_kind(outcome.role, event.kind.as_str());
            self.log.push(LogLine {
                at: event.timestamp,
                agent: name.clone(),
                kind: event.kind.to_string(),
                message: event.content.clone(),
            });
        }
        for degradation in outcome.degradations {
            delta.record_degradation(degradation);
        }
        self.completed_steps.extend(outcome.completed);

        delta.record_messages(outcome.outbox.len());
        for envelope in outcome.outbox {
            if matches!(envelope, Envelope::Assign { .. }) {
                delta.record_assignments(1);
            }
            let to = envelope.recipient();
            if !self.deliver(to, envelope.into_inbound()) {
                warn!(from = %name, to = %to, "Message to an agent no longer on shift dropped");
            }
        }
        for report in outcome.reports {
            self.handle_report(report, &name, now, delta).await;
        }
    }

    async fn handle_report(
        &mut self,
        report: Report,
        source: &str,
        now: DateTime<Utc>,
        delta: &mut MetricsAccumulator,
    ) {
        match report {
            Report::OrderAssigned {
                order_id,
                supervisor,
            } => {
                if let Some(order) = self.orders.get_mut(order_id) {
                    order.assigned_to = Some(supervisor);
                    if order.status == OrderStatus::Received
                        && order.advance_to(OrderStatus::Assigned, now).is_err()
                    {
                        debug!(order = %order_id, "Order moved on before assignment landed");
                    }
                }
                self.persist(order_id, delta).await;
            }
            Report::StepCompleted {
                order_id,
                item_index,
                step_type,
            } => {
                if let (Some(stage), Some(order)) =
                    (ItemStage::after_step(&step_type), self.orders.get_mut(order_id))
                {
                    order.set_item_stage(item_index, stage, now);
                }
            }
            Report::StepFailed {
                order_id,
                task_type,
                reason,
            } => {
                warn!(source, task_type = %task_type, reason = %reason, "Step failed");
                let detail = match order_id {
                    Some(id) => format!("{task_type} for order {id}: {reason}"),
                    None => format!("{task_type}: {reason}"),
                };
                delta.record_degradation(Degradation {
                    kind: DegradationKind::StepUnassignable,
                    source: source.to_string(),
                    detail,
                });
                // The item can no longer be finished.
                if let Some(id) = order_id {
                    self.cancel_order(id, CancelReason::Unavailable, now, delta)
                        .await;
                }
            }
            Report::Escalated { .. } => delta.record_escalation(),
            Report::QualityPassed { order_id, warnings } => {
                delta.record_quality(warnings.len(), false);
                if let Some(order) = self.orders.get_mut(order_id) {
                    let status = order.pass_quality(now);
                    info!(order = %order_id, %status, warnings = warnings.len(), "Quality passed");
                }
                self.persist(order_id, delta).await;
            }
            Report::QualityRejected { order_id, failures } => {
                delta.record_quality(0, true);
                self.note(
                    now,
                    EventKind::QualityWarning,
                    format!("order {order_id} rejected: {}", failures.join("; ")),
                );
                self.cancel_order(order_id, CancelReason::QualityRejected, now, delta)
                    .await;
            }
            Report::StaffRequested {
                station,
                requester,
                required,
                current,
                urgency,
            } => {
                let request = StaffRequest {
                    id: Uuid::new_v4(),
                    station: station.clone(),
                    requester,
                    required,
                    current,
                    urgency,
                    requested_at: now,
                    status: RequestStatus::Open,
                };
                if let Some(id) = self.desk.submit(request) {
                    info!(station = %station, %urgency, required, current, "Staff request filed");
                    let staffing = &self.exec.config.staffing;
                    self.scheduler.schedule_in(
                        now,
                        staffing.hr_response_minutes,
                        JobAction::StaffDecision { request_id: id },
                    );
                    self.scheduler.schedule_in(
                        now,
                        staffing.escalation_timeout_minutes,
                        JobAction::StaffEscalation { request_id: id },
                    );
                }
            }
            Report::ReleaseRequested {
                station,
                requester,
                excess,
            } => self.releases.push(PendingRelease {
                station,
                requester,
                excess,
            }),
            Report::InventoryConsumed { ingredients } => {
                for ingredient in ingredients {
                    if self.policy.level(&ingredient).is_some_and(|l| l > 0) {
                        self.policy.consume(&ingredient);
                        self.adjust_stock(&ingredient, -1, delta).await;
                    }
                }
            }
            Report::MenuRestricted { dishes } => {
                self.restricted = dishes.into_iter().collect();
                self.note(
                    now,
                    EventKind::Decision,
                    format!("menu restricted to exclude {:?}", self.restricted),
                );
            }
            Report::AssignmentExhausted { task_type, detail } => {
                delta.record_degradation(Degradation {
                    kind: DegradationKind::AssignmentExhausted,
                    source: source.to_string(),
                    detail: format!("{task_type}: {detail}"),
                });
                self.aborted = true;
            }
        }
    }

    /// Take a new order off the stream.
    async fn admit(&mut self, index: usize, now: DateTime<Utc>, delta: &mut MetricsAccumulator) {
        let order = self.exec.scenario.generate_order(index, &self.menu, now);
        let unavailable: Vec<String> = order
            .items
            .iter()
            .map(|i| i.menu_item.name.clone())
            .filter(|n| self.restricted.contains(n))
            .collect();
        let lead_station = order
            .items
            .first()
            .map(|i| i.menu_item.station.clone())
            .unwrap_or_default();
        let priority = order.priority;
        let id = self.orders.add(order);
        self.stream.insert(index, id);
        self.persist(id, delta).await;

        if !unavailable.is_empty() {
            self.note(
                now,
                EventKind::OrderStatus,
                format!("order #{index} refused, off the menu: {unavailable:?}"),
            );
            self.cancel_order(id, CancelReason::Unavailable, now, delta)
                .await;
            return;
        }
        debug!(order = %id, index, "Order received");
        self.send_to_role(
            AgentRole::ExecutiveChef,
            Task::new("order_assignment", format!("assign order #{index}"))
                .for_order(id)
                .with_priority(priority)
                .with_list("required_skills", &[lead_station]),
        );
    }

    async fn cancel_order(
        &mut self,
        id: OrderId,
        reason: CancelReason,
        now: DateTime<Utc>,
        delta: &mut MetricsAccumulator,
    ) {
        if self.orders.cancel(id, reason, now) != Some(OrderStatus::Cancelled) {
            return;
        }
        if self.cancelled.insert(id) {
            info!(order = %id, ?reason, "Order cancelled");
            self.note(
                now,
                EventKind::OrderStatus,
                format!("order {id} cancelled ({reason:?})"),
            );
            self.persist(id, delta).await;
        }
    }

    async fn start_crisis(
        &mut self,
        kind: &CrisisKind,
        recovery_ticks: u32,
        now: DateTime<Utc>,
        delta: &mut MetricsAccumulator,
    ) {
        warn!(crisis = %kind, "Crisis");
        delta.mark_crisis();
        match kind {
            CrisisKind::EquipmentFailure { equipment } => self.policy.take_out_of_service(equipment),
            CrisisKind::IngredientShortage { ingredient } => {
                let level = self.policy.level(ingredient).unwrap_or(0);
                self.policy.restock(ingredient, 0);
                self.adjust_stock(ingredient, -i64::from(level), delta)
                    .await;
            }
            CrisisKind::TimePressure { factor } => {
                self.time_pressure = self.exec.scenario.constraints.time_pressure * factor;
            }
        }
        let minutes = i64::from(recovery_ticks) * self.clock.tick_minutes();
        self.scheduler
            .schedule_in(now, minutes, JobAction::CrisisRecovery);

        let alert = Event::new(EventKind::Crisis, format!("crisis: {kind}"), now)
            .with_meta("priority", 9);
        self.broadcast(&alert);
        self.note(now, EventKind::Crisis, format!("crisis: {kind}"));
        self.replan_menu();
    }

    async fn end_crisis(&mut self, now: DateTime<Utc>, delta: &mut MetricsAccumulator) {
        let Some(crisis) = self.exec.scenario.crisis.as_ref() else {
            return;
        };
        match &crisis.kind {
            CrisisKind::EquipmentFailure { equipment } => self.policy.return_to_service(equipment),
            CrisisKind::IngredientShortage { ingredient } => {
                let level = self
                    .exec
                    .scenario
                    .inventory
                    .get(ingredient)
                    .copied()
                    .unwrap_or(0);
                self.policy.restock(ingredient, level);
                self.adjust_stock(ingredient, i64::from(level), delta)
                    .await;
            }
            CrisisKind::TimePressure { .. } => {
                self.time_pressure = self.exec.scenario.constraints.time_pressure;
            }
        }
        info!(crisis = %crisis.kind, "Crisis over");
        self.note(now, EventKind::Crisis, format!("recovered from {}", crisis.kind));
        self.replan_menu();
    }

    /// Ask the executive chef to re-check the menu against current stock.
    fn replan_menu(&self) {
        match serde_json::to_value(&self.menu) {
            Ok(dishes) => self.send_to_role(
                AgentRole::ExecutiveChef,
                Task::new("menu_planning", "re-plan the menu")
                    .with_priority(9)
                    .with_meta("dishes", dishes),
            ),
            Err(e) => warn!(error = %e, "Could not encode the menu"),
        }
    }

    async fn run_job(&mut self, job: ScheduledJob, now: DateTime<Utc>, delta: &mut MetricsAccumulator) {
        match job.action {
            JobAction::CrisisRecovery => self.end_crisis(now, delta).await,
            JobAction::StaffDecision { request_id } => {
                let Some(request) = self.desk.decide(request_id) else {
                    return;
                };
                match request.status {
                    RequestStatus::Approved => {
                        let joined = self.reinforce(&request.station, request.requester, delta).await;
                        let message = match joined {
                            Some(name) => format!("staff request approved: {name} joins {}", request.station),
                            None => format!("staff request for {} approved, nobody arrived", request.station),
                        };
                        self.follow_up(&request, message, now);
                    }
                    _ => {
                        let message = format!("staff request for {} denied", request.station);
                        self.follow_up(&request, message, now);
                    }
                }
            }
            JobAction::StaffEscalation { request_id } => {
                let Some(request) = self.desk.escalate(request_id) else {
                    return;
                };
                let message = format!(
                    "staff request for {} escalated to {}",
                    request.station, request.urgency
                );
                self.follow_up(&request, message, now);
                self.scheduler.schedule_in(
                    now,
                    self.exec.config.staffing.hr_response_minutes,
                    JobAction::StaffDecision { request_id },
                );
            }
        }
    }

    /// Tell the requester how their staff request went.
    fn follow_up(&mut self, request: &StaffRequest, message: String, now: DateTime<Utc>) {
        let event = Event::new(EventKind::StaffRequestFollowup, message.clone(), now)
            .with_meta("station", request.station.clone())
            .with_meta("urgency", request.urgency.to_string());
        self.deliver(request.requester, Inbound::Note(event));
        self.note(now, EventKind::StaffRequestFollowup, message);
    }

    /// Bring a reserve line cook onto `station`.
    async fn reinforce(
        &mut self,
        station: &str,
        requester: AgentId,
        delta: &mut MetricsAccumulator,
    ) -> Option<String> {
        let lead = self
            .members
            .iter()
            .find(|m| {
                m.agent.role() == AgentRole::ChefDePartie
                    && m.agent.card().station.as_deref() == Some(station)
            })
            .map(|m| m.agent.id())
            .unwrap_or(requester);
        self.hired += 1;
        let name = format!("{} {}", role_title(AgentRole::LineCook), self.hired);
        let request = SpawnRequest {
            name: name.clone(),
            role: AgentRole::LineCook,
            placement: self.spawner.station_placement(station, lead),
        };
        match self.spawner.spawn(request).await {
            Ok(spawned) => {
                info!(name = %name, station, "Reserve cook joined");
                self.enlist(spawned).await;
                Some(name)
            }
            Err(e) => {
                warn!(error = %e, "Reserve cook could not be spawned");
                delta.record_degradation(Degradation {
                    kind: DegradationKind::PersistenceFailure,
                    source: "staffing".into(),
                    detail: e.to_string(),
                });
                None
            }
        }
    }

    /// Status refresh, the quality gate and delay escalation.
    async fn review_orders(&mut self, roster: &Roster, now: DateTime<Utc>, delta: &mut MetricsAccumulator) {
        let exec = self.exec;
        let policy = &exec.config.orders;
        let ids: Vec<OrderId> = self.orders.active().map(|o| o.id).collect();
        for id in ids {
            let Some(order) = self.orders.get_mut(id) else {
                continue;
            };
            let changed = order.refresh_status(now);
            let items_done = order.items.iter().all(|i| i.stage == ItemStage::Completed);
            let needs_qc = items_done && !order.quality_passed && !self.qc_requested.contains(&id);
            let qc_station = order.items.first().map(|i| i.menu_item.station.clone());
            let priority = order.priority;

            let mut reassign_from = None;
            if order.is_delayed(now, policy.delay_factor, self.time_pressure) {
                if !order.delayed {
                    order.delayed = true;
                    info!(order = %id, "Order running late");
                }
                let escalated = order.escalate_priority(policy.max_priority);
                if escalated >= policy.reassign_priority_threshold && !order.reassigned {
                    reassign_from = Some(order.assigned_to);
                }
            }

            if let Some(before) = changed {
                let status = order.status;
                self.note(
                    now,
                    EventKind::OrderStatus,
                    format!("order {id}: {before} -> {status}"),
                );
                self.persist(id, delta).await;
            }
            if needs_qc {
                self.request_quality_check(id, qc_station.as_deref(), priority, roster);
            }
            if let Some(current) = reassign_from {
                self.reassign_late_order(id, current, roster, now, delta);
            }
        }
    }

    fn request_quality_check(
        &mut self,
        id: OrderId,
        station: Option<&str>,
        priority: u32,
        roster: &Roster,
    ) {
        let inspector = station
            .and_then(|s| roster.station_lead(AgentRole::ChefDePartie, s))
            .or_else(|| roster.by_role(AgentRole::ChefDePartie).next())
            .map(|m| m.id);
        let Some(inspector) = inspector else {
            warn!(order = %id, "Nobody can inspect the order");
            return;
        };
        let task = Task::new("quality_check", format!("inspect order {id}"))
            .for_order(id)
            .with_priority(priority + 1);
        if self.deliver(inspector, Inbound::Task(task)) {
            self.qc_requested.insert(id);
        }
    }

    /// Hand a late order to a different sous chef. Happens at most once.
    fn reassign_late_order(
        &mut self,
        id: OrderId,
        current: Option<AgentId>,
        roster: &Roster,
        now: DateTime<Utc>,
        delta: &mut MetricsAccumulator,
    ) {
        let Some(order) = self.orders.get(id) else {
            return;
        };
        let task = Task::new("preparation_supervision", format!("take over late order {id}"))
            .for_order(id)
            .with_priority(order.priority);
        let mut assigner = Assigner::new(&self.exec.config.assignment, &self.policy);
        let pool = roster
            .by_role(AgentRole::SousChef)
            .filter(|m| Some(m.id) != current);
        let Ok(to) = assigner.select(pool, &task) else {
            debug!(order = %id, "No other sous chef to take the late order");
            return;
        };
        if !self.deliver(to, Inbound::Task(task)) {
            return;
        }
        if let Some(order) = self.orders.get_mut(id) {
            order.assigned_to = Some(to);
            order.reassigned = true;
        }
        delta.record_reassignments(1);
        let name = self.name_of(to);
        self.note(
            now,
            EventKind::TaskReassignment,
            format!("late order {id} handed to {name}"),
        );
    }

    /// Act on release requests filed this tick.
    async fn process_releases(&mut self, now: DateTime<Utc>, delta: &mut MetricsAccumulator) {
        let exec = self.exec;
        for request in std::mem::take(&mut self.releases) {
            let config = &exec.config;
            let mut team = Vec::new();
            let mut held = HashMap::new();
            for member in self.members.iter_mut().filter(|m| {
                m.agent.role().is_execution_level()
                    && m.agent.card().station.as_deref() == Some(request.station.as_str())
            }) {
                member.agent.drain_inbox().await;
                team.push(member.agent.profile(config).await);
                held.insert(member.agent.id(), member.agent.unresolved_tasks());
            }
            let plan = plan_release(
                &team,
                &held,
                request.excess,
                &config.staffing,
                &config.assignment,
                &self.policy,
            );

            for (leaving, reason) in plan.blocked {
                let name = self.name_of(leaving);
                let err = BrigadeError::ReleaseBlocked {
                    member: leaving,
                    reason,
                };
                info!(station = %request.station, agent = %name, error = %err, "Release blocked");
                let event = Event::new(EventKind::StaffRelease, format!("{name}: {err}"), now);
                self.deliver(request.requester, Inbound::Note(event));
            }
            for (leaving, moves) in plan.released {
                let Some(pos) = self.members.iter().position(|m| m.agent.id() == leaving) else {
                    continue;
                };
                let mut member = self.members.remove(pos);
                let name = member.agent.card().name.clone();
                let targets: HashMap<TaskId, AgentId> = moves.into_iter().collect();
                member.agent.drain_inbox().await;
                let handed = member.agent.surrender();
                delta.record_reassignments(handed.len());
                for task in handed {
                    let to = targets.get(&task.id).copied().unwrap_or(request.requester);
                    if !self.deliver(to, Inbound::Task(task)) {
                        warn!(agent = %name, "Task lost while releasing");
                    }
                }
                self.exec.monitor.release(leaving).await;
                let message = format!("{name} released from {}", request.station);
                info!(station = %request.station, agent = %name, "Staff released");
                let event = Event::new(EventKind::StaffRelease, message.clone(), now);
                self.deliver(request.requester, Inbound::Note(event));
                self.note(now, EventKind::StaffRelease, message);
            }
        }
    }

    async fn persist(&self, id: OrderId, delta: &mut MetricsAccumulator) {
        let Some(order) = self.orders.get(id) else {
            return;
        };
        if let Err(e) = self.exec.store.save_order(order).await {
            let err = BrigadeError::TaskFailed(format!("saving order {id}: {e}"));
            warn!(error = %err, "Persistence failed");
            delta.record_degradation(Degradation {
                kind: DegradationKind::PersistenceFailure,
                source: "order_store".into(),
                detail: err.to_string(),
            });
        }
    }

    async fn adjust_stock(&self, ingredient: &str, change: i64, delta: &mut MetricsAccumulator) {
        if change == 0 {
            return;
        }
        if let Err(e) = self.exec.store.update_inventory(ingredient, change).await {
            let err = BrigadeError::TaskFailed(format!("updating {ingredient} stock: {e}"));
            warn!(error = %err, "Persistence failed");
            delta.record_degradation(Degradation {
                kind: DegradationKind::PersistenceFailure,
                source: "order_store".into(),
                detail: err.to_string(),
            });
        }
    }

    fn deliver(&self, to: AgentId, message: Inbound) -> bool {
        self.members
            .iter()
            .find(|m| m.agent.id() == to)
            .is_some_and(|m| m.inbox.send(message).is_ok())
    }

    fn send_to_role(&self, role: AgentRole, task: Task) {
        let Some(member) = self.members.iter().find(|m| m.agent.role() == role) else {
            warn!(%role, task_type = %task.task_type, "No agent in role");
            return;
        };
        if member.inbox.send(Inbound::Task(task)).is_err() {
            warn!(%role, "Inbox closed");
        }
    }

    fn broadcast(&self, event: &Event) {
        for member in &self.members {
            if member.inbox.send(Inbound::Note(event.clone())).is_err() {
                warn!(agent = %member.agent.card().name, "Inbox closed");
            }
        }
    }

    fn name_of(&self, id: AgentId) -> String {
        self.members
            .iter()
            .find(|m| m.agent.id() == id)
            .map(|m| m.agent.card().name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Add a kitchen-level line to the run log.
    fn note(&mut self, at: DateTime<Utc>, kind: EventKind, message: String) {
        self.log.push(LogLine {
            at,
            agent: "kitchen".into(),
            kind: kind.to_string(),
            message,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scenario::builtin;
    use brigade_agent::ScriptedBackend;

    fn small(name: &str) -> Scenario {
        let mut scenario = builtin(name).unwrap();
        scenario.stations = vec!["grill".into()];
        scenario.staff_count = 3;
        scenario.order_volume = 2;
        scenario.duration_ticks = 20;
        scenario.cancellations.clear();
        scenario.defect_every = 0;
        scenario
    }

    fn executor(scenario: Scenario) -> ScenarioExecutor {
        let backend = Arc::new(ScriptedBackend::always(Ok("proceed".into())));
        ScenarioExecutor::new(scenario, "scripted", backend, KitchenConfig::default()).unwrap()
    }

    async fn run(exec: &ScenarioExecutor) -> (MetricsSnapshot, Vec<RunUpdate>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let snapshot = exec.run(&tx).await;
        drop(tx);
        let mut updates = Vec::new();
        while let Some(u) = rx.recv().await {
            updates.push(u);
        }
        (snapshot, updates)
    }

    #[tokio::test]
    async fn test_orders_flow_to_completion() {
        let exec = executor(small("lunch_service"));
        let (snapshot, updates) = run(&exec).await;

        assert_eq!(snapshot.orders.total, 2);
        assert_eq!(snapshot.orders.completed, 2, "{snapshot:?}");
        assert!(!snapshot.degraded, "{:?}", snapshot.degradations);
        assert_eq!(updates.len(), 21);
        assert!(matches!(updates.last(), Some(RunUpdate::Final(_))));
        assert!(snapshot.role_scores["line_cook"].attempted > 0);
        assert!(snapshot.role_scores.contains_key("kitchen_porter"));
    }

    #[tokio::test]
    async fn test_unassignable_steps_cancel_their_order() {
        // A lone line cook: nobody in the kitchen can prep ingredients.
        let mut scenario = small("lunch_service");
        scenario.staff_count = 1;
        let exec = executor(scenario);
        let (snapshot, _) = run(&exec).await;

        assert_eq!(snapshot.orders.total, 2);
        assert_eq!(snapshot.orders.cancelled, 2, "{snapshot:?}");
        assert_eq!(snapshot.orders.active, 0);
        assert!(snapshot
            .degradations
            .iter()
            .any(|d| d.kind == DegradationKind::StepUnassignable));
    }

    fn member_id(kitchen: &Kitchen<'_>, name: &str) -> AgentId {
        kitchen
            .members
            .iter()
            .find(|m| m.agent.card().name == name)
            .map(|m| m.agent.id())
            .unwrap()
    }

    #[tokio::test]
    async fn test_released_members_hand_every_task_to_someone_staying() {
        let mut scenario = small("lunch_service");
        scenario.staff_count = 6;
        let exec = executor(scenario);
        let mut kitchen = Kitchen::open(&exec).await.unwrap();
        let first = member_id(&kitchen, "Line Cook 1");
        let fourth = member_id(&kitchen, "Line Cook 4");
        let lead = member_id(&kitchen, "Chef de Partie (grill)");

        let mut handed = Vec::new();
        for (to, count) in [(first, 1), (fourth, 2)] {
            for n in 0..count {
                let task = Task::new("cooking_step", format!("sear batch {n}"));
                handed.push(task.id);
                assert!(kitchen.deliver(to, Inbound::Task(task)));
            }
        }
        kitchen.releases.push(PendingRelease {
            station: "grill".into(),
            requester: lead,
            excess: 3,
        });
        let mut delta = MetricsAccumulator::new();
        kitchen
            .process_releases(exec.scenario().start_time, &mut delta)
            .await;

        let names: BTreeSet<String> = kitchen
            .members
            .iter()
            .map(|m| m.agent.card().name.clone())
            .collect();
        for gone in ["Prep Cook 2", "Kitchen Porter 3", "Line Cook 1"] {
            assert!(!names.contains(gone), "{gone} still on shift");
        }
        for stays in ["Line Cook 4", "Prep Cook 5", "Kitchen Porter 6"] {
            assert!(names.contains(stays), "{stays} was released");
        }

        let mut held = HashSet::new();
        for member in &mut kitchen.members {
            member.agent.drain_inbox().await;
            held.extend(member.agent.unresolved_tasks().into_iter().map(|t| t.id));
        }
        for id in &handed {
            assert!(held.contains(id), "task {id} lost in the release");
        }
        let cook = kitchen
            .members
            .iter()
            .find(|m| m.agent.id() == fourth)
            .unwrap();
        assert_eq!(cook.agent.unresolved_tasks().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_scenario_rejected() {
        let mut scenario = small("lunch_service");
        scenario.duration_ticks = 0;
        let backend = Arc::new(ScriptedBackend::always(Ok("ok".into())));
        assert!(ScenarioExecutor::new(scenario, "m", backend, KitchenConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_equipment_failure_restricts_menu() {
        let mut scenario = small("equipment_failure");
        scenario.crisis.as_mut().unwrap().at_tick = 1;
        scenario.order_volume = 4;
        let exec = executor(scenario);
        let (snapshot, updates) = run(&exec).await;

        assert!(snapshot.adaptation.is_some());
        let logged: Vec<&LogLine> = updates
            .iter()
            .filter_map(|u| match u {
                RunUpdate::Tick { log, .. } => Some(log),
                RunUpdate::Final(_) => None,
            })
            .flatten()
            .collect();
        assert!(logged.iter().any(|l| l.kind == "crisis"));
        assert!(logged.iter().any(|l| l.message.contains("recovered")));
    }
}
