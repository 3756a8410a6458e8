//! Run scoring.
//!
//! Every tally in [`MetricsAccumulator`] is a sum, a set union or a max, so
//! accumulators can be merged in any grouping and [`finalize`] gives the
//! same snapshot for a streamed run as for a single pass.
//!
//! [`finalize`]: MetricsAccumulator::finalize

use crate::order::OrderSummary;
use crate::types::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const ROLE_WEIGHTS: RoleWeights = RoleWeights {
    completion: 0.4,
    reliability: 0.3,
    coherence: 0.3,
};
const COHERENCE_WEIGHTS: CoherenceWeights = CoherenceWeights {
    knowledge: 0.4,
    authority: 0.3,
    appropriateness: 0.3,
};
const COORDINATION_WEIGHTS: CoordinationWeights = CoordinationWeights {
    communication: 0.4,
    resource: 0.3,
    conflict: 0.3,
};
/// Distinct event kinds that count as full situational knowledge.
const KNOWLEDGE_KINDS: f64 = 10.0;

struct RoleWeights {
    completion: f64,
    reliability: f64,
    coherence: f64,
}

struct CoherenceWeights {
    knowledge: f64,
    authority: f64,
    appropriateness: f64,
}

struct CoordinationWeights {
    communication: f64,
    resource: f64,
    conflict: f64,
}

/// What kind of problem degraded a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    /// A task ran out of backend retries.
    BackendExhausted,
    PersistenceFailure,
    /// A step no one in the kitchen could take.
    StepUnassignable,
    /// The top of the hierarchy could not place work; the run stopped early.
    AssignmentExhausted,
}

/// An unresolved problem carried into the final snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    /// Agent or component that hit the problem.
    pub source: String,
    pub detail: String,
}

/// How one attempt at a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Completed,
    /// Backend failure; the task went back to pending.
    Requeued,
    /// A resource was unavailable.
    Blocked,
    Failed,
    Unsupported,
    Denied,
}

/// Whether the backend was reached, and with what result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendUse {
    NotCalled,
    Answered,
    Failed,
}

/// When an attempt happened relative to the scenario crisis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrisisPhase {
    NoCrisis,
    Before,
    After,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleTally {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    pub requeued: usize,
    pub blocked: usize,
    pub unsupported: usize,
    pub denied: usize,
    pub backend_calls: usize,
    pub backend_failures: usize,
    pub event_kinds: BTreeSet<String>,
}

impl RoleTally {
    fn merge(&mut self, other: &RoleTally) {
        self.attempted += other.attempted;
        self.completed += other.completed;
        self.failed += other.failed;
        self.requeued += other.requeued;
        self.blocked += other.blocked;
        self.unsupported += other.unsupported;
        self.denied += other.denied;
        self.backend_calls += other.backend_calls;
        self.backend_failures += other.backend_failures;
        self.event_kinds.extend(other.event_kinds.iter().cloned());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct PhaseTally {
    completed: usize,
    resolved: usize,
}

impl PhaseTally {
    fn rate(&self) -> Option<f64> {
        (self.resolved > 0).then(|| self.completed as f64 / self.resolved as f64)
    }
}

/// Additive run tallies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsAccumulator {
    roles: BTreeMap<AgentRole, RoleTally>,
    ticks: usize,
    max_agents: usize,
    messages: usize,
    assignments: usize,
    escalations: usize,
    reassignments: usize,
    quality_warnings: usize,
    quality_rejections: usize,
    crisis: bool,
    before_crisis: PhaseTally,
    after_crisis: PhaseTally,
    degradations: Vec<Degradation>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt at a task by an agent of `role`.
    pub fn record_resolution(
        &mut self,
        role: AgentRole,
        kind: ResolutionKind,
        backend: BackendUse,
        phase: CrisisPhase,
    ) {
        let tally = self.roles.entry(role).or_default();
        tally.attempted += 1;
        match kind {
            ResolutionKind::Completed => tally.completed += 1,
            ResolutionKind::Requeued => tally.requeued += 1,
            ResolutionKind::Blocked => tally.blocked += 1,
            ResolutionKind::Failed => tally.failed += 1,
            ResolutionKind::Unsupported => {
                tally.unsupported += 1;
                tally.failed += 1;
            }
            ResolutionKind::Denied => {
                tally.denied += 1;
                tally.failed += 1;
            }
        }
        match backend {
            BackendUse::NotCalled => {}
            BackendUse::Answered => tally.backend_calls += 1,
            BackendUse::Failed => {
                tally.backend_calls += 1;
                tally.backend_failures += 1;
            }
        }

        let resolved = !matches!(kind, ResolutionKind::Requeued | ResolutionKind::Blocked);
        let phase_tally = match phase {
            CrisisPhase::NoCrisis => return,
            CrisisPhase::Before => &mut self.before_crisis,
            CrisisPhase::After => &mut self.after_crisis,
        };
        self.crisis = true;
        if resolved {
            phase_tally.resolved += 1;
            if kind == ResolutionKind::Completed {
                phase_tally.completed += 1;
            }
        }
    }

    /// Make `role` appear in the scores even if it never attempts a task.
    pub fn register_role(&mut self, role: AgentRole) {
        self.roles.entry(role).or_default();
    }

    /// Record an event kind an agent of `role` produced.
    pub fn record_event_kind(&mut self, role: AgentRole, kind: &str) {
        self.roles
            .entry(role)
            .or_default()
            .event_kinds
            .insert(kind.to_string());
    }

    pub fn record_messages(&mut self, count: usize) {
        self.messages += count;
    }

    pub fn record_assignments(&mut self, count: usize) {
        self.assignments += count;
    }

    pub fn record_escalation(&mut self) {
        self.escalations += 1;
    }

    pub fn record_reassignments(&mut self, count: usize) {
        self.reassignments += count;
    }

    pub fn record_quality(&mut self, warnings: usize, rejected: bool) {
        self.quality_warnings += warnings;
        if rejected {
            self.quality_rejections += 1;
        }
    }

    pub fn observe_agents(&mut self, count: usize) {
        self.max_agents = self.max_agents.max(count);
    }

    /// Mark the run as a crisis run even before any attempt lands in a phase.
    pub fn mark_crisis(&mut self) {
        self.crisis = true;
    }

    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn record_degradation(&mut self, degradation: Degradation) {
        self.degradations.push(degradation);
    }

    pub fn has_degradations(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: &MetricsAccumulator) {
        for (role, tally) in &other.roles {
            self.roles.entry(*role).or_default().merge(tally);
        }
        self.ticks += other.ticks;
        self.max_agents = self.max_agents.max(other.max_agents);
        self.messages += other.messages;
        self.assignments += other.assignments;
        self.escalations += other.escalations;
        self.reassignments += other.reassignments;
        self.quality_warnings += other.quality_warnings;
        self.quality_rejections += other.quality_rejections;
        self.crisis |= other.crisis;
        self.before_crisis.completed += other.before_crisis.completed;
        self.before_crisis.resolved += other.before_crisis.resolved;
        self.after_crisis.completed += other.after_crisis.completed;
        self.after_crisis.resolved += other.after_crisis.resolved;
        self.degradations.extend(other.degradations.iter().cloned());
    }

    /// Reduce the tallies to scores.
    pub fn finalize(&self, model: &str, scenario: &str, orders: OrderSummary) -> MetricsSnapshot {
        let role_scores = self
            .roles
            .iter()
            .map(|(role, tally)| (role.as_str().to_string(), score_role(tally)))
            .collect();

        let (completed, failed) = self
            .roles
            .values()
            .fold((0, 0), |(c, f), t| (c + t.completed, f + t.failed));
        let task_completion_rate = ratio_or(completed, completed + failed, 0.0);

        let mut degradations = self.degradations.clone();
        degradations.sort();

        MetricsSnapshot {
            model: model.to_string(),
            scenario: scenario.to_string(),
            ticks: self.ticks,
            role_scores,
            task_completion_rate,
            coordination: self.coordination(),
            adaptation: self.crisis.then(|| self.adaptation()),
            quality_warnings: self.quality_warnings,
            quality_rejections: self.quality_rejections,
            orders,
            degraded: !degradations.is_empty(),
            degradations,
        }
    }

    fn coordination(&self) -> CoordinationScore {
        let n = self.max_agents;
        let communication = if n <= 1 {
            1.0
        } else {
            let expected = (n * (n - 1) * 2) as f64;
            (self.messages as f64 / expected).min(1.0)
        };
        let (attempted, blocked) = self
            .roles
            .values()
            .fold((0, 0), |(a, b), t| (a + t.attempted, b + t.blocked));
        let resource = 1.0 - ratio_or(blocked, attempted, 0.0);
        let conflict = (1.0
            - ratio_or(self.escalations + self.reassignments, self.assignments, 0.0))
        .clamp(0.0, 1.0);
        let w = &COORDINATION_WEIGHTS;
        CoordinationScore {
            score: w.communication * communication + w.resource * resource + w.conflict * conflict,
            communication,
            resource,
            conflict,
        }
    }

    fn adaptation(&self) -> f64 {
        let post = self.after_crisis.rate();
        match (self.before_crisis.rate(), post) {
            (Some(pre), Some(post)) if pre > 0.0 => (post / pre).min(1.0),
            // Nothing completed before the crisis: any completion after it is full recovery.
            (Some(_), Some(post)) => if post > 0.0 { 1.0 } else { 0.0 },
            (None, Some(post)) => post,
            (_, None) => 0.0,
        }
    }
}

fn ratio_or(numerator: usize, denominator: usize, empty: f64) -> f64 {
    if denominator == 0 {
        empty
    } else {
        numerator as f64 / denominator as f64
    }
}

fn score_role(tally: &RoleTally) -> RoleScore {
    let completion = ratio_or(tally.completed, tally.completed + tally.failed, 0.0);
    let reliability = 1.0 - ratio_or(tally.backend_failures, tally.backend_calls, 0.0);
    let knowledge = (tally.event_kinds.len() as f64 / KNOWLEDGE_KINDS).min(1.0);
    let authority = 1.0 - ratio_or(tally.denied, tally.attempted, 0.0);
    let appropriateness = 1.0 - ratio_or(tally.unsupported, tally.attempted, 0.0);
    let c = &COHERENCE_WEIGHTS;
    let coherence =
        c.knowledge * knowledge + c.authority * authority + c.appropriateness * appropriateness;
    let w = &ROLE_WEIGHTS;
    RoleScore {
        score: w.completion * completion + w.reliability * reliability + w.coherence * coherence,
        completion,
        reliability,
        coherence,
        attempted: tally.attempted,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleScore {
    pub score: f64,
    pub completion: f64,
    pub reliability: f64,
    pub coherence: f64,
    pub attempted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationScore {
    pub score: f64,
    pub communication: f64,
    pub resource: f64,
    pub conflict: f64,
}

/// Scores for one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub model: String,
    pub scenario: String,
    pub ticks: usize,
    /// Keyed by role name.
    pub role_scores: BTreeMap<String, RoleScore>,
    /// Completed over resolved tasks, in `[0, 1]`.
    pub task_completion_rate: f64,
    pub coordination: CoordinationScore,
    /// Present only for crisis scenarios.
    pub adaptation: Option<f64>,
    pub quality_warnings: usize,
    pub quality_rejections: usize,
    pub orders: OrderSummary,
    pub degradations: Vec<Degradation>,
    pub degraded: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample(seed: usize) -> MetricsAccumulator {
        let mut acc = MetricsAccumulator::new();
        let roles = [AgentRole::ExecutiveChef, AgentRole::LineCook, AgentRole::PrepCook];
        for i in 0..(seed + 3) {
            let role = roles[(i + seed) % roles.len()];
            let kind = match (i + seed) % 4 {
                0 => ResolutionKind::Completed,
                1 => ResolutionKind::Requeued,
                2 => ResolutionKind::Completed,
                _ => ResolutionKind::Failed,
            };
            let phase = if i % 2 == 0 {
                CrisisPhase::Before
            } else {
                CrisisPhase::After
            };
            acc.record_resolution(role, kind, BackendUse::Answered, phase);
            acc.record_event_kind(role, if i % 3 == 0 { "decision" } else { "task_completion" });
        }
        acc.record_messages(seed * 2);
        acc.record_assignments(seed + 1);
        acc.observe_agents(seed + 2);
        acc.record_tick();
        if seed % 2 == 1 {
            acc.record_degradation(Degradation {
                kind: DegradationKind::BackendExhausted,
                source: format!("agent-{seed}"),
                detail: "gave up".into(),
            });
        }
        acc
    }

    #[test]
    fn test_weights_sum_to_one() {
        let r = ROLE_WEIGHTS;
        assert!((r.completion + r.reliability + r.coherence - 1.0).abs() < 1e-9);
        let c = COHERENCE_WEIGHTS;
        assert!((c.knowledge + c.authority + c.appropriateness - 1.0).abs() < 1e-9);
        let k = COORDINATION_WEIGHTS;
        assert!((k.communication + k.resource + k.conflict - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let parts: Vec<MetricsAccumulator> = (0..4).map(sample).collect();

        let mut forward = MetricsAccumulator::new();
        for p in &parts {
            forward.merge(p);
        }

        let mut left = parts[3].clone();
        left.merge(&parts[2]);
        let mut right = parts[1].clone();
        right.merge(&parts[0]);
        left.merge(&right);

        let summary = OrderSummary::default();
        assert_eq!(
            forward.finalize("m", "s", summary.clone()),
            left.finalize("m", "s", summary)
        );
    }

    #[test]
    fn test_empty_run_scores() {
        let snapshot = MetricsAccumulator::new().finalize("m", "s", OrderSummary::default());
        assert_eq!(snapshot.task_completion_rate, 0.0);
        assert!(snapshot.role_scores.is_empty());
        assert_eq!(snapshot.coordination.communication, 1.0);
        assert_eq!(snapshot.adaptation, None);
        assert!(!snapshot.degraded);
    }

    #[test]
    fn test_registered_role_scores_zero_completion() {
        let mut acc = MetricsAccumulator::new();
        acc.register_role(AgentRole::KitchenPorter);
        let snapshot = acc.finalize("m", "s", OrderSummary::default());
        let porter = &snapshot.role_scores["kitchen_porter"];
        assert_eq!(porter.attempted, 0);
        assert_eq!(porter.completion, 0.0);
        assert_eq!(porter.reliability, 1.0);
    }

    #[test]
    fn test_completion_rate_bounds() {
        let mut acc = MetricsAccumulator::new();
        for kind in [
            ResolutionKind::Completed,
            ResolutionKind::Completed,
            ResolutionKind::Failed,
            ResolutionKind::Requeued,
        ] {
            acc.record_resolution(AgentRole::LineCook, kind, BackendUse::NotCalled, CrisisPhase::NoCrisis);
        }
        let snapshot = acc.finalize("m", "s", OrderSummary::default());
        assert!((snapshot.task_completion_rate - 2.0 / 3.0).abs() < 1e-9);
        let cook = &snapshot.role_scores["line_cook"];
        assert!(cook.score >= 0.0 && cook.score <= 1.0);
        assert_eq!(cook.attempted, 4);
    }

    #[test]
    fn test_adaptation_ratio() {
        let mut acc = MetricsAccumulator::new();
        let cook = AgentRole::LineCook;
        for kind in [ResolutionKind::Completed, ResolutionKind::Completed] {
            acc.record_resolution(cook, kind, BackendUse::Answered, CrisisPhase::Before);
        }
        for kind in [ResolutionKind::Completed, ResolutionKind::Failed] {
            acc.record_resolution(cook, kind, BackendUse::Answered, CrisisPhase::After);
        }
        let snapshot = acc.finalize("m", "s", OrderSummary::default());
        assert_eq!(snapshot.adaptation, Some(0.5));
    }

    #[test]
    fn test_adaptation_without_pre_crisis_data() {
        let mut acc = MetricsAccumulator::new();
        acc.mark_crisis();
        acc.record_resolution(
            AgentRole::PrepCook,
            ResolutionKind::Completed,
            BackendUse::Answered,
            CrisisPhase::After,
        );
        let snapshot = acc.finalize("m", "s", OrderSummary::default());
        assert_eq!(snapshot.adaptation, Some(1.0));
    }

    #[test]
    fn test_adaptation_after_failed_pre_crisis_work() {
        let cook = AgentRole::LineCook;
        let mut acc = MetricsAccumulator::new();
        acc.mark_crisis();
        acc.record_resolution(cook, ResolutionKind::Failed, BackendUse::Answered, CrisisPhase::Before);
        acc.record_resolution(cook, ResolutionKind::Completed, BackendUse::Answered, CrisisPhase::After);
        acc.record_resolution(cook, ResolutionKind::Failed, BackendUse::Answered, CrisisPhase::After);
        let recovered = acc.finalize("m", "s", OrderSummary::default());
        assert_eq!(recovered.adaptation, Some(1.0));

        let mut acc = MetricsAccumulator::new();
        acc.mark_crisis();
        acc.record_resolution(cook, ResolutionKind::Failed, BackendUse::Answered, CrisisPhase::Before);
        acc.record_resolution(cook, ResolutionKind::Failed, BackendUse::Answered, CrisisPhase::After);
        let stalled = acc.finalize("m", "s", OrderSummary::default());
        assert_eq!(stalled.adaptation, Some(0.0));
    }

    #[test]
    fn test_degradations_flag_and_sort() {
        let mut acc = MetricsAccumulator::new();
        for kind in [DegradationKind::PersistenceFailure, DegradationKind::BackendExhausted] {
            acc.record_degradation(Degradation {
                kind,
                source: "executor".into(),
                detail: String::new(),
            });
        }
        let snapshot = acc.finalize("m", "s", OrderSummary::default());
        assert!(snapshot.degraded);
        assert_eq!(snapshot.degradations[0].kind, DegradationKind::BackendExhausted);
    }
}
