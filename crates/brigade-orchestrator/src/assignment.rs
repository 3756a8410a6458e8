//! Candidate scoring and step ordering.

use crate::config::AssignmentWeights;
use crate::policy::KitchenPolicy;
use crate::roles;
use crate::types::{AgentId, AgentRole, Task};
use brigade_core::{BrigadeError, BrigadeResult};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// What an assigner may know about an agent: a read-only copy taken at the
/// start of a tick.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateProfile {
    pub id: AgentId,
    pub name: String,
    pub role: AgentRole,
    pub station: Option<String>,
    pub supervisor: Option<AgentId>,
    /// Pending plus in-progress tasks.
    pub active_tasks: usize,
    /// Tasks that would need a new owner if the agent left.
    pub unresolved_tasks: usize,
    pub skills: BTreeSet<String>,
    pub equipment: BTreeSet<String>,
    /// Task types this agent has completed before, per long-term memory.
    pub experience: BTreeSet<String>,
    pub completed: usize,
    pub failed: usize,
}

impl CandidateProfile {
    pub fn workload(&self, capacity: usize) -> f64 {
        self.active_tasks as f64 / capacity.max(1) as f64
    }

    /// Success rate over resolved tasks; 1.0 before anything resolved.
    pub fn success_rate(&self) -> f64 {
        let resolved = self.completed + self.failed;
        if resolved == 0 {
            1.0
        } else {
            self.completed as f64 / resolved as f64
        }
    }
}

/// Snapshot of every agent, in creation order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<CandidateProfile>,
}

impl Roster {
    pub fn new(members: Vec<CandidateProfile>) -> Self {
        Self { members }
    }

    pub fn get(&self, id: AgentId) -> Option<&CandidateProfile> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn members(&self) -> &[CandidateProfile] {
        &self.members
    }

    pub fn by_role(&self, role: AgentRole) -> impl Iterator<Item = &CandidateProfile> {
        self.members.iter().filter(move |m| m.role == role)
    }

    /// The first agent of `role` working `station`.
    pub fn station_lead(&self, role: AgentRole, station: &str) -> Option<&CandidateProfile> {
        self.by_role(role)
            .find(|m| m.station.as_deref() == Some(station))
    }

    /// Execution-level staff at `station`.
    pub fn station_staff<'a>(
        &'a self,
        station: &'a str,
    ) -> impl Iterator<Item = &'a CandidateProfile> + 'a {
        self.members
            .iter()
            .filter(move |m| m.role.is_execution_level() && m.station.as_deref() == Some(station))
    }

    /// Members whose role has a handler for `task_type`.
    pub fn capable_of<'a>(
        &'a self,
        task_type: &'a str,
    ) -> impl Iterator<Item = &'a CandidateProfile> + 'a {
        self.members
            .iter()
            .filter(move |m| roles::handles(m.role, task_type))
    }

    /// Distinct station names, in first-seen order.
    pub fn stations(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for station in self.members.iter().filter_map(|m| m.station.as_ref()) {
            if !out.contains(station) {
                out.push(station.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Scores candidates and picks assignees, counting its own picks toward
/// workload so a burst of steps spreads across the team.
pub struct Assigner<'a> {
    weights: &'a AssignmentWeights,
    policy: &'a dyn KitchenPolicy,
    extra_load: HashMap<AgentId, usize>,
}

impl<'a> Assigner<'a> {
    pub fn new(weights: &'a AssignmentWeights, policy: &'a dyn KitchenPolicy) -> Self {
        Self {
            weights,
            policy,
            extra_load: HashMap::new(),
        }
    }

    /// Workload including tasks handed out by this assigner.
    pub fn workload(&self, candidate: &CandidateProfile) -> f64 {
        let extra = self.extra_load.get(&candidate.id).copied().unwrap_or(0);
        (candidate.active_tasks + extra) as f64 / self.weights.capacity.max(1) as f64
    }

    pub fn score(&self, candidate: &CandidateProfile, task: &Task) -> f64 {
        let mut score = 0.0;
        if candidate.experience.contains(&task.task_type) {
            score += self.weights.experience;
        }
        if self.workload(candidate) < self.weights.workload_threshold {
            score += self.weights.availability;
        }
        let familiar = self
            .policy
            .skills_sufficient(&candidate.skills, &task.required_skills())
            && self
                .policy
                .skills_sufficient(&candidate.equipment, &task.equipment());
        if familiar {
            score += self.weights.familiarity;
        }
        score
    }

    /// Pick the best-scoring candidate. Ties go to the earliest candidate.
    pub fn select<'c>(
        &mut self,
        candidates: impl IntoIterator<Item = &'c CandidateProfile>,
        task: &Task,
    ) -> BrigadeResult<AgentId> {
        let mut best: Option<(AgentId, f64)> = None;
        for candidate in candidates {
            let score = self.score(candidate, task);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate.id, score));
            }
        }
        match best {
            Some((id, score)) if score > 0.0 => {
                *self.extra_load.entry(id).or_insert(0) += 1;
                Ok(id)
            }
            _ => Err(BrigadeError::NoSuitableAssignee {
                task_type: task.task_type.clone(),
            }),
        }
    }
}

/// Stable sort: higher priority first, then fewer dependencies.
pub fn sort_steps(steps: &mut [Task]) {
    steps.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.dependencies.len().cmp(&b.dependencies.len()))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::policy::PermissivePolicy;
    use uuid::Uuid;

    fn cook(name: &str, active: usize, skills: &[&str]) -> CandidateProfile {
        CandidateProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: AgentRole::LineCook,
            station: Some("grill".into()),
            supervisor: None,
            active_tasks: active,
            unresolved_tasks: active,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            equipment: BTreeSet::from(["grill".to_string()]),
            experience: BTreeSet::new(),
            completed: 0,
            failed: 0,
        }
    }

    fn step() -> Task {
        Task::new("cooking_step", "sear steak")
            .with_list("required_skills", &["grilling".to_string()])
            .with_list("equipment", &["grill".to_string()])
    }

    #[test]
    fn test_score_components() {
        let weights = AssignmentWeights::default();
        let policy = PermissivePolicy;
        let assigner = Assigner::new(&weights, &policy);

        let mut veteran = cook("veteran", 0, &["grilling"]);
        veteran.experience.insert("cooking_step".into());
        assert_eq!(assigner.score(&veteran, &step()), 4.0);

        let busy = cook("busy", 8, &["grilling"]);
        assert_eq!(assigner.score(&busy, &step()), 1.0);

        let novice = cook("novice", 0, &["baking"]);
        assert_eq!(assigner.score(&novice, &step()), 1.0);
    }

    #[test]
    fn test_experience_outranks_availability() {
        let weights = AssignmentWeights::default();
        let policy = PermissivePolicy;
        let mut assigner = Assigner::new(&weights, &policy);

        let fresh = cook("fresh", 0, &["baking"]);
        let mut seasoned = cook("seasoned", 9, &["baking"]);
        seasoned.experience.insert("cooking_step".into());
        let pool = [fresh, seasoned.clone()];
        assert_eq!(assigner.select(&pool, &step()).unwrap(), seasoned.id);
    }

    #[test]
    fn test_ties_resolve_to_first_candidate() {
        let weights = AssignmentWeights::default();
        let policy = PermissivePolicy;
        let pool = [cook("a", 0, &["grilling"]), cook("b", 0, &["grilling"])];
        for _ in 0..5 {
            let mut assigner = Assigner::new(&weights, &policy);
            assert_eq!(assigner.select(&pool, &step()).unwrap(), pool[0].id);
        }
    }

    #[test]
    fn test_own_picks_count_toward_workload() {
        let weights = AssignmentWeights {
            capacity: 2,
            ..AssignmentWeights::default()
        };
        let policy = PermissivePolicy;
        let mut assigner = Assigner::new(&weights, &policy);
        let pool = [cook("a", 0, &["grilling"]), cook("b", 0, &["grilling"])];

        assert_eq!(assigner.select(&pool, &step()).unwrap(), pool[0].id);
        // a is now at 0.5 workload, still available; b ties and loses.
        assert_eq!(assigner.select(&pool, &step()).unwrap(), pool[0].id);
        // a is at 1.0 workload now.
        assert_eq!(assigner.select(&pool, &step()).unwrap(), pool[1].id);
    }

    #[test]
    fn test_no_positive_score_fails() {
        let weights = AssignmentWeights::default();
        let policy = PermissivePolicy;
        let mut assigner = Assigner::new(&weights, &policy);
        let pool = [cook("swamped", 10, &["baking"])];
        let err = assigner.select(&pool, &step()).unwrap_err();
        assert!(matches!(err, BrigadeError::NoSuitableAssignee { .. }));

        let empty: [CandidateProfile; 0] = [];
        assert!(assigner.select(&empty, &step()).is_err());
    }

    #[test]
    fn test_sort_steps_is_stable() {
        let dep = Uuid::new_v4();
        let mut steps = vec![
            Task::new("plating", "plate").with_priority(3).with_dependencies(vec![dep]),
            Task::new("ingredient_prep", "dice onion").with_priority(1),
            Task::new("cooking_step", "sear").with_priority(3),
            Task::new("ingredient_prep", "mince garlic").with_priority(1),
        ];
        sort_steps(&mut steps);
        let order: Vec<&str> = steps.iter().map(|s| s.description.as_str()).collect();
        assert_eq!(order, vec!["sear", "plate", "dice onion", "mince garlic"]);
    }

    #[test]
    fn test_roster_lookups() {
        let mut lead = cook("lead", 0, &[]);
        lead.role = AgentRole::ChefDePartie;
        let staff = cook("staff", 0, &[]);
        let roster = Roster::new(vec![lead.clone(), staff.clone()]);
        assert_eq!(roster.station_lead(AgentRole::ChefDePartie, "grill").unwrap().id, lead.id);
        assert_eq!(roster.station_staff("grill").count(), 1);
        assert_eq!(roster.stations(), vec!["grill"]);
        assert_eq!(roster.capable_of("cooking_step").count(), 1);
    }
}
