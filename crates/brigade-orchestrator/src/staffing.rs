//! Station sizing, the HR staffing desk, and release planning.

use crate::assignment::{Assigner, CandidateProfile};
use crate::config::{AssignmentWeights, PeakWindow, StaffingConfig};
use crate::policy::KitchenPolicy;
use crate::roles;
use crate::types::{AgentId, Task, TaskId};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

/// Staff a station needs for `load` active orders.
pub fn required_staff(load: usize, peak: bool, config: &StaffingConfig) -> usize {
    let bonus = if peak { config.peak_bonus } else { 0 };
    let by_load = load / config.load_per_staff.max(1) + bonus;
    config.min_staff.max(by_load)
}

/// Whether `time` falls in any peak window.
pub fn is_peak(time: DateTime<Utc>, windows: &[PeakWindow]) -> bool {
    let hour = time.hour();
    windows
        .iter()
        .any(|w| hour >= w.start_hour && hour < w.end_hour)
}

/// How badly a station needs more hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// One level up, saturating at critical.
    pub fn raised(self) -> Urgency {
        match self {
            Urgency::Low => Urgency::Medium,
            Urgency::Medium => Urgency::High,
            Urgency::High | Urgency::Critical => Urgency::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency from the shortfall ratio `(required - staff) / required`.
pub fn urgency(staff: usize, required: usize, load: usize, peak: bool) -> Urgency {
    if staff == 0 && load > 0 {
        return Urgency::Critical;
    }
    let shortfall = required.saturating_sub(staff) as f64 / required.max(1) as f64;
    let level = if shortfall >= 0.5 {
        Urgency::High
    } else if shortfall >= 0.25 {
        Urgency::Medium
    } else {
        Urgency::Low
    };
    if peak {
        level.max(Urgency::Medium)
    } else {
        level
    }
}

/// Overall condition of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationCondition {
    HighCapacity,
    LowCapacity,
    LimitedCapacity,
    Understaffed,
    Normal,
}

/// Point-in-time view of a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatus {
    pub station: String,
    pub capacity: usize,
    pub current_load: usize,
    pub available_staff: usize,
    pub equipment: Vec<String>,
    pub equipment_down: Vec<String>,
    pub condition: StationCondition,
}

impl StationStatus {
    pub fn assess(
        station: &str,
        capacity: usize,
        current_load: usize,
        available_staff: usize,
        equipment: Vec<String>,
        policy: &dyn KitchenPolicy,
    ) -> Self {
        let equipment_down: Vec<String> = equipment
            .iter()
            .filter(|e| !policy.equipment_available(e))
            .cloned()
            .collect();
        let load = current_load as f64;
        let cap = capacity as f64;
        let condition = if load > 1.5 * cap {
            StationCondition::HighCapacity
        } else if load < 0.3 * cap {
            StationCondition::LowCapacity
        } else if equipment_down.len() > 1 {
            StationCondition::LimitedCapacity
        } else if available_staff < 2 {
            StationCondition::Understaffed
        } else {
            StationCondition::Normal
        };
        Self {
            station: station.to_string(),
            capacity,
            current_load,
            available_staff,
            equipment,
            equipment_down,
            condition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Escalated,
    Approved,
    Denied,
}

/// A station's request for more staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRequest {
    pub id: Uuid,
    pub station: String,
    pub requester: AgentId,
    pub required: usize,
    pub current: usize,
    pub urgency: Urgency,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
}

impl StaffRequest {
    pub fn is_open(&self) -> bool {
        matches!(self.status, RequestStatus::Open | RequestStatus::Escalated)
    }
}

/// The HR desk: holds staff requests and a pool of reserve staff.
#[derive(Debug, Default)]
pub struct StaffingDesk {
    requests: Vec<StaffRequest>,
    reserve: usize,
}

impl StaffingDesk {
    pub fn new(reserve: usize) -> Self {
        Self {
            requests: Vec::new(),
            reserve,
        }
    }

    /// File a request. A station with an open request gets no second one.
    pub fn submit(&mut self, request: StaffRequest) -> Option<Uuid> {
        if self
            .requests
            .iter()
            .any(|r| r.station == request.station && r.is_open())
        {
            return None;
        }
        let id = request.id;
        self.requests.push(request);
        Some(id)
    }

    /// Answer a request. Approved while reserve staff remain. Without
    /// reserve an open request stays unanswered and an escalated one is
    /// denied.
    pub fn decide(&mut self, id: Uuid) -> Option<StaffRequest> {
        let request = self.requests.iter_mut().find(|r| r.id == id)?;
        match request.status {
            RequestStatus::Open | RequestStatus::Escalated if self.reserve > 0 => {
                self.reserve -= 1;
                request.status = RequestStatus::Approved;
            }
            RequestStatus::Escalated => request.status = RequestStatus::Denied,
            _ => return None,
        }
        Some(request.clone())
    }

    /// Escalate a request still unanswered. Raises its urgency one level.
    pub fn escalate(&mut self, id: Uuid) -> Option<StaffRequest> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Open)?;
        request.status = RequestStatus::Escalated;
        request.urgency = request.urgency.raised();
        Some(request.clone())
    }

    pub fn get(&self, id: Uuid) -> Option<&StaffRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn reserve(&self) -> usize {
        self.reserve
    }

    pub fn requests(&self) -> &[StaffRequest] {
        &self.requests
    }
}

/// Outcome of release planning for one station.
#[derive(Debug, Default, PartialEq)]
pub struct ReleasePlan {
    /// Members to release, each with a new owner for every task it holds.
    pub released: Vec<(AgentId, Vec<(TaskId, AgentId)>)>,
    /// Members that could not be released, with the reason.
    pub blocked: Vec<(AgentId, String)>,
}

/// Skills only `member` holds among `team`.
fn unique_skills(member: &CandidateProfile, team: &[CandidateProfile]) -> BTreeSet<String> {
    member
        .skills
        .iter()
        .filter(|s| {
            !team
                .iter()
                .any(|other| other.id != member.id && other.skills.contains(*s))
        })
        .cloned()
        .collect()
}

/// Choose up to `excess` members of `team` to release.
///
/// Supervisors and members at or above `release_max_workload` are never
/// candidates. Candidates without unique skills come first, then by lowest
/// workload. A candidate is released only if every task type its role
/// handles stays covered by a remaining teammate and every unresolved task
/// it holds can be reassigned to one. A member receiving reassigned tasks
/// stays.
pub fn plan_release(
    team: &[CandidateProfile],
    tasks: &HashMap<AgentId, Vec<Task>>,
    excess: usize,
    staffing: &StaffingConfig,
    weights: &AssignmentWeights,
    policy: &dyn KitchenPolicy,
) -> ReleasePlan {
    let mut plan = ReleasePlan::default();
    if excess == 0 {
        return plan;
    }

    let mut candidates: Vec<(&CandidateProfile, bool, f64)> = team
        .iter()
        .filter(|m| m.role.is_execution_level())
        .map(|m| {
            let unique = !unique_skills(m, team).is_empty();
            (m, unique, m.workload(weights.capacity))
        })
        .filter(|(_, _, workload)| *workload < staffing.release_max_workload)
        .collect();
    candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)));

    let mut assigner = Assigner::new(weights, policy);
    let mut leaving: BTreeSet<AgentId> = BTreeSet::new();
    let mut receiving: BTreeSet<AgentId> = BTreeSet::new();
    for (member, _, _) in candidates {
        if plan.released.len() >= excess {
            break;
        }
        if receiving.contains(&member.id) {
            continue;
        }
        let remains = |m: &&CandidateProfile| m.id != member.id && !leaving.contains(&m.id);
        let uncovered = roles::task_types(member.role)
            .find(|t| !team.iter().filter(remains).any(|m| roles::handles(m.role, t)));
        if let Some(task_type) = uncovered {
            plan.blocked
                .push((member.id, format!("last member able to handle {task_type}")));
            continue;
        }
        let held = tasks.get(&member.id).map(Vec::as_slice).unwrap_or(&[]);
        let mut moves = Vec::with_capacity(held.len());
        let mut failure = None;
        for task in held {
            let pool = team.iter().filter(|m| {
                m.id != member.id
                    && !leaving.contains(&m.id)
                    && roles::handles(m.role, &task.task_type)
            });
            match assigner.select(pool, task) {
                Ok(to) => moves.push((task.id, to)),
                Err(e) => {
                    failure = Some(format!("cannot reassign task {}: {e}", task.id));
                    break;
                }
            }
        }
        match failure {
            Some(reason) => plan.blocked.push((member.id, reason)),
            None => {
                leaving.insert(member.id);
                receiving.extend(moves.iter().map(|(_, to)| *to));
                plan.released.push((member.id, moves));
            }
        }
    }
    plan
}
