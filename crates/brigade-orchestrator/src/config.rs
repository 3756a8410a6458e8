use brigade_core::{BrigadeError, BrigadeResult};
use brigade_memory::SignificancePolicy;
use serde::{Deserialize, Serialize};

/// Weights and limits used by candidate scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentWeights {
    /// Bonus for prior completion experience with the task type.
    #[serde(default = "default_experience")]
    pub experience: f64,
    /// Bonus for a workload under `workload_threshold`.
    #[serde(default = "default_availability")]
    pub availability: f64,
    /// Bonus for holding every required skill and piece of equipment.
    #[serde(default = "default_familiarity")]
    pub familiarity: f64,
    #[serde(default = "default_workload_threshold")]
    pub workload_threshold: f64,
    /// Active tasks an agent can carry; the workload denominator.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How many long-term memories to inspect when deriving experience.
    #[serde(default = "default_experience_lookback")]
    pub experience_lookback: usize,
}

fn default_experience() -> f64 {
    2.0
}
fn default_availability() -> f64 {
    1.0
}
fn default_familiarity() -> f64 {
    1.0
}
fn default_workload_threshold() -> f64 {
    0.8
}
fn default_capacity() -> usize {
    10
}
fn default_experience_lookback() -> usize {
    50
}

impl Default for AssignmentWeights {
    fn default() -> Self {
        Self {
            experience: default_experience(),
            availability: default_availability(),
            familiarity: default_familiarity(),
            workload_threshold: default_workload_threshold(),
            capacity: default_capacity(),
            experience_lookback: default_experience_lookback(),
        }
    }
}

/// A daily window, `[start_hour, end_hour)`, of increased demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    /// First hour of the window (0-23).
    pub start_hour: u32,
    /// Hour the window closes (exclusive).
    pub end_hour: u32,
}

/// Station sizing and HR desk timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingConfig {
    #[serde(default = "default_min_staff")]
    pub min_staff: usize,
    /// Active orders one member can cover.
    #[serde(default = "default_load_per_staff")]
    pub load_per_staff: usize,
    #[serde(default = "default_peak_bonus")]
    pub peak_bonus: usize,
    #[serde(default = "default_peak_windows")]
    pub peak_windows: Vec<PeakWindow>,
    /// Minutes before an unanswered staff request escalates.
    #[serde(default = "default_escalation_timeout")]
    pub escalation_timeout_minutes: i64,
    /// Minutes the HR desk takes to answer a request.
    #[serde(default = "default_hr_response")]
    pub hr_response_minutes: i64,
    /// Members at or above this workload are never released.
    #[serde(default = "default_release_max_workload")]
    pub release_max_workload: f64,
    /// Nominal order capacity of a station.
    #[serde(default = "default_station_capacity")]
    pub station_capacity: usize,
}

fn default_min_staff() -> usize {
    2
}
fn default_load_per_staff() -> usize {
    3
}
fn default_peak_bonus() -> usize {
    1
}
fn default_peak_windows() -> Vec<PeakWindow> {
    vec![
        PeakWindow {
            start_hour: 11,
            end_hour: 14,
        },
        PeakWindow {
            start_hour: 17,
            end_hour: 21,
        },
    ]
}
fn default_escalation_timeout() -> i64 {
    30
}
fn default_hr_response() -> i64 {
    20
}
fn default_release_max_workload() -> f64 {
    0.3
}
fn default_station_capacity() -> usize {
    10
}

impl Default for StaffingConfig {
    fn default() -> Self {
        Self {
            min_staff: default_min_staff(),
            load_per_staff: default_load_per_staff(),
            peak_bonus: default_peak_bonus(),
            peak_windows: default_peak_windows(),
            escalation_timeout_minutes: default_escalation_timeout(),
            hr_response_minutes: default_hr_response(),
            release_max_workload: default_release_max_workload(),
            station_capacity: default_station_capacity(),
        }
    }
}

/// Pass/fail limits for the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum visual, plating and garnish score (out of 10).
    #[serde(default = "default_presentation_min")]
    pub presentation_min: f64,
    /// Allowed relative deviation from the expected portion.
    #[serde(default = "default_portion_tolerance")]
    pub portion_tolerance: f64,
    /// Minutes a hot item may wait before service.
    #[serde(default = "default_hot_idle_minutes")]
    pub hot_idle_minutes: i64,
}

fn default_presentation_min() -> f64 {
    7.0
}
fn default_portion_tolerance() -> f64 {
    0.15
}
fn default_hot_idle_minutes() -> i64 {
    10
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            presentation_min: default_presentation_min(),
            portion_tolerance: default_portion_tolerance(),
            hot_idle_minutes: default_hot_idle_minutes(),
        }
    }
}

/// Delay detection and escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPolicy {
    /// An order is delayed once elapsed time exceeds this multiple of its
    /// expected preparation time.
    #[serde(default = "default_delay_factor")]
    pub delay_factor: f64,
    /// Priority above which a delayed order is reassigned.
    #[serde(default = "default_reassign_threshold")]
    pub reassign_priority_threshold: u32,
    #[serde(default = "default_max_priority")]
    pub max_priority: u32,
}

fn default_delay_factor() -> f64 {
    1.5
}
fn default_reassign_threshold() -> u32 {
    8
}
fn default_max_priority() -> u32 {
    10
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            delay_factor: default_delay_factor(),
            reassign_priority_threshold: default_reassign_threshold(),
            max_priority: default_max_priority(),
        }
    }
}

/// Per-agent execution limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLimits {
    /// Backend failures a task may absorb before it is failed.
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,
    /// Long-term memories included in each prompt.
    #[serde(default = "default_memory_context")]
    pub memory_context: usize,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Tasks an agent may work through in one tick.
    #[serde(default = "default_tasks_per_step")]
    pub tasks_per_step: usize,
}

fn default_max_task_retries() -> u32 {
    2
}
fn default_backend_timeout_ms() -> u64 {
    30_000
}
fn default_memory_context() -> usize {
    3
}
fn default_embedding_dimension() -> usize {
    256
}
fn default_tasks_per_step() -> usize {
    3
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_task_retries: default_max_task_retries(),
            backend_timeout_ms: default_backend_timeout_ms(),
            memory_context: default_memory_context(),
            embedding_dimension: default_embedding_dimension(),
            tasks_per_step: default_tasks_per_step(),
        }
    }
}

/// Every tunable of the simulated kitchen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KitchenConfig {
    #[serde(default)]
    pub assignment: AssignmentWeights,
    #[serde(default)]
    pub staffing: StaffingConfig,
    #[serde(default)]
    pub quality: QualityThresholds,
    #[serde(default)]
    pub orders: OrderPolicy,
    #[serde(default)]
    pub agents: AgentLimits,
    #[serde(default)]
    pub significance: SignificancePolicy,
}

impl KitchenConfig {
    /// Reject values that would make the simulation meaningless.
    pub fn validate(&self) -> BrigadeResult<()> {
        if self.assignment.capacity == 0 {
            return Err(BrigadeError::Config("assignment.capacity must be > 0".into()));
        }
        if self.staffing.load_per_staff == 0 {
            return Err(BrigadeError::Config(
                "staffing.load_per_staff must be > 0".into(),
            ));
        }
        if self.agents.tasks_per_step == 0 {
            return Err(BrigadeError::Config("agents.tasks_per_step must be > 0".into()));
        }
        if self.orders.delay_factor <= 0.0 {
            return Err(BrigadeError::Config("orders.delay_factor must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.quality.portion_tolerance) {
            return Err(BrigadeError::Config(
                "quality.portion_tolerance must be in [0, 1)".into(),
            ));
        }
        for w in &self.staffing.peak_windows {
            if w.start_hour >= w.end_hour || w.end_hour > 24 {
                return Err(BrigadeError::Config(format!(
                    "invalid peak window {}-{}",
                    w.start_hour, w.end_hour
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = KitchenConfig::default();
        config.validate().unwrap();
        assert_eq!(config.assignment.experience, 2.0);
        assert_eq!(config.assignment.capacity, 10);
        assert_eq!(config.staffing.peak_windows.len(), 2);
        assert_eq!(config.orders.reassign_priority_threshold, 8);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: KitchenConfig =
            serde_json::from_str(r#"{"assignment": {"capacity": 4}, "quality": {}}"#).unwrap();
        assert_eq!(config.assignment.capacity, 4);
        assert_eq!(config.assignment.workload_threshold, 0.8);
        assert_eq!(config.quality.presentation_min, 7.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = KitchenConfig::default();
        config.assignment.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = KitchenConfig::default();
        config.staffing.peak_windows = vec![PeakWindow {
            start_hour: 20,
            end_hour: 18,
        }];
        assert!(config.validate().is_err());
    }
}
