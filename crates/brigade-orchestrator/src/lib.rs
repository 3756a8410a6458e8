//! Hierarchical kitchen brigade of LLM-driven agents and the scenario
//! executor that scores how well a model coordinates it.
//!
//! Orders arrive on a simulated clock, the executive chef hands them to sous
//! chefs, sous chefs break them into steps for their stations, and line staff
//! cook. Every decision goes through an [`brigade_agent::LlmBackend`].
//!
//! # Main types
//!
//! - [`ScenarioExecutor`]: Runs a [`Scenario`] against one model and produces a [`MetricsSnapshot`].
//! - [`Agent`]: One member of the brigade with its own queue, inbox and memory.
//! - [`TaskQueue`]: Per-agent priority queue with dependency tracking.
//! - [`Assigner`]: Scores candidates for a task and picks the best one.
//! - [`AgentMonitor`]: Live per-agent state for dashboards.
//! - [`Scheduler`]: Jobs due on the simulated clock.

/// Agents, the per-tick step and the handler workbench.
pub mod agent;
/// Candidate scoring and the roster snapshot.
pub mod assignment;
/// Tunable weights, thresholds and limits.
pub mod config;
/// Scenario executor.
pub mod engine;
/// Stations and dishes.
pub mod menu;
/// Messages between agents and reports to the executor.
pub mod messages;
/// Scores and degradations.
pub mod metrics;
/// Live agent state and the run update stream.
pub mod monitor;
/// Orders, items and the order book.
pub mod order;
/// Order and inventory storage.
pub mod persistence;
/// Resource availability checks.
pub mod policy;
/// Role permissions and task types.
pub mod profiles;
/// Plate inspection.
pub mod quality;
/// Task handlers per role.
pub mod roles;
/// Scenario definitions and the built-in set.
pub mod scenario;
/// Simulated clock and delayed jobs.
pub mod scheduler;
/// Agent construction.
pub mod spawner;
/// Staffing assessment, requests and releases.
pub mod staffing;
/// Priority task queue.
pub mod task_queue;
/// Shared types (Task, AgentRole, ids).
pub mod types;

pub use agent::{Agent, AgentCard, Placement, StepContext, StepOutcome};
pub use assignment::{Assigner, CandidateProfile, Roster};
pub use config::KitchenConfig;
pub use engine::ScenarioExecutor;
pub use metrics::{Degradation, DegradationKind, MetricsSnapshot};
pub use monitor::{AgentMonitor, AgentState, LogLine, RunUpdate, WorkerStatus};
pub use order::{Order, OrderBook, OrderStatus};
pub use persistence::{InMemoryOrderStore, OrderStore};
pub use profiles::{profile_for, RoleProfile};
pub use scenario::{builtin, builtin_names, Scenario};
pub use scheduler::{Scheduler, SimClock};
pub use spawner::{AgentSpawner, SpawnRequest};
pub use task_queue::TaskQueue;
pub use types::{AgentId, AgentRole, OrderId, Task, TaskId, TaskStatus};
