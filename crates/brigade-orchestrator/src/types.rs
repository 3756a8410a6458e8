use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifies an agent for the duration of a run.
pub type AgentId = Uuid;
/// Identifies a task.
pub type TaskId = Uuid;
/// Identifies an order.
pub type OrderId = Uuid;

/// Position of an agent in the kitchen brigade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Runs the kitchen; assigns orders to sous chefs.
    ExecutiveChef,
    /// Runs a station; breaks orders down for the station.
    SousChef,
    /// Station chef; breaks dishes into steps and checks quality.
    ChefDePartie,
    /// Cooks and plates.
    LineCook,
    /// Prepares ingredients.
    PrepCook,
    /// Cleans, washes, moves equipment.
    KitchenPorter,
}

impl AgentRole {
    /// Every role, top of the hierarchy first.
    pub const ALL: [AgentRole; 6] = [
        AgentRole::ExecutiveChef,
        AgentRole::SousChef,
        AgentRole::ChefDePartie,
        AgentRole::LineCook,
        AgentRole::PrepCook,
        AgentRole::KitchenPorter,
    ];

    /// The snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::ExecutiveChef => "executive_chef",
            AgentRole::SousChef => "sous_chef",
            AgentRole::ChefDePartie => "chef_de_partie",
            AgentRole::LineCook => "line_cook",
            AgentRole::PrepCook => "prep_cook",
            AgentRole::KitchenPorter => "kitchen_porter",
        }
    }

    /// Whether the role executes steps rather than supervising.
    pub fn is_execution_level(&self) -> bool {
        matches!(
            self,
            AgentRole::LineCook | AgentRole::PrepCook | AgentRole::KitchenPorter
        )
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task cannot run yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// At least one dependency has not completed.
    Dependencies,
    /// The named equipment is out of service.
    Equipment(String),
    /// The named ingredient is out of stock.
    Ingredient(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Dependencies => write!(f, "waiting on dependencies"),
            BlockReason::Equipment(name) => write!(f, "equipment '{name}' unavailable"),
            BlockReason::Ingredient(name) => write!(f, "ingredient '{name}' unavailable"),
        }
    }
}

/// Status of a task in an agent's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked { reason: BlockReason },
    Completed,
    Failed { reason: String },
    /// The task belonged to an order that was cancelled.
    Cancelled,
}

impl TaskStatus {
    /// Pending, in progress or blocked.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Blocked { .. }
        )
    }

    /// Counts toward workload.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

/// A unit of work owned by exactly one agent at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Handler selector, e.g. `order_assignment`, `cooking_step`.
    pub task_type: String,
    pub description: String,
    /// Higher runs first.
    pub priority: u32,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    /// Index of the order item this task works on.
    #[serde(default)]
    pub item_index: Option<usize>,
    /// Backend failures absorbed so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// A pending task with priority 5.
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            description: description.into(),
            priority: 5,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            order_id: None,
            item_index: None,
            attempts: 0,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Attach the order this task serves.
    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Attach the order item this task serves.
    pub fn for_item(mut self, order_id: OrderId, item_index: usize) -> Self {
        self.order_id = Some(order_id);
        self.item_index = Some(item_index);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach a list of strings under `key`.
    pub fn with_list(mut self, key: impl Into<String>, values: &[String]) -> Self {
        self.metadata.insert(
            key.into(),
            serde_json::Value::Array(
                values
                    .iter()
                    .map(|v| serde_json::Value::String(v.clone()))
                    .collect(),
            ),
        );
        self
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// A string list stored under `key`; missing or malformed yields empty.
    pub fn meta_list(&self, key: &str) -> Vec<String> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Skills an assignee must hold.
    pub fn required_skills(&self) -> Vec<String> {
        self.meta_list("required_skills")
    }

    /// Equipment the task uses.
    pub fn equipment(&self) -> Vec<String> {
        self.meta_list("equipment")
    }

    /// Ingredients the task consumes.
    pub fn ingredients(&self) -> Vec<String> {
        self.meta_list("ingredients")
    }

    /// Whether every dependency is in `completed`.
    pub fn dependencies_met(&self, completed: &std::collections::HashSet<TaskId>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}
