use crate::types::{BlockReason, OrderId, Task, TaskId, TaskStatus};
use std::collections::HashSet;

/// An agent's own task queue. Insertion order is preserved and used to
/// break priority ties.
///
/// Completed, failed and cancelled tasks leave the live list for a history
/// list, so lookups over pending work stay proportional to what is unresolved.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<Task>,
    history: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task.
    pub fn add(&mut self, task: Task) -> TaskId {
        let id = task.id;
        if task.status.is_unresolved() {
            self.tasks.push(task);
        } else {
            self.history.push(task);
        }
        id
    }

    /// The highest-priority pending task; earliest inserted wins ties.
    pub fn next_pending(&self) -> Option<&Task> {
        let mut best: Option<&Task> = None;
        for task in self.tasks.iter().filter(|t| t.status == TaskStatus::Pending) {
            if best.map_or(true, |b| task.priority > b.priority) {
                best = Some(task);
            }
        }
        best
    }

    /// Any task this queue has held, live or resolved.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks
            .iter()
            .chain(self.history.iter())
            .find(|t| t.id == id)
    }

    /// A live task.
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Set the status of a live task, retiring it to history once resolved.
    /// Returns false if the task is unknown or already resolved.
    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) -> bool {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        if status.is_unresolved() {
            self.tasks[pos].status = status;
        } else {
            let mut task = self.tasks.remove(pos);
            task.status = status;
            self.history.push(task);
        }
        true
    }

    /// Pending plus in-progress tasks.
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status.is_active()).count()
    }

    /// Tasks still awaiting work, in insertion order.
    pub fn unresolved(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Block pending tasks with unmet dependencies and release blocked ones
    /// whose dependencies have all completed. Returns how many were released.
    pub fn refresh_dependencies(&mut self, completed: &HashSet<TaskId>) -> usize {
        let mut released = 0;
        for task in &mut self.tasks {
            let met = task.dependencies_met(completed);
            match &task.status {
                TaskStatus::Pending if !met => {
                    task.status = TaskStatus::Blocked {
                        reason: BlockReason::Dependencies,
                    };
                }
                TaskStatus::Blocked {
                    reason: BlockReason::Dependencies,
                } if met => {
                    task.status = TaskStatus::Pending;
                    released += 1;
                }
                _ => {}
            }
        }
        released
    }

    /// Return resource-blocked tasks to pending when `still_blocked` says the
    /// resource is back. Returns how many were released.
    pub fn release_blocked(&mut self, still_blocked: impl Fn(&BlockReason) -> bool) -> usize {
        let mut released = 0;
        for task in &mut self.tasks {
            if let TaskStatus::Blocked { reason } = &task.status {
                if *reason != BlockReason::Dependencies && !still_blocked(reason) {
                    task.status = TaskStatus::Pending;
                    released += 1;
                }
            }
        }
        released
    }

    /// Cancel unresolved tasks belonging to any of `orders`.
    pub fn cancel_for_orders(&mut self, orders: &HashSet<OrderId>) -> usize {
        let (hit, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| t.order_id.is_some_and(|o| orders.contains(&o)));
        self.tasks = kept;
        let cancelled = hit.len();
        self.history.extend(hit.into_iter().map(|mut task| {
            task.status = TaskStatus::Cancelled;
            task
        }));
        cancelled
    }

    /// Remove and return every pending or blocked task.
    pub fn surrender(&mut self) -> Vec<Task> {
        let (handed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Blocked { .. }));
        self.tasks = kept;
        handed
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolved tasks, oldest first.
    pub fn history(&self) -> &[Task] {
        &self.history
    }
}
