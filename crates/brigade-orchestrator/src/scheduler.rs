use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use uuid::Uuid;

/// Simulated scenario clock. Only [`SimClock::advance`] moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    tick_minutes: i64,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>, tick_minutes: i64) -> Self {
        Self {
            start,
            now: start,
            tick_minutes: tick_minutes.max(1),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn tick_minutes(&self) -> i64 {
        self.tick_minutes
    }

    /// Move one tick forward and return the new time.
    pub fn advance(&mut self) -> DateTime<Utc> {
        self.now += Duration::minutes(self.tick_minutes);
        self.now
    }

    /// Minutes since the scenario started.
    pub fn elapsed_minutes(&self) -> i64 {
        (self.now - self.start).num_minutes()
    }
}

/// Deferred work the executor runs when the clock reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAction {
    /// The HR desk answers a staff request.
    StaffDecision { request_id: Uuid },
    /// An unanswered staff request escalates.
    StaffEscalation { request_id: Uuid },
    /// Equipment, stock or time pressure return to normal after a crisis.
    CrisisRecovery,
}

/// A job on the scenario clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub due: DateTime<Utc>,
    seq: u64,
    pub action: JobAction,
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered job queue driven by a [`SimClock`].
///
/// Jobs due at the same instant come out in the order they were scheduled,
/// so replaying a scenario replays the same job sequence.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<ScheduledJob>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` at `due`.
    pub fn schedule(&mut self, due: DateTime<Utc>, action: JobAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::debug!(%due, ?action, "Job scheduled");
        self.queue.push(Reverse(ScheduledJob { due, seq, action }));
    }

    /// Schedule `action` `minutes` after `now`.
    pub fn schedule_in(&mut self, now: DateTime<Utc>, minutes: i64, action: JobAction) {
        self.schedule(now + Duration::minutes(minutes), action);
    }

    /// Remove and return every job due at or before `now`, earliest first.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut ready = Vec::new();
        while self.queue.peek().is_some_and(|Reverse(job)| job.due <= now) {
            if let Some(Reverse(job)) = self.queue.pop() {
                ready.push(job);
            }
        }
        ready
    }

    /// Number of jobs still waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_clock_advances_by_tick() {
        let mut clock = SimClock::new(noon(), 5);
        clock.advance();
        clock.advance();
        assert_eq!(clock.elapsed_minutes(), 10);
        assert_eq!(clock.now(), noon() + Duration::minutes(10));
        assert_eq!(clock.start(), noon());
    }

    #[test]
    fn test_zero_tick_is_clamped() {
        let mut clock = SimClock::new(noon(), 0);
        clock.advance();
        assert_eq!(clock.elapsed_minutes(), 1);
    }

    #[test]
    fn test_due_returns_only_ripe_jobs_in_order() {
        let mut scheduler = Scheduler::new();
        let late = Uuid::new_v4();
        let early = Uuid::new_v4();
        scheduler.schedule_in(noon(), 30, JobAction::StaffEscalation { request_id: late });
        scheduler.schedule_in(noon(), 20, JobAction::StaffDecision { request_id: early });
        scheduler.schedule_in(noon(), 20, JobAction::CrisisRecovery);

        assert!(scheduler.due(noon() + Duration::minutes(10)).is_empty());
        let ready = scheduler.due(noon() + Duration::minutes(25));
        assert_eq!(
            ready.iter().map(|j| j.action.clone()).collect::<Vec<_>>(),
            vec![
                JobAction::StaffDecision { request_id: early },
                JobAction::CrisisRecovery
            ]
        );
        assert_eq!(scheduler.pending(), 1);

        let ready = scheduler.due(noon() + Duration::minutes(30));
        assert_eq!(ready[0].action, JobAction::StaffEscalation { request_id: late });
        assert_eq!(scheduler.pending(), 0);
    }
}
