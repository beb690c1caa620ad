//! In-process counters for admission and task outcomes

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::worker::TaskOutcome;

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_admitted: AtomicU64,
    jobs_rejected: AtomicU64,
    tasks_spawned: AtomicU64,
    tasks_stored: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_panicked: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_admitted(&self) {
        self.jobs_admitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_admitted", "Metric incremented");
    }

    pub fn job_rejected(&self) {
        self.jobs_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_rejected", "Metric incremented");
    }

    pub fn task_spawned(&self) {
        self.tasks_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_finished(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Stored(_) => &self.tasks_stored,
            TaskOutcome::Failed(_) => &self.tasks_failed,
            TaskOutcome::Panicked(_) => &self.tasks_panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_admitted: self.jobs_admitted.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            tasks_spawned: self.tasks_spawned.load(Ordering::Relaxed),
            tasks_stored: self.tasks_stored.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_admitted: u64,
    pub jobs_rejected: u64,
    pub tasks_spawned: u64,
    pub tasks_stored: u64,
    pub tasks_failed: u64,
    pub tasks_panicked: u64,
}
