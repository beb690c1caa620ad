//! Dispatch loop draining the admission queue

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::guard::{TaskOutcome, run_guarded};
use super::runner::{TaskContext, process_job};
use crate::observability::Metrics;
use crate::queue::{Job, JobReceiver};

/// Spawns one independent task per dequeued job.
///
/// Fan-out is unbounded: the loop never waits for a task, so the number of
/// tasks in flight is limited only by how fast the queue is drained.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<TaskContext>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(ctx: TaskContext, metrics: Arc<Metrics>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            metrics,
        }
    }

    /// Drain `jobs` until `shutdown` fires or every producer is gone.
    ///
    /// Cancellation is checked before each dequeue, so once `shutdown` fires
    /// no further job leaves the queue. Jobs still queued at that point are
    /// dropped along with the receiver; spawned tasks keep running.
    pub async fn run(self, mut jobs: JobReceiver, shutdown: CancellationToken) {
        info!("Dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Dispatcher stopping, queued jobs abandoned");
                    break;
                }
                job = jobs.dequeue() => match job {
                    Some(job) => {
                        self.spawn(job);
                    }
                    None => {
                        info!("Admission queue closed, dispatcher exiting");
                        break;
                    }
                },
            }
        }

        jobs.close();
    }

    /// Start the fetch-and-store task for `job`. The handle may be dropped;
    /// the task runs to completion regardless.
    pub fn spawn(&self, job: Job) -> JoinHandle<TaskOutcome> {
        let ctx = self.ctx.clone();
        let metrics = self.metrics.clone();
        let span = info_span!("task", task_id = %Uuid::now_v7(), url = %job);

        metrics.task_spawned();
        tokio::spawn(
            async move {
                let outcome = run_guarded(process_job(job, &ctx)).await;
                metrics.task_finished(&outcome);
                outcome
            }
            .instrument(span),
        )
    }
}
