use std::fmt;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Default number of pending jobs held before admission starts shedding
pub const DEFAULT_CAPACITY: usize = 1024;

/// One resource locator to fetch and store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job(String);

impl Job {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }

    pub fn into_url(self) -> String {
        self.0
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Job {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Job {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Producer side of the bounded FIFO admission queue.
///
/// Cloning yields another producer on the same queue. Admission never waits:
/// when the queue is full the job is dropped and logged, so the HTTP layer
/// stays responsive while workers are saturated.
#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    sender: mpsc::Sender<Job>,
    capacity: usize,
}

/// Consumer side, owned by the dispatcher
#[derive(Debug)]
pub struct JobReceiver {
    receiver: mpsc::Receiver<Job>,
}

impl AdmissionQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        debug!(capacity, "Created admission queue");
        (Self { sender, capacity }, JobReceiver { receiver })
    }

    /// Admit `job` if there is room. Returns `false` when the queue is full
    /// or the consumer is gone; the job is dropped in both cases.
    pub fn try_enqueue(&self, job: Job) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(url = %job, capacity = self.capacity, "Admission queue full, job dropped");
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(url = %job, "Admission queue closed, job dropped");
                false
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs waiting to be dequeued
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobReceiver {
    /// Wait for the next job in admission order. `None` once every producer
    /// is dropped and the queue is drained.
    pub async fn dequeue(&mut self) -> Option<Job> {
        self.receiver.recv().await
    }

    /// Stop admission; already queued jobs can still be dequeued
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
