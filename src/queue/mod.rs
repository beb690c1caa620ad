mod admission;

pub use admission::{AdmissionQueue, DEFAULT_CAPACITY, Job, JobReceiver};
