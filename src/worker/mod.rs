//! Download workers
//!
//! The [`Dispatcher`] drains the admission queue and spawns one task per
//! job. Each task derives a storage key, fetches the resource and uploads it;
//! a panic inside a task is contained by [`run_guarded`].

pub mod dispatcher;
pub mod guard;
pub mod http;
pub mod naming;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::Dispatcher;
pub use guard::{TaskOutcome, run_guarded};
pub use http::{BrowserHeaders, FetchError, FetchedBody, Fetcher, Headers, HttpClient, HttpConfig};
pub use runner::{IMAGE_CONTENT_TYPE, TaskContext, TaskError, process_job};
