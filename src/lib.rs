pub mod api;
pub mod config;
pub mod observability;
pub mod queue;
pub mod resolver;
pub mod server;
pub mod settings;
pub mod shutdown;
pub mod storage;
pub mod worker;
