// Web server modules for the embedding service

pub mod logger;
pub mod config;
pub mod error;
pub mod model;
pub mod backends;
pub mod lifecycle;
pub mod system_resources;
pub mod worker_pool;
pub mod dispatch;
pub mod state;
pub mod response_helpers;
pub mod request_parsing;
pub mod routes;
pub mod server;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use config::*;
pub use error::*;
pub use lifecycle::{LifecycleManager, SharedLifecycle};
pub use dispatch::Dispatcher;
pub use model::{EmbeddingModel, ModelHandle, ModelLoader, ProgressReporter};
pub use state::{AppState, SharedAppState};
