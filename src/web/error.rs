use thiserror::Error;

use instructor_embed_types::LifecycleState;

/// Resource acquisition or warm-up failed. Stored in the lifecycle, never
/// returned to a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Error loading model: {0}")]
    Acquire(String),
    #[error("Error warming up model: {0}")]
    WarmUp(String),
    #[error("Error loading model: loader panicked: {0}")]
    Panicked(String),
}

/// The underlying model call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct EncodeError(pub String);

impl EncodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool is shutting down")]
    ShuttingDown,
    #[error("worker dropped the task: {0}")]
    WorkerLost(String),
}

/// Request-level failure of `Dispatcher::dispatch`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Model not ready ({state}): {message}")]
    NotReady {
        state: LifecycleState,
        message: String,
    },
    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("Service is shutting down")]
    ShuttingDown,
}

impl From<PoolError> for DispatchError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ShuttingDown => DispatchError::ShuttingDown,
            PoolError::WorkerLost(reason) => DispatchError::Encode(EncodeError(reason)),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
