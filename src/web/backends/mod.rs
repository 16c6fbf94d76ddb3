//! Concrete [`ModelLoader`]s.

pub mod hash;
#[cfg(feature = "llama")]
pub mod llama;

use std::sync::Arc;

use super::config::{ModelBackend, ServerConfig};
use super::error::LoadError;
use super::model::{ModelHandle, ModelLoader, ProgressReporter};

/// Pick the loader for the configured backend.
pub fn build_loader(config: &ServerConfig) -> Arc<dyn ModelLoader> {
    match config.backend {
        ModelBackend::Hash => Arc::new(hash::HashLoader::new(config.hash_dimension)),
        #[cfg(feature = "llama")]
        ModelBackend::Llama => Arc::new(llama::LlamaLoader::from_config(config)),
        #[cfg(not(feature = "llama"))]
        ModelBackend::Llama => Arc::new(UnavailableLoader {
            backend: "llama",
            feature: "llama",
        }),
    }
}

/// Stands in for a backend compiled out of this binary; loading always fails.
#[derive(Debug)]
pub struct UnavailableLoader {
    backend: &'static str,
    feature: &'static str,
}

impl ModelLoader for UnavailableLoader {
    fn describe(&self) -> String {
        format!("{} (unavailable)", self.backend)
    }

    fn load(&self, _progress: &ProgressReporter<'_>) -> Result<ModelHandle, LoadError> {
        Err(LoadError::Acquire(format!(
            "the {} backend was not compiled in; rebuild with `--features {}`",
            self.backend, self.feature
        )))
    }
}
