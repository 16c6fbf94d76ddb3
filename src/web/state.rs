// Shared state handed to every request handler

use std::sync::Arc;

use instructor_embed_types::{DispatchParameters, SystemResources};

use super::config::ServerConfig;
use super::dispatch::Dispatcher;
use super::lifecycle::{LifecycleManager, SharedLifecycle};
use super::system_resources::{apply_overrides, derive_dispatch_parameters, sample_system_resources};

pub type SharedAppState = Arc<AppState>;

#[derive(Debug)]
pub struct AppState {
    pub lifecycle: SharedLifecycle,
    pub dispatcher: Dispatcher,
    /// Snapshot from startup, reported as-is by `/system-info`.
    pub resources: SystemResources,
}

impl AppState {
    /// Sample the host, derive pool parameters and start the worker pool.
    /// Model loading is not started here.
    pub fn from_config(config: &ServerConfig) -> std::io::Result<Self> {
        let resources = sample_system_resources();
        let derived = derive_dispatch_parameters(&resources);
        let params = apply_overrides(derived, config.max_workers, config.chunk_size);
        if params != derived {
            crate::sys_info!(
                "Operator overrides: workers {} -> {}, chunk size {} -> {}",
                derived.max_workers,
                params.max_workers,
                derived.chunk_size,
                params.chunk_size
            );
        }
        Self::new(Arc::new(LifecycleManager::new()), resources, params)
    }

    pub fn new(
        lifecycle: SharedLifecycle,
        resources: SystemResources,
        params: DispatchParameters,
    ) -> std::io::Result<Self> {
        let dispatcher = Dispatcher::new(Arc::clone(&lifecycle), params)?;
        Ok(Self {
            lifecycle,
            dispatcher,
            resources,
        })
    }

    pub fn parameters(&self) -> DispatchParameters {
        self.dispatcher.parameters()
    }
}
