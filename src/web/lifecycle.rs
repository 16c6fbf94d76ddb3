//! Background model loading and readiness state.
//!
//! One loader task drives STARTING -> DOWNLOADING -> WARMING_UP -> READY, or
//! drops into ERROR from any phase. Handlers read the status through a watch
//! channel and never wait on the loader. READY and ERROR are terminal and
//! progress never moves backwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use instructor_embed_types::{EmbedPair, LifecycleState, LifecycleStatus};

use super::error::{panic_message, DispatchError, LoadError};
use super::model::{ModelHandle, ModelLoader, ProgressReporter};
use crate::{sys_error, sys_info, sys_warn};

pub const WARM_UP_INSTRUCTION: &str = "Instruction for warm-up";
pub const WARM_UP_TEXT: &str = "Warm-up input";

pub const WARM_UP_PROGRESS: u8 = 50;
pub const READY_PROGRESS: u8 = 100;

pub type SharedLifecycle = Arc<LifecycleManager>;

pub struct LifecycleManager {
    status_tx: watch::Sender<LifecycleStatus>,
    /// Written once, just before the READY transition.
    model: OnceLock<ModelHandle>,
    started: AtomicBool,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(LifecycleStatus::default());
        Self {
            status_tx,
            model: OnceLock::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Current state, message and progress.
    pub fn status(&self) -> LifecycleStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.status_tx.borrow().state == LifecycleState::Ready
    }

    /// The loaded model, or `NotReady` echoing the current status.
    pub fn model(&self) -> Result<ModelHandle, DispatchError> {
        let status = self.status();
        if status.state == LifecycleState::Ready {
            if let Some(model) = self.model.get() {
                return Ok(Arc::clone(model));
            }
        }
        Err(DispatchError::NotReady {
            state: status.state,
            message: status.message,
        })
    }

    /// Spawn the loader on the blocking pool. Only the first call does
    /// anything; later calls return `None`.
    ///
    /// Failures, panics included, end up as the ERROR state. Must be called
    /// from inside a tokio runtime.
    pub fn start_loading(self: &Arc<Self>, loader: Arc<dyn ModelLoader>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            sys_warn!("Model loading already started, ignoring second request");
            return None;
        }

        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            let worker = Arc::clone(&manager);
            let outcome =
                tokio::task::spawn_blocking(move || worker.run_loader(loader.as_ref())).await;

            match outcome {
                Ok(Ok(model)) => manager.publish(model),
                Ok(Err(err)) => manager.fail(&err),
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        join_err.to_string()
                    };
                    manager.fail(&LoadError::Panicked(reason));
                }
            }
        }))
    }

    /// Resolves once the lifecycle reaches READY or ERROR.
    pub async fn wait_until_settled(&self) -> LifecycleStatus {
        let mut rx = self.subscribe();
        loop {
            {
                let status = rx.borrow_and_update();
                if status.state.is_terminal() {
                    return status.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }

    fn run_loader(&self, loader: &dyn ModelLoader) -> Result<ModelHandle, LoadError> {
        sys_info!("Loading model: {}", loader.describe());
        self.transition(LifecycleState::Downloading, "Downloading model...", 0);

        let sink = |progress: u8, message: &str| self.report_download_progress(progress, message);
        let model = loader.load(&ProgressReporter::new(&sink))?;

        self.transition(
            LifecycleState::WarmingUp,
            "Warming up model...",
            WARM_UP_PROGRESS,
        );

        let warm_up = model
            .encode(&[EmbedPair::new(WARM_UP_INSTRUCTION, WARM_UP_TEXT)])
            .map_err(|e| LoadError::WarmUp(e.to_string()))?;
        match warm_up.as_slice() {
            [vector] if !vector.is_empty() => {}
            other => {
                return Err(LoadError::WarmUp(format!(
                    "expected one non-empty vector, got {} vectors",
                    other.len()
                )))
            }
        }

        Ok(model)
    }

    fn publish(&self, model: ModelHandle) {
        let name = model.name().to_string();
        let dimension = model.dimension();
        if self.model.set(model).is_err() {
            sys_warn!("Model handle already published, keeping the first one");
        }
        self.transition(LifecycleState::Ready, "Model is ready!", READY_PROGRESS);
        sys_info!("Model {} ready ({} dims)", name, dimension);
    }

    fn fail(&self, err: &LoadError) {
        let message = err.to_string();
        sys_error!("{}", message);
        self.status_tx.send_if_modified(|status| {
            if status.state.is_terminal() {
                return false;
            }
            status.state = LifecycleState::Error;
            status.message = message;
            true
        });
    }

    /// Intermediate DOWNLOADING progress; stays below the warm-up mark and
    /// never decreases.
    fn report_download_progress(&self, progress: u8, message: &str) {
        let capped = progress.min(WARM_UP_PROGRESS - 1);
        self.status_tx.send_if_modified(|status| {
            if status.state != LifecycleState::Downloading || capped <= status.progress {
                return false;
            }
            status.progress = capped;
            status.message = message.to_string();
            true
        });
    }

    fn transition(&self, state: LifecycleState, message: &str, progress: u8) {
        let changed = self.status_tx.send_if_modified(|status| {
            if status.state.is_terminal() {
                return false;
            }
            status.state = state;
            status.message = message.to_string();
            status.progress = status.progress.max(progress);
            true
        });
        if changed {
            sys_info!("[LIFECYCLE] {} - {}", state, message);
        } else {
            sys_warn!("[LIFECYCLE] Ignoring transition to {} after terminal state", state);
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("status", &*self.status_tx.borrow())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
