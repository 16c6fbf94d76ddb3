//! Shared data types for the instructor-embed server.
//!
//! Everything here is plain data: lifecycle snapshots, request/response
//! bodies and the startup resource snapshot. Behaviour lives in the server
//! crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the background model acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Starting,
    Downloading,
    WarmingUp,
    Ready,
    Error,
}

impl LifecycleState {
    /// READY and ERROR never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Downloading => "downloading",
            LifecycleState::WarmingUp => "warming_up",
            LifecycleState::Ready => "ready",
            LifecycleState::Error => "error",
        }
    }

    /// Collapses the loading phases into the coarse value reported by `/ready`.
    pub fn readiness(self) -> Readiness {
        match self {
            LifecycleState::Ready => Readiness::Ready,
            LifecycleState::Error => Readiness::Error,
            _ => Readiness::Loading,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the lifecycle, as served by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStatus {
    #[serde(rename = "status")]
    pub state: LifecycleState,
    pub message: String,
    pub progress: u8,
}

impl Default for LifecycleStatus {
    fn default() -> Self {
        Self {
            state: LifecycleState::Starting,
            message: "Starting up...".to_string(),
            progress: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Loading,
    Ready,
    Error,
}

/// Body of `GET /ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: Readiness,
    pub message: String,
}

impl From<&LifecycleStatus> for ReadyResponse {
    fn from(status: &LifecycleStatus) -> Self {
        Self {
            status: status.state.readiness(),
            message: status.message.clone(),
        }
    }
}

/// One unit of embedding work: the instruction conditions how `text` is embedded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbedPair {
    pub instruction: String,
    pub text: String,
}

impl EmbedPair {
    pub fn new(instruction: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            text: text.into(),
        }
    }
}

/// Body of `POST /embed`. The two lists are paired positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub instructions: Vec<String>,
    pub texts: Vec<String>,
}

impl EmbedRequest {
    /// Zip instructions and texts into ordered pairs.
    ///
    /// Fails when the lists differ in length.
    pub fn into_pairs(self) -> Result<Vec<EmbedPair>, String> {
        if self.instructions.len() != self.texts.len() {
            return Err(format!(
                "instructions and texts must have the same length ({} != {})",
                self.instructions.len(),
                self.texts.len()
            ));
        }
        Ok(self
            .instructions
            .into_iter()
            .zip(self.texts)
            .map(|(instruction, text)| EmbedPair { instruction, text })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// Structured failure body for `/embed`.
///
/// For "Model not ready", `status`/`message` are the lifecycle's. For
/// "Encoding failed", `status` is always `error` and names the failure
/// class; the lifecycle itself stays READY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedErrorResponse {
    pub error: String,
    pub status: LifecycleState,
    pub message: String,
}

/// Host snapshot taken once at startup. Memory values are bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemResources {
    pub cpu_count: usize,
    pub total_memory: u64,
    pub available_memory: u64,
}

/// Worker pool sizing derived from [`SystemResources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchParameters {
    pub max_workers: usize,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemResourcesView {
    pub cpu_count: usize,
    pub total_memory: u64,
    pub available_memory: u64,
    pub total_memory_gb: f64,
    pub available_memory_gb: f64,
}

impl From<&SystemResources> for SystemResourcesView {
    fn from(resources: &SystemResources) -> Self {
        const BYTES_TO_GB: f64 = 1024.0 * 1024.0 * 1024.0;
        Self {
            cpu_count: resources.cpu_count,
            total_memory: resources.total_memory,
            available_memory: resources.available_memory,
            total_memory_gb: resources.total_memory as f64 / BYTES_TO_GB,
            available_memory_gb: resources.available_memory as f64 / BYTES_TO_GB,
        }
    }
}

/// Body of `GET /system-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfoResponse {
    pub system_resources: SystemResourcesView,
    pub parameters: DispatchParameters,
}
