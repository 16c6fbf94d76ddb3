//! The embedding model seam.
//!
//! The server never looks inside a model: it acquires one through a
//! [`ModelLoader`], warms it up, then shares it read-only as a [`ModelHandle`].

use std::sync::Arc;

use instructor_embed_types::EmbedPair;

use super::error::{EncodeError, LoadError};

/// An opaque, loaded embedding model.
///
/// Implementations must tolerate concurrent `encode` calls from every worker
/// thread at once.
pub trait EmbeddingModel: Send + Sync {
    /// One vector per pair, in input order.
    fn encode(&self, pairs: &[EmbedPair]) -> Result<Vec<Vec<f32>>, EncodeError>;

    /// Length of every vector returned by [`EmbeddingModel::encode`].
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

/// Shared, read-only model reference handed out once the model is READY.
pub type ModelHandle = Arc<dyn EmbeddingModel>;

/// Acquires a model (download + load). Runs on a blocking thread.
pub trait ModelLoader: Send + Sync {
    /// Short description for logs, e.g. the repo or file being loaded.
    fn describe(&self) -> String;

    fn load(&self, progress: &ProgressReporter<'_>) -> Result<ModelHandle, LoadError>;
}

/// Lets a loader publish intermediate progress while it is downloading.
pub struct ProgressReporter<'a> {
    sink: &'a (dyn Fn(u8, &str) + Send + Sync),
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a (dyn Fn(u8, &str) + Send + Sync)) -> Self {
        Self { sink }
    }

    /// A reporter that drops every update.
    pub fn noop() -> ProgressReporter<'static> {
        ProgressReporter {
            sink: &ignore_progress,
        }
    }

    pub fn report(&self, progress: u8, message: &str) {
        (self.sink)(progress, message);
    }
}

impl std::fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

fn ignore_progress(_progress: u8, _message: &str) {}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
