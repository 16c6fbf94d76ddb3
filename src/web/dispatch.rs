//! Turns one embedding request into bounded parallel work.
//!
//! Pairs are cut into contiguous chunks of `chunk_size`, each chunk becomes
//! one pool task against the shared model, and results are joined back in
//! submission order, so result[i] always belongs to pair[i] regardless of
//! which worker finished first. Any failed chunk fails the whole request.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;

use instructor_embed_types::{DispatchParameters, EmbedPair};

use super::error::{DispatchError, EncodeError};
use super::lifecycle::SharedLifecycle;
use super::model::EmbeddingModel;
use super::worker_pool::{SharedWorkerPool, WorkerPool};
use crate::sys_debug;

pub struct Dispatcher {
    lifecycle: SharedLifecycle,
    pool: SharedWorkerPool,
    params: DispatchParameters,
}

impl Dispatcher {
    /// Build the worker pool with exactly `params.max_workers` threads.
    pub fn new(lifecycle: SharedLifecycle, params: DispatchParameters) -> std::io::Result<Self> {
        let pool = Arc::new(WorkerPool::new(params.max_workers)?);
        Ok(Self::with_pool(lifecycle, pool, params))
    }

    pub fn with_pool(
        lifecycle: SharedLifecycle,
        pool: SharedWorkerPool,
        params: DispatchParameters,
    ) -> Self {
        Self {
            lifecycle,
            pool,
            params,
        }
    }

    pub fn parameters(&self) -> DispatchParameters {
        self.params
    }

    pub fn pool(&self) -> &SharedWorkerPool {
        &self.pool
    }

    /// Encode `pairs`, returning exactly one vector per pair in input order.
    ///
    /// Fails with `NotReady` before the model is loaded, without touching it.
    pub async fn dispatch(&self, pairs: Vec<EmbedPair>) -> Result<Vec<Vec<f32>>, DispatchError> {
        let model = self.lifecycle.model()?;
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let expected = pairs.len();
        let chunks = partition(pairs, self.params.chunk_size);
        let chunk_count = chunks.len();

        let mut handles = Vec::with_capacity(chunk_count);
        for chunk in chunks {
            let model = Arc::clone(&model);
            handles.push(self.pool.submit(move || encode_chunk(model.as_ref(), &chunk))?);
        }

        let encoded = try_join_all(handles.into_iter().map(|handle| async move {
            let chunk_result = handle.join().await.map_err(DispatchError::from)?;
            chunk_result.map_err(DispatchError::from)
        }))
        .await?;

        let vectors: Vec<Vec<f32>> = encoded.into_iter().flatten().collect();
        if vectors.len() != expected {
            return Err(EncodeError::new(format!(
                "expected {expected} vectors, got {}",
                vectors.len()
            ))
            .into());
        }
        if let Some(first) = vectors.first() {
            let dimension = first.len();
            if vectors.iter().any(|v| v.len() != dimension) {
                return Err(EncodeError::new("model returned vectors of differing length").into());
            }
        }

        sys_debug!(
            "[DISPATCH] {} pairs in {} chunks took {:?}",
            expected,
            chunk_count,
            started.elapsed()
        );
        Ok(vectors)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("params", &self.params)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn encode_chunk(model: &dyn EmbeddingModel, chunk: &[EmbedPair]) -> Result<Vec<Vec<f32>>, EncodeError> {
    let vectors = model.encode(chunk)?;
    if vectors.len() != chunk.len() {
        return Err(EncodeError::new(format!(
            "chunk of {} pairs produced {} vectors",
            chunk.len(),
            vectors.len()
        )));
    }
    Ok(vectors)
}

/// Split into contiguous runs of `size`; only the last run may be shorter.
pub fn partition<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter();
    loop {
        let chunk: Vec<T> = iter.by_ref().take(size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}
