//! Deterministic feature-hashing embedder.
//!
//! Every lower-cased word of the text (and, at half weight, of the
//! instruction) is hashed with FNV-1a into a signed bucket. Identical pairs
//! always give identical vectors, with no weights to download.

use std::sync::Arc;

use instructor_embed_types::EmbedPair;

use crate::web::error::{EncodeError, LoadError};
use crate::web::model::{l2_normalize, EmbeddingModel, ModelHandle, ModelLoader, ProgressReporter};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const TEXT_WEIGHT: f32 = 1.0;
const INSTRUCTION_WEIGHT: f32 = 0.5;

pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self, LoadError> {
        if dimension == 0 {
            return Err(LoadError::Acquire(
                "hash dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    pub fn embed_one(&self, pair: &EmbedPair) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        self.accumulate(&mut vector, "t", &pair.text, TEXT_WEIGHT);
        self.accumulate(&mut vector, "i", &pair.instruction, INSTRUCTION_WEIGHT);
        l2_normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], namespace: &str, input: &str, weight: f32) {
        for token in input.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let key = format!("{namespace}:{}", token.to_lowercase());
            let hash = fnv1a(key.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign * weight;
        }
    }
}

impl EmbeddingModel for HashEmbedder {
    fn encode(&self, pairs: &[EmbedPair]) -> Result<Vec<Vec<f32>>, EncodeError> {
        Ok(pairs.iter().map(|pair| self.embed_one(pair)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "fnv-hash"
    }
}

#[derive(Debug, Clone)]
pub struct HashLoader {
    dimension: usize,
}

impl HashLoader {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl ModelLoader for HashLoader {
    fn describe(&self) -> String {
        format!("fnv-hash ({} dims)", self.dimension)
    }

    fn load(&self, progress: &ProgressReporter<'_>) -> Result<ModelHandle, LoadError> {
        let embedder = HashEmbedder::new(self.dimension)?;
        progress.report(40, "Hash embedder initialized");
        Ok(Arc::new(embedder))
    }
}
