//! Stub models and loaders shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use instructor_embed_types::EmbedPair;

use super::backends::hash::fnv1a;
use super::error::{EncodeError, LoadError};
use super::model::{EmbeddingModel, ModelHandle, ModelLoader, ProgressReporter};

pub const STUB_DIMENSION: usize = 4;

/// Vector that identifies `pair` uniquely enough to check correspondence.
pub fn expected_vector(pair: &EmbedPair) -> Vec<f32> {
    let h = fnv1a(format!("{}\u{0}{}", pair.instruction, pair.text).as_bytes());
    (0..STUB_DIMENSION)
        .map(|i| ((h >> (i * 16)) & 0xffff) as f32)
        .collect()
}

/// Seed that differs between runs.
pub fn run_seed() -> u64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros()) as u64
}

pub fn delay_ms(seed: u64, text: &str, max_ms: u64) -> u64 {
    let mut bytes = seed.to_le_bytes().to_vec();
    bytes.extend_from_slice(text.as_bytes());
    fnv1a(&bytes) % (max_ms + 1)
}

pub fn numbered_pairs(n: usize) -> Vec<EmbedPair> {
    (0..n)
        .map(|i| EmbedPair::new(format!("instruction {}", i % 3), format!("text #{i}")))
        .collect()
}

/// Deterministic model with optional per-call delay and failure trigger.
#[derive(Default)]
pub struct StubModel {
    pub calls: AtomicUsize,
    /// Any chunk containing this text fails.
    pub fail_on_text: Option<String>,
    /// Sleep up to this many ms per chunk, derived from `delay_seed` and the
    /// chunk's first text.
    pub max_delay_ms: u64,
    pub delay_seed: u64,
    pub fail_all: bool,
    /// Returns one vector too few for chunks longer than one pair.
    pub drop_last: bool,
    /// Panics on any chunk containing this text.
    pub panic_on_text: Option<String>,
    pub chunk_sizes: Mutex<Vec<usize>>,
}

impl StubModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sizes of every chunk seen so far, sorted by arrival.
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunk_sizes.lock().unwrap().clone()
    }
}

impl EmbeddingModel for StubModel {
    fn encode(&self, pairs: &[EmbedPair]) -> Result<Vec<Vec<f32>>, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.chunk_sizes.lock().unwrap().push(pairs.len());
        if self.fail_all {
            return Err(EncodeError::new("stub model failure"));
        }
        if let Some(bad) = &self.fail_on_text {
            if pairs.iter().any(|p| &p.text == bad) {
                return Err(EncodeError::new(format!("cannot encode {bad}")));
            }
        }
        if self.max_delay_ms > 0 {
            if let Some(first) = pairs.first() {
                let ms = delay_ms(self.delay_seed, &first.text, self.max_delay_ms);
                std::thread::sleep(Duration::from_millis(ms));
            }
        }
        if let Some(bad) = &self.panic_on_text {
            if pairs.iter().any(|p| &p.text == bad) {
                panic!("stub model panicked on {bad}");
            }
        }
        let mut vectors: Vec<Vec<f32>> = pairs.iter().map(expected_vector).collect();
        if self.drop_last && vectors.len() > 1 {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        STUB_DIMENSION
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Loader that hands out a prepared model, or fails at a chosen progress.
pub struct StubLoader {
    pub model: Option<ModelHandle>,
    pub report_before: Vec<u8>,
    pub error: Option<String>,
    pub panic: bool,
    /// Blocks `load` until a message arrives.
    pub gate: Option<Mutex<std::sync::mpsc::Receiver<()>>>,
}

impl StubLoader {
    pub fn ok(model: ModelHandle) -> Self {
        Self {
            model: Some(model),
            report_before: Vec::new(),
            error: None,
            panic: false,
            gate: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            model: None,
            report_before: Vec::new(),
            error: Some(message.to_string()),
            panic: false,
            gate: None,
        }
    }
}

impl ModelLoader for StubLoader {
    fn describe(&self) -> String {
        "stub".to_string()
    }

    fn load(&self, progress: &ProgressReporter<'_>) -> Result<ModelHandle, LoadError> {
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        for p in &self.report_before {
            progress.report(*p, "stub progress");
        }
        if self.panic {
            panic!("stub loader exploded");
        }
        if let Some(message) = &self.error {
            return Err(LoadError::Acquire(message.clone()));
        }
        Ok(self
            .model
            .clone()
            .unwrap_or_else(|| Arc::new(StubModel::default())))
    }
}
