//! GGUF embedding models through llama.cpp.
//!
//! Acquisition resolves the GGUF file (local path or Hugging Face Hub
//! download), then loads it on the CPU/GPU backend. Every `encode` call builds
//! its own embeddings-enabled context so workers never share one.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use hf_hub::api::sync::Api;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};

use instructor_embed_types::EmbedPair;

use crate::web::config::ServerConfig;
use crate::web::error::{EncodeError, LoadError};
use crate::web::model::{l2_normalize, EmbeddingModel, ModelHandle, ModelLoader, ProgressReporter};
use crate::{sys_info, sys_warn};

pub struct LlamaEmbedder {
    backend: LlamaBackend,
    model: LlamaModel,
    n_ctx: u32,
    dimension: usize,
    name: String,
}

impl LlamaEmbedder {
    fn embed_pair(
        &self,
        ctx: &mut llama_cpp_2::context::LlamaContext<'_>,
        pair: &EmbedPair,
    ) -> Result<Vec<f32>, EncodeError> {
        let input = format!("{} {}", pair.instruction, pair.text);
        let tokens = self
            .model
            .str_to_token(input.trim(), AddBos::Always)
            .map_err(|e| EncodeError::new(format!("Tokenization failed: {e}")))?;

        if tokens.len() > self.n_ctx as usize {
            return Err(EncodeError::new(format!(
                "Input is {} tokens, context holds {}",
                tokens.len(),
                self.n_ctx
            )));
        }

        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        batch
            .add_sequence(&tokens, 0, false)
            .map_err(|e| EncodeError::new(format!("Failed to build batch: {e}")))?;

        ctx.clear_kv_cache();
        ctx.decode(&mut batch)
            .map_err(|e| EncodeError::new(format!("Decode failed: {e}")))?;

        let mut embedding = ctx
            .embeddings_seq_ith(0)
            .map_err(|e| EncodeError::new(format!("No embedding produced: {e}")))?
            .to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl EmbeddingModel for LlamaEmbedder {
    fn encode(&self, pairs: &[EmbedPair]) -> Result<Vec<Vec<f32>>, EncodeError> {
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_batch(self.n_ctx)
            .with_n_ubatch(self.n_ctx)
            .with_embeddings(true);

        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| EncodeError::new(format!("Failed to create context: {e}")))?;

        pairs
            .iter()
            .map(|pair| self.embed_pair(&mut ctx, pair))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct LlamaLoader {
    model_path: Option<PathBuf>,
    hf_repo: String,
    hf_file: String,
    n_ctx: u32,
}

impl LlamaLoader {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            hf_repo: config.hf_repo.clone(),
            hf_file: config.hf_file.clone(),
            n_ctx: config.llama_context.max(64),
        }
    }

    fn resolve_model_file(&self) -> Result<PathBuf, LoadError> {
        if let Some(path) = &self.model_path {
            if !path.exists() {
                return Err(LoadError::Acquire(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
            return Ok(path.clone());
        }

        sys_info!("Fetching {} from {}", self.hf_file, self.hf_repo);
        let api = Api::new().map_err(|e| LoadError::Acquire(format!("Hub client: {e}")))?;
        api.model(self.hf_repo.clone())
            .get(&self.hf_file)
            .map_err(|e| LoadError::Acquire(format!("download {}: {e}", self.hf_file)))
    }
}

impl ModelLoader for LlamaLoader {
    fn describe(&self) -> String {
        match &self.model_path {
            Some(path) => format!("llama.cpp {}", path.display()),
            None => format!("llama.cpp {}/{}", self.hf_repo, self.hf_file),
        }
    }

    fn load(&self, progress: &ProgressReporter<'_>) -> Result<ModelHandle, LoadError> {
        let model_file = self.resolve_model_file()?;
        progress.report(30, "Model downloaded, loading weights...");

        let backend =
            LlamaBackend::init().map_err(|e| LoadError::Acquire(format!("backend init: {e}")))?;
        let model = LlamaModel::load_from_file(&backend, &model_file, &LlamaModelParams::default())
            .map_err(|e| LoadError::Acquire(format!("Failed to load model: {e}")))?;

        let dimension = usize::try_from(model.n_embd()).unwrap_or(0);
        if dimension == 0 {
            sys_warn!("Model {} reports no embedding length", model_file.display());
        }

        let name = model_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("gguf")
            .to_string();
        sys_info!("Loaded {} ({} dims, n_ctx {})", name, dimension, self.n_ctx);

        Ok(Arc::new(LlamaEmbedder {
            backend,
            model,
            n_ctx: self.n_ctx,
            dimension,
            name,
        }))
    }
}
