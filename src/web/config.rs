use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HASH_DIMENSION: usize = 768;
pub const DEFAULT_HF_REPO: &str = "CompendiumLabs/bge-base-en-v1.5-gguf";
pub const DEFAULT_HF_FILE: &str = "bge-base-en-v1.5-q8_0.gguf";
pub const DEFAULT_LLAMA_CONTEXT: u32 = 2048;

/// Which embedding implementation the loader acquires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelBackend {
    /// Deterministic feature-hashing embedder, no download.
    Hash,
    /// GGUF embedding model through llama.cpp (requires the `llama` feature).
    Llama,
}

/// Server configuration. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "instructor_embed_web", version, about = "Sentence embedding HTTP service")]
pub struct ServerConfig {
    #[arg(long, env = "INSTRUCTOR_EMBED_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "INSTRUCTOR_EMBED_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "INSTRUCTOR_EMBED_BACKEND", value_enum, default_value_t = ModelBackend::Hash)]
    pub backend: ModelBackend,

    /// Vector length produced by the hash backend.
    #[arg(long, env = "INSTRUCTOR_EMBED_HASH_DIMENSION", default_value_t = DEFAULT_HASH_DIMENSION)]
    pub hash_dimension: usize,

    /// Local GGUF file; skips the Hugging Face download when set.
    #[arg(long, env = "INSTRUCTOR_EMBED_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    #[arg(long, env = "INSTRUCTOR_EMBED_HF_REPO", default_value = DEFAULT_HF_REPO)]
    pub hf_repo: String,

    #[arg(long, env = "INSTRUCTOR_EMBED_HF_FILE", default_value = DEFAULT_HF_FILE)]
    pub hf_file: String,

    #[arg(long, env = "INSTRUCTOR_EMBED_LLAMA_CONTEXT", default_value_t = DEFAULT_LLAMA_CONTEXT)]
    pub llama_context: u32,

    /// Override the derived worker count (still at least 1).
    #[arg(long, env = "INSTRUCTOR_EMBED_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Override the derived chunk size (still clamped to 4..=32).
    #[arg(long, env = "INSTRUCTOR_EMBED_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    #[arg(long, env = "INSTRUCTOR_EMBED_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "INSTRUCTOR_EMBED_LOG_DIR", default_value = "logs")]
    pub log_dir: String,

    /// Log to the console only.
    #[arg(long, env = "INSTRUCTOR_EMBED_NO_FILE_LOG")]
    pub no_file_log: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backend: ModelBackend::Hash,
            hash_dimension: DEFAULT_HASH_DIMENSION,
            model_path: None,
            hf_repo: DEFAULT_HF_REPO.to_string(),
            hf_file: DEFAULT_HF_FILE.to_string(),
            llama_context: DEFAULT_LLAMA_CONTEXT,
            max_workers: None,
            chunk_size: None,
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            no_file_log: false,
        }
    }
}
