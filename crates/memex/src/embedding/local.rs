//! Local ONNX embeddings via fastembed
//!
//! The model is loaded once at startup (downloading on first run) and runs
//! on the blocking thread pool so inference never stalls the runtime.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::error::{MemexError, Result};

pub const DEFAULT_LOCAL_MODEL: &str = "multilingual-e5-small";

fn parse_model(name: &str) -> Result<(FastEmbedModel, usize)> {
    match name {
        "multilingual-e5-small" => Ok((FastEmbedModel::MultilingualE5Small, 384)),
        "all-minilm-l6-v2" => Ok((FastEmbedModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((FastEmbedModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((FastEmbedModel::BGEBaseENV15, 768)),
        other => Err(MemexError::Config(format!(
            "Unknown fastembed model '{other}'"
        ))),
    }
}

pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        let (model, dimension) = parse_model(&model_name)?;

        if dimension != config.dimension {
            return Err(MemexError::Config(format!(
                "fastembed model '{model_name}' produces {dimension} dimensions but config says {}",
                config.dimension
            )));
        }

        tracing::info!("Loading embedding model {model_name} (this may take a moment on first run)");
        let model = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| MemexError::Embedding(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| MemexError::Embedding("embedding model lock poisoned".to_string()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| MemexError::Embedding(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| MemexError::Embedding("No embedding returned".to_string()))
        })
        .await
        .map_err(|e| MemexError::Embedding(format!("embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
