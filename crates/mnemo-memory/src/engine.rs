// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy embedding engine with graceful degradation.
//!
//! The model is loaded on the first embed request, never at startup, and
//! only once even under concurrent callers. A load failure degrades the
//! engine permanently for the process lifetime: every embed returns None
//! and recall falls back to keyword search.

use std::sync::Arc;

use mnemo_core::traits::EmbeddingAdapter;
use mnemo_core::{EmbeddingInput, MnemoError};
use tokio::sync::OnceCell;

/// Builds the concrete embedding adapter. Loading happens on a blocking
/// thread; implementations may do file IO and model initialization.
pub trait EmbedderFactory: Send + Sync + 'static {
    fn load(&self) -> Result<Arc<dyn EmbeddingAdapter>, MnemoError>;
}

pub struct EmbeddingEngine {
    factory: Arc<dyn EmbedderFactory>,
    adapter: OnceCell<Option<Arc<dyn EmbeddingAdapter>>>,
}

impl EmbeddingEngine {
    pub fn new(factory: Arc<dyn EmbedderFactory>) -> Self {
        Self {
            factory,
            adapter: OnceCell::new(),
        }
    }

    /// Whether the model has loaded successfully. False both before the
    /// first embed and after a failed load.
    pub fn is_ready(&self) -> bool {
        matches!(self.adapter.get(), Some(Some(_)))
    }

    /// Vector dimensionality, once the model is loaded.
    pub fn dimensions(&self) -> Option<usize> {
        match self.adapter.get() {
            Some(Some(adapter)) => Some(adapter.dimensions()),
            _ => None,
        }
    }

    async fn adapter(&self) -> Option<Arc<dyn EmbeddingAdapter>> {
        self.adapter
            .get_or_init(|| async {
                let factory = Arc::clone(&self.factory);
                match tokio::task::spawn_blocking(move || factory.load()).await {
                    Ok(Ok(adapter)) => {
                        tracing::info!(
                            dimensions = adapter.dimensions(),
                            "embedding model loaded"
                        );
                        Some(adapter)
                    }
                    Ok(Err(error)) => {
                        tracing::warn!(
                            %error,
                            "embedding model failed to load, keyword recall only"
                        );
                        None
                    }
                    Err(error) => {
                        tracing::warn!(
                            %error,
                            "embedding load task panicked, keyword recall only"
                        );
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Embed one text. None when the engine is degraded or inference
    /// fails; callers treat that as "no semantic signal".
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let adapter = self.adapter().await?;
        let input = EmbeddingInput {
            texts: vec![text.to_owned()],
        };
        match adapter.embed(input).await {
            Ok(mut output) => output.embeddings.pop(),
            Err(error) => {
                tracing::warn!(%error, "embedding inference failed");
                None
            }
        }
    }

    /// Embed many texts sequentially (bounded memory for backfill runs).
    /// Per-text failures yield None without aborting the batch.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Vec<Option<Vec<f32>>> {
        let Some(adapter) = self.adapter().await else {
            return texts.iter().map(|_| None).collect();
        };

        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let input = EmbeddingInput {
                texts: vec![text.clone()],
            };
            let vector = match adapter.embed(input).await {
                Ok(mut output) => output.embeddings.pop(),
                Err(error) => {
                    tracing::warn!(index = i, total = texts.len(), %error, "batch embed failed");
                    None
                }
            };
            results.push(vector);
            if let Some(progress) = on_progress.as_mut() {
                progress(i + 1, texts.len());
            }
        }
        results
    }
}

/// Cosine similarity in [-1, 1]. Mismatched lengths, empty, and zero
/// vectors all score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
