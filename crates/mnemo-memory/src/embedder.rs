// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ONNX embedding backend for local inference with all-MiniLM-L6-v2.
//!
//! Produces 384-dimensional sentence vectors on CPU; no network calls.
//! Expects `model.onnx` and `tokenizer.json` side by side on disk.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use mnemo_core::traits::EmbeddingAdapter;
use mnemo_core::{EmbeddingInput, EmbeddingOutput, MnemoError};

use crate::engine::EmbedderFactory;

/// Vector size produced by all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

fn embed_err(message: impl Into<String>) -> MnemoError {
    MnemoError::Embedding {
        message: message.into(),
        source: None,
    }
}

/// Sentence embedder backed by an ONNX Runtime session.
pub struct OnnxEmbedder {
    // Session is not Sync; all inference goes through the lock.
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

// Safety: the session is only touched under the Mutex, and the tokenizer's
// encode path is thread-safe.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Load the model and its tokenizer with the given graph optimization
    /// level.
    pub fn load(
        model_path: &Path,
        optimization: GraphOptimizationLevel,
    ) -> Result<Self, MnemoError> {
        let model_dir = model_path
            .parent()
            .ok_or_else(|| embed_err(format!("invalid model path {}", model_path.display())))?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            embed_err(format!(
                "cannot load tokenizer {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let session = Session::builder()
            .map_err(|e| embed_err(format!("session builder: {e}")))?
            .with_optimization_level(optimization)
            .map_err(|e| embed_err(format!("optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| embed_err(format!("thread config: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                embed_err(format!("cannot load model {}: {e}", model_path.display()))
            })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, MnemoError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| embed_err(format!("tokenization: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> =
            encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let ids = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| embed_err(format!("input_ids shape: {e}")))?;
        let mask = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| embed_err(format!("attention_mask shape: {e}")))?;
        let types = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| embed_err(format!("token_type_ids shape: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| embed_err(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => TensorRef::from_array_view(&ids)
                    .map_err(|e| embed_err(format!("input_ids tensor: {e}")))?,
                "attention_mask" => TensorRef::from_array_view(&mask)
                    .map_err(|e| embed_err(format!("attention_mask tensor: {e}")))?,
                "token_type_ids" => TensorRef::from_array_view(&types)
                    .map_err(|e| embed_err(format!("token_type_ids tensor: {e}")))?
            ])
            .map_err(|e| embed_err(format!("inference: {e}")))?;

        // Token embeddings come back as [1, seq_len, hidden].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| embed_err(format!("output tensor: {e}")))?;
        let hidden = shape[shape.len() - 1] as usize;

        Ok(l2_normalize(&masked_mean_pool(
            data,
            &attention_mask,
            seq_len,
            hidden,
        )))
    }
}

/// Mean over real (unmasked) token positions.
fn masked_mean_pool(
    token_embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden: usize,
) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut real_tokens = 0.0f32;
    for (i, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        if mask > 0 {
            let row = &token_embeddings[i * hidden..(i + 1) * hidden];
            for (acc, value) in pooled.iter_mut().zip(row) {
                *acc += value;
            }
            real_tokens += 1.0;
        }
    }
    if real_tokens > 0.0 {
        for value in &mut pooled {
            *value /= real_tokens;
        }
    }
    pooled
}

fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter().map(|v| v / norm).collect()
    } else {
        vector.to_vec()
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            embeddings.push(self.embed_one(text)?);
        }
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: EMBEDDING_DIM,
        })
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Loads an [`OnnxEmbedder`] for the embedding engine. Tries the fully
/// optimized graph first; some runtime builds reject Level3 graphs, so a
/// portable Level1 session is the fallback.
pub struct OnnxEmbedderFactory {
    model_path: PathBuf,
}

impl OnnxEmbedderFactory {
    pub fn new(model_path: PathBuf) -> Self {
        Self { model_path }
    }
}

impl EmbedderFactory for OnnxEmbedderFactory {
    fn load(&self) -> Result<Arc<dyn EmbeddingAdapter>, MnemoError> {
        match OnnxEmbedder::load(&self.model_path, GraphOptimizationLevel::Level3) {
            Ok(embedder) => Ok(Arc::new(embedder)),
            Err(error) => {
                tracing::warn!(%error, "optimized session failed, retrying portable graph");
                let embedder =
                    OnnxEmbedder::load(&self.model_path, GraphOptimizationLevel::Level1)?;
                Ok(Arc::new(embedder))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooling_skips_padding_tokens() {
        let embeddings = vec![
            1.0, 2.0, // real
            9.0, 9.0, // padding, must be ignored
        ];
        let pooled = masked_mean_pool(&embeddings, &[1, 0], 2, 2);
        assert_eq!(pooled, vec![1.0, 2.0]);
    }

    #[test]
    fn pooling_averages_real_tokens() {
        let embeddings = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let pooled = masked_mean_pool(&embeddings, &[1, 1, 1], 3, 2);
        assert!((pooled[0] - 3.0).abs() < f32::EPSILON);
        assert!((pooled[1] - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn normalized_vector_has_unit_length() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-4);
        assert!((normalized[1] - 0.8).abs() < 1e-4);
    }

    #[test]
    fn zero_vector_normalizes_to_itself() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn missing_model_is_an_error() {
        let result = OnnxEmbedder::load(
            Path::new("/nonexistent/model.onnx"),
            GraphOptimizationLevel::Level1,
        );
        assert!(result.is_err());
    }
}
