// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating vector embeddings from text.
///
/// Embedding adapters power semantic recall by converting fact text and
/// queries into fixed-dimension vectors. An adapter that cannot load is
/// simply absent: callers hold `Option`s or engine wrappers, never a
/// half-initialized adapter.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync + 'static {
    /// Generates embeddings for the given input, one vector per text.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError>;

    /// Dimensionality of the vectors this adapter produces.
    fn dimensions(&self) -> usize;
}
