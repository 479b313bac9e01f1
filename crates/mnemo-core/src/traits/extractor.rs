// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fact extractor trait for the LLM extraction collaborator.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::{ExtractionRequest, FactCandidate};

/// Adapter for the external fact-extraction collaborator.
///
/// Given a conversation segment's text and a bounded set of existing facts
/// (dedup hints), returns candidate facts or an error. The pipeline never
/// retries a failed extraction; the outcome is recorded in the extraction
/// log either way.
#[async_trait]
pub trait FactExtractor: Send + Sync + 'static {
    /// Extract fact candidates from a conversation segment.
    async fn extract(&self, request: ExtractionRequest) -> Result<Vec<FactCandidate>, MnemoError>;

    /// Identifier of the model backing this extractor, recorded in the
    /// extraction log (e.g. "anthropic/claude-haiku").
    fn model_name(&self) -> &str;
}
