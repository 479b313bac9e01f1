// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value types exchanged across the collaborator trait boundaries.

use serde::{Deserialize, Serialize};

/// Input for an embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingInput {
    /// Texts to embed, one vector produced per text.
    pub texts: Vec<String>,
}

/// Output of an embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingOutput {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Dimensionality of the vectors.
    pub dimensions: usize,
}

/// A fact candidate returned by the extraction collaborator.
///
/// The collaborator is probabilistic: every field here is a *suggestion*
/// that the pipeline validates or overrides before persisting. In particular
/// `visibility` is re-derived by the classifier, and the duplicate/supersede
/// references are only honored when they resolve against the fact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCandidate {
    /// Category label, e.g. "preference", "decision", "person".
    pub category: String,
    /// Full fact text.
    pub content: String,
    /// Optional one-line summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Suggested visibility tier ("private" | "shared" | "secret").
    #[serde(default)]
    pub visibility: Option<String>,
    /// Extractor confidence in [0.0, 1.0].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Sentiment tag, e.g. "neutral", "correction", "update".
    #[serde(default)]
    pub sentiment: Option<String>,
    /// Id of the existing fact this one replaces, if any.
    #[serde(default)]
    pub supersedes: Option<String>,
    /// Id of the existing fact this one duplicates, if any.
    #[serde(default)]
    pub duplicate_of: Option<String>,
    /// Whether a duplicate should bump the occurrence count.
    #[serde(default)]
    pub increment_occurrence: bool,
}

fn default_confidence() -> f64 {
    1.0
}

/// A compact view of an existing fact handed to the extractor as
/// deduplication context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingFactContext {
    pub id: String,
    pub category: String,
    /// Summary if present, otherwise the content.
    pub text: String,
}

/// Request handed to the extraction collaborator.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Concatenated raw text of the conversation segment.
    pub conversation_text: String,
    /// Existing active facts for the owning agent, for dedup hints.
    pub existing_facts: Vec<ExistingFactContext>,
}
