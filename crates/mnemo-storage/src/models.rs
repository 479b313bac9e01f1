// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed row models for storage entities.
//!
//! Timestamps are epoch milliseconds (`i64`): recall scoring does
//! millisecond arithmetic on them, so they are stored as INTEGER rather
//! than ISO strings.

use serde::{Deserialize, Serialize};

/// A persisted conversation segment. Immutable after the flush that
/// created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    pub agent_id: String,
    pub session_key: String,
    pub channel: Option<String>,
    pub started_at: i64,
    pub ended_at: i64,
    pub turn_count: i64,
    pub raw_text: String,
    pub metadata: Option<String>,
}

/// A single turn within a conversation segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    /// Provider-side message id, when the channel supplies one.
    pub message_id: Option<String>,
    pub metadata: Option<String>,
}

/// A structured fact in the knowledge base.
///
/// Rows linked by `supersedes` form a lineage; at most one row per lineage
/// is active. Facts are never deleted, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRow {
    pub id: String,
    pub agent_id: String,
    pub category: String,
    pub content: String,
    pub summary: Option<String>,
    /// Visibility tier as stored: "private", "shared", or "secret".
    pub visibility: String,
    pub confidence: f64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub occurrence_count: i64,
    pub supersedes: Option<String>,
    pub is_active: bool,
    pub metadata: Option<String>,
    /// Embedding vector as little-endian f32 bytes, if backfilled.
    #[serde(skip)]
    pub embedding: Option<Vec<u8>>,
}

/// Audit-trail row recording one mention of a fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactOccurrenceRow {
    pub id: String,
    pub fact_id: String,
    pub conversation_id: String,
    pub timestamp: i64,
    pub context_snippet: Option<String>,
    pub sentiment: Option<String>,
}

/// One row per conversation recording the last extraction attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionLogRow {
    pub conversation_id: String,
    pub extracted_at: i64,
    pub model_used: String,
    pub facts_extracted: i64,
    pub facts_updated: i64,
    pub facts_deduplicated: i64,
    pub error: Option<String>,
}

/// Input shape for the extraction-log upsert.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub model_used: String,
    pub facts_extracted: i64,
    pub facts_updated: i64,
    pub facts_deduplicated: i64,
    pub error: Option<String>,
}

/// Convert an f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a SQLite BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}
