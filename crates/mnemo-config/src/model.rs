// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mnemo memory subsystem.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Mnemo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemoConfig {
    /// Data directory and capture buffering settings.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Fact extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Recall and context injection settings.
    #[serde(default)]
    pub recall: RecallConfig,

    /// Local embedding backend settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Capture buffering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Directory where the database and backup logs live.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Idle time (ms) before flushing a session's buffered segment.
    #[serde(default = "default_pause_timeout_ms")]
    pub pause_timeout_ms: u64,

    /// Maximum buffered turns before a synchronous flush.
    #[serde(default = "default_max_buffer_turns")]
    pub max_buffer_turns: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pause_timeout_ms: default_pause_timeout_ms(),
            max_buffer_turns: default_max_buffer_turns(),
        }
    }
}

fn default_data_dir() -> String {
    ".mnemo".to_string()
}

fn default_pause_timeout_ms() -> u64 {
    300_000
}

fn default_max_buffer_turns() -> usize {
    50
}

/// Fact extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Whether segments are handed to the extractor after capture.
    /// Opt-in: enabling this sends conversation text to the configured
    /// extraction collaborator.
    #[serde(default)]
    pub enabled: bool,

    /// Minimum turns in a segment before extraction is attempted.
    #[serde(default = "default_min_turns")]
    pub min_turns: usize,

    /// Maximum extraction calls per rolling 60-second window.
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: usize,

    /// How many existing facts to hand to the extractor as dedup context.
    #[serde(default = "default_existing_facts_limit")]
    pub existing_facts_limit: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_turns: default_min_turns(),
            max_per_minute: default_max_per_minute(),
            existing_facts_limit: default_existing_facts_limit(),
        }
    }
}

fn default_min_turns() -> usize {
    3
}

fn default_max_per_minute() -> usize {
    10
}

fn default_existing_facts_limit() -> usize {
    50
}

/// Recall and context injection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Whether recalled facts are injected before each AI turn.
    #[serde(default = "default_auto_recall")]
    pub auto_recall: bool,

    /// Maximum number of facts surfaced per recall.
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    /// Hard character budget for the injected context block.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Minimum query length (chars) to trigger recall search.
    #[serde(default = "default_min_query_length")]
    pub min_query_length: usize,

    /// Whether shared facts from other agents are included.
    #[serde(default = "default_cross_agent")]
    pub cross_agent: bool,

    /// Human-readable display names for agents shown in cross-agent
    /// provenance tags, agent id -> display name.
    #[serde(default)]
    pub agent_display: HashMap<String, String>,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            auto_recall: default_auto_recall(),
            max_facts: default_max_facts(),
            max_context_chars: default_max_context_chars(),
            min_query_length: default_min_query_length(),
            cross_agent: default_cross_agent(),
            agent_display: HashMap::new(),
        }
    }
}

fn default_auto_recall() -> bool {
    true
}

fn default_max_facts() -> usize {
    20
}

fn default_max_context_chars() -> usize {
    4000
}

fn default_min_query_length() -> usize {
    5
}

fn default_cross_agent() -> bool {
    true
}

/// Local embedding backend configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Path to the ONNX model file. `None` leaves the engine degraded
    /// (keyword-only recall).
    #[serde(default)]
    pub model_path: Option<String>,

    /// Minimum cosine similarity for a semantic match against own facts.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_similarity_threshold() -> f64 {
    0.45
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = MnemoConfig::default();
        assert_eq!(cfg.capture.data_dir, ".mnemo");
        assert_eq!(cfg.capture.pause_timeout_ms, 300_000);
        assert_eq!(cfg.capture.max_buffer_turns, 50);
        assert!(!cfg.extraction.enabled, "extraction is opt-in");
        assert_eq!(cfg.extraction.min_turns, 3);
        assert_eq!(cfg.extraction.max_per_minute, 10);
        assert!(cfg.recall.auto_recall);
        assert_eq!(cfg.recall.max_context_chars, 4000);
        assert!(cfg.embedding.model_path.is_none());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = "[capture]\ndata_dir = \"/tmp/x\"\nbogus_key = 1\n";
        let result: Result<MnemoConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_section_fills_defaults() {
        let toml = "[extraction]\nenabled = true\n";
        let cfg: MnemoConfig = toml::from_str(toml).unwrap();
        assert!(cfg.extraction.enabled);
        assert_eq!(cfg.extraction.min_turns, 3);
        assert_eq!(cfg.extraction.existing_facts_limit, 50);
    }
}
