// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Figment handles types and unknown keys; this pass catches values that are
//! well-typed but operationally nonsensical (zero budgets, out-of-range
//! thresholds) before any component is constructed with them.

use thiserror::Error;

use crate::model::MnemoConfig;

/// A single configuration validation failure.
#[derive(Debug, Error)]
#[error("invalid config value for `{field}`: {message}")]
pub struct ConfigError {
    /// Dotted path of the offending field, e.g. `recall.max_context_chars`.
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration, returning all failures at once.
pub fn validate_config(config: &MnemoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.capture.data_dir.is_empty() {
        errors.push(ConfigError::new("capture.data_dir", "must not be empty"));
    }
    if config.capture.max_buffer_turns == 0 {
        errors.push(ConfigError::new(
            "capture.max_buffer_turns",
            "must be at least 1",
        ));
    }
    if config.capture.pause_timeout_ms == 0 {
        errors.push(ConfigError::new(
            "capture.pause_timeout_ms",
            "must be at least 1ms",
        ));
    }
    if config.extraction.max_per_minute == 0 {
        errors.push(ConfigError::new(
            "extraction.max_per_minute",
            "must be at least 1 (disable extraction instead of setting 0)",
        ));
    }
    if config.recall.max_facts == 0 {
        errors.push(ConfigError::new("recall.max_facts", "must be at least 1"));
    }
    if config.recall.max_context_chars == 0 {
        errors.push(ConfigError::new(
            "recall.max_context_chars",
            "must be at least 1",
        ));
    }
    if !(0.0..=1.0).contains(&config.embedding.similarity_threshold) {
        errors.push(ConfigError::new(
            "embedding.similarity_threshold",
            format!(
                "must be between 0.0 and 1.0, got {}",
                config.embedding.similarity_threshold
            ),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
