// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./mnemo.toml` > `~/.config/mnemo/mnemo.toml` >
//! `/etc/mnemo/mnemo.toml` with environment variable overrides via the
//! `MNEMO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MnemoConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mnemo/mnemo.toml` (system-wide)
/// 3. `~/.config/mnemo/mnemo.toml` (user XDG config)
/// 4. `./mnemo.toml` (local directory)
/// 5. `MNEMO_*` environment variables
pub fn load_config() -> Result<MnemoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemoConfig::default()))
        .merge(Toml::file("/etc/mnemo/mnemo.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("mnemo/mnemo.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("mnemo.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MnemoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MnemoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `MNEMO_CAPTURE_MAX_BUFFER_TURNS` must map
/// to `capture.max_buffer_turns`, not `capture.max.buffer.turns`.
fn env_provider() -> Env {
    Env::prefixed("MNEMO_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("capture_", "capture.", 1)
            .replacen("extraction_", "extraction.", 1)
            .replacen("recall_", "recall.", 1)
            .replacen("embedding_", "embedding.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_yields_defaults() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.capture.max_buffer_turns, 50);
        assert!(!cfg.extraction.enabled);
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = r#"
            [capture]
            pause_timeout_ms = 1000
            max_buffer_turns = 4

            [recall]
            max_context_chars = 512
        "#;
        let cfg = load_config_from_str(toml).unwrap();
        assert_eq!(cfg.capture.pause_timeout_ms, 1000);
        assert_eq!(cfg.capture.max_buffer_turns, 4);
        assert_eq!(cfg.recall.max_context_chars, 512);
        // Untouched sections keep defaults.
        assert_eq!(cfg.extraction.min_turns, 3);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let result = load_config_from_str("[capture]\nnot_a_key = true\n");
        assert!(result.is_err());
    }
}
