// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mnemo memory subsystem.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common value types used throughout the Mnemo workspace. The extraction
//! and embedding collaborators implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemoError;
pub use traits::{EmbeddingAdapter, FactExtractor};
pub use types::{
    EmbeddingInput, EmbeddingOutput, ExistingFactContext, ExtractionRequest, FactCandidate,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemo_error_has_all_variants() {
        let _config = MnemoError::Config("test".into());
        let _storage = MnemoError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _extraction = MnemoError::Extraction {
            message: "test".into(),
            source: None,
        };
        let _embedding = MnemoError::Embedding {
            message: "test".into(),
            source: None,
        };
        let _internal = MnemoError::Internal("test".into());
    }

    #[test]
    fn storage_helper_boxes_source() {
        let err = MnemoError::storage(std::io::Error::other("disk full"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn trait_objects_are_dyn_compatible() {
        fn _assert_embedding(_: &dyn EmbeddingAdapter) {}
        fn _assert_extractor(_: &dyn FactExtractor) {}
    }
}
