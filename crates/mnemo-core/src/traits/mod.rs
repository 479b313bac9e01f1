// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Mnemo pipeline.
//!
//! The extraction LLM and the embedding model live outside this subsystem.
//! Both are reached only through these traits, so hosts and tests can plug
//! in real providers, fakes, or nothing at all.

pub mod embedding;
pub mod extractor;

pub use embedding::EmbeddingAdapter;
pub use extractor::FactExtractor;
