// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent memory pipeline: capture, extraction, and recall.
//!
//! Messages are buffered per session and flushed as conversation segments
//! ([`buffer`], [`writer`]). Segments feed a rate-limited extraction
//! trigger ([`trigger`]) whose fact candidates are deduplicated and
//! classified before landing in the knowledge base ([`dedup`],
//! [`classifier`]). Recall searches that knowledge base by keyword and by
//! embedding similarity ([`recall`], [`engine`], [`embedder`]) and
//! renders a bounded context block ([`context`]). [`service`] ties it all
//! together.

pub mod backfill;
pub mod buffer;
pub mod classifier;
pub mod context;
pub mod dedup;
pub mod embedder;
pub mod engine;
pub mod recall;
pub mod service;
pub mod trigger;
pub mod writer;

pub use buffer::{BufferEntry, ConversationBuffer, FlushHandler, FlushedSegment};
pub use classifier::{classify_visibility, Visibility};
pub use context::build_recall_context;
pub use embedder::{OnnxEmbedder, OnnxEmbedderFactory};
pub use engine::{cosine_similarity, EmbedderFactory, EmbeddingEngine};
pub use recall::{extract_search_terms, search_relevant_facts, MatchSource, ScoredFact};
pub use service::MemoryService;
pub use trigger::ExtractionTrigger;
pub use writer::SegmentWriter;
