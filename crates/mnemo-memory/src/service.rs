// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory subsystem facade.
//!
//! Wires capture, extraction, embeddings, and recall together behind a
//! small API: record messages, flush sessions, recall context. Hosts
//! construct one [`MemoryService`] per database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mnemo_config::MnemoConfig;
use mnemo_core::traits::FactExtractor;
use mnemo_core::MnemoError;
use mnemo_storage::Database;

use crate::backfill::{self, BackfillReport};
use crate::buffer::{BufferEntry, ConversationBuffer, FlushHandler, FlushedSegment};
use crate::context::build_recall_context;
use crate::engine::{EmbedderFactory, EmbeddingEngine};
use crate::recall::search_relevant_facts;
use crate::trigger::ExtractionTrigger;
use crate::writer::SegmentWriter;

/// Flush path: persist the segment, then hand it to extraction when an
/// extractor is wired in.
struct SegmentPipeline {
    writer: SegmentWriter,
    trigger: Option<Arc<ExtractionTrigger>>,
}

#[async_trait]
impl FlushHandler for SegmentPipeline {
    async fn handle_flush(&self, segment: FlushedSegment) -> Result<(), MnemoError> {
        let conversation = self.writer.write_segment(&segment).await;
        if let (Some(conversation), Some(trigger)) = (conversation, &self.trigger) {
            trigger.trigger(conversation);
        }
        Ok(())
    }
}

pub struct MemoryService {
    cfg: MnemoConfig,
    db: Arc<Database>,
    buffer: ConversationBuffer,
    engine: Arc<EmbeddingEngine>,
    trigger: Option<Arc<ExtractionTrigger>>,
}

impl MemoryService {
    /// Open (or create) the database under the configured data directory
    /// and assemble the full pipeline.
    pub async fn open(
        cfg: MnemoConfig,
        extractor: Option<Arc<dyn FactExtractor>>,
        embedder_factory: Arc<dyn EmbedderFactory>,
    ) -> Result<Self, MnemoError> {
        let db_path = PathBuf::from(&cfg.capture.data_dir).join("conversations.sqlite");
        let db = Arc::new(Database::open(&db_path).await?);
        Ok(Self::with_database(cfg, db, extractor, embedder_factory))
    }

    /// Assemble the pipeline over an existing database handle.
    pub fn with_database(
        cfg: MnemoConfig,
        db: Arc<Database>,
        extractor: Option<Arc<dyn FactExtractor>>,
        embedder_factory: Arc<dyn EmbedderFactory>,
    ) -> Self {
        let trigger = if cfg.extraction.enabled {
            extractor.map(|extractor| {
                ExtractionTrigger::new(Arc::clone(&db), cfg.extraction.clone(), extractor)
            })
        } else {
            tracing::info!("fact extraction disabled");
            None
        };

        let writer = SegmentWriter::new(Arc::clone(&db), PathBuf::from(&cfg.capture.data_dir));
        let pipeline = Arc::new(SegmentPipeline {
            writer,
            trigger: trigger.clone(),
        });
        let buffer = ConversationBuffer::new(
            pipeline,
            Duration::from_millis(cfg.capture.pause_timeout_ms),
            cfg.capture.max_buffer_turns,
        );
        let engine = Arc::new(EmbeddingEngine::new(embedder_factory));

        Self {
            cfg,
            db,
            buffer,
            engine,
            trigger,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn embedding_engine(&self) -> &Arc<EmbeddingEngine> {
        &self.engine
    }

    /// Buffer one message for its session.
    pub async fn record_message(&self, session_key: &str, entry: BufferEntry) {
        self.buffer.record(session_key, entry).await;
    }

    /// Flush one session's buffer through the capture pipeline.
    pub async fn flush_session(&self, session_key: &str) {
        self.buffer.flush_session(session_key).await;
    }

    /// Flush everything. Call on shutdown so no buffered turns are lost.
    pub async fn flush_all(&self) {
        let pending = self.buffer.pending_sessions();
        if pending > 0 {
            tracing::info!(sessions = pending, "flushing buffered sessions");
        }
        self.buffer.flush_all().await;
    }

    /// Build the recall context block for an agent's incoming message.
    /// None when recall is disabled, the query is too short, or nothing
    /// relevant was found.
    pub async fn recall(&self, agent_id: &str, query: &str) -> Option<String> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.recall_at(agent_id, query, now_ms).await
    }

    pub(crate) async fn recall_at(
        &self,
        agent_id: &str,
        query: &str,
        now_ms: i64,
    ) -> Option<String> {
        let recall_cfg = &self.cfg.recall;
        if !recall_cfg.auto_recall {
            return None;
        }
        let query = query.trim();
        if query.chars().count() < recall_cfg.min_query_length {
            return None;
        }

        // Degraded engine yields None and recall stays keyword-only.
        let query_embedding = self.engine.embed(query).await;

        let scored = search_relevant_facts(
            &self.db,
            agent_id,
            query,
            recall_cfg,
            query_embedding.as_deref(),
            self.cfg.embedding.similarity_threshold as f32,
            now_ms,
        )
        .await;
        if scored.is_empty() {
            return None;
        }

        let block = build_recall_context(
            &scored,
            recall_cfg.max_context_chars,
            &recall_cfg.agent_display,
            now_ms,
        );
        if block.is_empty() {
            None
        } else {
            tracing::debug!(agent_id, facts = scored.len(), "recall context built");
            Some(block)
        }
    }

    /// Embed facts stored before the model became available.
    pub async fn backfill_embeddings(&self, batch_size: u32) -> Result<BackfillReport, MnemoError> {
        backfill::backfill_embeddings(&self.db, &self.engine, batch_size).await
    }

    /// Run extraction over segments that were captured but never
    /// extracted, oldest first. Awaits each run; the regular rate limit
    /// still applies. Returns how many segments were considered.
    pub async fn reprocess_pending(&self, agent_id: &str, limit: u32) -> Result<usize, MnemoError> {
        let Some(trigger) = &self.trigger else {
            return Ok(0);
        };
        let pending =
            mnemo_storage::queries::conversations::get_unextracted_conversations(
                &self.db, agent_id, limit,
            )
            .await?;
        let count = pending.len();
        for conversation in pending {
            trigger.run_extraction(conversation).await;
        }
        Ok(count)
    }
}
