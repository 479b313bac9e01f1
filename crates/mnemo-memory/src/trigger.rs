// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget fact extraction after a segment is captured.
//!
//! Extraction runs on a spawned task so it never blocks message flow.
//! Short segments are skipped, calls are rate-limited per minute, and
//! every attempt that gets past those gates leaves an extraction_log row,
//! error or not. Nothing in here may propagate a failure to the caller.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mnemo_config::ExtractionConfig;
use mnemo_core::traits::FactExtractor;
use mnemo_core::{ExistingFactContext, ExtractionRequest, MnemoError};
use mnemo_storage::queries::facts;
use mnemo_storage::{ConversationRow, Database, ExtractionOutcome};

use crate::dedup;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window rate limiter. The window resets once a full period has
/// elapsed since it started.
#[derive(Debug)]
pub struct RateWindow {
    count: u32,
    window_start: Instant,
}

impl RateWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Take one slot if the window allows it.
    pub fn try_acquire(&mut self, now: Instant, max: u32) -> bool {
        if now.duration_since(self.window_start) >= RATE_WINDOW {
            self.count = 0;
            self.window_start = now;
        }
        if self.count >= max {
            return false;
        }
        self.count += 1;
        true
    }
}

pub struct ExtractionTrigger {
    db: Arc<Database>,
    cfg: ExtractionConfig,
    extractor: Arc<dyn FactExtractor>,
    rate: Mutex<RateWindow>,
}

impl ExtractionTrigger {
    pub fn new(
        db: Arc<Database>,
        cfg: ExtractionConfig,
        extractor: Arc<dyn FactExtractor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            cfg,
            extractor,
            rate: Mutex::new(RateWindow::new(Instant::now())),
        })
    }

    /// Schedule extraction for a captured segment and return immediately.
    pub fn trigger(self: &Arc<Self>, conversation: ConversationRow) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_extraction(conversation).await;
        });
    }

    /// The extraction pipeline for one segment. Public so callers that
    /// need completion (reprocessing, tests) can await it directly.
    pub async fn run_extraction(&self, conversation: ConversationRow) {
        if conversation.turn_count < self.cfg.min_turns as i64 {
            tracing::debug!(
                conversation_id = %conversation.id,
                turns = conversation.turn_count,
                min = self.cfg.min_turns,
                "segment too short, skipping extraction"
            );
            return;
        }

        let admitted = {
            let mut rate = self.rate.lock().unwrap_or_else(|e| e.into_inner());
            rate.try_acquire(Instant::now(), self.cfg.max_per_minute as u32)
        };
        if !admitted {
            tracing::warn!(
                conversation_id = %conversation.id,
                max_per_minute = self.cfg.max_per_minute,
                "extraction rate limit reached, skipping segment"
            );
            return;
        }

        tracing::debug!(
            conversation_id = %conversation.id,
            turns = conversation.turn_count,
            agent_id = %conversation.agent_id,
            "starting fact extraction"
        );

        let outcome = match self.extract_and_apply(&conversation).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(conversation_id = %conversation.id, %error, "extraction failed");
                ExtractionOutcome {
                    model_used: self.extractor.model_name().to_owned(),
                    facts_extracted: 0,
                    facts_updated: 0,
                    facts_deduplicated: 0,
                    error: Some(error.to_string()),
                }
            }
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        if let Err(error) =
            facts::log_extraction(&self.db, &conversation.id, now_ms, outcome).await
        {
            tracing::warn!(
                conversation_id = %conversation.id,
                %error,
                "failed to record extraction outcome"
            );
        }
    }

    async fn extract_and_apply(
        &self,
        conversation: &ConversationRow,
    ) -> Result<ExtractionOutcome, MnemoError> {
        let existing = facts::get_relevant_facts(
            &self.db,
            &conversation.agent_id,
            self.cfg.existing_facts_limit as u32,
        )
        .await?;
        let existing_facts = existing
            .into_iter()
            .map(|f| ExistingFactContext {
                id: f.id,
                category: f.category,
                text: f.content,
            })
            .collect();

        let request = ExtractionRequest {
            conversation_text: conversation.raw_text.clone(),
            existing_facts,
        };
        let candidates = self.extractor.extract(request).await?;

        let model_used = self.extractor.model_name().to_owned();
        if candidates.is_empty() {
            tracing::debug!(conversation_id = %conversation.id, "no facts extracted");
            return Ok(ExtractionOutcome {
                model_used,
                facts_extracted: 0,
                facts_updated: 0,
                facts_deduplicated: 0,
                error: None,
            });
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let tally = dedup::process_extracted_facts(
            &self.db,
            &conversation.agent_id,
            &conversation.id,
            candidates,
            now_ms,
        )
        .await;

        tracing::info!(
            conversation_id = %conversation.id,
            agent_id = %conversation.agent_id,
            new = tally.new_facts,
            updated = tally.updated,
            deduplicated = tally.deduplicated,
            "extraction complete"
        );

        Ok(ExtractionOutcome {
            model_used,
            facts_extracted: tally.new_facts as i64,
            facts_updated: tally.updated as i64,
            facts_deduplicated: tally.deduplicated as i64,
            error: None,
        })
    }
}
