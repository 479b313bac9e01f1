// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding backfill for facts stored before a model was available.

use mnemo_core::MnemoError;
use mnemo_storage::queries::facts;
use mnemo_storage::{vec_to_blob, Database, FactRow};

use crate::engine::EmbeddingEngine;

/// Text handed to the embedder for a fact: summary first when present,
/// capped so pathological facts stay cheap.
pub fn embedding_text(fact: &FactRow) -> String {
    let combined = match &fact.summary {
        Some(summary) => format!("{summary}. {}", fact.content),
        None => fact.content.clone(),
    };
    combined.chars().take(2_000).collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: usize,
}

/// Embed every active fact that is still missing a vector, in batches.
///
/// Stops early when a whole batch fails to embed (degraded engine or a
/// persistently failing model) so the loop cannot spin on the same rows.
pub async fn backfill_embeddings(
    db: &Database,
    engine: &EmbeddingEngine,
    batch_size: u32,
) -> Result<BackfillReport, MnemoError> {
    let mut report = BackfillReport::default();

    loop {
        let batch = facts::get_facts_missing_embeddings(db, batch_size).await?;
        if batch.is_empty() {
            break;
        }

        let texts: Vec<String> = batch.iter().map(embedding_text).collect();
        let vectors = engine.embed_batch(&texts, None).await;

        let mut embedded_this_batch = 0;
        for (fact, vector) in batch.iter().zip(vectors) {
            match vector {
                Some(vector) => {
                    facts::set_fact_embedding(db, &fact.id, vec_to_blob(&vector)).await?;
                    embedded_this_batch += 1;
                }
                None => report.failed += 1,
            }
        }
        report.embedded += embedded_this_batch;

        tracing::info!(
            embedded = embedded_this_batch,
            batch = batch.len(),
            "embedding backfill batch done"
        );

        if embedded_this_batch == 0 {
            break;
        }
    }

    Ok(report)
}

/// (facts with an embedding, active facts total).
pub async fn embedding_coverage(db: &Database) -> Result<(i64, i64), MnemoError> {
    facts::count_embedding_coverage(db).await
}
