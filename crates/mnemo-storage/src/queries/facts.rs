// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fact persistence, occurrence tracking, supersession, and search.
//!
//! Facts are append-only: supersession deactivates the old row instead of
//! rewriting it, and occurrences accumulate in a separate audit table.

use mnemo_core::MnemoError;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::database::{map_tr_err, Database};
use crate::models::{blob_to_vec, ExtractionLogRow, ExtractionOutcome, FactRow};

/// Occurrence snippets are capped so the audit table stays bounded.
const MAX_SNIPPET_CHARS: usize = 500;

fn fact_from_row(row: &Row<'_>) -> Result<FactRow, rusqlite::Error> {
    Ok(FactRow {
        id: row.get("id")?,
        agent_id: row.get("agent_id")?,
        category: row.get("category")?,
        content: row.get("content")?,
        summary: row.get("summary")?,
        visibility: row.get("visibility")?,
        confidence: row.get("confidence")?,
        first_seen_at: row.get("first_seen_at")?,
        last_seen_at: row.get("last_seen_at")?,
        occurrence_count: row.get("occurrence_count")?,
        supersedes: row.get("supersedes")?,
        is_active: row.get("is_active")?,
        metadata: row.get("metadata")?,
        embedding: row.get("embedding")?,
    })
}

fn insert_fact_stmt(tx: &rusqlite::Connection, fact: &FactRow) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO facts
             (id, agent_id, category, content, summary, visibility, confidence,
              first_seen_at, last_seen_at, occurrence_count, supersedes,
              is_active, metadata, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            fact.id,
            fact.agent_id,
            fact.category,
            fact.content,
            fact.summary,
            fact.visibility,
            fact.confidence,
            fact.first_seen_at,
            fact.last_seen_at,
            fact.occurrence_count,
            fact.supersedes,
            fact.is_active,
            fact.metadata,
            fact.embedding,
        ],
    )?;
    Ok(())
}

pub async fn insert_fact(db: &Database, fact: FactRow) -> Result<(), MnemoError> {
    db.connection()
        .call(move |conn| {
            insert_fact_stmt(conn, &fact)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_fact(db: &Database, fact_id: &str) -> Result<Option<FactRow>, MnemoError> {
    let fact_id = fact_id.to_owned();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM facts WHERE id = ?1",
                    params![fact_id],
                    fact_from_row,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Record one mention of a fact: append an occurrence row, bump the
/// occurrence count, and refresh `last_seen_at`. Single transaction so the
/// count never drifts from the audit trail.
pub async fn record_occurrence(
    db: &Database,
    fact_id: &str,
    conversation_id: &str,
    timestamp: i64,
    context_snippet: Option<String>,
    sentiment: Option<String>,
) -> Result<(), MnemoError> {
    let fact_id = fact_id.to_owned();
    let conversation_id = conversation_id.to_owned();
    let snippet = context_snippet.map(|s| s.chars().take(MAX_SNIPPET_CHARS).collect::<String>());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO fact_occurrences
                     (id, fact_id, conversation_id, timestamp, context_snippet, sentiment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    fact_id,
                    conversation_id,
                    timestamp,
                    snippet,
                    sentiment,
                ],
            )?;
            tx.execute(
                "UPDATE facts
                 SET occurrence_count = occurrence_count + 1, last_seen_at = ?2
                 WHERE id = ?1",
                params![fact_id, timestamp],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace `old_fact_id` with a new fact: the old row is deactivated, the
/// new row inserted with `supersedes` pointing back. One transaction, so a
/// lineage never has zero active members mid-replacement.
pub async fn supersede_fact(
    db: &Database,
    old_fact_id: &str,
    mut new_fact: FactRow,
) -> Result<(), MnemoError> {
    let old_fact_id = old_fact_id.to_owned();
    new_fact.supersedes = Some(old_fact_id.clone());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE facts SET is_active = 0 WHERE id = ?1",
                params![old_fact_id],
            )?;
            insert_fact_stmt(&tx, &new_fact)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert the extraction-log row for a conversation. Reprocessing a
/// segment replaces its previous outcome.
pub async fn log_extraction(
    db: &Database,
    conversation_id: &str,
    extracted_at: i64,
    outcome: ExtractionOutcome,
) -> Result<(), MnemoError> {
    let conversation_id = conversation_id.to_owned();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO extraction_log
                     (conversation_id, extracted_at, model_used, facts_extracted,
                      facts_updated, facts_deduplicated, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    conversation_id,
                    extracted_at,
                    outcome.model_used,
                    outcome.facts_extracted,
                    outcome.facts_updated,
                    outcome.facts_deduplicated,
                    outcome.error,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_extraction_log(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<ExtractionLogRow>, MnemoError> {
    let conversation_id = conversation_id.to_owned();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM extraction_log WHERE conversation_id = ?1",
                    params![conversation_id],
                    |row| {
                        Ok(ExtractionLogRow {
                            conversation_id: row.get("conversation_id")?,
                            extracted_at: row.get("extracted_at")?,
                            model_used: row.get("model_used")?,
                            facts_extracted: row.get("facts_extracted")?,
                            facts_updated: row.get("facts_updated")?,
                            facts_deduplicated: row.get("facts_deduplicated")?,
                            error: row.get("error")?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Active facts for an agent, most recently seen first. Used to seed the
/// extraction prompt with what the agent already knows.
pub async fn get_relevant_facts(
    db: &Database,
    agent_id: &str,
    limit: u32,
) -> Result<Vec<FactRow>, MnemoError> {
    let agent_id = agent_id.to_owned();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM facts
                 WHERE agent_id = ?1 AND is_active = 1
                 ORDER BY last_seen_at DESC, occurrence_count DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![agent_id, limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Turn free text into an FTS5 MATCH expression: strip characters that
/// carry meaning in query syntax, lowercase the rest (uppercase AND/OR/NOT
/// are operators; the tokenizer folds case anyway), and OR the terms so
/// any keyword hit qualifies.
pub fn sanitize_match_query(query: &str) -> String {
    query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c
            } else {
                // Everything else, apostrophes and hyphens included, is
                // either FTS5 syntax or invalid in a bareword.
                ' '
            }
        })
        .flat_map(|c| c.to_lowercase())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Keyword search over an agent's active facts, best match first.
pub async fn search_facts(
    db: &Database,
    agent_id: &str,
    query: &str,
    limit: u32,
) -> Result<Vec<FactRow>, MnemoError> {
    let agent_id = agent_id.to_owned();
    let match_query = sanitize_match_query(query);
    if match_query.is_empty() {
        return Ok(Vec::new());
    }
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT f.* FROM facts f
                 JOIN facts_fts ON facts_fts.rowid = f.rowid
                 WHERE facts_fts MATCH ?1 AND f.agent_id = ?2 AND f.is_active = 1
                 ORDER BY rank
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![match_query, agent_id, limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Keyword search over other agents' shared facts. Secret and private
/// rows never cross the agent boundary.
pub async fn search_shared_facts(
    db: &Database,
    requesting_agent_id: &str,
    query: &str,
    limit: u32,
) -> Result<Vec<FactRow>, MnemoError> {
    let requesting_agent_id = requesting_agent_id.to_owned();
    let match_query = sanitize_match_query(query);
    if match_query.is_empty() {
        return Ok(Vec::new());
    }
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT f.* FROM facts f
                 JOIN facts_fts ON facts_fts.rowid = f.rowid
                 WHERE facts_fts MATCH ?1
                   AND f.agent_id != ?2
                   AND f.visibility = 'shared'
                   AND f.is_active = 1
                 ORDER BY rank
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![match_query, requesting_agent_id, limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Recently seen shared facts from other agents, for the fallback recall
/// strategy.
pub async fn get_shared_facts_from_other_agents(
    db: &Database,
    requesting_agent_id: &str,
    limit: u32,
) -> Result<Vec<FactRow>, MnemoError> {
    let requesting_agent_id = requesting_agent_id.to_owned();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM facts
                 WHERE agent_id != ?1 AND visibility = 'shared' AND is_active = 1
                 ORDER BY last_seen_at DESC, occurrence_count DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![requesting_agent_id, limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_fact_embedding(
    db: &Database,
    fact_id: &str,
    embedding: Vec<u8>,
) -> Result<(), MnemoError> {
    let fact_id = fact_id.to_owned();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE facts SET embedding = ?2 WHERE id = ?1",
                params![fact_id, embedding],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Active facts for an agent that carry an embedding, newest first, with
/// the vector decoded. Capped by `limit` so the in-process similarity scan
/// stays bounded.
pub async fn get_facts_with_embeddings(
    db: &Database,
    agent_id: &str,
    limit: u32,
) -> Result<Vec<(FactRow, Vec<f32>)>, MnemoError> {
    let agent_id = agent_id.to_owned();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM facts
                 WHERE agent_id = ?1 AND is_active = 1 AND embedding IS NOT NULL
                 ORDER BY last_seen_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![agent_id, limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(decode_embeddings(rows))
        })
        .await
        .map_err(map_tr_err)
}

/// Other agents' shared facts that carry an embedding.
pub async fn get_shared_facts_with_embeddings(
    db: &Database,
    requesting_agent_id: &str,
    limit: u32,
) -> Result<Vec<(FactRow, Vec<f32>)>, MnemoError> {
    let requesting_agent_id = requesting_agent_id.to_owned();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM facts
                 WHERE agent_id != ?1 AND visibility = 'shared'
                   AND is_active = 1 AND embedding IS NOT NULL
                 ORDER BY last_seen_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![requesting_agent_id, limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(decode_embeddings(rows))
        })
        .await
        .map_err(map_tr_err)
}

fn decode_embeddings(rows: Vec<FactRow>) -> Vec<(FactRow, Vec<f32>)> {
    rows.into_iter()
        .filter_map(|fact| {
            let vector = fact.embedding.as_deref().map(blob_to_vec)?;
            Some((fact, vector))
        })
        .collect()
}

/// Active facts without an embedding, oldest first. Backfill input.
pub async fn get_facts_missing_embeddings(
    db: &Database,
    limit: u32,
) -> Result<Vec<FactRow>, MnemoError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM facts
                 WHERE is_active = 1 AND embedding IS NULL
                 ORDER BY first_seen_at ASC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], fact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// (facts with an embedding, active facts total).
pub async fn count_embedding_coverage(db: &Database) -> Result<(i64, i64), MnemoError> {
    db.connection()
        .call(|conn| {
            let counts = conn.query_row(
                "SELECT COUNT(embedding), COUNT(*) FROM facts WHERE is_active = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of occurrence rows for a fact.
pub async fn count_occurrences(db: &Database, fact_id: &str) -> Result<i64, MnemoError> {
    let fact_id = fact_id.to_owned();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM fact_occurrences WHERE fact_id = ?1",
                params![fact_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}
