// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication of extracted fact candidates.
//!
//! Each candidate lands in one of three buckets: a duplicate of a known
//! fact (bump its occurrence), a replacement for a stale fact (supersede),
//! or genuinely new (insert). Repetition is itself a signal; every path
//! records an occurrence row so recurrence can be scored later.

use mnemo_core::{FactCandidate, MnemoError};
use mnemo_storage::queries::facts;
use mnemo_storage::{Database, FactRow};
use uuid::Uuid;

use crate::classifier::classify_visibility;

/// Outcome counts for one batch of candidates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeduplicationTally {
    pub new_facts: u32,
    pub updated: u32,
    pub deduplicated: u32,
}

/// Apply a batch of extracted candidates to the knowledge base.
///
/// Candidates are processed independently; one failing never blocks the
/// rest.
pub async fn process_extracted_facts(
    db: &Database,
    agent_id: &str,
    conversation_id: &str,
    candidates: Vec<FactCandidate>,
    now_ms: i64,
) -> DeduplicationTally {
    let mut tally = DeduplicationTally::default();

    for candidate in candidates {
        let preview: String = candidate.content.chars().take(60).collect();
        let result = apply_candidate(db, agent_id, conversation_id, &candidate, now_ms).await;
        match result {
            Ok(Outcome::Duplicate) => tally.deduplicated += 1,
            Ok(Outcome::Superseded) => tally.updated += 1,
            Ok(Outcome::Inserted) => tally.new_facts += 1,
            Err(error) => {
                tracing::warn!(%error, content = %preview, "failed to apply fact candidate");
            }
        }
    }

    tally
}

enum Outcome {
    Duplicate,
    Superseded,
    Inserted,
}

async fn apply_candidate(
    db: &Database,
    agent_id: &str,
    conversation_id: &str,
    candidate: &FactCandidate,
    now_ms: i64,
) -> Result<Outcome, MnemoError> {
    if let (Some(existing_id), true) = (&candidate.duplicate_of, candidate.increment_occurrence) {
        facts::record_occurrence(
            db,
            existing_id,
            conversation_id,
            now_ms,
            Some(candidate.content.clone()),
            Some(candidate.sentiment.clone().unwrap_or_else(|| "neutral".to_owned())),
        )
        .await?;
        tracing::debug!(fact_id = %existing_id, "duplicate fact, occurrence recorded");
        return Ok(Outcome::Duplicate);
    }

    if let Some(old_id) = &candidate.supersedes {
        let row = build_fact_row(candidate, agent_id, now_ms);
        let new_id = row.id.clone();
        facts::supersede_fact(db, old_id, row).await?;
        facts::record_occurrence(
            db,
            &new_id,
            conversation_id,
            now_ms,
            Some(candidate.content.clone()),
            Some(candidate.sentiment.clone().unwrap_or_else(|| "update".to_owned())),
        )
        .await?;
        tracing::debug!(old_fact_id = %old_id, new_fact_id = %new_id, "fact superseded");
        return Ok(Outcome::Superseded);
    }

    let row = build_fact_row(candidate, agent_id, now_ms);
    let new_id = row.id.clone();
    facts::insert_fact(db, row).await?;
    facts::record_occurrence(
        db,
        &new_id,
        conversation_id,
        now_ms,
        Some(candidate.content.clone()),
        Some(candidate.sentiment.clone().unwrap_or_else(|| "neutral".to_owned())),
    )
    .await?;
    tracing::debug!(fact_id = %new_id, category = %candidate.category, "new fact stored");
    Ok(Outcome::Inserted)
}

fn build_fact_row(candidate: &FactCandidate, agent_id: &str, now_ms: i64) -> FactRow {
    let visibility = classify_visibility(
        &candidate.category,
        &candidate.content,
        candidate.visibility.as_deref(),
    );
    FactRow {
        id: Uuid::new_v4().to_string(),
        agent_id: agent_id.to_owned(),
        category: candidate.category.clone(),
        content: candidate.content.clone(),
        summary: candidate.summary.clone(),
        visibility: visibility.as_str().to_owned(),
        confidence: candidate.confidence,
        first_seen_at: now_ms,
        last_seen_at: now_ms,
        // record_occurrence bumps this to 1 right after insert.
        occurrence_count: 0,
        supersedes: candidate.supersedes.clone(),
        is_active: true,
        metadata: None,
        embedding: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_storage::queries::conversations::insert_conversation_with_messages;
    use mnemo_storage::ConversationRow;

    async fn seed_conversation(db: &Database, id: &str) {
        insert_conversation_with_messages(
            db,
            ConversationRow {
                id: id.to_owned(),
                agent_id: "alfred".to_owned(),
                session_key: "agent:alfred:main".to_owned(),
                channel: None,
                started_at: 0,
                ended_at: 0,
                turn_count: 0,
                raw_text: String::new(),
                metadata: None,
            },
            vec![],
        )
        .await
        .unwrap();
    }

    fn candidate(content: &str) -> FactCandidate {
        FactCandidate {
            category: "preference".to_owned(),
            content: content.to_owned(),
            summary: None,
            visibility: None,
            confidence: 1.0,
            sentiment: None,
            supersedes: None,
            duplicate_of: None,
            increment_occurrence: false,
        }
    }

    #[tokio::test]
    async fn new_candidate_inserts_with_one_occurrence() {
        let db = Database::open_in_memory().await.unwrap();
        seed_conversation(&db, "c1").await;
        let tally =
            process_extracted_facts(&db, "alfred", "c1", vec![candidate("likes tea")], 1_000)
                .await;
        assert_eq!(tally.new_facts, 1);

        let stored = facts::get_relevant_facts(&db, "alfred", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].occurrence_count, 1);
        assert_eq!(stored[0].visibility, "shared");
        assert_eq!(
            facts::count_occurrences(&db, &stored[0].id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn duplicate_bumps_existing_fact() {
        let db = Database::open_in_memory().await.unwrap();
        seed_conversation(&db, "c1").await;
        seed_conversation(&db, "c2").await;
        process_extracted_facts(&db, "alfred", "c1", vec![candidate("likes tea")], 1_000).await;
        let existing = facts::get_relevant_facts(&db, "alfred", 10).await.unwrap();
        let existing_id = existing[0].id.clone();

        let mut dup = candidate("still likes tea");
        dup.duplicate_of = Some(existing_id.clone());
        dup.increment_occurrence = true;
        let tally = process_extracted_facts(&db, "alfred", "c2", vec![dup], 2_000).await;
        assert_eq!(tally.deduplicated, 1);
        assert_eq!(tally.new_facts, 0);

        let fact = facts::get_fact(&db, &existing_id).await.unwrap().unwrap();
        assert_eq!(fact.occurrence_count, 2);
        assert_eq!(fact.last_seen_at, 2_000);
    }

    #[tokio::test]
    async fn duplicate_without_increment_flag_inserts() {
        let db = Database::open_in_memory().await.unwrap();
        seed_conversation(&db, "c1").await;
        let mut c = candidate("likes tea");
        c.duplicate_of = Some("nonexistent".to_owned());
        c.increment_occurrence = false;
        let tally = process_extracted_facts(&db, "alfred", "c1", vec![c], 1_000).await;
        assert_eq!(tally.new_facts, 1);
    }

    #[tokio::test]
    async fn supersede_replaces_and_counts_as_update() {
        let db = Database::open_in_memory().await.unwrap();
        seed_conversation(&db, "c1").await;
        seed_conversation(&db, "c2").await;
        process_extracted_facts(&db, "alfred", "c1", vec![candidate("FTP is 250W")], 1_000).await;
        let old = facts::get_relevant_facts(&db, "alfred", 10).await.unwrap();
        let old_id = old[0].id.clone();

        let mut replacement = candidate("FTP is 260W");
        replacement.supersedes = Some(old_id.clone());
        let tally = process_extracted_facts(&db, "alfred", "c2", vec![replacement], 2_000).await;
        assert_eq!(tally.updated, 1);

        let active = facts::get_relevant_facts(&db, "alfred", 10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].content, "FTP is 260W");
        assert_eq!(active[0].supersedes.as_deref(), Some(old_id.as_str()));
        assert_eq!(active[0].occurrence_count, 1);
    }

    #[tokio::test]
    async fn hard_visibility_rules_apply_on_insert() {
        let db = Database::open_in_memory().await.unwrap();
        seed_conversation(&db, "c1").await;
        let mut c = candidate("the database password is hunter2");
        c.visibility = Some("shared".to_owned());
        process_extracted_facts(&db, "alfred", "c1", vec![c], 1_000).await;

        let stored = facts::get_relevant_facts(&db, "alfred", 10).await.unwrap();
        assert_eq!(stored[0].visibility, "secret");
    }

    #[tokio::test]
    async fn one_bad_candidate_does_not_block_the_rest() {
        let db = Database::open_in_memory().await.unwrap();
        seed_conversation(&db, "c1").await;
        // Superseding a fact that does not exist still inserts the new row;
        // a duplicate of a missing fact is the failure case here.
        let mut bad = candidate("update for a ghost");
        bad.duplicate_of = Some("missing-id".to_owned());
        bad.increment_occurrence = true;
        let good = candidate("likes tea");

        let tally =
            process_extracted_facts(&db, "alfred", "c1", vec![bad, good], 1_000).await;
        assert_eq!(tally.new_facts, 1);

        let stored = facts::get_relevant_facts(&db, "alfred", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "likes tea");
    }
}
