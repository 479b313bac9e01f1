// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-strategy recall over the knowledge base.
//!
//! Strategies, in order: FTS5 keyword match, semantic similarity against
//! embedded facts, recent or frequently-seen background facts, and shared
//! facts from other agents. Each hit is scored by category weight,
//! recency decay, and occurrence frequency; cross-agent hits are
//! discounted because the agent's own knowledge is primary. Every
//! strategy failure is non-fatal.

use std::collections::HashSet;
use std::sync::LazyLock;

use mnemo_config::RecallConfig;
use mnemo_storage::queries::facts;
use mnemo_storage::{Database, FactRow};

use crate::engine::cosine_similarity;

/// How a recalled fact was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Fts,
    Semantic,
    Recency,
    Frequency,
    CrossAgent,
}

#[derive(Debug, Clone)]
pub struct ScoredFact {
    pub fact: FactRow,
    pub score: f64,
    pub source: MatchSource,
    pub cross_agent: bool,
}

const THIRTY_DAYS_MS: f64 = 30.0 * 24.0 * 60.0 * 60.0 * 1000.0;
const SEVEN_DAYS_MS: i64 = 7 * 24 * 60 * 60 * 1000;
/// Bound for in-process similarity scans as the knowledge base grows.
const SEMANTIC_CANDIDATE_CAP: u32 = 200;
/// Cross-agent matches need a bit more signal than the configured own-fact
/// threshold.
const CROSS_AGENT_THRESHOLD_OFFSET: f32 = 0.05;
const MAX_SEARCH_TERMS: usize = 12;

/// Decisions and corrections matter most; routine chatter least.
fn category_weight(category: &str) -> f64 {
    match category {
        "decision" => 1.5,
        "correction" => 1.4,
        "preference" => 1.3,
        "action_item" => 1.2,
        "person" => 1.1,
        "technical" => 1.0,
        "emotional" => 0.9,
        "routine" => 0.7,
        _ => 1.0,
    }
}

/// Linear decay over 30 days, clamped to a floor so old facts never
/// vanish entirely.
fn recency_boost(now_ms: i64, last_seen_at: i64, floor: f64) -> f64 {
    let elapsed = (now_ms - last_seen_at).max(0) as f64;
    (1.0 - elapsed / THIRTY_DAYS_MS).max(floor)
}

/// Logarithmic boost for repetition, capped at 2x.
fn frequency_boost(occurrence_count: i64) -> f64 {
    (1.0 + (occurrence_count.max(1) as f64).log2()).min(2.0)
}

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // English
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has",
        "had", "do", "does", "did", "will", "would", "could", "should", "may", "might",
        "shall", "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on",
        "with", "at", "by", "from", "as", "into", "through", "during", "before", "after",
        "above", "below", "between", "out", "off", "over", "under", "again", "further",
        "then", "once", "here", "there", "when", "where", "why", "how", "all", "both",
        "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
        "own", "same", "so", "than", "too", "very", "just", "don", "now", "it", "its", "i",
        "me", "my", "we", "our", "you", "your", "he", "him", "his", "she", "her", "they",
        "them", "their", "what", "which", "who", "whom", "this", "that", "these", "those",
        "am", "but", "if", "or", "because", "until", "while", "about", "and", "also",
        "get", "got", "let", "ok", "okay", "yes", "yeah", "sure", "please", "thanks",
        "thank", "hi", "hello", "hey",
        // French
        "le", "la", "les", "un", "une", "des", "du", "de", "et", "en", "est", "sont",
        "ont", "il", "elle", "nous", "vous", "ils", "je", "tu", "ce", "se", "qui", "que",
        "dans", "pour", "pas", "sur", "avec", "plus", "ne", "au", "aux", "par", "son",
        "sa", "ses", "mais", "ou", "si", "bien", "tout", "fait", "comme", "été", "être",
        "avoir", "faire", "dit", "ça", "oui", "non",
    ]
    .into_iter()
    .collect()
});

/// Meaningful keywords from a user message: lowercased, punctuation
/// stripped, stopwords and tokens under three characters dropped.
pub fn extract_search_terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '\'') {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w))
        .map(str::to_owned)
        .collect()
}

/// Search the knowledge base for facts relevant to the user's message.
/// Returns scored facts, best first, capped at `cfg.max_facts`.
/// `similarity_threshold` is the minimum cosine similarity for a semantic
/// match against the agent's own facts; cross-agent facts must clear it by
/// [`CROSS_AGENT_THRESHOLD_OFFSET`] more.
pub async fn search_relevant_facts(
    db: &Database,
    agent_id: &str,
    user_message: &str,
    cfg: &RecallConfig,
    query_embedding: Option<&[f32]>,
    similarity_threshold: f32,
    now_ms: i64,
) -> Vec<ScoredFact> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut results: Vec<ScoredFact> = Vec::new();

    let terms = extract_search_terms(user_message);
    let keyword_query = terms
        .iter()
        .take(MAX_SEARCH_TERMS)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let fts_limit = (cfg.max_facts * 2) as u32;

    // Strategy 1: keyword match over own facts.
    if !keyword_query.is_empty() {
        match facts::search_facts(db, agent_id, &keyword_query, fts_limit).await {
            Ok(hits) => {
                for fact in hits {
                    if !seen.insert(fact.id.clone()) {
                        continue;
                    }
                    let score = category_weight(&fact.category)
                        * recency_boost(now_ms, fact.last_seen_at, 0.5)
                        * frequency_boost(fact.occurrence_count);
                    results.push(ScoredFact {
                        fact,
                        score,
                        source: MatchSource::Fts,
                        cross_agent: false,
                    });
                }
            }
            Err(error) => tracing::debug!(%error, "keyword search failed"),
        }
    }

    // Strategy 2: semantic similarity over own embedded facts. Catches
    // relevant facts even without keyword overlap.
    if let Some(query_vec) = query_embedding {
        match facts::get_facts_with_embeddings(db, agent_id, SEMANTIC_CANDIDATE_CAP).await {
            Ok(candidates) => {
                for (fact, vector) in candidates {
                    if seen.contains(&fact.id) {
                        continue;
                    }
                    let similarity = cosine_similarity(query_vec, &vector);
                    if similarity < similarity_threshold {
                        continue;
                    }
                    seen.insert(fact.id.clone());
                    // Map similarity 0.3..1.0 onto 0..1, with a slight
                    // edge over plain keyword hits.
                    let sim_score = ((similarity - 0.3) / 0.7) as f64;
                    let score = sim_score
                        * category_weight(&fact.category)
                        * recency_boost(now_ms, fact.last_seen_at, 0.5)
                        * frequency_boost(fact.occurrence_count)
                        * 1.2;
                    results.push(ScoredFact {
                        fact,
                        score,
                        source: MatchSource::Semantic,
                        cross_agent: false,
                    });
                }
            }
            Err(error) => tracing::debug!(%error, "semantic search failed"),
        }
    }

    // Strategy 3: recent or frequently-repeated background facts.
    let seven_days_ago = now_ms - SEVEN_DAYS_MS;
    match facts::get_relevant_facts(db, agent_id, fts_limit).await {
        Ok(recent) => {
            for fact in recent {
                if seen.contains(&fact.id) {
                    continue;
                }
                let is_recent = fact.last_seen_at >= seven_days_ago;
                let is_frequent = fact.occurrence_count >= 3;
                if !is_recent && !is_frequent {
                    continue;
                }
                seen.insert(fact.id.clone());
                let score = category_weight(&fact.category)
                    * recency_boost(now_ms, fact.last_seen_at, 0.3)
                    * frequency_boost(fact.occurrence_count)
                    * 0.6;
                results.push(ScoredFact {
                    fact,
                    score,
                    source: if is_recent {
                        MatchSource::Recency
                    } else {
                        MatchSource::Frequency
                    },
                    cross_agent: false,
                });
            }
        }
        Err(error) => tracing::debug!(%error, "recency lookup failed"),
    }

    if cfg.cross_agent {
        // Strategy 4: other agents' shared knowledge, discounted.
        if !keyword_query.is_empty() {
            match facts::search_shared_facts(db, agent_id, &keyword_query, fts_limit).await {
                Ok(hits) => {
                    for fact in hits {
                        if !seen.insert(fact.id.clone()) {
                            continue;
                        }
                        let score = category_weight(&fact.category)
                            * recency_boost(now_ms, fact.last_seen_at, 0.5)
                            * frequency_boost(fact.occurrence_count)
                            * 0.5;
                        results.push(ScoredFact {
                            fact,
                            score,
                            source: MatchSource::CrossAgent,
                            cross_agent: true,
                        });
                    }
                }
                Err(error) => tracing::debug!(%error, "shared keyword search failed"),
            }
        }

        if let Some(query_vec) = query_embedding {
            match facts::get_shared_facts_with_embeddings(db, agent_id, SEMANTIC_CANDIDATE_CAP)
                .await
            {
                Ok(candidates) => {
                    for (fact, vector) in candidates {
                        if seen.contains(&fact.id) {
                            continue;
                        }
                        let similarity = cosine_similarity(query_vec, &vector);
                        if similarity < similarity_threshold + CROSS_AGENT_THRESHOLD_OFFSET {
                            continue;
                        }
                        seen.insert(fact.id.clone());
                        let sim_score = ((similarity - 0.3) / 0.7) as f64;
                        let score = sim_score
                            * category_weight(&fact.category)
                            * recency_boost(now_ms, fact.last_seen_at, 0.5)
                            * 0.5;
                        results.push(ScoredFact {
                            fact,
                            score,
                            source: MatchSource::CrossAgent,
                            cross_agent: true,
                        });
                    }
                }
                Err(error) => tracing::debug!(%error, "shared semantic search failed"),
            }
        }

        match facts::get_shared_facts_from_other_agents(db, agent_id, cfg.max_facts as u32).await
        {
            Ok(shared) => {
                for fact in shared {
                    if seen.contains(&fact.id) {
                        continue;
                    }
                    let is_recent = fact.last_seen_at >= seven_days_ago;
                    let is_frequent = fact.occurrence_count >= 4;
                    if !is_recent && !is_frequent {
                        continue;
                    }
                    seen.insert(fact.id.clone());
                    let score = category_weight(&fact.category)
                        * recency_boost(now_ms, fact.last_seen_at, 0.3)
                        * frequency_boost(fact.occurrence_count)
                        * 0.35;
                    results.push(ScoredFact {
                        fact,
                        score,
                        source: MatchSource::CrossAgent,
                        cross_agent: true,
                    });
                }
            }
            Err(error) => tracing::debug!(%error, "shared recency lookup failed"),
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(cfg.max_facts);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_storage::vec_to_blob;

    const NOW: i64 = 1_700_000_000_000;

    fn fact(id: &str, agent_id: &str, category: &str, content: &str) -> FactRow {
        FactRow {
            id: id.to_owned(),
            agent_id: agent_id.to_owned(),
            category: category.to_owned(),
            content: content.to_owned(),
            summary: None,
            visibility: "shared".to_owned(),
            confidence: 1.0,
            first_seen_at: NOW - 1_000,
            last_seen_at: NOW - 1_000,
            occurrence_count: 1,
            supersedes: None,
            is_active: true,
            metadata: None,
            embedding: None,
        }
    }

    fn config() -> RecallConfig {
        RecallConfig::default()
    }

    #[test]
    fn search_terms_drop_stopwords_and_short_tokens() {
        let terms = extract_search_terms("What is the training plan for my FTP test?");
        assert_eq!(terms, vec!["training", "plan", "ftp", "test"]);
    }

    #[test]
    fn boosts_behave_at_the_edges() {
        assert!((frequency_boost(0) - 1.0).abs() < 1e-9);
        assert!((frequency_boost(1) - 1.0).abs() < 1e-9);
        assert!((frequency_boost(2) - 2.0).abs() < 1e-9);
        assert!((frequency_boost(100) - 2.0).abs() < 1e-9, "capped at 2x");

        assert!((recency_boost(NOW, NOW, 0.5) - 1.0).abs() < 1e-9);
        let ninety_days = NOW - 90 * 24 * 60 * 60 * 1000;
        assert!((recency_boost(NOW, ninety_days, 0.5) - 0.5).abs() < 1e-9, "floored");
    }

    #[tokio::test]
    async fn keyword_match_finds_own_facts() {
        let db = Database::open_in_memory().await.unwrap();
        facts::insert_fact(&db, fact("f1", "alfred", "technical", "rides a titanium gravel bike"))
            .await
            .unwrap();
        let old = NOW - 60 * 24 * 60 * 60 * 1000;
        let mut unrelated = fact("f2", "alfred", "routine", "waters the plants weekly");
        unrelated.last_seen_at = old;
        unrelated.first_seen_at = old;
        facts::insert_fact(&db, unrelated).await.unwrap();

        let hits =
            search_relevant_facts(&db, "alfred", "tell me about my gravel bike", &config(), None, 0.45, NOW)
                .await;
        assert_eq!(hits[0].fact.id, "f1");
        assert_eq!(hits[0].source, MatchSource::Fts);
        assert!(!hits[0].cross_agent);
    }

    #[tokio::test]
    async fn recent_facts_surface_without_keyword_overlap() {
        let db = Database::open_in_memory().await.unwrap();
        facts::insert_fact(&db, fact("f1", "alfred", "decision", "moving to Denver in March"))
            .await
            .unwrap();

        let hits = search_relevant_facts(&db, "alfred", "zzz qqq xyzabc", &config(), None, 0.45, NOW).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, MatchSource::Recency);
    }

    #[tokio::test]
    async fn stale_low_occurrence_facts_are_left_out() {
        let db = Database::open_in_memory().await.unwrap();
        let mut stale = fact("f1", "alfred", "routine", "had cereal for breakfast");
        stale.last_seen_at = NOW - 20 * 24 * 60 * 60 * 1000;
        stale.occurrence_count = 1;
        facts::insert_fact(&db, stale).await.unwrap();

        let hits = search_relevant_facts(&db, "alfred", "unrelated words here", &config(), None, 0.45, NOW)
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn semantic_match_respects_threshold() {
        let db = Database::open_in_memory().await.unwrap();
        let mut close = fact("close", "alfred", "technical", "cycling power numbers");
        close.embedding = Some(vec_to_blob(&[1.0, 0.0, 0.0]));
        facts::insert_fact(&db, close).await.unwrap();
        let mut far = fact("far", "alfred", "technical", "gardening notes");
        far.embedding = Some(vec_to_blob(&[0.0, 1.0, 0.0]));
        facts::insert_fact(&db, far).await.unwrap();

        let query = [0.9f32, 0.1, 0.0];
        let hits =
            search_relevant_facts(&db, "alfred", "zzz qqq xyzabc", &config(), Some(&query), 0.45, NOW)
                .await;

        let semantic: Vec<_> = hits
            .iter()
            .filter(|h| h.source == MatchSource::Semantic)
            .collect();
        assert_eq!(semantic.len(), 1);
        assert_eq!(semantic[0].fact.id, "close");
    }

    #[tokio::test]
    async fn semantic_threshold_is_caller_controlled() {
        let db = Database::open_in_memory().await.unwrap();
        let mut row = fact("f1", "alfred", "technical", "cycling power numbers");
        row.embedding = Some(vec_to_blob(&[1.0, 0.0, 0.0]));
        facts::insert_fact(&db, row).await.unwrap();

        // Similarity against the stored vector is exactly 0.6.
        let query = [0.6f32, 0.8, 0.0];
        let loose =
            search_relevant_facts(&db, "alfred", "zzz qqq xyzabc", &config(), Some(&query), 0.45, NOW)
                .await;
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].source, MatchSource::Semantic);

        let strict =
            search_relevant_facts(&db, "alfred", "zzz qqq xyzabc", &config(), Some(&query), 0.65, NOW)
                .await;
        assert!(!strict.iter().any(|h| h.source == MatchSource::Semantic));
    }

    #[tokio::test]
    async fn cross_agent_hits_are_tagged_and_discounted() {
        let db = Database::open_in_memory().await.unwrap();
        facts::insert_fact(&db, fact("own", "alfred", "technical", "espresso machine maintenance"))
            .await
            .unwrap();
        facts::insert_fact(&db, fact("other", "bruce", "technical", "espresso grinder settings"))
            .await
            .unwrap();

        let hits =
            search_relevant_facts(&db, "alfred", "espresso machine help", &config(), None, 0.45, NOW)
                .await;
        let own = hits.iter().find(|h| h.fact.id == "own").unwrap();
        let other = hits.iter().find(|h| h.fact.id == "other").unwrap();
        assert!(other.cross_agent);
        assert_eq!(other.source, MatchSource::CrossAgent);
        assert!(own.score > other.score);
    }

    #[tokio::test]
    async fn cross_agent_disabled_keeps_results_local() {
        let db = Database::open_in_memory().await.unwrap();
        facts::insert_fact(&db, fact("other", "bruce", "technical", "espresso grinder settings"))
            .await
            .unwrap();

        let mut cfg = config();
        cfg.cross_agent = false;
        let hits =
            search_relevant_facts(&db, "alfred", "espresso grinder", &cfg, None, 0.45, NOW).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn results_are_capped_at_max_facts() {
        let db = Database::open_in_memory().await.unwrap();
        for i in 0..30 {
            facts::insert_fact(&db, fact(&format!("f{i}"), "alfred", "technical", "espresso notes"))
                .await
                .unwrap();
        }

        let mut cfg = config();
        cfg.max_facts = 5;
        let hits = search_relevant_facts(&db, "alfred", "espresso notes", &cfg, None, 0.45, NOW).await;
        assert_eq!(hits.len(), 5);
    }
}
