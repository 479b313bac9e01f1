// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Formats recalled facts into the context block injected before an AI
//! turn.
//!
//! Output is grouped by category, most actionable first, annotated with
//! relative age and recurrence markers, and hard-capped by a character
//! budget. Returns an empty string when there is nothing worth injecting.

use std::collections::HashMap;

use crate::recall::ScoredFact;

/// Display order, most actionable categories first.
const CATEGORY_ORDER: &[&str] = &[
    "decision",
    "correction",
    "action_item",
    "preference",
    "person",
    "technical",
    "emotional",
    "routine",
];

fn category_label(category: &str) -> String {
    match category {
        "decision" => "📌 Decision".to_owned(),
        "correction" => "✏️ Correction".to_owned(),
        "action_item" => "📋 Action Item".to_owned(),
        "preference" => "⭐ Preference".to_owned(),
        "person" => "👤 Person".to_owned(),
        "technical" => "🔧 Technical".to_owned(),
        "emotional" => "💭 Emotional".to_owned(),
        "routine" => "📎 Routine".to_owned(),
        other => format!("📎 {other}"),
    }
}

/// Compact relative age, coarsening with distance.
fn format_relative_time(now_ms: i64, timestamp_ms: i64) -> String {
    let mins = (now_ms - timestamp_ms).max(0) / 60_000;
    if mins < 60 {
        return format!("{mins}m ago");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{days}d ago");
    }
    let weeks = days / 7;
    if weeks < 5 {
        return format!("{weeks}w ago");
    }
    format!("{}mo ago", days / 30)
}

/// Marker for facts that keep coming up.
fn recurrence_tag(occurrences: i64) -> String {
    if occurrences >= 5 {
        format!(" 🔴 (recurring ×{occurrences})")
    } else if occurrences >= 3 {
        format!(" 🟡 (mentioned ×{occurrences})")
    } else {
        String::new()
    }
}

fn agent_label<'a>(agent_id: &'a str, agent_display: &'a HashMap<String, String>) -> &'a str {
    agent_display.get(agent_id).map(String::as_str).unwrap_or(agent_id)
}

fn bullet_line(fact: &ScoredFact, agent_display: &HashMap<String, String>, now_ms: i64) -> String {
    let text = fact
        .fact
        .summary
        .clone()
        .unwrap_or_else(|| fact.fact.content.chars().take(120).collect());
    let when = format_relative_time(now_ms, fact.fact.last_seen_at);
    let recurrence = recurrence_tag(fact.fact.occurrence_count);
    let source = if fact.cross_agent {
        format!(" [via {}]", agent_label(&fact.fact.agent_id, agent_display))
    } else {
        String::new()
    };
    format!("- {text} _({when})_{recurrence}{source}")
}

/// Build the recall context block.
///
/// The budget is enforced incrementally: a header or bullet that would
/// push the block past `max_chars` is dropped along with everything after
/// it. A block that ends up with headers but no facts collapses to empty.
pub fn build_recall_context(
    facts: &[ScoredFact],
    max_chars: usize,
    agent_display: &HashMap<String, String>,
    now_ms: i64,
) -> String {
    if facts.is_empty() {
        return String::new();
    }

    let mut grouped: HashMap<&str, Vec<&ScoredFact>> = HashMap::new();
    let mut category_seen_order: Vec<&str> = Vec::new();
    for fact in facts {
        let category = fact.fact.category.as_str();
        if !grouped.contains_key(category) {
            category_seen_order.push(category);
        }
        grouped.entry(category).or_default().push(fact);
    }

    let has_cross_agent = facts.iter().any(|f| f.cross_agent);
    let intro = if has_cross_agent {
        "_Relevant facts from your knowledge base + shared knowledge (auto-injected):_"
    } else {
        "_Relevant facts from your knowledge base (auto-injected):_"
    };

    let mut lines: Vec<String> = vec![
        "## 🧠 Recalled Memory".to_owned(),
        intro.to_owned(),
        String::new(),
    ];
    let mut total_chars: usize = lines.iter().map(|l| l.chars().count() + 1).sum();
    let mut wrote_any_bullet = false;

    // Known categories in priority order, then anything else in the order
    // it first appeared.
    let ordered = CATEGORY_ORDER
        .iter()
        .copied()
        .chain(
            category_seen_order
                .iter()
                .copied()
                .filter(|c| !CATEGORY_ORDER.contains(c)),
        );

    'outer: for category in ordered {
        let Some(category_facts) = grouped.get(category) else {
            continue;
        };

        let header = format!("### {}", category_label(category));
        if total_chars + header.chars().count() + 2 > max_chars {
            break;
        }
        total_chars += header.chars().count() + 1;
        lines.push(header);

        for fact in category_facts {
            let line = bullet_line(fact, agent_display, now_ms);
            if total_chars + line.chars().count() + 1 > max_chars {
                break 'outer;
            }
            total_chars += line.chars().count() + 1;
            lines.push(line);
            wrote_any_bullet = true;
        }

        lines.push(String::new());
        total_chars += 1;
    }

    if !wrote_any_bullet {
        return String::new();
    }

    lines.join("\n").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::MatchSource;
    use mnemo_storage::FactRow;

    const NOW: i64 = 1_700_000_000_000;

    fn scored(category: &str, content: &str, cross_agent: bool) -> ScoredFact {
        ScoredFact {
            fact: FactRow {
                id: content.to_owned(),
                agent_id: if cross_agent { "bruce" } else { "alfred" }.to_owned(),
                category: category.to_owned(),
                content: content.to_owned(),
                summary: None,
                visibility: "shared".to_owned(),
                confidence: 1.0,
                first_seen_at: NOW - 120_000,
                last_seen_at: NOW - 120_000,
                occurrence_count: 1,
                supersedes: None,
                is_active: true,
                metadata: None,
                embedding: None,
            },
            score: 1.0,
            source: MatchSource::Fts,
            cross_agent,
        }
    }

    #[test]
    fn no_facts_yields_empty_string() {
        let block = build_recall_context(&[], 4000, &HashMap::new(), NOW);
        assert!(block.is_empty());
    }

    #[test]
    fn groups_by_category_in_priority_order() {
        let facts = vec![
            scored("preference", "prefers tea", false),
            scored("decision", "moving to Denver", false),
        ];
        let block = build_recall_context(&facts, 4000, &HashMap::new(), NOW);

        let decision_at = block.find("📌 Decision").unwrap();
        let preference_at = block.find("⭐ Preference").unwrap();
        assert!(decision_at < preference_at);
        assert!(block.contains("- moving to Denver _(2m ago)_"));
    }

    #[test]
    fn relative_times_coarsen_with_age() {
        assert_eq!(format_relative_time(NOW, NOW - 5 * 60_000), "5m ago");
        assert_eq!(format_relative_time(NOW, NOW - 3 * 3_600_000), "3h ago");
        assert_eq!(format_relative_time(NOW, NOW - 2 * 86_400_000), "2d ago");
        assert_eq!(format_relative_time(NOW, NOW - 14 * 86_400_000), "2w ago");
        assert_eq!(format_relative_time(NOW, NOW - 90 * 86_400_000), "3mo ago");
    }

    #[test]
    fn recurrence_markers_kick_in_at_thresholds() {
        assert_eq!(recurrence_tag(1), "");
        assert_eq!(recurrence_tag(3), " 🟡 (mentioned ×3)");
        assert_eq!(recurrence_tag(5), " 🔴 (recurring ×5)");
    }

    #[test]
    fn cross_agent_facts_carry_provenance() {
        let facts = vec![scored("technical", "grinder at setting 8", true)];
        let mut display = HashMap::new();
        display.insert("bruce".to_owned(), "Barista Bot".to_owned());

        let block = build_recall_context(&facts, 4000, &display, NOW);
        assert!(block.contains("[via Barista Bot]"));
        assert!(block.contains("shared knowledge"));

        // Unknown agents fall back to the raw id.
        let block = build_recall_context(&facts, 4000, &HashMap::new(), NOW);
        assert!(block.contains("[via bruce]"));
    }

    #[test]
    fn never_exceeds_the_character_budget() {
        let facts: Vec<ScoredFact> = (0..40)
            .map(|i| scored("technical", &format!("fact number {i} with some padding text"), false))
            .collect();

        for budget in [150, 300, 600, 1200] {
            let block = build_recall_context(&facts, budget, &HashMap::new(), NOW);
            assert!(
                block.chars().count() <= budget,
                "budget {budget} exceeded: {}",
                block.chars().count()
            );
        }
    }

    #[test]
    fn headers_without_facts_collapse_to_empty() {
        let facts = vec![scored(
            "decision",
            "a very long decision description that will not fit in a tiny budget at all",
            false,
        )];
        // Enough for the preamble and header, not for any bullet.
        let block = build_recall_context(&facts, 100, &HashMap::new(), NOW);
        assert!(block.is_empty());
    }

    #[test]
    fn long_content_is_truncated_in_bullets() {
        let long = "x".repeat(400);
        let facts = vec![scored("technical", &long, false)];
        let block = build_recall_context(&facts, 4000, &HashMap::new(), NOW);
        assert!(!block.contains(&"x".repeat(121)));
        assert!(block.contains(&"x".repeat(120)));
    }
}
