// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persists flushed conversation segments.
//!
//! Each segment lands in two places: a conversation row plus message rows
//! in SQLite, and a line-per-message JSONL backup under
//! `<data_dir>/conversations/YYYY-MM-DD-HHMM.jsonl`. Both writes are
//! best-effort; a failure is logged and never propagated, so capture can
//! never disrupt the agent.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use mnemo_core::MnemoError;
use mnemo_storage::queries::conversations;
use mnemo_storage::{ConversationRow, Database, MessageRow};
use serde_json::json;
use uuid::Uuid;

use crate::buffer::FlushedSegment;

/// Extract the agent id from a session key of the form
/// `agent:<agentId>:<sessionName>`. Falls back to the raw key when the
/// format does not match.
pub fn parse_agent_id(session_key: &str) -> &str {
    let mut parts = session_key.split(':');
    if parts.next() == Some("agent") {
        if let Some(agent_id) = parts.next() {
            if !agent_id.is_empty() {
                return agent_id;
            }
        }
    }
    session_key
}

pub struct SegmentWriter {
    db: Arc<Database>,
    data_dir: PathBuf,
}

impl SegmentWriter {
    pub fn new(db: Arc<Database>, data_dir: PathBuf) -> Self {
        Self { db, data_dir }
    }

    /// Persist a segment. Returns the conversation row that was written so
    /// the caller can hand it to the extraction trigger, or None for an
    /// empty segment.
    pub async fn write_segment(&self, segment: &FlushedSegment) -> Option<ConversationRow> {
        if segment.entries.is_empty() {
            return None;
        }

        let segment_id = Uuid::new_v4().to_string();
        let agent_id = parse_agent_id(&segment.session_key).to_owned();
        let channel = segment
            .entries
            .first()
            .and_then(|e| e.channel.clone())
            .unwrap_or_else(|| "unknown".to_owned());

        let raw_text = segment
            .entries
            .iter()
            .map(|e| format!("[{}] {}", e.role, e.content))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let conversation = ConversationRow {
            id: segment_id.clone(),
            agent_id,
            session_key: segment.session_key.clone(),
            channel: Some(channel),
            started_at: segment.started_at,
            ended_at: segment.ended_at,
            turn_count: segment.entries.len() as i64,
            raw_text,
            metadata: None,
        };

        let messages: Vec<MessageRow> = segment
            .entries
            .iter()
            .map(|entry| MessageRow {
                id: Uuid::new_v4().to_string(),
                conversation_id: segment_id.clone(),
                role: entry.role.clone(),
                content: entry.content.clone(),
                timestamp: entry.timestamp,
                message_id: entry.message_id.clone(),
                metadata: None,
            })
            .collect();

        if let Err(error) = conversations::insert_conversation_with_messages(
            &self.db,
            conversation.clone(),
            messages.clone(),
        )
        .await
        {
            tracing::warn!(segment_id, %error, "sqlite write failed for segment");
        }

        if let Err(error) = self.write_jsonl_backup(&conversation, &messages).await {
            tracing::warn!(segment_id, %error, "jsonl backup failed for segment");
        }

        tracing::info!(
            segment_id,
            turns = conversation.turn_count,
            duration_ms = conversation.ended_at - conversation.started_at,
            session_key = %conversation.session_key,
            "captured conversation segment"
        );

        Some(conversation)
    }

    async fn write_jsonl_backup(
        &self,
        conversation: &ConversationRow,
        messages: &[MessageRow],
    ) -> Result<(), MnemoError> {
        let dir = self.data_dir.join("conversations");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(MnemoError::storage)?;

        let path = dir.join(format!("{}.jsonl", bucket_name(conversation.started_at)));

        let mut lines = String::new();
        for message in messages {
            let line = json!({
                "segmentId": conversation.id,
                "sessionKey": conversation.session_key,
                "agentId": conversation.agent_id,
                "channel": conversation.channel,
                "turnCount": conversation.turn_count,
                "segmentStartedAt": conversation.started_at,
                "segmentEndedAt": conversation.ended_at,
                "messageId": message.id,
                "role": message.role,
                "content": message.content,
                "timestamp": message.timestamp,
                "providerMessageId": message.message_id,
            });
            lines.push_str(&line.to_string());
            lines.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(MnemoError::storage)?;
        tokio::io::AsyncWriteExt::write_all(&mut file, lines.as_bytes())
            .await
            .map_err(MnemoError::storage)?;
        Ok(())
    }
}

/// Minute-resolution filename bucket, `YYYY-MM-DD-HHMM`, in local time.
fn bucket_name(epoch_ms: i64) -> String {
    match Local.timestamp_millis_opt(epoch_ms) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.format("%Y-%m-%d-%H%M").to_string()
        }
        chrono::LocalResult::None => "unknown".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferEntry;

    fn entry(role: &str, content: &str, timestamp: i64) -> BufferEntry {
        BufferEntry {
            role: role.to_owned(),
            content: content.to_owned(),
            timestamp,
            message_id: None,
            channel: Some("cli".to_owned()),
        }
    }

    #[test]
    fn agent_id_parsing() {
        assert_eq!(parse_agent_id("agent:alfred:main"), "alfred");
        assert_eq!(parse_agent_id("agent:alfred"), "alfred");
        assert_eq!(parse_agent_id("agent::main"), "agent::main");
        assert_eq!(parse_agent_id("plain-session"), "plain-session");
    }

    #[tokio::test]
    async fn write_segment_persists_rows_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let writer = SegmentWriter::new(db.clone(), dir.path().to_path_buf());

        let segment = FlushedSegment {
            session_key: "agent:alfred:main".to_owned(),
            entries: vec![entry("user", "hello", 1_000), entry("assistant", "hi", 2_000)],
            started_at: 1_000,
            ended_at: 2_000,
        };

        let conversation = writer.write_segment(&segment).await.unwrap();
        assert_eq!(conversation.agent_id, "alfred");
        assert_eq!(conversation.turn_count, 2);
        assert_eq!(
            conversation.raw_text,
            "[user] hello\n\n---\n\n[assistant] hi"
        );

        let stored = conversations::get_conversation(&db, &conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.session_key, "agent:alfred:main");
        let messages = conversations::get_messages(&db, &conversation.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);

        let backup_dir = dir.path().join("conversations");
        let mut files = std::fs::read_dir(&backup_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect::<Vec<_>>();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(files.pop().unwrap()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(first["agentId"], "alfred");
        assert_eq!(first["role"], "user");
    }

    #[tokio::test]
    async fn empty_segment_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let writer = SegmentWriter::new(db, dir.path().to_path_buf());

        let segment = FlushedSegment {
            session_key: "s1".to_owned(),
            entries: vec![],
            started_at: 0,
            ended_at: 0,
        };
        assert!(writer.write_segment(&segment).await.is_none());
        assert!(!dir.path().join("conversations").exists());
    }
}
