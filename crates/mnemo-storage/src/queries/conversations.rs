// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and message persistence.

use mnemo_core::MnemoError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::{ConversationRow, MessageRow};

fn conversation_from_row(row: &Row<'_>) -> Result<ConversationRow, rusqlite::Error> {
    Ok(ConversationRow {
        id: row.get("id")?,
        agent_id: row.get("agent_id")?,
        session_key: row.get("session_key")?,
        channel: row.get("channel")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        turn_count: row.get("turn_count")?,
        raw_text: row.get("raw_text")?,
        metadata: row.get("metadata")?,
    })
}

fn message_from_row(row: &Row<'_>) -> Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        role: row.get("role")?,
        content: row.get("content")?,
        timestamp: row.get("timestamp")?,
        message_id: row.get("message_id")?,
        metadata: row.get("metadata")?,
    })
}

/// Insert a conversation and all of its messages in one transaction.
///
/// The conversation insert uses OR IGNORE so a retried flush of the same
/// segment id does not fail; messages belonging to an already-stored
/// conversation are skipped the same way.
pub async fn insert_conversation_with_messages(
    db: &Database,
    conversation: ConversationRow,
    messages: Vec<MessageRow>,
) -> Result<(), MnemoError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, agent_id, session_key, channel, started_at, ended_at,
                      turn_count, raw_text, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    conversation.id,
                    conversation.agent_id,
                    conversation.session_key,
                    conversation.channel,
                    conversation.started_at,
                    conversation.ended_at,
                    conversation.turn_count,
                    conversation.raw_text,
                    conversation.metadata,
                ],
            )?;
            for message in &messages {
                tx.execute(
                    "INSERT OR IGNORE INTO messages
                         (id, conversation_id, role, content, timestamp,
                          message_id, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        message.id,
                        message.conversation_id,
                        message.role,
                        message.content,
                        message.timestamp,
                        message.message_id,
                        message.metadata,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<ConversationRow>, MnemoError> {
    let conversation_id = conversation_id.to_owned();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM conversations WHERE id = ?1",
                    params![conversation_id],
                    conversation_from_row,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a conversation in chronological order. Rowid breaks ties
/// so same-millisecond turns keep insertion order.
pub async fn get_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<MessageRow>, MnemoError> {
    let conversation_id = conversation_id.to_owned();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM messages WHERE conversation_id = ?1
                 ORDER BY timestamp ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map(params![conversation_id], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations for an agent that have no extraction-log entry yet,
/// oldest first. Used to reprocess segments missed while extraction was
/// disabled or failing.
pub async fn get_unextracted_conversations(
    db: &Database,
    agent_id: &str,
    limit: u32,
) -> Result<Vec<ConversationRow>, MnemoError> {
    let agent_id = agent_id.to_owned();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.* FROM conversations c
                 LEFT JOIN extraction_log e ON e.conversation_id = c.id
                 WHERE c.agent_id = ?1 AND e.conversation_id IS NULL
                 ORDER BY c.started_at ASC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![agent_id, limit], conversation_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Whether extraction has already been attempted for this conversation.
pub async fn is_extracted(db: &Database, conversation_id: &str) -> Result<bool, MnemoError> {
    let conversation_id = conversation_id.to_owned();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM extraction_log WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}
