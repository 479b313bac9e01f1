// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation buffering, grouped by session key.
//!
//! A buffer flushes when the session pauses (no message for the configured
//! timeout), when it reaches the turn cap, or on an explicit flush from the
//! caller. Flush hands the accumulated entries to a [`FlushHandler`]; the
//! buffer itself never touches storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use mnemo_core::MnemoError;
use tokio::task::JoinHandle;

/// One buffered message.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    pub role: String,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Provider-side message id, if the channel supplies one.
    pub message_id: Option<String>,
    /// Channel the message arrived on.
    pub channel: Option<String>,
}

/// The contents of one session buffer at flush time.
#[derive(Debug, Clone)]
pub struct FlushedSegment {
    pub session_key: String,
    pub entries: Vec<BufferEntry>,
    pub started_at: i64,
    pub ended_at: i64,
}

/// Receives flushed segments. Handler errors are logged and swallowed so a
/// downstream failure never disrupts message handling.
#[async_trait]
pub trait FlushHandler: Send + Sync + 'static {
    async fn handle_flush(&self, segment: FlushedSegment) -> Result<(), MnemoError>;
}

struct SessionState {
    entries: Vec<BufferEntry>,
    started_at: i64,
    last_activity_at: i64,
    timer: Option<JoinHandle<()>>,
}

struct BufferInner {
    sessions: Mutex<HashMap<String, SessionState>>,
    handler: Arc<dyn FlushHandler>,
    pause_timeout: Duration,
    max_turns: usize,
}

impl BufferInner {
    /// Remove a session from the map, cancelling its timer. Returns None
    /// for unknown or empty sessions.
    fn take(&self, session_key: &str) -> Option<FlushedSegment> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let state = sessions.remove(session_key)?;
        if let Some(timer) = state.timer {
            timer.abort();
        }
        if state.entries.is_empty() {
            return None;
        }
        Some(FlushedSegment {
            session_key: session_key.to_owned(),
            entries: state.entries,
            started_at: state.started_at,
            ended_at: state.last_activity_at,
        })
    }

    async fn dispatch(&self, segment: FlushedSegment) {
        let session_key = segment.session_key.clone();
        if let Err(error) = self.handler.handle_flush(segment).await {
            tracing::warn!(%session_key, %error, "flush handler failed");
        }
    }
}

/// Groups incoming messages by session and decides when a segment is
/// complete.
pub struct ConversationBuffer {
    inner: Arc<BufferInner>,
}

impl ConversationBuffer {
    pub fn new(
        handler: Arc<dyn FlushHandler>,
        pause_timeout: Duration,
        max_turns: usize,
    ) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                sessions: Mutex::new(HashMap::new()),
                handler,
                pause_timeout,
                max_turns,
            }),
        }
    }

    /// Buffer a message. Resets the session's pause timer; flushes inline
    /// if the turn cap is reached.
    pub async fn record(&self, session_key: &str, entry: BufferEntry) {
        let flush_now = {
            let mut sessions = self
                .inner
                .sessions
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let state = sessions
                .entry(session_key.to_owned())
                .or_insert_with(|| SessionState {
                    entries: Vec::new(),
                    started_at: entry.timestamp,
                    last_activity_at: entry.timestamp,
                    timer: None,
                });

            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.last_activity_at = entry.timestamp;
            state.entries.push(entry);

            if state.entries.len() >= self.inner.max_turns {
                true
            } else {
                state.timer = Some(self.spawn_timer(session_key.to_owned()));
                false
            }
        };

        if flush_now {
            self.flush_session(session_key).await;
        }
    }

    /// Flush one session now. No-op if the session is unknown or empty.
    pub async fn flush_session(&self, session_key: &str) {
        if let Some(segment) = self.inner.take(session_key) {
            self.inner.dispatch(segment).await;
        }
    }

    /// Flush every buffered session. Used on shutdown.
    pub async fn flush_all(&self) {
        let keys: Vec<String> = {
            let sessions = self
                .inner
                .sessions
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            sessions.keys().cloned().collect()
        };
        for key in keys {
            self.flush_session(&key).await;
        }
    }

    /// Number of sessions currently buffered.
    pub fn pending_sessions(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn spawn_timer(&self, session_key: String) -> JoinHandle<()> {
        let weak: Weak<BufferInner> = Arc::downgrade(&self.inner);
        let pause_timeout = self.inner.pause_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(pause_timeout).await;
            // If the buffer was dropped the segment is lost; flush_all on
            // shutdown is the caller's responsibility.
            if let Some(inner) = weak.upgrade() {
                if let Some(segment) = inner.take(&session_key) {
                    tracing::debug!(%session_key, "pause timeout reached, flushing");
                    inner.dispatch(segment).await;
                }
            }
        })
    }
}
