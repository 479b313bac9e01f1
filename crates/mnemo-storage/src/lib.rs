// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the memory subsystem.
//!
//! One database file holds conversation segments, extracted facts, their
//! occurrence audit trail, and the extraction log. All access goes through
//! a single [`Database`] handle; tokio-rusqlite serializes every statement
//! onto one background thread, so the connection is the single writer and
//! WAL mode keeps readers unblocked.
//!
//! Schema lives in `migrations/` and is applied by refinery on open.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::{
    blob_to_vec, vec_to_blob, ConversationRow, ExtractionLogRow, ExtractionOutcome,
    FactOccurrenceRow, FactRow, MessageRow,
};
