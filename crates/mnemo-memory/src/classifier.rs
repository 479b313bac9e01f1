// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Visibility classification for extracted facts.
//!
//! The extractor's suggested visibility is trusted only after hard
//! keyword and category rules have had their say. Secret facts never
//! propagate to other agents.

use serde::{Deserialize, Serialize};

/// Who may see a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Agent-specific operational details.
    Private,
    /// User preferences, people, general knowledge. The default.
    Shared,
    /// Credentials, medical, financial. Never leaves the owning agent.
    Secret,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Shared => "shared",
            Visibility::Secret => "secret",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Visibility::Private),
            "shared" => Some(Visibility::Shared),
            "secret" => Some(Visibility::Secret),
            _ => None,
        }
    }
}

const SECRET_CATEGORIES: &[&str] = &["credentials", "medical", "financial"];

const SECRET_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "passphrase",
    "secret",
    "api key",
    "apikey",
    "api_key",
    "access token",
    "access_token",
    "auth token",
    "auth_token",
    "private key",
    "private_key",
    "ssh key",
    "ssh_key",
    "credential",
    "secret key",
    "client secret",
    "diagnosis",
    "medical",
    "prescription",
    "medication",
    "symptom",
    "disease",
    "illness",
    "ssn",
    "social security",
    "credit card",
    "card number",
    "bank account",
    "routing number",
    "iban",
    "pin code",
    "pin number",
];

const PRIVATE_CATEGORIES: &[&str] = &["operational", "workflow", "internal"];

const PRIVATE_KEYWORDS: &[&str] = &[
    "workflow",
    "operational",
    "internal process",
    "internal procedure",
    "pipeline step",
    "agent instruction",
    "system prompt",
];

/// Classify a fact's visibility from its category, content, and the
/// extractor's suggestion. Hard rules win; an unrecognized suggestion
/// falls back to shared.
pub fn classify_visibility(category: &str, content: &str, suggested: Option<&str>) -> Visibility {
    let category = category.to_lowercase();
    let content = content.to_lowercase();

    if SECRET_CATEGORIES.contains(&category.as_str()) {
        return Visibility::Secret;
    }
    if SECRET_KEYWORDS.iter().any(|kw| content.contains(kw)) {
        return Visibility::Secret;
    }
    if PRIVATE_CATEGORIES.contains(&category.as_str()) {
        return Visibility::Private;
    }
    if PRIVATE_KEYWORDS.iter().any(|kw| content.contains(kw)) {
        return Visibility::Private;
    }

    suggested
        .and_then(Visibility::from_str_value)
        .unwrap_or(Visibility::Shared)
}
