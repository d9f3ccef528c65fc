//! Seed record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the shared seed at one point of its evolution.
///
/// Records are immutable once written: a new generation produces a new
/// record and replaces the "current" pointer, never mutates in place. The
/// superseded record lives on as a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRecord {
    /// Opaque identity, unique per generation outcome
    pub id: String,
    /// Resolvable location of the image payload
    pub url: String,
    /// Prompt that produced this image
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    /// Run-lock counter; 0 means the seed is free
    #[serde(default)]
    pub remaining_generations: u32,
}

/// One page of history, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<SeedRecord>,
    /// Opaque cursor denoting "everything strictly older"; `None` when the
    /// listing is exhausted
    pub next_cursor: Option<String>,
}
