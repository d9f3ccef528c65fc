//! Seed persistence on top of the blob store
//!
//! Layout: the current record lives at a fixed key; every successful
//! generation writes a PNG plus a JSON sidecar under a key embedding the
//! creation timestamp and record id. Timestamps are RFC3339 with `:` and
//! `.` replaced so keys stay lexically orderable by creation time; the id
//! suffix of a sidecar key doubles as the pagination cursor.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::seed::record::{HistoryPage, SeedRecord};
use crate::store::BlobStore;

const CURRENT_KEY: &str = "seed/current.json";
const HISTORY_PREFIX: &str = "seed/history/";
const UPLOADS_PREFIX: &str = "seed/uploads/";

const GENESIS_PROMPT: &str = "Genesis seed";
const RESET_PROMPT: &str = "Fresh start! Describe your first creation...";

/// 1x1 transparent PNG used to bootstrap an empty store
const GENESIS_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAH+wK3u7e3iQAAAABJRU5ErkJggg==";

const MAX_HISTORY_PAGE: usize = 200;

/// Domain layer over the blob store: current pointer, history, uploads
pub struct SeedStore {
    blobs: Arc<dyn BlobStore>,
}

impl SeedStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Read the current seed record, bootstrapping a genesis record when the
    /// store is empty
    pub async fn current(&self) -> Result<SeedRecord> {
        match self.blobs.get(CURRENT_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                info!("No current seed found; bootstrapping genesis");
                self.bootstrap(GENESIS_PROMPT).await
            }
        }
    }

    /// Persist a finished generation and republish it as the current seed.
    ///
    /// Only called once bytes are fully produced — the history pair is
    /// written before the current pointer moves, so no partial state is ever
    /// observable as "current".
    pub async fn publish(&self, bytes: &[u8], prompt: &str, remaining: u32) -> Result<SeedRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let stem = history_stem(created_at, &id);

        let url = self
            .blobs
            .put(&format!("{}.png", stem), bytes, "image/png")
            .await?;

        let record = SeedRecord {
            id,
            url,
            prompt: prompt.to_string(),
            created_at,
            remaining_generations: remaining,
        };

        self.blobs
            .put(
                &format!("{}.json", stem),
                &serde_json::to_vec_pretty(&record)?,
                "application/json",
            )
            .await?;

        self.set_current(&record).await?;

        debug!(id = %record.id, remaining, "Published new seed record");

        Ok(record)
    }

    async fn set_current(&self, record: &SeedRecord) -> Result<()> {
        self.blobs
            .put(
                CURRENT_KEY,
                &serde_json::to_vec_pretty(record)?,
                "application/json",
            )
            .await?;
        Ok(())
    }

    /// List history newest first. A cursor resolves to everything strictly
    /// older than the entry carrying that id, even when newer entries were
    /// inserted after the cursor was issued.
    pub async fn history(&self, limit: usize, cursor: Option<&str>) -> Result<HistoryPage> {
        let capped = limit.clamp(1, MAX_HISTORY_PAGE);
        // An empty cursor would substring-match every key
        let cursor = cursor.filter(|c| !c.is_empty());

        let mut keys: Vec<String> = self
            .blobs
            .list(HISTORY_PREFIX)
            .await?
            .into_iter()
            .filter(|k| k.ends_with(".json"))
            .collect();
        keys.sort_by(|a, b| b.cmp(a));

        let start = match cursor {
            Some(cursor) => keys
                .iter()
                .position(|k| k.contains(cursor))
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };

        let chosen: Vec<&String> = keys.iter().skip(start).take(capped).collect();

        let mut items = Vec::with_capacity(chosen.len());
        for key in &chosen {
            if let Some(bytes) = self.blobs.get(key).await? {
                items.push(serde_json::from_slice::<SeedRecord>(&bytes)?);
            }
        }

        let next_cursor = if start + capped < keys.len() {
            chosen.last().and_then(|k| id_of_key(k))
        } else {
            None
        };

        Ok(HistoryPage { items, next_cursor })
    }

    /// Look up a single history entry by record id
    pub async fn get_by_id(&self, id: &str) -> Result<Option<SeedRecord>> {
        if id.is_empty() {
            return Ok(None);
        }

        let suffix = format!("{}.json", id);
        let keys = self.blobs.list(HISTORY_PREFIX).await?;
        let Some(key) = keys.iter().find(|k| k.ends_with(&suffix)) else {
            return Ok(None);
        };

        match self.blobs.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store an uploaded conditioning image under a time-ordered key
    pub async fn save_upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        content_type: &str,
    ) -> Result<String> {
        let safe: String = original_name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            .collect();
        let safe = if safe.is_empty() { "seed.png" } else { &safe };

        let ts = timestamp_slug(Utc::now());
        let key = format!("{}{}_{}", UPLOADS_PREFIX, ts, safe);

        self.blobs.put(&key, bytes, content_type).await
    }

    /// Republish a fresh genesis record, recorded in history like any other
    /// generation
    pub async fn reset(&self) -> Result<SeedRecord> {
        info!("Resetting seed to genesis");
        self.bootstrap(RESET_PROMPT).await
    }

    /// Fetch the payload behind a store-local URL; `None` when the URL does
    /// not belong to this store
    pub async fn resolve_image(&self, url: &str) -> Result<Option<Vec<u8>>> {
        match self.blobs.key_for_url(url) {
            Some(key) => self.blobs.get(&key).await,
            None => Ok(None),
        }
    }

    async fn bootstrap(&self, prompt: &str) -> Result<SeedRecord> {
        let png = BASE64
            .decode(GENESIS_PNG_B64)
            .map_err(|e| AppError::Internal(format!("Corrupt genesis image: {}", e)))?;
        self.publish(&png, prompt, 0).await
    }
}

fn timestamp_slug(ts: DateTime<Utc>) -> String {
    // Nanosecond precision keeps keys unique and ordered even for
    // back-to-back publishes
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
        .replace([':', '.'], "-")
}

fn history_stem(ts: DateTime<Utc>, id: &str) -> String {
    format!("{}{}_{}", HISTORY_PREFIX, timestamp_slug(ts), id)
}

/// Extract the record id from a history sidecar key; ids contain no `_`,
/// so the last segment is always the id
fn id_of_key(key: &str) -> Option<String> {
    key.rsplit('_')
        .next()
        .and_then(|tail| tail.strip_suffix(".json"))
        .map(str::to_string)
}
