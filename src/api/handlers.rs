//! Request handlers

use axum::{
    extract::{Multipart, Query, State},
    http::HeaderMap,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::ImageSize;
use crate::error::{AppError, Result};
use crate::seed::record::{HistoryPage, SeedRecord};
use crate::seed::run_lock;
use crate::suggest::{DEFAULT_SUGGESTIONS, MAX_SUGGESTIONS};
use crate::AppState;

const MAX_PROMPT_CHARS: usize = 400;
const MAX_LOCK: u32 = 100;
const MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_HISTORY_LIMIT: usize = 50;

const DISALLOWED_WORDS: &[&str] = &["nsfw", "gore", "hate", "abuse"];

/// Body of a generation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub prompt: String,
    pub override_seed_url: Option<String>,
    pub generations_lock: Option<u32>,
    pub size: Option<ImageSize>,
}

/// Successful generation: the new record plus queue telemetry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub record: SeedRecord,
    pub pending_count: u64,
    pub estimated_wait_ms: u64,
}

/// POST /api/generate
pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>> {
    // Admission and validation fail fast, before a queue slot is consumed
    let identity = client_identity(&headers);
    if !state.admission.allow(identity.as_deref()) {
        return Err(AppError::AdmissionDenied);
    }

    let prompt = validate_prompt(&body.prompt)?;
    validate_lock(body.generations_lock)?;

    let current = state.seeds.current().await?;
    run_lock::gate(current.remaining_generations, body.generations_lock)?;

    let seed_url = body
        .override_seed_url
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            if current.url.is_empty() {
                None
            } else {
                Some(current.url.clone())
            }
        });

    // The conditioning image is best effort; generation proceeds without it
    let seed_image = match &seed_url {
        Some(url) => load_seed_image(&state, url).await,
        None => None,
    };

    let size = body.size.unwrap_or_default();
    let strategy = state.strategy.clone();
    let job_prompt = prompt.clone();

    let handle = state.queue.enqueue(async move {
        strategy
            .produce(&job_prompt, seed_image.as_deref(), size)
            .await
    })?;
    let bytes = handle.wait().await?;

    let remaining = run_lock::next_remaining(current.remaining_generations, body.generations_lock);
    let record = state.seeds.publish(&bytes, &prompt, remaining).await?;

    info!(id = %record.id, remaining, "Seed evolved");

    Ok(Json(GenerateResponse {
        record,
        pending_count: state.queue.pending_count(),
        estimated_wait_ms: state.queue.estimated_wait_ms(),
    }))
}

/// GET /api/current
pub async fn current(State(state): State<Arc<AppState>>) -> Result<Json<SeedRecord>> {
    Ok(Json(state.seeds.current().await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

/// GET /api/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(AppError::InvalidInput("Invalid limit".to_string()));
    }

    // An explicitly empty cursor means no cursor
    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());
    let page = state.seeds.history(limit, cursor).await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    pub id: String,
}

/// GET /api/frame
pub async fn frame(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FrameQuery>,
) -> Result<Json<SeedRecord>> {
    if query.id.is_empty() {
        return Err(AppError::InvalidInput("Missing id".to_string()));
    }

    state
        .seeds
        .get_by_id(&query.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(query.id))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub prompt: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

/// GET /api/suggest
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<SuggestResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    if limit == 0 || limit > MAX_SUGGESTIONS {
        return Err(AppError::InvalidInput(format!(
            "Limit must be between 1 and {}",
            MAX_SUGGESTIONS
        )));
    }

    let base = query.prompt.as_deref().unwrap_or("");
    let suggestions = state.suggestions.suggest(base, limit).await;
    Ok(Json(SuggestResponse { suggestions }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// POST /api/upload-seed
pub async fn upload_seed(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("seed.png").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !matches!(content_type.as_str(), "image/png" | "image/jpeg") {
            return Err(AppError::InvalidInput("Invalid type".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Malformed upload: {}", e)))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::InvalidInput("File too large".to_string()));
        }
        if !matches!(
            crate::store::detect_image_format(&bytes),
            Some("png") | Some("jpg")
        ) {
            return Err(AppError::InvalidInput(
                "File content is not a PNG or JPEG".to_string(),
            ));
        }

        let url = state.seeds.save_upload(&bytes, &name, &content_type).await?;
        return Ok(Json(UploadResponse { url }));
    }

    Err(AppError::InvalidInput("Missing file".to_string()))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub seed: SeedRecord,
}

/// POST /api/reset
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<ResetResponse>> {
    let seed = state.seeds.reset().await?;
    Ok(Json(ResetResponse {
        message: "Seed reset to genesis".to_string(),
        seed,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub time: chrono::DateTime<Utc>,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: Utc::now(),
    })
}

/// Caller identity for admission control: first hop of x-forwarded-for
fn client_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_prompt(prompt: &str) -> Result<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Prompt cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_PROMPT_CHARS {
        return Err(AppError::InvalidInput(format!(
            "Prompt cannot exceed {} characters",
            MAX_PROMPT_CHARS
        )));
    }

    let lower = trimmed.to_lowercase();
    if DISALLOWED_WORDS.iter().any(|w| lower.contains(w)) {
        return Err(AppError::InvalidInput(
            "Prompt contains disallowed content".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

fn validate_lock(lock: Option<u32>) -> Result<()> {
    match lock {
        Some(0) => Err(AppError::InvalidInput(
            "Generations lock must be positive".to_string(),
        )),
        Some(l) if l > MAX_LOCK => Err(AppError::InvalidInput(format!(
            "Generations lock cannot exceed {}",
            MAX_LOCK
        ))),
        _ => Ok(()),
    }
}

/// Resolve the conditioning image behind a URL: data URLs decode in place,
/// store-local URLs read from the blob store, anything else is fetched
/// remotely under the configured timeout. Failures log and yield `None`.
async fn load_seed_image(state: &AppState, url: &str) -> Option<Vec<u8>> {
    if let Some(data) = url.strip_prefix("data:") {
        let b64 = data.splitn(2, ',').nth(1)?;
        return match BASE64.decode(b64.as_bytes()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed data URL seed");
                None
            }
        };
    }

    match state.seeds.resolve_image(url).await {
        Ok(Some(bytes)) => return Some(bytes),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "Failed to read local seed image");
            return None;
        }
    }

    match state.http.get(url).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                debug!(error = %e, "Failed to read remote seed image body");
                None
            }
        },
        Ok(response) => {
            debug!(status = %response.status(), "Remote seed image fetch refused");
            None
        }
        Err(e) => {
            debug!(error = %e, "Failed to fetch remote seed image");
            None
        }
    }
}
