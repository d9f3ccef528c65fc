//! Shared-Seed Image Generation Gateway
//!
//! One globally shared image "seed" evolved by many independent clients.
//! Generation requests are admitted per caller identity, serialized through
//! a FIFO queue in front of the external image backend, and published to a
//! blob store where any number of readers poll the current record.

pub mod admission;
pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod queue;
pub mod seed;
pub mod store;
pub mod suggest;
pub mod sync;

pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;

use admission::AdmissionControl;
use backend::{GenerationStrategy, HttpBackend};
use config::Settings;
use queue::{GenerationQueue, QueueConfig};
use seed::SeedStore;
use store::{BlobStore, FsStore};
use suggest::SuggestionEngine;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub admission: AdmissionControl,
    pub queue: GenerationQueue,
    pub strategy: Arc<GenerationStrategy>,
    pub seeds: SeedStore,
    pub suggestions: SuggestionEngine,
    /// Client for fetching remote conditioning images
    pub http: reqwest::Client,
}

impl AppState {
    /// Wire up every component from settings. Must run inside a tokio
    /// runtime (the queue spawns its worker task).
    pub fn from_settings(settings: Settings) -> Result<Arc<Self>> {
        let blobs: Arc<dyn BlobStore> = Arc::new(FsStore::new(
            &settings.storage.base_path,
            &settings.storage.url_prefix,
        ));
        let seeds = SeedStore::new(blobs);

        let backend = Arc::new(HttpBackend::new(&settings.backend)?);
        let strategy = Arc::new(GenerationStrategy::new(
            backend,
            Duration::from_millis(settings.generation.call_timeout_ms),
        ));

        let suggestions = SuggestionEngine::new(&settings.backend)?;

        let admission = AdmissionControl::new(
            Duration::from_secs(settings.admission.window_secs),
            settings.admission.enabled,
        );

        let queue = GenerationQueue::with_config(QueueConfig {
            max_queue_size: settings.generation.max_queue_size,
            initial_avg_duration_ms: settings.generation.initial_avg_duration_ms,
        });

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.generation.seed_fetch_timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Arc::new(Self {
            settings,
            admission,
            queue,
            strategy,
            seeds,
            suggestions,
            http,
        }))
    }
}
