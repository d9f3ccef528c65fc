//! Retry and fallback policy for a single generation
//!
//! Two tagged paths: an image-conditioned edit (best effort, tried first
//! whenever a conditioning image is available) and unconditioned synthesis
//! (the last resort). Every backend call is bounded by a hard timeout and
//! retried exactly once. An exhausted edit path falls through silently to
//! synthesis; an exhausted synthesis path is terminal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::{ImageBackend, ImageSize};
use crate::error::{AppError, Result};

/// The two ways a generation can be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPath {
    Edit,
    Synthesize,
}

impl GenerationPath {
    fn label(&self) -> &'static str {
        match self {
            GenerationPath::Edit => "edit",
            GenerationPath::Synthesize => "synthesize",
        }
    }
}

/// Decides edit-vs-synthesize and applies the bounded retry policy
pub struct GenerationStrategy {
    backend: Arc<dyn ImageBackend>,
    call_timeout: Duration,
}

impl GenerationStrategy {
    pub fn new(backend: Arc<dyn ImageBackend>, call_timeout: Duration) -> Self {
        Self {
            backend,
            call_timeout,
        }
    }

    /// Produce image bytes for `prompt`, conditioned on `seed_image` when
    /// one is available.
    pub async fn produce(
        &self,
        prompt: &str,
        seed_image: Option<&[u8]>,
        size: ImageSize,
    ) -> Result<Vec<u8>> {
        if let Some(image) = seed_image {
            match self
                .attempt(GenerationPath::Edit, || self.backend.edit(image, prompt))
                .await
            {
                Ok(bytes) => return Ok(bytes),
                // A conditioned edit is an enhancement, not a requirement
                Err(err) => {
                    debug!(error = %err, "Edit path exhausted; falling back to synthesis")
                }
            }
        }

        self.attempt(GenerationPath::Synthesize, || {
            self.backend.synthesize(prompt, size)
        })
        .await
    }

    /// Run one path's call with a single retry; both attempts bounded by the
    /// hard timeout
    async fn attempt<F, Fut>(&self, path: GenerationPath, call: F) -> Result<Vec<u8>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        match self.bounded(path, call()).await {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                debug!(path = path.label(), error = %err, "Attempt failed; retrying once");
                self.bounded(path, call()).await
            }
        }
    }

    async fn bounded<Fut>(&self, path: GenerationPath, fut: Fut) -> Result<Vec<u8>>
    where
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::BackendTimeout(format!(
                "{} call exceeded {}ms",
                path.label(),
                self.call_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend that fails the first `edit_failures` / `synth_failures`
    /// calls on each path, then succeeds
    struct ScriptedBackend {
        edit_failures: u32,
        synth_failures: u32,
        edit_calls: AtomicU32,
        synth_calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedBackend {
        fn new(edit_failures: u32, synth_failures: u32) -> Self {
            Self {
                edit_failures,
                synth_failures,
                edit_calls: AtomicU32::new(0),
                synth_calls: AtomicU32::new(0),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl ImageBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn edit(&self, _image: &[u8], _prompt: &str) -> Result<Vec<u8>> {
            let call = self.edit_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if call <= self.edit_failures {
                return Err(AppError::BackendFailure("edit refused".to_string()));
            }
            Ok(b"edited".to_vec())
        }

        async fn synthesize(&self, _prompt: &str, _size: ImageSize) -> Result<Vec<u8>> {
            let call = self.synth_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if call <= self.synth_failures {
                return Err(AppError::BackendFailure("synthesize refused".to_string()));
            }
            Ok(b"synthesized".to_vec())
        }
    }

    fn strategy(backend: Arc<ScriptedBackend>) -> GenerationStrategy {
        GenerationStrategy::new(backend, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_edit_preferred_when_seed_present() {
        let backend = Arc::new(ScriptedBackend::new(0, 0));
        let bytes = strategy(backend.clone())
            .produce("a fox", Some(b"seed"), ImageSize::Square)
            .await
            .unwrap();

        assert_eq!(bytes, b"edited");
        assert_eq!(backend.edit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_seed_skips_edit_path() {
        let backend = Arc::new(ScriptedBackend::new(0, 0));
        let bytes = strategy(backend.clone())
            .produce("a fox", None, ImageSize::Wide)
            .await
            .unwrap();

        assert_eq!(bytes, b"synthesized");
        assert_eq!(backend.edit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_edit_failure_falls_back_after_one_retry() {
        let backend = Arc::new(ScriptedBackend::new(2, 0));
        let bytes = strategy(backend.clone())
            .produce("a fox", Some(b"seed"), ImageSize::Square)
            .await
            .unwrap();

        assert_eq!(bytes, b"synthesized");
        assert_eq!(backend.edit_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_paths_exhausted_is_terminal() {
        let backend = Arc::new(ScriptedBackend::new(2, 2));
        let err = strategy(backend.clone())
            .produce("a fox", Some(b"seed"), ImageSize::Square)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "backend_failure");
        assert_eq!(backend.edit_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_synthesis_retry_succeeds() {
        let backend = Arc::new(ScriptedBackend::new(0, 1));
        let bytes = strategy(backend.clone())
            .produce("a fox", None, ImageSize::Square)
            .await
            .unwrap();

        assert_eq!(bytes, b"synthesized");
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_synthesis_hits_hard_timeout() {
        let mut backend = ScriptedBackend::new(0, 0);
        backend.delay = Some(Duration::from_secs(120));
        let strategy = GenerationStrategy::new(Arc::new(backend), Duration::from_secs(60));

        let err = strategy
            .produce("a fox", None, ImageSize::Square)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "backend_timeout");
    }
}
