//! Common traits and types for image generation backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Requested output shape for text-to-image synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    #[default]
    Square,
    Wide,
    Tall,
}

impl ImageSize {
    /// Pixel dimensions understood by the backend API
    pub fn dimensions(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Wide => "1792x1024",
            ImageSize::Tall => "1024x1792",
        }
    }
}

/// Trait for the remote image generation capability.
///
/// Both calls are slow (seconds) and fallible; retry and fallback live in
/// [`crate::backend::strategy`], not here.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Image-conditioned edit: bias the output toward the supplied image
    async fn edit(&self, image: &[u8], prompt: &str) -> Result<Vec<u8>>;

    /// Unconditioned text-to-image synthesis
    async fn synthesize(&self, prompt: &str, size: ImageSize) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_dimensions() {
        assert_eq!(ImageSize::Square.dimensions(), "1024x1024");
        assert_eq!(ImageSize::Wide.dimensions(), "1792x1024");
        assert_eq!(ImageSize::Tall.dimensions(), "1024x1792");
    }

    #[test]
    fn test_size_wire_names() {
        assert_eq!(serde_json::to_string(&ImageSize::Square).unwrap(), "\"square\"");
        let parsed: ImageSize = serde_json::from_str("\"wide\"").unwrap();
        assert_eq!(parsed, ImageSize::Wide);
    }
}
