//! HTTP backend client for an OpenAI-style images API

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::{ImageBackend, ImageSize};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

/// HTTP-based image generation backend
pub struct HttpBackend {
    name: String,
    client: Client,
    endpoint: String,
    api_key: String,
    edit_model: String,
    synthesize_model: String,
}

#[derive(Debug, Serialize)]
struct ApiSynthesizeRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiImageResponse {
    #[serde(default)]
    data: Vec<ApiImageData>,
}

#[derive(Debug, Deserialize)]
struct ApiImageData {
    #[serde(default)]
    b64_json: Option<String>,
}

impl HttpBackend {
    /// Create a new HTTP backend from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: "images-api".to_string(),
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            edit_model: config.edit_model.clone(),
            synthesize_model: config.synthesize_model.clone(),
        })
    }

    fn decode_response(&self, response: ApiImageResponse) -> Result<Vec<u8>> {
        let b64 = response
            .data
            .into_iter()
            .find_map(|img| img.b64_json)
            .ok_or_else(|| AppError::BackendFailure("No image returned".to_string()))?;

        BASE64
            .decode(b64.as_bytes())
            .map_err(|e| AppError::BackendFailure(format!("Malformed image payload: {}", e)))
    }

    async fn read_success(&self, response: reqwest::Response) -> Result<ApiImageResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BackendFailure(format!(
                "Backend returned {}: {}",
                status, body
            )));
        }

        response
            .json::<ApiImageResponse>()
            .await
            .map_err(|e| AppError::BackendFailure(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl ImageBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn edit(&self, image: &[u8], prompt: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/images/edits", self.endpoint);
        debug!(backend = %self.name, url = %url, "Sending edit request");

        let part = Part::bytes(image.to_vec())
            .file_name("seed.png")
            .mime_str("image/png")
            .map_err(|e| AppError::Internal(format!("Invalid multipart payload: {}", e)))?;

        let form = Form::new()
            .part("image", part)
            .text("model", self.edit_model.clone())
            .text("prompt", prompt.to_string())
            // Edits only accept the square size
            .text("size", ImageSize::Square.dimensions())
            .text("response_format", "b64_json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let api_response = self.read_success(response).await?;
        self.decode_response(api_response)
    }

    async fn synthesize(&self, prompt: &str, size: ImageSize) -> Result<Vec<u8>> {
        let url = format!("{}/v1/images/generations", self.endpoint);
        debug!(backend = %self.name, url = %url, size = size.dimensions(), "Sending synthesize request");

        let request = ApiSynthesizeRequest {
            model: &self.synthesize_model,
            prompt,
            size: size.dimensions(),
            response_format: "b64_json",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let api_response = self.read_success(response).await?;
        self.decode_response(api_response)
    }
}
