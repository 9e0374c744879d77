//! LLM-backed PII extraction.
//!
//! An [`ExtractionClient`] returns unlocated `(class, text)` pairs from an
//! external service; [`LlmDetector`] maps classes onto categories and
//! locates each value in the scanned content.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use kbase_core::{Error, ExtractionConfig, PiiCategory, Result};

use crate::pii::{Detection, DetectionSource, PiiSource};

const LLM_CONFIDENCE: f32 = 0.9;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One value reported by the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(rename = "class")]
    pub extraction_class: String,
    pub text: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    extractions: Vec<Extraction>,
}

/// Client for a structured-extraction service.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Extract PII values from `text`, hinting at the categories of interest.
    async fn extract(&self, text: &str, hints: &[PiiCategory]) -> Result<Vec<Extraction>>;
}

/// Map an extraction class name onto a category. Unknown classes map to `None`.
pub fn map_extraction_class(class: &str) -> Option<PiiCategory> {
    let normalized = class.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "phone_number" | "telephone" => Some(PiiCategory::Phone),
        "email_address" => Some(PiiCategory::Email),
        "social_security" | "social_security_number" => Some(PiiCategory::Ssn),
        "credential" | "passcode" => Some(PiiCategory::Password),
        "credit_card_number" | "card_number" => Some(PiiCategory::CreditCard),
        "secret" | "token" | "access_token" | "secret_key" => Some(PiiCategory::ApiKey),
        "street_address" => Some(PiiCategory::Address),
        other => other.parse().ok(),
    }
}

/// HTTP extraction client.
///
/// Sends `POST {endpoint}/extract` with `{text, categories, model}` and
/// expects `{"extractions": [{"class", "text", "attributes"}]}` back.
pub struct HttpExtractionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpExtractionClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn extract(&self, text: &str, hints: &[PiiCategory]) -> Result<Vec<Extraction>> {
        let url = format!("{}/extract", self.endpoint);
        let categories: Vec<&str> = hints.iter().map(|c| c.as_str()).collect();
        let body = json!({
            "text": text,
            "categories": categories,
            "model": self.model,
        });

        debug!("Requesting PII extraction from {} with model {}", url, self.model);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("Extraction request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!("API error {}: {}", status, body)));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("Invalid extraction response: {}", e)))?;
        Ok(parsed.extractions)
    }
}

/// PII source that delegates detection to an [`ExtractionClient`].
pub struct LlmDetector<C> {
    client: C,
}

impl<C: ExtractionClient> LlmDetector<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: ExtractionClient> PiiSource for LlmDetector<C> {
    async fn detect(&self, text: &str, categories: &[PiiCategory]) -> Result<Vec<Detection>> {
        let extractions = self.client.extract(text, categories).await?;

        // Repeated values are located at successive occurrences.
        let mut cursors: HashMap<&str, usize> = HashMap::new();
        let mut detections = Vec::new();

        for extraction in &extractions {
            let Some(category) = map_extraction_class(&extraction.extraction_class) else {
                debug!("Ignoring unknown extraction class '{}'", extraction.extraction_class);
                continue;
            };
            if !categories.contains(&category) || extraction.text.is_empty() {
                continue;
            }

            let from = cursors.get(extraction.text.as_str()).copied().unwrap_or(0);
            let Some(found) = text[from..].find(&extraction.text) else {
                debug!("Extracted {} value not found in content", category);
                continue;
            };
            let start = from + found;
            let end = start + extraction.text.len();
            cursors.insert(extraction.text.as_str(), end);

            detections.push(Detection {
                category,
                text: extraction.text.clone(),
                start,
                end,
                confidence: LLM_CONFIDENCE,
                source: DetectionSource::Llm,
            });
        }

        Ok(detections)
    }

    fn name(&self) -> &str {
        "llm"
    }
}
