//! Networked vision-language provider.
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint. The model is asked
//! for a JSON object `{"text": ..., "confidence": ...}`; a model that ignores
//! the format and answers with plain text is still usable, with a confidence
//! estimated from the shape of the text.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RecognitionProvider, Recognized};
use crate::error::ProviderError;
use crate::models::config::{VisionConfig, VISION_PROVIDER_ID};
use crate::models::receipt::PreprocessedImage;

/// Prompt sent with every image unless the configuration overrides it.
pub const DEFAULT_PROMPT: &str = "Transcribe all text on this Indonesian purchase receipt exactly as printed, \
line by line, top to bottom. Respond with JSON only: \
{\"text\": \"<transcription with \\n line breaks>\", \"confidence\": <number between 0 and 1>}";

/// Vision-language recognition over HTTP.
#[derive(Clone)]
pub struct VisionProvider {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct VisionPayload {
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

impl VisionProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Build from configuration. `None` when no host is configured.
    pub fn from_config(config: &VisionConfig) -> Option<Self> {
        let host = config.host.as_deref()?;
        let mut provider = Self::new(host, &config.model);
        if let Some(key) = &config.api_key {
            provider = provider.with_api_key(key);
        }
        if let Some(prompt) = &config.prompt {
            provider = provider.with_prompt(prompt);
        }
        Some(provider)
    }

    /// Send a bearer token with every request.
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RecognitionProvider for VisionProvider {
    fn id(&self) -> &str {
        VISION_PROVIDER_ID
    }

    async fn recognize(&self, image: &PreprocessedImage) -> Result<Recognized, ProviderError> {
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image.bytes());

        let request = GenerateRequest {
            model: &self.model,
            prompt: &self.prompt,
            images: vec![base64_image],
            stream: false,
            format: "json",
        };

        let mut builder = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?.error_for_status()?;
        let generated: GenerateResponse = response.json().await?;
        debug!(model = %self.model, "Vision response: {}", generated.response);

        parse_vision_response(&generated.response)
    }
}

/// Interpret a model answer as recognized text.
fn parse_vision_response(response: &str) -> Result<Recognized, ProviderError> {
    let response = response.trim();
    if response.is_empty() {
        return Err(ProviderError::InvalidResponse("empty vision response".into()));
    }

    let start = response.find('{');
    let end = response.rfind('}');

    if let (Some(s), Some(e)) = (start, end) {
        if s < e {
            if let Ok(payload) = serde_json::from_str::<VisionPayload>(&response[s..=e]) {
                let text = payload.text.trim().to_string();
                // A model claiming confidence in nothing is not trusted.
                let confidence = match payload.confidence {
                    Some(_) if text.is_empty() => 0.0,
                    Some(confidence) => confidence,
                    None => heuristic_confidence(&text),
                };
                return Ok(Recognized::new(text, confidence));
            }
        }
    }

    // Plain-text answer.
    Ok(Recognized::new(response, heuristic_confidence(response)))
}

/// Rough confidence for text the model did not score itself.
fn heuristic_confidence(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    let len = text.chars().count();
    let base: f32 = if len < 20 {
        0.2
    } else if len < 100 {
        0.4
    } else if len < 300 {
        0.6
    } else {
        0.7
    };

    let has_digits = text.chars().any(|c| c.is_ascii_digit());
    let multi_line = text.lines().filter(|l| !l.trim().is_empty()).count() >= 3;

    let bonus: f32 = if has_digits { 0.05 } else { 0.0 } + if multi_line { 0.05 } else { 0.0 };

    (base + bonus).min(0.9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_json_payload() {
        let parsed = parse_vision_response(r#"{"text": "TOKO ABC\nTOTAL 10.000", "confidence": 0.85}"#).unwrap();
        assert_eq!(parsed.text, "TOKO ABC\nTOTAL 10.000");
        assert_eq!(parsed.confidence, 0.85);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let parsed = parse_vision_response("Here you go:\n{\"text\": \"WARUNG\", \"confidence\": 0.5}\nDone.").unwrap();
        assert_eq!(parsed.text, "WARUNG");
        assert_eq!(parsed.confidence, 0.5);
    }

    #[test]
    fn test_parse_plain_text_uses_heuristic() {
        let parsed = parse_vision_response("TOKO ABC\nJl. Merdeka 1\nTOTAL Rp 10.000").unwrap();
        assert_eq!(parsed.text, "TOKO ABC\nJl. Merdeka 1\nTOTAL Rp 10.000");
        // 38 chars, digits, three lines
        assert!((parsed.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_missing_confidence_uses_heuristic() {
        let parsed = parse_vision_response(r#"{"text": "OK"}"#).unwrap();
        assert!((parsed.confidence - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_empty_response_is_error() {
        assert!(matches!(
            parse_vision_response("   "),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_from_config_requires_host() {
        let mut config = VisionConfig::default();
        assert!(VisionProvider::from_config(&config).is_none());

        config.host = Some("http://localhost:11434/".to_string());
        let provider = VisionProvider::from_config(&config).unwrap();
        assert_eq!(provider.host(), "http://localhost:11434");
        assert_eq!(provider.model(), VisionConfig::default().model);
        assert_eq!(provider.id(), "vision");
    }
}
