//! Vision analysis client
//!
//! Talks to an Ollama-compatible endpoint running a multimodal model. The
//! analyzer is behind a trait so the pipeline can run with a stub in tests.

use crate::config::Settings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Output of analyzing a single image or video frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionAnalysis {
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    pub scene: Option<String>,
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Analyze the media file at `path`. An error means the vision service
    /// is unavailable; the pipeline continues without analysis.
    async fn analyze(&self, path: &Path) -> Result<VisionAnalysis>;
}

pub struct OllamaVisionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

const ANALYSIS_PROMPT: &str = "Describe this image for a photo library. Respond with JSON only, \
using keys: description (one sentence), tags (list of short lowercase keywords), \
objects (list of visible objects), scene (one or two words for the setting).";

impl OllamaVisionClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.vision_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("vision client: {}", e)))?;
        Ok(Self {
            client,
            base_url: settings.vision_host.trim_end_matches('/').to_string(),
            model: settings.vision_model.clone(),
        })
    }

    fn parse_analysis(raw: &str) -> VisionAnalysis {
        // models occasionally wrap the JSON in a code fence
        let trimmed = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        match serde_json::from_str::<VisionAnalysis>(trimmed) {
            Ok(mut analysis) => {
                analysis.tags = normalize_terms(analysis.tags);
                analysis.objects = normalize_terms(analysis.objects);
                if analysis
                    .description
                    .as_deref()
                    .map(|d| d.trim().is_empty())
                    .unwrap_or(false)
                {
                    analysis.description = None;
                }
                analysis
            }
            // free-text fallback: treat the whole response as a description
            Err(_) if !trimmed.is_empty() => VisionAnalysis {
                description: Some(trimmed.to_string()),
                ..Default::default()
            },
            Err(_) => VisionAnalysis::default(),
        }
    }
}

fn normalize_terms(terms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let t = term.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

#[async_trait]
impl VisionAnalyzer for OllamaVisionClient {
    async fn analyze(&self, path: &Path) -> Result<VisionAnalysis> {
        let bytes = tokio::fs::read(path).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        let request = GenerateRequest {
            model: &self.model,
            prompt: ANALYSIS_PROMPT,
            images: vec![encoded],
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ExternalService(format!("vision request: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ExternalService(format!(
                "vision service returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ExternalService(format!("vision response: {}", e)))?;

        Ok(Self::parse_analysis(&body.response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_well_formed_json() {
        let raw = r#"{"description": "A dog running on a beach.",
            "tags": ["Dog", "beach", "dog"], "objects": ["dog"], "scene": "beach"}"#;
        let analysis = OllamaVisionClient::parse_analysis(raw);
        assert_eq!(
            analysis.description.as_deref(),
            Some("A dog running on a beach.")
        );
        assert_eq!(analysis.tags, vec!["dog", "beach"]);
        assert_eq!(analysis.scene.as_deref(), Some("beach"));
    }

    #[test]
    fn parse_fenced_json() {
        let raw = "```json\n{\"description\": \"Sunset.\", \"tags\": [], \"objects\": [], \"scene\": null}\n```";
        let analysis = OllamaVisionClient::parse_analysis(raw);
        assert_eq!(analysis.description.as_deref(), Some("Sunset."));
    }

    #[test]
    fn parse_free_text_becomes_description() {
        let analysis = OllamaVisionClient::parse_analysis("Just a picture of a cat.");
        assert_eq!(
            analysis.description.as_deref(),
            Some("Just a picture of a cat.")
        );
        assert!(analysis.tags.is_empty());
    }

    #[test]
    fn parse_empty_yields_nothing() {
        let analysis = OllamaVisionClient::parse_analysis("   ");
        assert!(analysis.description.is_none());
    }
}
