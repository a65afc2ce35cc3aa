//! Gemini API client for the generative pipeline steps
//!
//! One client per model tier: the full flash model drives query synthesis
//! and roadmap generation, the lite model drives grading.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::PipelineError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Model used for query + roadmap synthesis.
pub const GENERATION_MODEL: &str = "gemini-2.5-flash";
/// Lightweight model used for context grading.
pub const GRADING_MODEL: &str = "gemini-2.0-flash-lite";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                model
            ),
        }
    }

    /// Generate a response for `prompt` under a system instruction.
    pub async fn generate(&self, prompt: &str, system_instruction: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Config(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 4096,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            },
        };

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                PipelineError::Llm(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(PipelineError::Llm(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            PipelineError::Llm(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| PipelineError::Llm("Empty response from Gemini".to_string()))?;

        Ok(answer)
    }
}

/// Strip markdown code fences the model wraps around JSON payloads.
pub fn strip_json_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "heat pump rebates 78704".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 4096,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are an energy advisor".to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request);
        assert!(json.is_ok());
        assert!(json.unwrap().contains("heat pump rebates 78704"));
    }

    #[test]
    fn test_strip_json_fences() {
        assert_eq!(strip_json_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_json_fences("  [\"a\"]  "), "[\"a\"]");
    }
}
