//! Prompt builder and answer gateway.
//!
//! [`build_prompt`] embeds the question and assembled context into a
//! fixed instructional template; the [`Generator`] trait is the seam to
//! the black-box generation service. Any failure surfaces as
//! [`PipelineError::Generation`]; the caller must never fabricate an
//! answer on failure.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::InferenceConfig;
use crate::error::{PipelineError, Result};

/// Build the generation prompt from a question and assembled context.
///
/// The template instructs the model to answer from the context only
/// and to say so when the answer is not present.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the question based on the provided context.\n\
         \n\
         Context:\n\
         {}\n\
         \n\
         Question: {}\n\
         \n\
         Answer based only on the context provided. If the answer is not in the context, say so.",
        context, question
    )
}

/// Black-box text generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

/// Generator calling the Hugging Face chat-completions endpoint.
///
/// Requires the `HF_TOKEN` environment variable.
pub struct HfGenerator {
    model: String,
    api_token: String,
    timeout_secs: u64,
}

impl HfGenerator {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_token = std::env::var("HF_TOKEN").map_err(|_| {
            PipelineError::Configuration("HF_TOKEN environment variable not set".to_string())
        })?;

        Ok(Self {
            model: config.generation_model.clone(),
            api_token,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Generator for HfGenerator {
    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let client = reqwest::Client::builder()
            // Generation is the slowest call in the pipeline.
            .timeout(Duration::from_secs(self.timeout_secs * 4))
            .build()
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let url = format!(
            "https://api-inference.huggingface.co/models/{}/v1/chat/completions",
            self.model
        );
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_new_tokens,
            "temperature": temperature,
        });

        let response = client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Generation(format!(
                "inference API error {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let answer = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                PipelineError::Generation("invalid response: missing choices[0].message.content".to_string())
            })?;

        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_question_and_context() {
        let prompt = build_prompt("What is Rust?", "[doc.txt | Chunk 0]\nRust is a language.");
        assert!(prompt.contains("Question: What is Rust?"));
        assert!(prompt.contains("Rust is a language."));
        assert!(prompt.contains("Answer based only on the context provided."));
    }
}
