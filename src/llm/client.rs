//! OpenAI-compatible chat-completions client (OpenAI, Groq, local servers).

use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use super::prompt::{generation_prompt, summary_prompt, GENERATION_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT};
use super::response::parse_completion;
use super::{GeneratedQuery, GenerationError, GenerationRequest, TextGenerator};
use crate::executor::QueryRows;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let mut base = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("chat/completions")
            .context("Failed to build completions endpoint")?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: 1024,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(system, user))
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Unavailable(format!("API error ({}): {}", status, body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(format!("invalid JSON body: {}", e)))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| GenerationError::Malformed("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedQuery, GenerationError> {
        let prompt = generation_prompt(request);
        tracing::debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            retry = request.directive.is_some(),
            "Requesting query generation"
        );
        let completion = self.complete(GENERATION_SYSTEM_PROMPT, &prompt).await?;
        parse_completion(&completion)
    }

    async fn summarize(
        &self,
        question: &str,
        query: &str,
        rows: &QueryRows,
    ) -> Result<String, GenerationError> {
        let answer = self
            .complete(SUMMARY_SYSTEM_PROMPT, &summary_prompt(question, query, rows))
            .await?;
        if answer.is_empty() {
            return Err(GenerationError::Malformed("empty summary".to_string()));
        }
        Ok(answer)
    }

    fn description(&self) -> String {
        format!("{} via {}", self.model, self.endpoint.host_str().unwrap_or("?"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = OpenAiCompatClient::new(DEFAULT_BASE_URL, "k", "m").unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://api.groq.com/openai/v1/chat/completions"
        );

        let client = OpenAiCompatClient::new("http://localhost:8080/v1/", "k", "m").unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(OpenAiCompatClient::new("not a url", "k", "m").is_err());
    }

    #[test]
    fn test_request_body() {
        let client = OpenAiCompatClient::new(DEFAULT_BASE_URL, "k", "llama-3.3-70b-versatile")
            .unwrap()
            .with_sampling(0.0, 256);
        let body = client.request_body("sys", "user");
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_description() {
        let client = OpenAiCompatClient::new(DEFAULT_BASE_URL, "k", "m").unwrap();
        assert_eq!(client.description(), "m via api.groq.com");
    }
}
