use futures::{StreamExt, TryStreamExt};
use reqwest::Client;

use crate::llm::summarizer::{ByteStream, Summarizer};

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl OpenAIClient {
    const SYSTEM_PROMPT: &str = include_str!("./prompts/system_0.txt");

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
            model: <Self as Summarizer>::SUMMARIZER_MODEL.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn completion_body(&self, user_content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": [
                {
                    "role": "system",
                    "content": Self::SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": user_content
                }
            ]
        })
    }

    pub async fn send_streaming_completion_request(
        &self,
        user_content: &str,
    ) -> Result<reqwest::Response, OpenAIError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.completion_body(user_content))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            tracing::error!(status, %message, "Completion request rejected");
            return Err(OpenAIError::Api { status, message });
        }

        Ok(resp)
    }
}

impl Summarizer for OpenAIClient {
    const SUMMARIZER_MODEL: &'static str = "gpt-4o-mini";
    type Error = OpenAIError;

    #[tracing::instrument(skip_all, fields(model = %self.model, chars = transcript.len()))]
    async fn stream_summary(&self, transcript: &str) -> Result<ByteStream<OpenAIError>, OpenAIError> {
        let resp = self.send_streaming_completion_request(transcript).await?;

        Ok(resp.bytes_stream().map_err(OpenAIError::from).boxed())
    }
}
