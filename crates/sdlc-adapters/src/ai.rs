use async_trait::async_trait;

use crate::error::AdaptersError;

/// Boundary around the language-model SDK (spec.md §2 shared infrastructure,
/// §9 "dynamic JSON from the language model"). Workers never call an AI
/// SDK directly; they go through this trait so tests substitute
/// `FakeAiAdapter` for a real HTTP round-trip.
#[async_trait]
pub trait AiAdapter: Send + Sync {
    /// Sends `prompt` to `model_id` and returns the raw text completion.
    /// Callers are responsible for extracting and validating JSON out of
    /// the reply (spec.md §9) — this trait has no opinion on response
    /// shape.
    async fn complete(&self, model_id: &str, prompt: &str) -> Result<String, AdaptersError>;
}

/// Talks to an OpenAI-compatible chat-completions endpoint. The specific
/// provider is a deployment detail; any endpoint that accepts
/// `{model, messages}` and returns `{choices: [{message: {content}}]}`
/// works here.
pub struct HttpAiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAiAdapter {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key }
    }
}

#[async_trait]
impl AiAdapter for HttpAiAdapter {
    async fn complete(&self, model_id: &str, prompt: &str) -> Result<String, AdaptersError> {
        let mut request = self.client.post(format!("{}/chat/completions", self.base_url)).json(&serde_json::json!({
            "model": model_id,
            "messages": [{"role": "user", "content": prompt}],
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| AdaptersError::transient("ai completion", e))?;
        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(AdaptersError::transient(
                "ai completion",
                std::io::Error::other(format!("upstream status {status}")),
            ));
        }
        if !status.is_success() {
            return Err(AdaptersError::permanent("ai completion", format!("upstream status {status}")));
        }
        let body: serde_json::Value =
            response.json().await.map_err(|e| AdaptersError::permanent("ai completion", e.to_string()))?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdaptersError::permanent("ai completion", "missing choices[0].message.content"))
    }
}

/// Scripted adapter for tests: returns queued replies in FIFO order and
/// records every prompt it was asked to complete.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeAiAdapter {
    replies: parking_lot::Mutex<std::collections::VecDeque<String>>,
    pub prompts: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeAiAdapter {
    pub fn new(replies: impl IntoIterator<Item = String>) -> Self {
        Self {
            replies: parking_lot::Mutex::new(replies.into_iter().collect()),
            prompts: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AiAdapter for FakeAiAdapter {
    async fn complete(&self, _model_id: &str, prompt: &str) -> Result<String, AdaptersError> {
        self.prompts.lock().push(prompt.to_string());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| AdaptersError::permanent("ai completion", "no scripted reply left"))
    }
}
