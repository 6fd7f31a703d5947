//! HTTP-backed `LlmProvider` and `EmbeddingModel`, talking to an
//! OpenAI-compatible chat-completions and embeddings API.

use async_trait::async_trait;
use chatcore::{ChatCoreError, ChatCoreResult, LlmCompletion, LlmProvider, LlmRequest, Role, TextChunkStream};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub struct LlmHttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmHttpClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn chat_body(&self, request: &LlmRequest, stream: bool) -> serde_json::Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system_prompt })];
        messages.extend(request.messages.iter().map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({ "role": role, "content": m.content })
        }));

        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }
}

#[async_trait]
impl LlmProvider for LlmHttpClient {
    async fn complete(&self, request: &LlmRequest) -> ChatCoreResult<LlmCompletion> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.chat_body(request, false))
            .send()
            .await
            .map_err(|e| ChatCoreError::Llm(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatCoreError::Llm(e.to_string()))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ChatCoreError::Llm(e.to_string()))?;

        let text = response["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let prompt_tokens = response["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let completion_tokens = response["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(LlmCompletion {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn complete_streaming(&self, request: &LlmRequest) -> ChatCoreResult<TextChunkStream> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.chat_body(request, true))
            .send()
            .await
            .map_err(|e| ChatCoreError::Llm(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatCoreError::Llm(e.to_string()))?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut response = response;
            let mut buffer = String::new();
            loop {
                match response.chunk().await {
                    Ok(Some(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(pos) = buffer.find("\n\n") {
                            let event = buffer[..pos].to_string();
                            buffer.drain(..pos + 2);
                            for line in event.lines() {
                                let Some(data) = line.strip_prefix("data: ") else { continue };
                                if data == "[DONE]" {
                                    return;
                                }
                                if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) {
                                    if let Some(delta) = parsed["choices"][0]["delta"]["content"].as_str() {
                                        if tx.send(Ok(delta.to_string())).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string())).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl chatcore::EmbeddingModel for LlmHttpClient {
    async fn embed_batch(&self, texts: &[String]) -> ChatCoreResult<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| ChatCoreError::Embedding(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatCoreError::Embedding(e.to_string()))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ChatCoreError::Embedding(e.to_string()))?;

        let data = response["data"]
            .as_array()
            .ok_or_else(|| ChatCoreError::Embedding("embeddings response missing data".to_string()))?;

        data.iter()
            .map(|entry| {
                entry["embedding"]
                    .as_array()
                    .ok_or_else(|| ChatCoreError::Embedding("embedding entry missing vector".to_string()))
                    .map(|vec| vec.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
            })
            .collect()
    }
}
