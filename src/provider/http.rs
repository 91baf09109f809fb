//! OpenAI-compatible HTTP provider
//!
//! Works against any endpoint speaking the OpenAI REST shape
//! (`/audio/transcriptions`, `/chat/completions`, `/embeddings`).
//! Capability presence is driven purely by configuration: an empty
//! model name means the capability is absent.

use super::{CapabilityProvider, CapabilitySet, ChatMessage, TranscriptSegment};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::media::Frame;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

pub struct HttpProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    // Bounds concurrent in-flight calls per provider instance.
    permits: Arc<Semaphore>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    segments: Vec<TranscriptionSegmentBody>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegmentBody {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn classify(err: reqwest::Error) -> Error {
        if err.is_timeout() || err.is_connect() {
            Error::ProviderTransient(err.to_string())
        } else {
            Error::ProviderFatal(err.to_string())
        }
    }

    /// Map an HTTP error status to the provider error taxonomy:
    /// 408/429/5xx are retryable, everything else is fatal.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>());
        if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error() {
            Err(Error::ProviderTransient(message))
        } else {
            Err(Error::ProviderFatal(message))
        }
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| Error::Other("provider permit pool closed".into()))
    }

    async fn post_chat(&self, body: serde_json::Value) -> Result<String> {
        let _permit = self.acquire_permit().await?;
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify)?;
        let parsed: ChatResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::classify)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(text.trim().to_string())
    }

    fn frame_data_url(frame: &Frame) -> Result<String> {
        let bytes = std::fs::read(&frame.path).map_err(|e| {
            Error::ProviderFatal(format!("Failed to read frame {:?}: {}", frame.path, e))
        })?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
    }
}

#[async_trait]
impl CapabilityProvider for HttpProvider {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            transcribe: !self.config.transcribe_model.is_empty(),
            caption: !self.config.vision_model.is_empty(),
            embed: !self.config.embed_model.is_empty(),
            chat: !self.config.chat_model.is_empty(),
        }
    }

    async fn transcribe(&self, audio: &Path) -> Result<Vec<TranscriptSegment>> {
        if self.config.transcribe_model.is_empty() {
            return Err(Error::Unsupported("transcription"));
        }
        let _permit = self.acquire_permit().await?;

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".into());
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("model", self.config.transcribe_model.clone())
            .text("response_format", "verbose_json");

        debug!("Transcribing {:?}", audio);
        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(Self::classify)?;
        let parsed: TranscriptionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::classify)?;

        if parsed.segments.is_empty() && !parsed.text.trim().is_empty() {
            // Some endpoints only return flat text.
            return Ok(vec![TranscriptSegment {
                start_sec: 0.0,
                end_sec: parsed.duration.unwrap_or(0.0),
                text: parsed.text.trim().to_string(),
            }]);
        }

        Ok(parsed
            .segments
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| TranscriptSegment {
                start_sec: s.start,
                end_sec: s.end,
                text: s.text.trim().to_string(),
            })
            .collect())
    }

    async fn caption(&self, frames: &[Frame], prompt: &str) -> Result<String> {
        if self.config.vision_model.is_empty() {
            return Err(Error::Unsupported("captioning"));
        }
        let mut content = vec![json!({"type": "text", "text": prompt})];
        for frame in frames {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": Self::frame_data_url(frame)?},
            }));
        }
        self.post_chat(json!({
            "model": self.config.vision_model,
            "messages": [{"role": "user", "content": content}],
            "max_tokens": 500,
        }))
        .await
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.config.embed_model.is_empty() {
            return Err(Error::Unsupported("embedding"));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let _permit = self.acquire_permit().await?;

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&json!({"model": self.config.embed_model, "input": texts}))
            .send()
            .await
            .map_err(Self::classify)?;
        let parsed: EmbeddingResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::classify)?;

        if parsed.data.len() != texts.len() {
            return Err(Error::ProviderFatal(format!(
                "Embedding count mismatch: sent {}, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        if self.config.chat_model.is_empty() {
            return Err(Error::Unsupported("chat"));
        }
        self.post_chat(json!({
            "model": self.config.chat_model,
            "messages": messages,
        }))
        .await
    }
}
