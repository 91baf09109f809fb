//! Capability provider interface
//!
//! Providers expose transcribe/caption/embed/chat as optionally-present
//! capabilities. Callers query [`CapabilityProvider::capabilities`]
//! before dispatching a stage and never branch on provider identity;
//! a missing capability is a skip, not an error.

mod http;

pub use http::HttpProvider;

use crate::error::{Error, Result};
use crate::media::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Cooperative cancellation for pipeline work. Cancelling stops the
/// issuing of new provider calls promptly; in-flight calls finish or
/// time out on their own, so partial multi-row writes never happen.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One transcribed speech segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// A chat message (role is "system", "user" or "assistant")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// The set of capabilities a provider supports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub transcribe: bool,
    pub caption: bool,
    pub embed: bool,
    pub chat: bool,
}

/// A provider of optionally-present model capabilities.
///
/// Every default method reports the capability as unsupported, so an
/// implementation only overrides what it can actually do. Errors
/// distinguish transient failures (retryable) from fatal ones.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self) -> CapabilitySet;

    async fn transcribe(&self, _audio: &Path) -> Result<Vec<TranscriptSegment>> {
        Err(Error::Unsupported("transcription"))
    }

    async fn caption(&self, _frames: &[Frame], _prompt: &str) -> Result<String> {
        Err(Error::Unsupported("captioning"))
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Unsupported("embedding"))
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(Error::Unsupported("chat"))
    }
}

const BACKOFF_BASE_MS: u64 = 500;

/// Run a provider call with bounded retry and exponential backoff.
/// Only transient errors are retried; unsupported and fatal errors
/// return immediately.
pub async fn with_retry<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay = Duration::from_millis(BACKOFF_BASE_MS << attempt);
                warn!(
                    "Transient provider error (attempt {}/{}): {}; retrying in {:?}",
                    attempt + 1,
                    max_retries,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::ProviderTransient("429".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::ProviderTransient("timeout".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::ProviderFatal("401".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Unsupported("embedding")) }
        })
        .await;
        assert!(matches!(result, Err(Error::Unsupported("embedding"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
