//! Shared test doubles for pipeline tests

use crate::error::{Error, Result};
use crate::media::{Frame, MediaDecomposer, MediaInfo};
use crate::provider::{CapabilityProvider, CapabilitySet, ChatMessage, TranscriptSegment};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Scriptable in-memory provider. Captions and chat replies are queues
/// consumed in call order, with fixed fallbacks once drained.
pub struct MockProvider {
    caps: CapabilitySet,
    segments: Mutex<Vec<TranscriptSegment>>,
    caption_queue: Mutex<VecDeque<String>>,
    chat_queue: Mutex<VecDeque<String>>,
    caption_failures: AtomicUsize,
    chat_failures: AtomicUsize,
    embeddings: Mutex<HashMap<String, Vec<f32>>>,
    default_vector: Mutex<Vec<f32>>,
    transcribe_count: AtomicUsize,
    caption_count: AtomicUsize,
    embed_count: AtomicUsize,
    chat_count: AtomicUsize,
}

impl MockProvider {
    pub fn with_caps(caps: CapabilitySet) -> Self {
        Self {
            caps,
            segments: Mutex::new(Vec::new()),
            caption_queue: Mutex::new(VecDeque::new()),
            chat_queue: Mutex::new(VecDeque::new()),
            caption_failures: AtomicUsize::new(0),
            chat_failures: AtomicUsize::new(0),
            embeddings: Mutex::new(HashMap::new()),
            default_vector: Mutex::new(vec![1.0, 0.0, 0.0]),
            transcribe_count: AtomicUsize::new(0),
            caption_count: AtomicUsize::new(0),
            embed_count: AtomicUsize::new(0),
            chat_count: AtomicUsize::new(0),
        }
    }

    pub fn full() -> Self {
        Self::with_caps(CapabilitySet {
            transcribe: true,
            caption: true,
            embed: true,
            chat: true,
        })
    }

    pub fn set_segments(&self, segments: Vec<TranscriptSegment>) {
        *self.segments.lock().unwrap() = segments;
    }

    pub fn push_caption(&self, text: &str) {
        self.caption_queue.lock().unwrap().push_back(text.to_string());
    }

    pub fn push_chat(&self, text: &str) {
        self.chat_queue.lock().unwrap().push_back(text.to_string());
    }

    /// The next `caption` call fails with a fatal provider error.
    pub fn fail_next_caption_fatal(&self) {
        self.caption_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// The next `chat` call fails with a fatal provider error.
    pub fn fail_next_chat_fatal(&self) {
        self.chat_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_embedding(&self, text: &str, vector: Vec<f32>) {
        self.embeddings.lock().unwrap().insert(text.to_string(), vector);
    }

    pub fn set_default_vector(&self, vector: Vec<f32>) {
        *self.default_vector.lock().unwrap() = vector;
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_count.load(Ordering::SeqCst)
    }

    pub fn caption_calls(&self) -> usize {
        self.caption_count.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_count.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityProvider for MockProvider {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    async fn transcribe(&self, _audio: &Path) -> Result<Vec<TranscriptSegment>> {
        if !self.caps.transcribe {
            return Err(Error::Unsupported("transcription"));
        }
        self.transcribe_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.segments.lock().unwrap().clone())
    }

    async fn caption(&self, _frames: &[Frame], _prompt: &str) -> Result<String> {
        if !self.caps.caption {
            return Err(Error::Unsupported("captioning"));
        }
        self.caption_count.fetch_add(1, Ordering::SeqCst);
        if self
            .caption_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::ProviderFatal("scripted failure".into()));
        }
        Ok(self
            .caption_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "movement observed".to_string()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if !self.caps.embed {
            return Err(Error::Unsupported("embedding"));
        }
        self.embed_count.fetch_add(1, Ordering::SeqCst);
        let map = self.embeddings.lock().unwrap();
        let default = self.default_vector.lock().unwrap().clone();
        Ok(texts
            .iter()
            .map(|t| map.get(t).cloned().unwrap_or_else(|| default.clone()))
            .collect())
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        if !self.caps.chat {
            return Err(Error::Unsupported("chat"));
        }
        self.chat_count.fetch_add(1, Ordering::SeqCst);
        if self
            .chat_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::ProviderFatal("scripted failure".into()));
        }
        Ok(self
            .chat_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "mock answer".to_string()))
    }
}

/// Decomposer that fabricates frames without touching ffmpeg. Frame
/// paths need not exist; cleanup tolerates missing files.
pub struct MockDecomposer {
    pub duration_sec: f64,
    pub fail_probe: bool,
}

impl MockDecomposer {
    pub fn with_duration(duration_sec: f64) -> Self {
        Self {
            duration_sec,
            fail_probe: false,
        }
    }

    pub fn failing_probe() -> Self {
        Self {
            duration_sec: 0.0,
            fail_probe: true,
        }
    }

    fn fake_frames(timestamps: Vec<f64>) -> Vec<Frame> {
        timestamps
            .into_iter()
            .map(|ts| Frame {
                path: std::env::temp_dir().join(format!("mock_frame_{}.jpg", Uuid::new_v4())),
                timestamp_sec: ts,
            })
            .collect()
    }
}

#[async_trait]
impl MediaDecomposer for MockDecomposer {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        if self.fail_probe {
            return Err(Error::Decode(format!("Unreadable source {:?}", path)));
        }
        Ok(MediaInfo {
            duration_sec: self.duration_sec,
            width: Some(640),
            height: Some(480),
            file_size_bytes: 1234,
        })
    }

    async fn extract_audio(&self, _path: &Path) -> Result<PathBuf> {
        let out = std::env::temp_dir().join(format!("mock_audio_{}.wav", Uuid::new_v4()));
        std::fs::write(&out, b"")?;
        Ok(out)
    }

    async fn sample_frames(&self, _path: &Path, fps: f64, max_frames: usize) -> Result<Vec<Frame>> {
        let total = ((self.duration_sec * fps) as usize).min(max_frames);
        Ok(Self::fake_frames(
            (0..total).map(|i| i as f64 / fps).collect(),
        ))
    }

    async fn sample_window(
        &self,
        _path: &Path,
        start_sec: f64,
        end_sec: f64,
        count: usize,
    ) -> Result<Vec<Frame>> {
        Ok(Self::fake_frames(crate::media::window_timestamps(
            start_sec, end_sec, count,
        )))
    }
}
