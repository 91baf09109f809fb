//! Media decomposition: probe, audio extraction, frame sampling
//!
//! All decoding goes through ffmpeg/ffprobe subprocesses. The trait
//! exists so pipeline code can be exercised without real media files.
//! Any failure in this layer is [`Error::Decode`].

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(600);
const FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Probed media metadata
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration_sec: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size_bytes: u64,
}

impl MediaInfo {
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

/// A sampled video frame on disk with its source timestamp
#[derive(Debug, Clone)]
pub struct Frame {
    pub path: PathBuf,
    pub timestamp_sec: f64,
}

/// Decomposes media into audio and timestamped frames
#[async_trait]
pub trait MediaDecomposer: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Extract the audio track as 16 kHz mono WAV; returns the temp path.
    async fn extract_audio(&self, path: &Path) -> Result<PathBuf>;

    /// Sample frames across the whole video at `fps`, capped at `max_frames`.
    async fn sample_frames(&self, path: &Path, fps: f64, max_frames: usize) -> Result<Vec<Frame>>;

    /// Sample `count` evenly spaced frames within `[start_sec, end_sec]`.
    async fn sample_window(
        &self,
        path: &Path,
        start_sec: f64,
        end_sec: f64,
        count: usize,
    ) -> Result<Vec<Frame>>;
}

/// Evenly spaced timestamps within a window; a single frame lands in
/// the middle.
pub fn window_timestamps(start_sec: f64, end_sec: f64, count: usize) -> Vec<f64> {
    let duration = end_sec - start_sec;
    if duration <= 0.0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![start_sec + duration / 2.0];
    }
    let step = duration / (count - 1) as f64;
    (0..count).map(|i| start_sec + i as f64 * step).collect()
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Parse ffprobe `-print_format json` output into metadata.
fn parse_probe_output(raw: &str, file_size_bytes: u64) -> Result<MediaInfo> {
    let parsed: ProbeOutput = serde_json::from_str(raw)
        .map_err(|e| Error::Decode(format!("Unparseable ffprobe output: {}", e)))?;

    let duration_sec = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(MediaInfo {
        duration_sec,
        width: video_stream.and_then(|s| s.width),
        height: video_stream.and_then(|s| s.height),
        file_size_bytes,
    })
}

/// ffmpeg/ffprobe-backed decomposer
#[derive(Debug, Default, Clone)]
pub struct FfmpegDecomposer;

impl FfmpegDecomposer {
    pub fn new() -> Self {
        Self
    }

    async fn run(cmd: &mut Command, timeout: Duration, what: &str) -> Result<Vec<u8>> {
        let future = cmd.stdin(Stdio::null()).output();
        let output = tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| Error::Decode(format!("{} timed out", what)))?
            .map_err(|e| Error::Decode(format!("{} failed to start: {}", what, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Decode(format!(
                "{} exited with {}: {}",
                what,
                output.status,
                stderr.chars().take(400).collect::<String>()
            )));
        }
        Ok(output.stdout)
    }

    fn scratch_dir(prefix: &str) -> Result<PathBuf> {
        let dir = std::env::temp_dir().join(format!("{}_{}", prefix, Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[async_trait]
impl MediaDecomposer for FfmpegDecomposer {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let file_size_bytes = std::fs::metadata(path)
            .map_err(|e| Error::Decode(format!("Unreadable source {:?}: {}", path, e)))?
            .len();

        let mut cmd = Command::new("ffprobe");
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let stdout = Self::run(&mut cmd, PROBE_TIMEOUT, "ffprobe").await?;
        parse_probe_output(&String::from_utf8_lossy(&stdout), file_size_bytes)
    }

    async fn extract_audio(&self, path: &Path) -> Result<PathBuf> {
        let out = std::env::temp_dir().join(format!("clipmind_audio_{}.wav", Uuid::new_v4()));
        debug!("Extracting audio from {:?} to {:?}", path, out);

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-i")
            .arg(path)
            .args(["-ar", "16000", "-ac", "1", "-f", "wav", "-y"])
            .arg(&out);
        Self::run(&mut cmd, EXTRACT_TIMEOUT, "ffmpeg audio extraction").await?;
        Ok(out)
    }

    async fn sample_frames(&self, path: &Path, fps: f64, max_frames: usize) -> Result<Vec<Frame>> {
        let info = self.probe(path).await?;
        let total = ((info.duration_sec * fps) as usize).min(max_frames);
        if total == 0 || fps <= 0.0 {
            return Ok(Vec::new());
        }

        let dir = Self::scratch_dir("clipmind_frames")?;
        debug!("Sampling up to {} frames at {} fps into {:?}", total, fps, dir);

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-i")
            .arg(path)
            .args(["-vf", &format!("fps={}", fps)])
            .args(["-frames:v", &total.to_string(), "-q:v", "2", "-y"])
            .arg(dir.join("frame_%06d.jpg"));
        Self::run(&mut cmd, EXTRACT_TIMEOUT, "ffmpeg frame sampling").await?;

        let mut frames = Vec::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "jpg").unwrap_or(false))
            .collect();
        entries.sort();

        for path in entries.into_iter().take(max_frames) {
            // frame_%06d.jpg is 1-indexed
            let index: usize = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.rsplit('_').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(1);
            frames.push(Frame {
                timestamp_sec: (index.saturating_sub(1)) as f64 / fps,
                path,
            });
        }
        Ok(frames)
    }

    async fn sample_window(
        &self,
        path: &Path,
        start_sec: f64,
        end_sec: f64,
        count: usize,
    ) -> Result<Vec<Frame>> {
        let dir = Self::scratch_dir("clipmind_window")?;
        let mut frames = Vec::new();

        for (i, ts) in window_timestamps(start_sec, end_sec, count).into_iter().enumerate() {
            let out = dir.join(format!("window_{:03}.jpg", i));
            let mut cmd = Command::new("ffmpeg");
            cmd.args(["-ss", &format!("{:.3}", ts)])
                .arg("-i")
                .arg(path)
                .args(["-frames:v", "1", "-q:v", "2", "-y"])
                .arg(&out);
            // A single missing frame near the end of the stream is not
            // worth failing the whole window.
            if Self::run(&mut cmd, FRAME_TIMEOUT, "ffmpeg frame seek").await.is_err() {
                continue;
            }
            if out.exists() && std::fs::metadata(&out).map(|m| m.len() > 0).unwrap_or(false) {
                frames.push(Frame {
                    path: out,
                    timestamp_sec: ts,
                });
            }
        }
        Ok(frames)
    }
}

/// Remove frame scratch files and their parent directory.
pub fn cleanup_frames(frames: &[Frame]) {
    for frame in frames {
        let _ = std::fs::remove_file(&frame.path);
    }
    if let Some(dir) = frames.first().and_then(|f| f.path.parent()) {
        let _ = std::fs::remove_dir(dir);
    }
}
