//! Ingestion orchestration
//!
//! A single ingestion run takes one video through probe, transcription,
//! captioning, the dense caption cascade, and embedding backfill, then
//! settles the video's status. Stage failures degrade to named warnings
//! wherever the remaining artifacts are still useful; only decode and
//! store failures abort the run. Idempotency is keyed on content hash,
//! never on path.

use crate::cascade::{self, CascadeOptions};
use crate::chunk::{chunk_text, mean_pool};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::MediaDecomposer;
use crate::provider::{with_retry, CancelFlag, CapabilityProvider};
use crate::store::{ArtifactRecord, ArtifactType, Store, VideoRecord, VideoStatus};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Bytes of file head mixed into the content hash
const HASH_HEAD_BYTES: usize = 64 * 1024;

/// Content hash for idempotency: the first 64 KiB of the file plus its
/// size. Re-reading whole multi-gigabyte files per run is not worth it
/// when the head and length already discriminate real-world media.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let size = file.metadata()?.len();

    let mut head = vec![0u8; HASH_HEAD_BYTES];
    let mut read = 0;
    while read < head.len() {
        let n = file.read(&mut head[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }

    let mut hasher = Hasher::new();
    hasher.update(&head[..read]);
    hasher.update(size.to_string().as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

/// Per-run ingestion switches
#[derive(Debug, Clone, Serialize)]
pub struct IngestOptions {
    /// Run the cascade's window captioning layer
    pub captions: bool,
    /// Escalate captions through cascade layers 1 and 2
    pub cascade: bool,
    /// Frame sampling rate override (frames per second)
    pub fps_sample: Option<f64>,
    /// Override for the total sampled frame budget
    pub max_frames: Option<usize>,
    pub skip_embed: bool,
    /// Re-ingest even if the content hash is already known
    pub force: bool,
    pub dry_run: bool,
    pub topic: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            captions: true,
            cascade: false,
            fps_sample: None,
            max_frames: None,
            skip_embed: false,
            force: false,
            dry_run: false,
            topic: "general".into(),
        }
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    CompleteWithWarnings,
    Failed,
    Skipped,
    DryRun,
}

/// Structured per-video ingestion report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub status: ReportStatus,
    pub video_id: String,
    pub filename: String,
    pub duration_sec: f64,
    pub artifacts_count: usize,
    pub warnings: Vec<String>,
    pub elapsed_sec: f64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub planned_stages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    fn new(status: ReportStatus, video_id: &str, filename: &str) -> Self {
        Self {
            status,
            video_id: video_id.to_string(),
            filename: filename.to_string(),
            duration_sec: 0.0,
            artifacts_count: 0,
            warnings: Vec::new(),
            elapsed_sec: 0.0,
            planned_stages: Vec::new(),
            error: None,
        }
    }
}

/// Resolve the layer-0 frame budget to (frames per window, window
/// cap). Frames per window come from the sampling rate over the
/// window, capped by the configured per-window limit and by the
/// per-run budget spread across the captioned windows; when the video
/// has more windows than budgeted frames, the window count itself is
/// capped so the budget holds.
fn layer0_budget(config: &Config, options: &IngestOptions, duration_sec: f64) -> (usize, usize) {
    let fps = options.fps_sample.unwrap_or(config.ingest.fps_sample);
    let budget = options.max_frames.unwrap_or(config.ingest.max_frames).max(1);
    let window_count = ((duration_sec / config.cascade.window_secs).ceil() as usize).max(1);
    let max_windows = window_count.min(budget);
    let from_rate = ((config.cascade.window_secs * fps).ceil() as usize).max(1);
    let frames = from_rate
        .min(config.cascade.frames_per_window)
        .min((budget / max_windows).max(1));
    (frames, max_windows)
}

fn planned_stages(options: &IngestOptions, provider: &dyn CapabilityProvider) -> Vec<String> {
    let caps = provider.capabilities();
    let mut stages = vec!["probe".to_string()];
    if caps.transcribe {
        stages.push("transcription".into());
    }
    if options.captions && caps.caption {
        stages.push("captioning".into());
        if options.cascade && caps.chat {
            stages.push("cascade_escalation".into());
        }
    }
    if !options.skip_embed && caps.embed {
        stages.push("embedding".into());
    }
    stages
}

/// Ingest one video. Never returns `Err` for stage-level problems; the
/// report's status and warnings carry them. `Err` is reserved for
/// environment failures before a video row exists.
pub async fn ingest(
    store: &Store,
    provider: &dyn CapabilityProvider,
    media: &dyn MediaDecomposer,
    config: &Config,
    path: &Path,
    options: &IngestOptions,
    cancel: &CancelFlag,
) -> Result<IngestReport> {
    let started = Instant::now();

    let canonical = path
        .canonicalize()
        .map_err(|e| Error::InvalidPath(format!("{:?}: {}", path, e)))?;
    let filename = canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| canonical.display().to_string());
    let file_hash = content_hash(&canonical)?;

    // Idempotency check runs before any decode work.
    if let Some(existing) = store.get_video_by_hash(&file_hash).await? {
        if !options.force {
            info!("Skipping {}: content already ingested as {}", filename, existing.id);
            let mut report = IngestReport::new(ReportStatus::Skipped, &existing.id, &filename);
            report.duration_sec = existing.duration_sec;
            report.artifacts_count = store.count_artifacts(&existing.id).await?;
            report.elapsed_sec = started.elapsed().as_secs_f64();
            return Ok(report);
        }
        if options.dry_run {
            debug!("Dry run: leaving existing video {} untouched", existing.id);
        } else {
            info!("Force re-ingest: deleting existing video {}", existing.id);
            store.delete_video(&existing.id).await?;
        }
    }

    let mut video = VideoRecord::new(
        canonical.to_string_lossy().to_string(),
        filename.clone(),
        file_hash,
    );

    let info = match media.probe(&canonical).await {
        Ok(info) => info,
        Err(e) => {
            // Unreadable sources still get a row so the failure is
            // visible in listings.
            warn!("Probe failed for {}: {}", filename, e);
            video.status = VideoStatus::Failed.to_string();
            video.error_message = Some(e.to_string());
            store.insert_video(&video).await.ok();
            let mut report = IngestReport::new(ReportStatus::Failed, &video.id, &filename);
            report.error = Some(e.to_string());
            report.elapsed_sec = started.elapsed().as_secs_f64();
            return Ok(report);
        }
    };

    if options.dry_run {
        let mut report = IngestReport::new(ReportStatus::DryRun, &video.id, &filename);
        report.duration_sec = info.duration_sec;
        report.planned_stages = planned_stages(options, provider);
        report.elapsed_sec = started.elapsed().as_secs_f64();
        return Ok(report);
    }

    video.duration_sec = info.duration_sec;
    video.file_size_bytes = info.file_size_bytes as i64;
    video.width = info.width.map(|w| w as i64);
    video.height = info.height.map(|h| h as i64);
    video.ingest_config_json = serde_json::to_string(options).ok();
    match store.insert_video(&video).await {
        Ok(()) => {}
        Err(Error::DuplicateVideo(_)) => {
            // A concurrent run won the insert race between the hash
            // check and here; defer to it.
            let existing = store
                .get_video_by_hash(&video.file_hash)
                .await?
                .ok_or_else(|| Error::StoreIntegrity("hash row vanished mid-ingest".into()))?;
            info!("Concurrent ingest of {} won the race", filename);
            let mut report = IngestReport::new(ReportStatus::Skipped, &existing.id, &filename);
            report.duration_sec = existing.duration_sec;
            report.artifacts_count = store.count_artifacts(&existing.id).await?;
            report.elapsed_sec = started.elapsed().as_secs_f64();
            return Ok(report);
        }
        Err(e) => return Err(e),
    }

    let mut warnings: Vec<String> = Vec::new();
    if info.duration_sec > config.ingest.long_video_warn_minutes * 60.0 {
        warnings.push(format!(
            "video is {:.1} minutes long; ingestion may be slow",
            info.duration_sec / 60.0
        ));
    }

    match run_stages(store, provider, media, config, &canonical, &video, options, cancel, &mut warnings)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_fatal_to_ingest() => {
            warn!("Ingestion of {} failed: {}", filename, e);
            store
                .update_video_status(&video.id, VideoStatus::Failed, Some(&e.to_string()))
                .await?;
            let mut report = IngestReport::new(ReportStatus::Failed, &video.id, &filename);
            report.duration_sec = info.duration_sec;
            report.artifacts_count = store.count_artifacts(&video.id).await.unwrap_or(0);
            report.warnings = warnings;
            report.error = Some(e.to_string());
            report.elapsed_sec = started.elapsed().as_secs_f64();
            return Ok(report);
        }
        Err(e) => return Err(e),
    }

    let status = if warnings.is_empty() {
        VideoStatus::Complete
    } else {
        VideoStatus::CompleteWithWarnings
    };
    store.update_video_status(&video.id, status, None).await?;

    let mut report = IngestReport::new(
        if warnings.is_empty() {
            ReportStatus::Complete
        } else {
            ReportStatus::CompleteWithWarnings
        },
        &video.id,
        &filename,
    );
    report.duration_sec = info.duration_sec;
    report.artifacts_count = store.count_artifacts(&video.id).await?;
    report.warnings = warnings;
    report.elapsed_sec = started.elapsed().as_secs_f64();
    info!(
        "Ingested {} in {:.1}s: {} artifacts, {} warning(s)",
        filename,
        report.elapsed_sec,
        report.artifacts_count,
        report.warnings.len()
    );
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn run_stages(
    store: &Store,
    provider: &dyn CapabilityProvider,
    media: &dyn MediaDecomposer,
    config: &Config,
    path: &Path,
    video: &VideoRecord,
    options: &IngestOptions,
    cancel: &CancelFlag,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let caps = provider.capabilities();

    // Transcription
    if cancel.is_cancelled() {
        warnings.push("ingestion cancelled before transcription".into());
        return Ok(());
    }
    if !caps.transcribe {
        warnings.push("transcription skipped: capability unavailable".into());
    } else {
        match transcribe_stage(store, provider, media, config, path, &video.id).await {
            Ok(count) => debug!("Transcription produced {} segments", count),
            Err(e) if e.is_fatal_to_ingest() => return Err(e),
            Err(e) => warnings.push(format!("transcription failed: {}", e)),
        }
    }

    // Captioning and cascade
    if cancel.is_cancelled() {
        warnings.push("ingestion cancelled before captioning".into());
        return Ok(());
    }
    if options.captions {
        if !caps.caption {
            warnings.push("captioning skipped: capability unavailable".into());
        } else {
            let escalate = options.cascade && caps.chat;
            if options.cascade && !caps.chat {
                warnings.push("cascade escalation skipped: chat capability unavailable".into());
            }
            let (frames_per_window, max_windows) =
                layer0_budget(config, options, video.duration_sec);
            let cascade_options = CascadeOptions {
                topic: options.topic.clone(),
                escalate,
                frames_per_window,
                max_windows,
                concurrency: config.provider.concurrency,
                max_retries: config.provider.max_retries,
            };
            let layers = cascade::run_cascade(
                media,
                provider,
                path,
                &video.id,
                video.duration_sec,
                &config.cascade,
                &cascade_options,
                cancel,
            )
            .await?;
            let (artifacts, cascade_warnings) = layers.into_artifacts();
            warnings.extend(cascade_warnings);
            store.insert_artifacts(&artifacts).await?;
        }
    }

    // Embedding backfill
    if cancel.is_cancelled() {
        warnings.push("ingestion cancelled before embedding".into());
        return Ok(());
    }
    if !options.skip_embed {
        if !caps.embed {
            warnings.push("embedding skipped: capability unavailable".into());
        } else {
            match embed_stage(store, provider, config, &video.id).await {
                Ok(count) => debug!("Embedded {} artifacts", count),
                Err(e) if e.is_fatal_to_ingest() => return Err(e),
                Err(e) => warnings.push(format!("embedding failed: {}", e)),
            }
        }
    }

    Ok(())
}

async fn transcribe_stage(
    store: &Store,
    provider: &dyn CapabilityProvider,
    media: &dyn MediaDecomposer,
    config: &Config,
    path: &Path,
    video_id: &str,
) -> Result<usize> {
    let audio = media
        .extract_audio(path)
        .await
        .map_err(|e| Error::ProviderFatal(format!("audio extraction failed: {}", e)))?;

    let result = with_retry(config.provider.max_retries, || provider.transcribe(&audio)).await;
    let _ = std::fs::remove_file(&audio);
    let segments = result?;

    let artifacts: Vec<ArtifactRecord> = segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            ArtifactRecord::new(
                video_id,
                ArtifactType::Transcript,
                s.start_sec,
                Some(s.end_sec),
                s.text.trim().to_string(),
                "transcription",
            )
        })
        .collect();

    let count = artifacts.len();
    store.insert_artifacts(&artifacts).await?;
    Ok(count)
}

/// Embed every artifact that lacks a vector, batched, one pooled
/// vector per artifact.
async fn embed_stage(
    store: &Store,
    provider: &dyn CapabilityProvider,
    config: &Config,
    video_id: &str,
) -> Result<usize> {
    let pending = store.artifacts_without_embeddings(video_id).await?;
    if pending.is_empty() {
        return Ok(0);
    }

    // Flatten all artifact windows into one batchable list, remembering
    // which artifact each window belongs to.
    let mut windows: Vec<String> = Vec::new();
    let mut spans: Vec<(String, usize)> = Vec::new();
    for artifact in &pending {
        let chunks = chunk_text(
            &artifact.text,
            config.chunk.max_words,
            config.chunk.overlap_words,
        );
        if chunks.is_empty() {
            continue;
        }
        spans.push((artifact.id.clone(), chunks.len()));
        windows.extend(chunks);
    }
    if windows.is_empty() {
        return Ok(0);
    }

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(windows.len());
    for batch in windows.chunks(config.provider.embed_batch_size.max(1)) {
        let batch_owned = batch.to_vec();
        let batch_vectors =
            with_retry(config.provider.max_retries, || provider.embed(&batch_owned)).await?;
        if batch_vectors.len() != batch.len() {
            return Err(Error::ProviderFatal(format!(
                "embedding count mismatch: sent {}, got {}",
                batch.len(),
                batch_vectors.len()
            )));
        }
        vectors.extend(batch_vectors);
    }

    let mut items: Vec<(String, Vec<f32>)> = Vec::with_capacity(spans.len());
    let mut offset = 0;
    for (artifact_id, window_count) in spans {
        let pooled = mean_pool(&vectors[offset..offset + window_count]);
        items.push((artifact_id, pooled));
        offset += window_count;
    }

    let count = items.len();
    store
        .insert_embeddings(&config.provider.embed_model, &items)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CapabilitySet, TranscriptSegment};
    use crate::testutil::{MockDecomposer, MockProvider};
    use std::io::Write;
    use tempfile::TempDir;

    async fn setup() -> (Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::connect(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    fn write_video_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    fn options() -> IngestOptions {
        IngestOptions {
            captions: false,
            ..IngestOptions::default()
        }
    }

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment {
                start_sec: 0.0,
                end_sec: 4.0,
                text: "hello and welcome".into(),
            },
            TranscriptSegment {
                start_sec: 4.0,
                end_sec: 8.0,
                text: "today we talk pricing".into(),
            },
        ]
    }

    #[test]
    fn frame_budget_caps_window_sampling() {
        let config = Config::default();
        let mut opts = options();

        // 10s video, one 30s window, default 0.5 fps: rate allows 15
        // but the per-window cap of 5 wins.
        assert_eq!(layer0_budget(&config, &opts, 10.0), (5, 1));

        // A 3-frame budget beats both.
        opts.max_frames = Some(3);
        assert_eq!(layer0_budget(&config, &opts, 10.0), (3, 1));

        // Budget is spread across windows.
        opts.max_frames = Some(4);
        assert_eq!(layer0_budget(&config, &opts, 120.0), (1, 4));

        // More windows than budgeted frames: the window count itself is
        // capped so 300s at 4 frames samples 4 windows of 1 frame.
        assert_eq!(layer0_budget(&config, &opts, 300.0), (1, 4));

        // A low sampling rate wins over the per-window cap.
        opts.max_frames = None;
        opts.fps_sample = Some(0.05);
        assert_eq!(layer0_budget(&config, &opts, 10.0), (2, 1));
    }

    #[test]
    fn content_hash_is_stable_and_size_sensitive() {
        let tmp = TempDir::new().unwrap();
        let a = write_video_file(&tmp, "a.mp4", b"same head bytes");
        let b = write_video_file(&tmp, "b.mp4", b"same head bytes");
        let c = write_video_file(&tmp, "c.mp4", b"same head bytes plus tail");

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
        assert_ne!(content_hash(&a).unwrap(), content_hash(&c).unwrap());
    }

    #[tokio::test]
    async fn second_run_is_skipped_with_same_identity() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        provider.set_segments(segments());
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let first = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(first.status, ReportStatus::Complete);
        assert_eq!(first.artifacts_count, 2);

        let second = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(second.status, ReportStatus::Skipped);
        assert_eq!(second.video_id, first.video_id);
        assert_eq!(second.artifacts_count, first.artifacts_count);
        assert_eq!(provider.transcribe_calls(), 1);
    }

    #[tokio::test]
    async fn force_replaces_instead_of_duplicating() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        provider.set_segments(segments());
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let first = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();

        let mut forced = options();
        forced.force = true;
        let second = ingest(&store, &provider, &media, &config, &path, &forced, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(second.status, ReportStatus::Complete);
        assert_ne!(second.video_id, first.video_id);
        assert_eq!(store.list_videos().await.unwrap().len(), 1);
        assert_eq!(store.count_artifacts(&second.video_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn force_dry_run_leaves_existing_video_untouched() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        provider.set_segments(segments());
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let first = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(first.status, ReportStatus::Complete);

        let mut opts = options();
        opts.force = true;
        opts.dry_run = true;
        let report = ingest(&store, &provider, &media, &config, &path, &opts, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::DryRun);
        assert_eq!(store.list_videos().await.unwrap().len(), 1);
        assert_eq!(store.count_artifacts(&first.video_id).await.unwrap(), 2);
        assert_eq!(provider.transcribe_calls(), 1);
    }

    #[tokio::test]
    async fn missing_transcribe_capability_warns_and_continues() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::with_caps(CapabilitySet {
            transcribe: false,
            caption: false,
            embed: false,
            chat: false,
        });
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let report = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::CompleteWithWarnings);
        assert!(report.warnings.iter().any(|w| w.contains("transcription")));
        assert_eq!(report.artifacts_count, 0);
        let transcripts = store
            .get_artifacts(&report.video_id, Some(ArtifactType::Transcript))
            .await
            .unwrap();
        assert!(transcripts.is_empty());
    }

    #[tokio::test]
    async fn captioning_produces_window_artifacts() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::with_caps(CapabilitySet {
            transcribe: false,
            caption: true,
            embed: false,
            chat: false,
        });
        provider.push_caption("a cat jumps onto the table");
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let mut opts = IngestOptions::default();
        opts.skip_embed = true;
        opts.max_frames = Some(3);
        let report = ingest(&store, &provider, &media, &config, &path, &opts, &CancelFlag::new())
            .await
            .unwrap();

        let captions = store
            .get_artifacts(&report.video_id, Some(ArtifactType::Caption))
            .await
            .unwrap();
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "a cat jumps onto the table");
        assert_eq!(captions[0].source_stage, "cascade_layer0");
    }

    #[tokio::test]
    async fn failed_captioning_surfaces_in_report_warnings() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::with_caps(CapabilitySet {
            transcribe: false,
            caption: true,
            embed: false,
            chat: false,
        });
        provider.fail_next_caption_fatal();
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let mut opts = IngestOptions::default();
        opts.skip_embed = true;
        let report = ingest(&store, &provider, &media, &config, &path, &opts, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::CompleteWithWarnings);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("captioning failed")));
        assert_eq!(report.artifacts_count, 0);
    }

    #[tokio::test]
    async fn frame_budget_caps_captioned_window_count() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "long.mp4", b"fake long video bytes");
        let provider = MockProvider::with_caps(CapabilitySet {
            transcribe: false,
            caption: true,
            embed: false,
            chat: false,
        });
        let media = MockDecomposer::with_duration(300.0);
        let config = Config::default();

        // 300s at 30s windows is 10 windows; a 4-frame budget caps the
        // run to 4 single-frame windows.
        let mut opts = IngestOptions::default();
        opts.skip_embed = true;
        opts.max_frames = Some(4);
        let report = ingest(&store, &provider, &media, &config, &path, &opts, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(provider.caption_calls(), 4);
        let captions = store
            .get_artifacts(&report.video_id, Some(ArtifactType::Caption))
            .await
            .unwrap();
        assert_eq!(captions.len(), 4);
    }

    #[tokio::test]
    async fn decode_failure_records_a_failed_video() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "broken.mp4", b"not a video");
        let provider = MockProvider::full();
        let media = MockDecomposer::failing_probe();
        let config = Config::default();

        let report = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Failed);
        assert!(report.error.is_some());
        let video = store.get_video(&report.video_id).await.unwrap();
        assert_eq!(video.get_status().unwrap(), VideoStatus::Failed);
        assert!(video.error_message.is_some());
        assert_eq!(provider.transcribe_calls(), 0);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        provider.set_segments(segments());
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let mut opts = options();
        opts.dry_run = true;
        let report = ingest(&store, &provider, &media, &config, &path, &opts, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::DryRun);
        assert!(report.planned_stages.contains(&"transcription".to_string()));
        assert!(store.list_videos().await.unwrap().is_empty());
        assert_eq!(provider.transcribe_calls(), 0);
    }

    #[tokio::test]
    async fn embeddings_are_one_to_one_with_artifacts() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        provider.set_segments(segments());
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let report = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Complete);
        let details = store.video_info(&report.video_id).await.unwrap();
        assert_eq!(details.embedded_count, 2);
        assert!(store
            .artifacts_without_embeddings(&report.video_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn long_artifact_still_gets_a_single_pooled_vector() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        let long_text = (0..50).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        provider.set_segments(vec![TranscriptSegment {
            start_sec: 0.0,
            end_sec: 9.0,
            text: long_text,
        }]);
        let media = MockDecomposer::with_duration(10.0);
        let mut config = Config::default();
        config.chunk.max_words = 20;
        config.chunk.overlap_words = 5;

        let report = ingest(&store, &provider, &media, &config, &path, &options(), &CancelFlag::new())
            .await
            .unwrap();

        let details = store.video_info(&report.video_id).await.unwrap();
        assert_eq!(details.embedded_count, 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_with_warning() {
        let (store, tmp) = setup().await;
        let path = write_video_file(&tmp, "demo.mp4", b"fake video bytes");
        let provider = MockProvider::full();
        provider.set_segments(segments());
        let media = MockDecomposer::with_duration(10.0);
        let config = Config::default();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = ingest(&store, &provider, &media, &config, &path, &options(), &cancel)
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::CompleteWithWarnings);
        assert!(report.warnings.iter().any(|w| w.contains("cancelled")));
        assert_eq!(provider.transcribe_calls(), 0);
    }
}
