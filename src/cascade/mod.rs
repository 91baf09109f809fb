//! Three-layer dense caption cascade
//!
//! Layer 0 captions fixed-duration frame windows with a vision call
//! per window; Layer 1 condenses those captions into a structured
//! `START:END:EVENT` log with one chat call; Layer 2 turns the log
//! into a categorized prose report. Each layer consumes only the
//! previous layer's output, so raw frames are decoded exactly once.
//! A layer with an empty input set is skipped entirely.

use crate::config::CascadeConfig;
use crate::error::Result;
use crate::media::{cleanup_frames, MediaDecomposer};
use crate::provider::{with_retry, CancelFlag, CapabilityProvider, ChatMessage};
use crate::store::{ArtifactRecord, ArtifactType};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, warn};

/// Sentinel a vision model returns for windows with no change/action.
const STATIC_SENTINEL: &str = "STATIC";
/// Sentinel the layer-1 model returns when no events survived.
const NO_EVENTS_SENTINEL: &str = "NO_EVENTS";

const LAYER1_SYSTEM_PROMPT: &str = "\
You are a video analysis system producing a structured event log from window-level observations.

Format each event as:
START_SEC:END_SEC:EVENT

Rules:
- Merge consecutive windows describing the same ongoing event into one entry.
- Drop trivial or purely static observations.
- Use concrete language: who/what did what, when.
- Preserve timestamps accurately.
- If the input is empty or all windows were static, respond with: NO_EVENTS";

const LAYER2_SYSTEM_PROMPT: &str = "\
You are producing the final consolidated video analysis report from a structured event log.

Format:
## Events
List each event with MM:SS timestamps and a clear description.

## Summary
2-3 sentence overview of the video content.

## Categories
Tag each event with relevant categories (e.g. \"person_entry\", \"vehicle_movement\", \"equipment_use\").

If the input indicates NO_EVENTS, produce a report stating no significant events were detected.";

/// Cascade invocation parameters
#[derive(Debug, Clone)]
pub struct CascadeOptions {
    pub topic: String,
    /// Run layers 1 and 2 on top of the window captions
    pub escalate: bool,
    pub frames_per_window: usize,
    /// Cap on captioned windows so the frame budget holds even when
    /// the video has more windows than budgeted frames
    pub max_windows: usize,
    pub concurrency: usize,
    pub max_retries: u32,
}

/// Artifacts produced per layer, plus stage-local warnings
#[derive(Debug, Default)]
pub struct CascadeLayers {
    pub captions: Vec<ArtifactRecord>,
    pub events: Vec<ArtifactRecord>,
    pub summary: Option<ArtifactRecord>,
    pub report: Option<ArtifactRecord>,
    pub warnings: Vec<String>,
}

impl CascadeLayers {
    pub fn into_artifacts(self) -> (Vec<ArtifactRecord>, Vec<String>) {
        let mut artifacts = self.captions;
        artifacts.extend(self.events);
        artifacts.extend(self.summary);
        artifacts.extend(self.report);
        (artifacts, self.warnings)
    }
}

/// Build the vision prompt for one layer-0 window. A recognized topic
/// sharpens the focus; anything else is injected verbatim.
fn window_prompt(topic: &str, start_sec: f64, end_sec: f64) -> String {
    let focus = match topic {
        "general" | "" => String::new(),
        "security" => "Focus on people entering or leaving, vehicles, and unusual activity. ".into(),
        "sports" => "Focus on plays, scoring, and player movement. ".into(),
        custom => format!("Focus on: {}. ", custom),
    };
    format!(
        "These frames span seconds {:.1} to {:.1} of a video, in order. {}\
         Describe what happens across the frames: actions, movements, changes. \
         Be concrete about who or what did what. \
         If the scene is completely static with no change or action, respond with exactly: {}",
        start_sec, end_sec, focus, STATIC_SENTINEL
    )
}

/// A caption qualifies only if it describes change/action rather than
/// static scenery.
fn qualifies(caption: &str) -> bool {
    let trimmed = caption.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(STATIC_SENTINEL)
}

/// Parse one `START:END:EVENT` line; unparseable lines yield None.
fn parse_event_line(line: &str) -> Option<(f64, f64, String)> {
    let mut parts = line.splitn(3, ':');
    let start: f64 = parts.next()?.trim().parse().ok()?;
    let end: f64 = parts.next()?.trim().parse().ok()?;
    let text = parts.next()?.trim();
    if text.is_empty() || end < start {
        return None;
    }
    Some((start, end, text.to_string()))
}

/// Parse a layer-1 event log into per-event entries.
fn parse_event_log(log: &str) -> Vec<(f64, f64, String)> {
    log.lines().filter_map(parse_event_line).collect()
}

/// Compute `[start, end)` boundaries for layer-0 windows.
fn layer0_windows(duration_sec: f64, window_secs: f64) -> Vec<(f64, f64)> {
    if duration_sec <= 0.0 || window_secs <= 0.0 {
        return Vec::new();
    }
    let count = (duration_sec / window_secs).ceil().max(1.0) as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * window_secs;
            (start, (start + window_secs).min(duration_sec))
        })
        .collect()
}

/// Run the cascade. Window captioning is concurrent up to
/// `options.concurrency`; a barrier collects all windows in time order
/// before layer 1 starts. Layer 1/2 failures are stage-local: earlier
/// layers' artifacts are still returned.
#[allow(clippy::too_many_arguments)]
pub async fn run_cascade(
    media: &dyn MediaDecomposer,
    provider: &dyn CapabilityProvider,
    video_path: &Path,
    video_id: &str,
    duration_sec: f64,
    config: &CascadeConfig,
    options: &CascadeOptions,
    cancel: &CancelFlag,
) -> Result<CascadeLayers> {
    let mut layers = CascadeLayers::default();

    let mut windows = layer0_windows(duration_sec, config.window_secs);
    windows.truncate(options.max_windows.max(1));
    info!(
        "Cascade layer 0: {} window(s) of {:.0}s, {} frame(s) each",
        windows.len(),
        config.window_secs,
        options.frames_per_window
    );

    let frames_per_window = options.frames_per_window;
    // Per window: a qualifying caption, or a warning for a failed call.
    let captioned: Vec<(Option<(f64, f64, String)>, Option<String>)> =
        stream::iter(windows.into_iter())
            .map(|(start, end)| async move {
                if cancel.is_cancelled() {
                    return (None, None);
                }
                let frames = match media
                    .sample_window(video_path, start, end, frames_per_window)
                    .await
                {
                    Ok(frames) if !frames.is_empty() => frames,
                    Ok(_) => return (None, None),
                    Err(e) => {
                        warn!("Window {:.0}-{:.0}s frame sampling failed: {}", start, end, e);
                        let warning = format!(
                            "captioning failed for window {:.0}-{:.0}s: {}",
                            start, end, e
                        );
                        return (None, Some(warning));
                    }
                };

                let prompt = window_prompt(&options.topic, start, end);
                let result =
                    with_retry(options.max_retries, || provider.caption(&frames, &prompt)).await;
                cleanup_frames(&frames);

                match result {
                    Ok(text) if qualifies(&text) => {
                        debug!("Window {:.0}-{:.0}s: {}", start, end, text);
                        (Some((start, end, text.trim().to_string())), None)
                    }
                    Ok(_) => {
                        debug!("Window {:.0}-{:.0}s filtered as static", start, end);
                        (None, None)
                    }
                    Err(e) => {
                        warn!("Window {:.0}-{:.0}s captioning failed: {}", start, end, e);
                        let warning = format!(
                            "captioning failed for window {:.0}-{:.0}s: {}",
                            start, end, e
                        );
                        (None, Some(warning))
                    }
                }
            })
            // buffered (not buffer_unordered) keeps window order at the barrier
            .buffered(options.concurrency.max(1))
            .collect()
            .await;

    for (caption, warning) in captioned {
        if let Some((start, end, text)) = caption {
            layers.captions.push(ArtifactRecord::new(
                video_id,
                ArtifactType::Caption,
                start,
                Some(end),
                text,
                "cascade_layer0",
            ));
        }
        if let Some(warning) = warning {
            layers.warnings.push(warning);
        }
    }

    if layers.captions.is_empty() {
        info!("Cascade: no qualifying captions in layer 0; skipping layers 1 and 2");
        return Ok(layers);
    }
    if !options.escalate || cancel.is_cancelled() {
        return Ok(layers);
    }

    // Layer 1: structured event log from the layer-0 captions only.
    let log_input = layers
        .captions
        .iter()
        .map(|a| {
            format!(
                "[{:.0}s-{:.0}s] {}",
                a.start_sec,
                a.end_sec.unwrap_or(a.start_sec),
                a.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let layer1_messages = [
        ChatMessage::system(LAYER1_SYSTEM_PROMPT),
        ChatMessage::user(log_input),
    ];
    let event_log = match with_retry(options.max_retries, || provider.chat(&layer1_messages)).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Cascade layer 1 failed: {}", e);
            layers.warnings.push(format!("cascade layer 1 failed: {}", e));
            return Ok(layers);
        }
    };

    if event_log.trim().is_empty() || event_log.trim() == NO_EVENTS_SENTINEL {
        info!("Cascade layer 1 reported no events");
        return Ok(layers);
    }

    for (start, end, text) in parse_event_log(&event_log) {
        layers.events.push(ArtifactRecord::new(
            video_id,
            ArtifactType::DenseCaptionEvent,
            start,
            Some(end),
            text,
            "cascade_layer1",
        ));
    }
    layers.summary = Some(ArtifactRecord::new(
        video_id,
        ArtifactType::Summary,
        0.0,
        Some(duration_sec),
        event_log.trim().to_string(),
        "cascade_layer1",
    ));

    if cancel.is_cancelled() {
        return Ok(layers);
    }

    // Layer 2: report from the event log only.
    let summary_text = layers.summary.as_ref().map(|s| s.text.clone()).unwrap_or_default();
    let layer2_messages = [
        ChatMessage::system(LAYER2_SYSTEM_PROMPT),
        ChatMessage::user(summary_text),
    ];
    match with_retry(options.max_retries, || provider.chat(&layer2_messages)).await {
        Ok(report) if !report.trim().is_empty() => {
            layers.report = Some(ArtifactRecord::new(
                video_id,
                ArtifactType::Report,
                0.0,
                Some(duration_sec),
                report.trim().to_string(),
                "cascade_layer2",
            ));
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Cascade layer 2 failed: {}", e);
            layers.warnings.push(format!("cascade layer 2 failed: {}", e));
        }
    }

    Ok(layers)
}
