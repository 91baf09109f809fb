//! Grounded question answering over retrieved artifacts
//!
//! The composer retrieves hybrid candidates, builds a timestamped
//! context block, and asks the chat capability for an answer grounded
//! strictly in that context. Zero candidates short-circuits to a fixed
//! insufficient-evidence answer without any chat call.

use crate::error::{Error, Result};
use crate::provider::{with_retry, CapabilityProvider, ChatMessage};
use crate::search::{self, format_timestamp, SearchResult};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const INSUFFICIENT_EVIDENCE_ANSWER: &str =
    "There is insufficient evidence in the indexed videos to answer this question.";

const GROUNDING_SYSTEM_PROMPT: &str = "\
You answer questions about video content using ONLY the provided context excerpts.

Rules:
- Every claim must be supported by the context. Do not use outside knowledge.
- Cite the relevant timestamps (e.g. \"at 00:01:15\") when you reference an excerpt.
- If the context does not contain enough information, say so explicitly using the phrase \"insufficient evidence\".
- Be concise and direct.";

/// Phrases in an answer that indicate the model could not ground it.
const HEDGE_MARKERS: &[&str] = &[
    "insufficient evidence",
    "not enough information",
    "cannot determine",
];

/// Scale applied to confidence when the answer itself hedges.
const HEDGE_CONFIDENCE_SCALE: f32 = 0.25;

/// One supporting excerpt behind an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub video_id: String,
    pub artifact_id: String,
    pub start_sec: f64,
    pub end_sec: Option<f64>,
    pub source_type: String,
    pub text: String,
    pub score: f32,
}

/// The answer with its supporting evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskReport {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

fn context_block(candidates: &[SearchResult]) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "[{} @ {} ({})] {}",
                c.filename, c.timestamp, c.source_type, c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn citations_from(candidates: &[SearchResult]) -> Vec<Citation> {
    candidates
        .iter()
        .map(|c| Citation {
            video_id: c.video_id.clone(),
            artifact_id: c.artifact_id.clone(),
            start_sec: c.timestamp_sec,
            end_sec: None,
            source_type: c.source_type.clone(),
            text: c.text.clone(),
            score: c.score,
        })
        .collect()
}

/// Confidence from retrieval scores: weighted blend of the top score
/// and the mean of the top three, clamped to [0, 1]. A hedging answer
/// scales the result down.
fn confidence(candidates: &[SearchResult], answer: &str) -> f32 {
    let Some(top) = candidates.first() else {
        return 0.0;
    };
    let head = &candidates[..candidates.len().min(3)];
    let mean = head.iter().map(|c| c.score).sum::<f32>() / head.len() as f32;
    let mut value = (0.25 * top.score + 0.75 * mean).clamp(0.0, 1.0);

    let lowered = answer.to_lowercase();
    if HEDGE_MARKERS.iter().any(|m| lowered.contains(m)) {
        value *= HEDGE_CONFIDENCE_SCALE;
    }
    value
}

/// Answer a question grounded in retrieved artifacts.
pub async fn ask(
    store: &Store,
    provider: &dyn CapabilityProvider,
    question: &str,
    top_k: usize,
    max_retries: u32,
    video_id: Option<&str>,
) -> Result<AskReport> {
    let candidates = search::search(store, provider, question, top_k, video_id).await?;

    if candidates.is_empty() {
        debug!("No retrieval candidates; skipping chat call");
        return Ok(AskReport {
            answer: INSUFFICIENT_EVIDENCE_ANSWER.to_string(),
            citations: Vec::new(),
            confidence: 0.0,
            error_code: None,
        });
    }

    let messages = [
        ChatMessage::system(GROUNDING_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Context excerpts:\n{}\n\nQuestion: {}",
            context_block(&candidates),
            question
        )),
    ];

    let answer = match with_retry(max_retries, || provider.chat(&messages)).await {
        Ok(text) => text,
        Err(Error::Unsupported(_)) => {
            warn!("Chat capability unavailable; returning citations only");
            return Ok(AskReport {
                answer: String::new(),
                citations: citations_from(&candidates),
                confidence: 0.0,
                error_code: Some("chat_unavailable".into()),
            });
        }
        Err(e) => {
            warn!("Chat call failed: {}", e);
            return Ok(AskReport {
                answer: String::new(),
                citations: citations_from(&candidates),
                confidence: 0.0,
                error_code: Some("chat_failed".into()),
            });
        }
    };

    let confidence = confidence(&candidates, &answer);
    Ok(AskReport {
        answer,
        citations: citations_from(&candidates),
        confidence,
        error_code: None,
    })
}

/// Render citations for plain-text output.
pub fn format_citations(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(|c| {
            format!(
                "  [{}] {} ({}): {}",
                format_timestamp(c.start_sec),
                c.video_id,
                c.source_type,
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
