//! Hybrid lexical + semantic retrieval
//!
//! Lexical candidates come from the FTS index with 3x oversampling;
//! stored vectors rerank them by cosine similarity against the query
//! embedding. When embeddings are unavailable (no embed capability, a
//! failed query embedding, or a corpus with no stored vectors) the
//! ranking degrades to pure lexical order rather than erroring.

use crate::error::Result;
use crate::provider::CapabilityProvider;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SEMANTIC_WEIGHT: f32 = 0.7;
const LEXICAL_WEIGHT: f32 = 0.3;
/// Lexical candidates fetched per requested result
const OVERSAMPLE: usize = 3;

/// One ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub score: f32,
    pub video_id: String,
    pub filename: String,
    pub artifact_id: String,
    pub timestamp_sec: f64,
    pub timestamp: String,
    pub source_type: String,
    pub text: String,
}

/// Format seconds as HH:MM:SS
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Cosine similarity; zero for mismatched or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Run a hybrid search. Results are deterministically ordered: score
/// descending, then start time ascending, then artifact id.
pub async fn search(
    store: &Store,
    provider: &dyn CapabilityProvider,
    query: &str,
    limit: usize,
    video_id: Option<&str>,
) -> Result<Vec<SearchResult>> {
    let hits = store
        .lexical_search(query, limit.max(1) * OVERSAMPLE, video_id)
        .await?;
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    // Normalize raw bm25 scores to [0, 1] over this candidate set.
    let max_lexical = hits
        .iter()
        .map(|h| h.raw_score)
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON);

    let query_vector = if provider.capabilities().embed {
        match provider.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => Some(vectors.remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!("Query embedding failed, falling back to lexical ranking: {}", e);
                None
            }
        }
    } else {
        None
    };

    let artifact_ids: Vec<String> = hits.iter().map(|h| h.artifact.id.clone()).collect();
    let stored = store.embeddings_for(&artifact_ids).await?;
    let semantic_active = query_vector.is_some() && !stored.is_empty();
    debug!(
        "Search: {} candidates, semantic reranking {}",
        hits.len(),
        if semantic_active { "on" } else { "off" }
    );

    let mut scored: Vec<SearchResult> = hits
        .into_iter()
        .map(|hit| {
            let lexical = hit.raw_score / max_lexical;
            let score = if !semantic_active {
                lexical
            } else {
                match (query_vector.as_deref(), stored.get(&hit.artifact.id)) {
                    (Some(qv), Some(av)) => {
                        SEMANTIC_WEIGHT * cosine_similarity(qv, av) + LEXICAL_WEIGHT * lexical
                    }
                    // Vectorless artifacts in a mixed corpus keep only
                    // their lexical contribution.
                    _ => LEXICAL_WEIGHT * lexical,
                }
            };
            SearchResult {
                rank: 0,
                score,
                video_id: hit.artifact.video_id,
                filename: hit.filename,
                artifact_id: hit.artifact.id,
                timestamp_sec: hit.artifact.start_sec,
                timestamp: format_timestamp(hit.artifact.start_sec),
                source_type: hit.artifact.artifact_type,
                text: hit.artifact.text,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.timestamp_sec.total_cmp(&b.timestamp_sec))
            .then_with(|| a.artifact_id.cmp(&b.artifact_id))
    });
    scored.truncate(limit);
    for (i, result) in scored.iter_mut().enumerate() {
        result.rank = i + 1;
    }
    Ok(scored)
}
