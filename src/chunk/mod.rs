//! Text chunking for embedding calls
//!
//! Artifact text is split into overlapping word windows sized for the
//! embedding model. Because embeddings are strictly 1:1 with
//! artifacts, a multi-window artifact gets its window vectors
//! mean-pooled and re-normalized back into a single vector.

use unicode_segmentation::UnicodeSegmentation;

/// Split text into overlapping windows of at most `max_words` words.
/// Consecutive windows share `overlap_words` words. Always returns at
/// least one window for non-empty text.
pub fn chunk_text(text: &str, max_words: usize, overlap_words: usize) -> Vec<String> {
    debug_assert!(overlap_words < max_words);
    let words: Vec<&str> = text.unicode_words().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if words.len() <= max_words {
        return vec![words.join(" ")];
    }

    let step = max_words - overlap_words;
    let mut windows = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + max_words).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    windows
}

/// L2-normalize a vector; zero vectors pass through unchanged.
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Mean-pool window vectors into one normalized artifact vector.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    if vectors.len() == 1 {
        return l2_normalize(first);
    }
    let dim = first.len();
    let mut pooled = vec![0.0f32; dim];
    for vector in vectors {
        for (slot, v) in pooled.iter_mut().zip(vector.iter()) {
            *slot += v;
        }
    }
    let n = vectors.len() as f32;
    for slot in pooled.iter_mut() {
        *slot /= n;
    }
    l2_normalize(&pooled)
}
