//! Default configuration values

use std::path::PathBuf;

pub fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_transcribe_model() -> String {
    "whisper-1".to_string()
}

pub fn default_vision_model() -> String {
    "gpt-4.1".to_string()
}

pub fn default_embed_model() -> String {
    "text-embedding-3-small".to_string()
}

pub fn default_chat_model() -> String {
    "gpt-4.1".to_string()
}

pub fn default_timeout_secs() -> u64 {
    120
}

pub fn default_max_retries() -> u32 {
    3
}

pub fn default_concurrency() -> usize {
    4
}

pub fn default_fps_sample() -> f64 {
    0.5
}

pub fn default_max_frames() -> usize {
    200
}

pub fn default_long_video_warn_minutes() -> f64 {
    60.0
}

pub fn default_window_secs() -> f64 {
    30.0
}

pub fn default_frames_per_window() -> usize {
    5
}

pub fn default_chunk_max_words() -> usize {
    375
}

pub fn default_chunk_overlap_words() -> usize {
    40
}

pub fn default_embedding_batch_size() -> usize {
    100
}

pub fn default_search_limit() -> usize {
    10
}

pub fn default_top_k() -> usize {
    10
}

/// Configuration directory: ~/.config/clipmind (or platform equivalent)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clipmind")
}

/// Default config file path
pub fn default_config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default database file path
pub fn default_db_file() -> PathBuf {
    config_dir().join("clipmind.db")
}
