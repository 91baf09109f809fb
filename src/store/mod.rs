//! Unified artifact store backed by SQLite
//!
//! Every derived unit of a video (transcript segments, captions,
//! cascade events, summaries, reports) lands here together with its
//! embedding and an FTS5 lexical projection. The store is the only
//! shared mutable resource in the pipeline: all batch writes are short
//! transactions so concurrent readers never observe a partially
//! written unit.

mod schema;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Video ingestion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    Complete,
    CompleteWithWarnings,
    Failed,
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoStatus::Pending => write!(f, "pending"),
            VideoStatus::Complete => write!(f, "complete"),
            VideoStatus::CompleteWithWarnings => write!(f, "complete_with_warnings"),
            VideoStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for VideoStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "complete" => Ok(VideoStatus::Complete),
            "complete_with_warnings" => Ok(VideoStatus::CompleteWithWarnings),
            "failed" => Ok(VideoStatus::Failed),
            _ => Err(Error::Other(format!("Unknown video status: {}", s))),
        }
    }
}

/// Artifact type: which kind of derived text this row holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Transcript,
    Caption,
    DenseCaptionEvent,
    Summary,
    Report,
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactType::Transcript => write!(f, "transcript"),
            ArtifactType::Caption => write!(f, "caption"),
            ArtifactType::DenseCaptionEvent => write!(f, "dense_caption_event"),
            ArtifactType::Summary => write!(f, "summary"),
            ArtifactType::Report => write!(f, "report"),
        }
    }
}

impl FromStr for ArtifactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transcript" => Ok(ArtifactType::Transcript),
            "caption" => Ok(ArtifactType::Caption),
            "dense_caption_event" => Ok(ArtifactType::DenseCaptionEvent),
            "summary" => Ok(ArtifactType::Summary),
            "report" => Ok(ArtifactType::Report),
            _ => Err(Error::Other(format!("Unknown artifact type: {}", s))),
        }
    }
}

/// A stored video
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub file_path: String,
    pub filename: String,
    pub file_hash: String,
    pub file_size_bytes: i64,
    pub duration_sec: f64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
    pub ingest_config_json: Option<String>,
    pub ingested_at: String,
}

impl VideoRecord {
    pub fn new(file_path: String, filename: String, file_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_path,
            filename,
            file_hash,
            file_size_bytes: 0,
            duration_sec: 0.0,
            width: None,
            height: None,
            status: VideoStatus::Pending.to_string(),
            error_message: None,
            ingest_config_json: None,
            ingested_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn get_status(&self) -> Result<VideoStatus> {
        self.status.parse()
    }
}

/// A timestamped unit of derived text, append-only within a video
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub video_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub start_sec: f64,
    pub end_sec: Option<f64>,
    pub text: String,
    pub source_stage: String,
}

impl ArtifactRecord {
    pub fn new(
        video_id: &str,
        artifact_type: ArtifactType,
        start_sec: f64,
        end_sec: Option<f64>,
        text: String,
        source_stage: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.to_string(),
            artifact_type: artifact_type.to_string(),
            start_sec,
            end_sec,
            text,
            source_stage: source_stage.to_string(),
        }
    }
}

/// One lexical search hit with its raw (unnormalized) relevance score
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub artifact: ArtifactRecord,
    pub filename: String,
    pub raw_score: f32,
}

/// Listing entry for `list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoListItem {
    pub video_id: String,
    pub filename: String,
    pub duration_sec: f64,
    pub status: String,
    pub artifacts_count: i64,
}

/// Detailed view for `info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetails {
    pub video: VideoRecord,
    pub artifact_counts: HashMap<String, i64>,
    pub embedded_count: i64,
}

/// Encode an f32 vector as a little-endian blob
fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian blob back into an f32 vector
fn vector_from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Quote query terms so user input cannot break FTS5 MATCH syntax.
/// Terms are ORed; bm25 still rewards documents matching more of them.
fn fts_match_expr(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn integrity_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            Error::StoreIntegrity(db.message().to_string())
        }
        _ => Error::Database(e),
    }
}

/// Artifact store handle; cheap to clone
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (and migrate) the store at the given path
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);

        for (i, sql) in schema::MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i64;
            if version <= current {
                continue;
            }
            info!("Applying schema migration {}", version);
            sqlx::raw_sql(sql).execute(&self.pool).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    // ===== Videos =====

    /// Insert a new video row. A uniqueness violation on the content
    /// hash means a concurrent ingestion won the race; the caller
    /// should defer to the existing record.
    pub async fn insert_video(&self, video: &VideoRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO videos (id, file_path, filename, file_hash, file_size_bytes,
                duration_sec, width, height, status, error_message, ingest_config_json, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&video.id)
        .bind(&video.file_path)
        .bind(&video.filename)
        .bind(&video.file_hash)
        .bind(video.file_size_bytes)
        .bind(video.duration_sec)
        .bind(video.width)
        .bind(video.height)
        .bind(&video.status)
        .bind(&video.error_message)
        .bind(&video.ingest_config_json)
        .bind(&video.ingested_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::DuplicateVideo(video.file_hash.clone()))
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    pub async fn get_video(&self, video_id: &str) -> Result<VideoRecord> {
        sqlx::query_as::<_, VideoRecord>("SELECT * FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))
    }

    /// Idempotency lookup: content hash, not path, is the key.
    pub async fn get_video_by_hash(&self, file_hash: &str) -> Result<Option<VideoRecord>> {
        let video = sqlx::query_as::<_, VideoRecord>("SELECT * FROM videos WHERE file_hash = ?")
            .bind(file_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    pub async fn update_video_status(
        &self,
        video_id: &str,
        status: VideoStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE videos SET status = ?, error_message = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(error_message)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a video and everything derived from it. Explicit ordered
    /// deletes in one transaction keep the FTS triggers in the loop.
    pub async fn delete_video(&self, video_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM embeddings WHERE artifact_id IN (SELECT id FROM artifacts WHERE video_id = ?)",
        )
        .bind(video_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM artifacts WHERE video_id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(integrity_error)?;
        Ok(())
    }

    pub async fn list_videos(&self) -> Result<Vec<VideoListItem>> {
        #[derive(FromRow)]
        struct Row {
            id: String,
            filename: String,
            duration_sec: f64,
            status: String,
            artifacts_count: i64,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT v.id, v.filename, v.duration_sec, v.status,
                   COUNT(a.id) AS artifacts_count
            FROM videos v
            LEFT JOIN artifacts a ON a.video_id = v.id
            GROUP BY v.id
            ORDER BY v.ingested_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| VideoListItem {
                video_id: r.id,
                filename: r.filename,
                duration_sec: r.duration_sec,
                status: r.status,
                artifacts_count: r.artifacts_count,
            })
            .collect())
    }

    pub async fn video_info(&self, video_id: &str) -> Result<VideoDetails> {
        let video = self.get_video(video_id).await?;

        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT type, COUNT(*) FROM artifacts WHERE video_id = ? GROUP BY type",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        let embedded_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM embeddings e
            JOIN artifacts a ON a.id = e.artifact_id
            WHERE a.video_id = ?
            "#,
        )
        .bind(video_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(VideoDetails {
            video,
            artifact_counts: counts.into_iter().collect(),
            embedded_count,
        })
    }

    // ===== Artifacts =====

    /// Insert a batch of artifacts in one transaction. The FTS triggers
    /// run inside the same transaction, so an artifact and its lexical
    /// projection are never observable independently.
    pub async fn insert_artifacts(&self, artifacts: &[ArtifactRecord]) -> Result<()> {
        if artifacts.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for artifact in artifacts {
            sqlx::query(
                r#"
                INSERT INTO artifacts (id, video_id, type, start_sec, end_sec, text, source_stage)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&artifact.id)
            .bind(&artifact.video_id)
            .bind(&artifact.artifact_type)
            .bind(artifact.start_sec)
            .bind(artifact.end_sec)
            .bind(&artifact.text)
            .bind(&artifact.source_stage)
            .execute(&mut *tx)
            .await
            .map_err(integrity_error)?;
        }
        tx.commit().await.map_err(integrity_error)?;
        debug!("Inserted {} artifacts", artifacts.len());
        Ok(())
    }

    pub async fn get_artifacts(
        &self,
        video_id: &str,
        artifact_type: Option<ArtifactType>,
    ) -> Result<Vec<ArtifactRecord>> {
        let artifacts = match artifact_type {
            Some(t) => {
                sqlx::query_as::<_, ArtifactRecord>(
                    "SELECT * FROM artifacts WHERE video_id = ? AND type = ? ORDER BY start_sec, id",
                )
                .bind(video_id)
                .bind(t.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ArtifactRecord>(
                    "SELECT * FROM artifacts WHERE video_id = ? ORDER BY start_sec, id",
                )
                .bind(video_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(artifacts)
    }

    pub async fn count_artifacts(&self, video_id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Artifacts that have no embedding yet, in time order.
    pub async fn artifacts_without_embeddings(&self, video_id: &str) -> Result<Vec<ArtifactRecord>> {
        let artifacts = sqlx::query_as::<_, ArtifactRecord>(
            r#"
            SELECT a.* FROM artifacts a
            LEFT JOIN embeddings e ON e.artifact_id = a.id
            WHERE a.video_id = ? AND e.artifact_id IS NULL
            ORDER BY a.start_sec, a.id
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(artifacts)
    }

    // ===== Embeddings =====

    /// Insert a batch of 1:1 artifact embeddings in one transaction.
    pub async fn insert_embeddings(
        &self,
        model: &str,
        items: &[(String, Vec<f32>)],
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (artifact_id, vector) in items {
            sqlx::query(
                "INSERT INTO embeddings (artifact_id, model, dim, vector) VALUES (?, ?, ?, ?)",
            )
            .bind(artifact_id)
            .bind(model)
            .bind(vector.len() as i64)
            .bind(vector_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(integrity_error)?;
        }
        tx.commit().await.map_err(integrity_error)?;
        debug!("Inserted {} embeddings", items.len());
        Ok(())
    }

    /// Load stored vectors for a set of artifact IDs.
    pub async fn embeddings_for(
        &self,
        artifact_ids: &[String],
    ) -> Result<HashMap<String, Vec<f32>>> {
        if artifact_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = artifact_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT artifact_id, vector FROM embeddings WHERE artifact_id IN ({})",
            placeholders
        );
        let mut q = sqlx::query_as::<_, (String, Vec<u8>)>(&query);
        for id in artifact_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, blob)| (id, vector_from_blob(&blob)))
            .collect())
    }

    // ===== Lexical search =====

    /// Full-text search over artifact text. Raw scores are positive,
    /// higher is better (negated FTS5 bm25).
    pub async fn lexical_search(
        &self,
        query: &str,
        limit: usize,
        video_id: Option<&str>,
    ) -> Result<Vec<LexicalHit>> {
        let match_expr = fts_match_expr(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(FromRow)]
        struct Row {
            id: String,
            video_id: String,
            #[sqlx(rename = "type")]
            artifact_type: String,
            start_sec: f64,
            end_sec: Option<f64>,
            text: String,
            source_stage: String,
            filename: String,
            score: f64,
        }

        let base = r#"
            SELECT a.id, a.video_id, a.type, a.start_sec, a.end_sec, a.text, a.source_stage,
                   v.filename, -bm25(artifacts_fts) AS score
            FROM artifacts_fts
            JOIN artifacts a ON a.rowid = artifacts_fts.rowid
            JOIN videos v ON v.id = a.video_id
            WHERE artifacts_fts MATCH ?
        "#;

        let rows = if let Some(vid) = video_id {
            sqlx::query_as::<_, Row>(&format!(
                "{} AND a.video_id = ? ORDER BY bm25(artifacts_fts), a.start_sec, a.id LIMIT ?",
                base
            ))
            .bind(&match_expr)
            .bind(vid)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Row>(&format!(
                "{} ORDER BY bm25(artifacts_fts), a.start_sec, a.id LIMIT ?",
                base
            ))
            .bind(&match_expr)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows
            .into_iter()
            .map(|r| LexicalHit {
                artifact: ArtifactRecord {
                    id: r.id,
                    video_id: r.video_id,
                    artifact_type: r.artifact_type,
                    start_sec: r.start_sec,
                    end_sec: r.end_sec,
                    text: r.text,
                    source_stage: r.source_stage,
                },
                filename: r.filename,
                raw_score: r.score.abs() as f32,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::connect(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    async fn insert_test_video(store: &Store, hash: &str, filename: &str) -> VideoRecord {
        let mut video = VideoRecord::new(
            format!("/videos/{}", filename),
            filename.to_string(),
            hash.to_string(),
        );
        video.duration_sec = 10.0;
        store.insert_video(&video).await.unwrap();
        video
    }

    #[test]
    fn vector_blob_roundtrip() {
        let vector = vec![1.0f32, -0.5, 0.25, 3.75];
        assert_eq!(vector_from_blob(&vector_to_blob(&vector)), vector);
    }

    #[test]
    fn fts_expr_quotes_terms() {
        assert_eq!(fts_match_expr("door opens"), "\"door\" OR \"opens\"");
        assert_eq!(fts_match_expr("say \"hi\""), "\"say\" OR \"\"\"hi\"\"\"");
        assert_eq!(fts_match_expr("   "), "");
    }

    #[tokio::test]
    async fn duplicate_hash_is_rejected() {
        let (store, _tmp) = setup().await;
        insert_test_video(&store, "hash1", "a.mp4").await;

        let dupe = VideoRecord::new("/videos/b.mp4".into(), "b.mp4".into(), "hash1".into());
        let err = store.insert_video(&dupe).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateVideo(_)));
    }

    #[tokio::test]
    async fn artifact_insert_is_immediately_searchable() {
        let (store, _tmp) = setup().await;
        let video = insert_test_video(&store, "hash1", "demo.mp4").await;

        let artifact = ArtifactRecord::new(
            &video.id,
            ArtifactType::Transcript,
            1.0,
            Some(4.0),
            "the quick brown fox".into(),
            "transcription",
        );
        store.insert_artifacts(&[artifact.clone()]).await.unwrap();

        let hits = store.lexical_search("fox", 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].artifact.id, artifact.id);
        assert_eq!(hits[0].filename, "demo.mp4");
        assert!(hits[0].raw_score > 0.0);
    }

    #[tokio::test]
    async fn delete_video_cascades_to_artifacts_and_index() {
        let (store, _tmp) = setup().await;
        let video = insert_test_video(&store, "hash1", "demo.mp4").await;

        let artifact = ArtifactRecord::new(
            &video.id,
            ArtifactType::Caption,
            0.0,
            Some(5.0),
            "red car drives away".into(),
            "cascade_layer0",
        );
        store.insert_artifacts(&[artifact.clone()]).await.unwrap();
        store
            .insert_embeddings("test-model", &[(artifact.id.clone(), vec![0.1, 0.2])])
            .await
            .unwrap();

        store.delete_video(&video.id).await.unwrap();

        assert!(store.lexical_search("car", 10, None).await.unwrap().is_empty());
        assert!(store.get_artifacts(&video.id, None).await.unwrap().is_empty());
        assert!(store
            .embeddings_for(&[artifact.id.clone()])
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            store.get_video(&video.id).await,
            Err(Error::VideoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn artifacts_are_ordered_and_filterable() {
        let (store, _tmp) = setup().await;
        let video = insert_test_video(&store, "hash1", "demo.mp4").await;

        let later = ArtifactRecord::new(
            &video.id,
            ArtifactType::Transcript,
            8.0,
            Some(9.0),
            "later".into(),
            "transcription",
        );
        let earlier = ArtifactRecord::new(
            &video.id,
            ArtifactType::Caption,
            2.0,
            Some(3.0),
            "earlier".into(),
            "cascade_layer0",
        );
        store.insert_artifacts(&[later, earlier]).await.unwrap();

        let all = store.get_artifacts(&video.id, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].text, "earlier");

        let transcripts = store
            .get_artifacts(&video.id, Some(ArtifactType::Transcript))
            .await
            .unwrap();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].text, "later");
    }

    #[tokio::test]
    async fn embeddings_roundtrip_and_pending_query() {
        let (store, _tmp) = setup().await;
        let video = insert_test_video(&store, "hash1", "demo.mp4").await;

        let a = ArtifactRecord::new(
            &video.id,
            ArtifactType::Transcript,
            0.0,
            Some(1.0),
            "alpha".into(),
            "transcription",
        );
        let b = ArtifactRecord::new(
            &video.id,
            ArtifactType::Transcript,
            1.0,
            Some(2.0),
            "beta".into(),
            "transcription",
        );
        store.insert_artifacts(&[a.clone(), b.clone()]).await.unwrap();

        store
            .insert_embeddings("test-model", &[(a.id.clone(), vec![0.5, 0.5])])
            .await
            .unwrap();

        let pending = store.artifacts_without_embeddings(&video.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);

        let vectors = store
            .embeddings_for(&[a.id.clone(), b.id.clone()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[&a.id], vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn lexical_search_scopes_by_video() {
        let (store, _tmp) = setup().await;
        let v1 = insert_test_video(&store, "hash1", "one.mp4").await;
        let v2 = insert_test_video(&store, "hash2", "two.mp4").await;

        store
            .insert_artifacts(&[
                ArtifactRecord::new(
                    &v1.id,
                    ArtifactType::Transcript,
                    0.0,
                    None,
                    "pricing details".into(),
                    "transcription",
                ),
                ArtifactRecord::new(
                    &v2.id,
                    ArtifactType::Transcript,
                    0.0,
                    None,
                    "pricing overview".into(),
                    "transcription",
                ),
            ])
            .await
            .unwrap();

        let scoped = store
            .lexical_search("pricing", 10, Some(&v1.id))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].artifact.video_id, v1.id);

        let all = store.lexical_search("pricing", 10, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
