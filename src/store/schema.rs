//! Embedded schema migrations with version tracking

/// Ordered migrations; index + 1 is the schema version.
///
/// The FTS triggers are the lexical-sync contract: an artifact row and
/// its full-text projection always commit in the same transaction, so
/// readers can never observe one without the other.
pub const MIGRATIONS: &[&str] = &[
    // Version 1: initial schema
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL,
        applied_at TEXT DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS videos (
        id TEXT PRIMARY KEY,
        file_path TEXT NOT NULL,
        filename TEXT NOT NULL,
        file_hash TEXT NOT NULL UNIQUE,
        file_size_bytes INTEGER NOT NULL,
        duration_sec REAL NOT NULL DEFAULT 0,
        width INTEGER,
        height INTEGER,
        status TEXT NOT NULL DEFAULT 'pending',
        error_message TEXT,
        ingest_config_json TEXT,
        ingested_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS artifacts (
        id TEXT PRIMARY KEY,
        video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        type TEXT NOT NULL,
        start_sec REAL NOT NULL,
        end_sec REAL,
        text TEXT NOT NULL,
        source_stage TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_artifacts_video ON artifacts(video_id, start_sec);
    CREATE INDEX IF NOT EXISTS idx_artifacts_type ON artifacts(video_id, type);

    CREATE TABLE IF NOT EXISTS embeddings (
        artifact_id TEXT PRIMARY KEY REFERENCES artifacts(id) ON DELETE CASCADE,
        model TEXT NOT NULL,
        dim INTEGER NOT NULL,
        vector BLOB NOT NULL
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS artifacts_fts USING fts5(
        text, content=artifacts, content_rowid=rowid
    );

    CREATE TRIGGER IF NOT EXISTS artifacts_ai AFTER INSERT ON artifacts BEGIN
        INSERT INTO artifacts_fts(rowid, text) VALUES (new.rowid, new.text);
    END;
    CREATE TRIGGER IF NOT EXISTS artifacts_ad AFTER DELETE ON artifacts BEGIN
        INSERT INTO artifacts_fts(artifacts_fts, rowid, text) VALUES('delete', old.rowid, old.text);
    END;
    CREATE TRIGGER IF NOT EXISTS artifacts_au AFTER UPDATE ON artifacts BEGIN
        INSERT INTO artifacts_fts(artifacts_fts, rowid, text) VALUES('delete', old.rowid, old.text);
        INSERT INTO artifacts_fts(rowid, text) VALUES (new.rowid, new.text);
    END;
    "#,
];
