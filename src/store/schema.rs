//! SQLite schema for the run ledger
//!
//! The conversation files stay the source of truth for what is done; the
//! ledger only records what each run did and the digest of the last save.

pub const SCHEMA: &str = r#"
-- ============================================
-- RUNS
-- ============================================

-- One row per annotator pass over one file
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,                   -- UUID
    pass TEXT NOT NULL,                    -- 'translate', 'classify', ...
    source_path TEXT NOT NULL,
    status TEXT DEFAULT 'running',         -- 'running', 'completed', 'aborted'
    started_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    finished_at DATETIME,
    conversations INTEGER DEFAULT 0,       -- conversations checkpointed
    enriched INTEGER DEFAULT 0,
    not_applicable INTEGER DEFAULT 0,
    errored INTEGER DEFAULT 0,
    calls INTEGER DEFAULT 0
);

-- One row per saved conversation
CREATE TABLE IF NOT EXISTS checkpoints (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL,
    conversation_index INTEGER NOT NULL,
    conversation_key TEXT NOT NULL,
    enriched INTEGER DEFAULT 0,
    not_applicable INTEGER DEFAULT 0,
    errored INTEGER DEFAULT 0,
    skipped INTEGER DEFAULT 0,
    calls INTEGER DEFAULT 0,
    saved_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE
);

-- ============================================
-- FILES
-- ============================================

-- Digest of the bytes furrow last wrote to each file
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    sha256 TEXT NOT NULL,
    conversation_count INTEGER,
    saved_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_runs_pass ON runs(pass);
CREATE INDEX IF NOT EXISTS idx_runs_path ON runs(source_path);
CREATE INDEX IF NOT EXISTS idx_checkpoints_run ON checkpoints(run_id);
"#;
