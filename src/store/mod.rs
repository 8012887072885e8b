//! Run ledger with SQLite
//!
//! Records every annotator run, each conversation checkpoint inside it, and
//! the digest of the last file furrow wrote. Resumption does not depend on
//! the ledger: the markers in the conversation files decide what is pending.

mod schema;

use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::annotate::ConversationReport;
use crate::enrich::PassKind;
use crate::model::{self, Conversation};

pub use schema::SCHEMA;

pub struct RunLedger {
    conn: Connection,
}

impl RunLedger {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let ledger = Self { conn };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ============================================
    // RUNS
    // ============================================

    /// Start a run and return its id
    pub fn begin_run(&self, pass: PassKind, source: &Path) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO runs (id, pass, source_path, status, started_at)
             VALUES (?, ?, ?, 'running', datetime('now'))",
            params![id, pass.as_str(), path_key(source)],
        )?;
        Ok(id)
    }

    pub fn record_checkpoint(&self, run_id: &str, report: &ConversationReport) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO checkpoints
               (run_id, conversation_index, conversation_key, enriched, not_applicable,
                errored, skipped, calls, saved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))"#,
            params![
                run_id,
                report.index as i64,
                report.key,
                report.counts.enriched as i64,
                report.counts.not_applicable as i64,
                report.counts.errored as i64,
                report.counts.skipped as i64,
                report.calls as i64,
            ],
        )?;
        Ok(())
    }

    /// Close a run, totalling its checkpoints
    pub fn finish_run(&self, run_id: &str, status: &str) -> Result<()> {
        self.conn.execute(
            r#"UPDATE runs SET
                   status = ?2,
                   finished_at = datetime('now'),
                   conversations = (SELECT COUNT(*) FROM checkpoints WHERE run_id = ?1),
                   enriched = (SELECT COALESCE(SUM(enriched), 0) FROM checkpoints WHERE run_id = ?1),
                   not_applicable = (SELECT COALESCE(SUM(not_applicable), 0) FROM checkpoints WHERE run_id = ?1),
                   errored = (SELECT COALESCE(SUM(errored), 0) FROM checkpoints WHERE run_id = ?1),
                   calls = (SELECT COALESCE(SUM(calls), 0) FROM checkpoints WHERE run_id = ?1)
               WHERE id = ?1"#,
            params![run_id, status],
        )?;
        Ok(())
    }

    pub fn checkpoint_count(&self, run_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM checkpoints WHERE run_id = ?",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ============================================
    // FILES
    // ============================================

    pub fn record_file_digest(&self, path: &Path, sha256: &str, conversations: usize) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO files (path, sha256, conversation_count, saved_at)
               VALUES (?, ?, ?, datetime('now'))
               ON CONFLICT(path) DO UPDATE SET
                   sha256 = excluded.sha256,
                   conversation_count = excluded.conversation_count,
                   saved_at = datetime('now')"#,
            params![path_key(path), sha256, conversations as i64],
        )?;
        Ok(())
    }

    /// Digest of the last save furrow made to `path`
    pub fn last_digest(&self, path: &Path) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT sha256 FROM files WHERE path = ?",
            params![path_key(path)],
            |row| row.get(0),
        );

        match result {
            Ok(digest) => Ok(Some(digest)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save outside an annotator run and record the digest, so the next
    /// run does not mistake furrow's own write for an external edit
    pub fn save_conversations(&self, path: &Path, records: &[Conversation]) -> Result<String> {
        let digest = model::save_conversations(path, records)?;
        self.record_file_digest(path, &digest, records.len())?;
        Ok(digest)
    }

    // ============================================
    // QUERIES
    // ============================================

    pub fn list_runs(&self, pass: Option<PassKind>) -> Result<Vec<RunRow>> {
        let base_query = r#"SELECT id, pass, source_path, status, started_at, finished_at,
                      conversations, enriched, not_applicable, errored, calls
               FROM runs"#;

        let query = match pass {
            Some(_) => format!("{} WHERE pass = ?1 ORDER BY started_at DESC, rowid DESC", base_query),
            None => format!("{} ORDER BY started_at DESC, rowid DESC", base_query),
        };

        let mut stmt = self.conn.prepare(&query)?;
        let rows: Vec<RunRow> = match pass {
            Some(p) => stmt
                .query_map(params![p.as_str()], map_run)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], map_run)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(rows)
    }

    /// Find a run by full id or id prefix
    pub fn get_run(&self, query: &str) -> Result<Option<RunRow>> {
        let row = self.conn.query_row(
            r#"SELECT id, pass, source_path, status, started_at, finished_at,
                      conversations, enriched, not_applicable, errored, calls
               FROM runs
               WHERE id = ?1 OR id LIKE ?2
               ORDER BY CASE WHEN id = ?1 THEN 0 ELSE 1 END
               LIMIT 1"#,
            params![query, format!("{}%", query)],
            map_run,
        );

        match row {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_checkpoints(&self, run_id: &str) -> Result<Vec<CheckpointRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT conversation_index, conversation_key, enriched, not_applicable,
                      errored, skipped, calls, saved_at
               FROM checkpoints
               WHERE run_id = ?
               ORDER BY id"#,
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok(CheckpointRow {
                conversation_index: row.get(0)?,
                conversation_key: row.get(1)?,
                enriched: row.get(2)?,
                not_applicable: row.get(3)?,
                errored: row.get(4)?,
                skipped: row.get(5)?,
                calls: row.get(6)?,
                saved_at: row.get(7)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn map_run(row: &rusqlite::Row) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: row.get(0)?,
        pass: row.get(1)?,
        source_path: row.get(2)?,
        status: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        conversations: row.get(6)?,
        enriched: row.get(7)?,
        not_applicable: row.get(8)?,
        errored: row.get(9)?,
        calls: row.get(10)?,
    })
}

/// Files are keyed by canonical path when it resolves
fn path_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug)]
pub struct RunRow {
    pub id: String,
    pub pass: String,
    pub source_path: String,
    pub status: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub conversations: i64,
    pub enriched: i64,
    pub not_applicable: i64,
    pub errored: i64,
    pub calls: i64,
}

#[derive(Debug)]
pub struct CheckpointRow {
    pub conversation_index: i64,
    pub conversation_key: String,
    pub enriched: i64,
    pub not_applicable: i64,
    pub errored: i64,
    pub skipped: i64,
    pub calls: i64,
    pub saved_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{ConversationReport, Counts};
    use tempfile::tempdir;

    fn report(index: usize, enriched: usize, errored: usize) -> ConversationReport {
        ConversationReport {
            index,
            key: format!("c{index}"),
            counts: Counts {
                enriched,
                errored,
                ..Default::default()
            },
            calls: enriched + errored,
            cleared: 0,
        }
    }

    #[test]
    fn test_tracked_save_matches_file_digest() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(&dir.path().join("ledger.db")).unwrap();
        let path = dir.path().join("conversations.json");
        let records = vec![Conversation::with_id("c1", vec![model::Message::user("hi")])];

        assert_eq!(ledger.last_digest(&path).unwrap(), None);
        let digest = ledger.save_conversations(&path, &records).unwrap();
        assert_eq!(digest, model::file_digest(&path).unwrap());
        assert_eq!(ledger.last_digest(&path).unwrap(), Some(digest));
    }

    #[test]
    fn test_run_totals_come_from_checkpoints() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(&dir.path().join("nested/ledger.db")).unwrap();
        let source = dir.path().join("conversations.json");

        let run = ledger.begin_run(PassKind::Classify, &source).unwrap();
        ledger.record_checkpoint(&run, &report(0, 3, 0)).unwrap();
        ledger.record_checkpoint(&run, &report(2, 1, 2)).unwrap();
        ledger.finish_run(&run, "aborted").unwrap();

        let row = ledger.get_run(&run[..8]).unwrap().unwrap();
        assert_eq!(row.id, run);
        assert_eq!(row.pass, "classify");
        assert_eq!(row.status, "aborted");
        assert_eq!(row.conversations, 2);
        assert_eq!(row.enriched, 4);
        assert_eq!(row.errored, 2);
        assert_eq!(row.calls, 6);
        assert!(row.finished_at.is_some());

        let checkpoints = ledger.get_checkpoints(&run).unwrap();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[1].conversation_key, "c2");
    }

    #[test]
    fn test_list_runs_filters_by_pass() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(&dir.path().join("ledger.db")).unwrap();
        let source = dir.path().join("a.json");
        ledger.begin_run(PassKind::Classify, &source).unwrap();
        ledger.begin_run(PassKind::Translate, &source).unwrap();
        ledger.begin_run(PassKind::Classify, &source).unwrap();

        assert_eq!(ledger.list_runs(None).unwrap().len(), 3);
        assert_eq!(ledger.list_runs(Some(PassKind::Classify)).unwrap().len(), 2);
        assert!(ledger.list_runs(Some(PassKind::Standalone)).unwrap().is_empty());
        assert!(ledger.get_run("no-such-run").unwrap().is_none());
    }

    #[test]
    fn test_file_digest_upsert() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(&dir.path().join("ledger.db")).unwrap();
        let source = dir.path().join("conversations.json");
        std::fs::write(&source, "[]").unwrap();

        assert_eq!(ledger.last_digest(&source).unwrap(), None);
        ledger.record_file_digest(&source, "aaa", 1).unwrap();
        ledger.record_file_digest(&source, "bbb", 2).unwrap();
        assert_eq!(ledger.last_digest(&source).unwrap().as_deref(), Some("bbb"));
    }
}
