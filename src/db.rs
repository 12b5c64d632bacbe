use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

pub const DB_FILE: &str = "planbook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS save_journal(
            id TEXT PRIMARY KEY,
            target TEXT NOT NULL,
            kind TEXT NOT NULL,
            entries INTEGER NOT NULL,
            payload_json TEXT,
            status TEXT NOT NULL,
            error TEXT,
            queued_at TEXT NOT NULL,
            completed_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_save_journal_completed ON save_journal(completed_at)",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

/// One flushed save batch and how it ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub target: String,
    pub kind: String,
    pub entries: i64,
    pub payload: Option<serde_json::Value>,
    pub status: String,
    pub error: Option<String>,
    pub queued_at: String,
    pub completed_at: String,
}

pub fn journal_insert(conn: &Connection, entry: &JournalEntry) -> anyhow::Result<()> {
    let payload = match &entry.payload {
        Some(v) => Some(serde_json::to_string(v)?),
        None => None,
    };
    conn.execute(
        "INSERT INTO save_journal(id, target, kind, entries, payload_json, status, error, queued_at, completed_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.id,
            entry.target,
            entry.kind,
            entry.entries,
            payload,
            entry.status,
            entry.error,
            entry.queued_at,
            entry.completed_at
        ],
    )?;
    Ok(())
}

/// Most recent first.
pub fn journal_recent(conn: &Connection, limit: i64) -> anyhow::Result<Vec<JournalEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, target, kind, entries, payload_json, status, error, queued_at, completed_at
         FROM save_journal
         ORDER BY completed_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt.query_map([limit], |r| {
        let payload: Option<String> = r.get(4)?;
        Ok(JournalEntry {
            id: r.get(0)?,
            target: r.get(1)?,
            kind: r.get(2)?,
            entries: r.get(3)?,
            payload: payload.and_then(|s| serde_json::from_str(&s).ok()),
            status: r.get(5)?,
            error: r.get(6)?,
            queued_at: r.get(7)?,
            completed_at: r.get(8)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
