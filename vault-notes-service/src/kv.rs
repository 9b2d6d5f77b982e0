//! SQLite-backed key/value namespace shared by the note index and the
//! agent secret store.
//!
//! Key layout:
//! - `NOTE:{slug}`   -> JSON `NoteMeta`
//! - `AIKEY:{agent}` -> shared secret
//!
//! The service only reads this namespace; entries are provisioned out of
//! band. Writers exist for tests.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::sync::Mutex;
use vault_notes_types::NoteMeta;

use crate::auth::SecretResolver;
use crate::error::Result;
use crate::notes::NoteIndex;

pub const NOTE_PREFIX: &str = "NOTE:";
pub const AGENT_KEY_PREFIX: &str = "AIKEY:";

pub struct KvStore {
    conn: Mutex<Connection>,
}

impl KvStore {
    pub fn open(path: &str) -> SqliteResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning leaves the connection usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> SqliteResult<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
    }

    #[cfg(test)]
    pub fn put(&self, key: &str, value: &str) -> SqliteResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, in key order.
    pub fn list_prefix(&self, prefix: &str) -> SqliteResult<Vec<(String, String)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT key, value FROM kv WHERE substr(key, 1, ?2) = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![prefix, prefix.chars().count() as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        rows.collect()
    }

    #[cfg(test)]
    pub fn put_note(&self, meta: &NoteMeta) -> Result<()> {
        let json = serde_json::to_string(meta)?;
        self.put(&format!("{}{}", NOTE_PREFIX, meta.slug), &json)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn put_agent_secret(&self, agent_id: &str, secret: &str) -> SqliteResult<()> {
        self.put(&format!("{}{}", AGENT_KEY_PREFIX, agent_id), secret)
    }
}

#[async_trait]
impl SecretResolver for KvStore {
    async fn resolve(&self, agent_id: &str) -> Result<Option<String>> {
        Ok(self.get(&format!("{}{}", AGENT_KEY_PREFIX, agent_id))?)
    }
}

#[async_trait]
impl NoteIndex for KvStore {
    async fn lookup(&self, slug: &str) -> Result<Option<NoteMeta>> {
        match self.get(&format!("{}{}", NOTE_PREFIX, slug))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn all_notes(&self) -> Result<Vec<NoteMeta>> {
        let mut notes = Vec::new();
        for (key, json) in self.list_prefix(NOTE_PREFIX)? {
            match serde_json::from_str::<NoteMeta>(&json) {
                Ok(meta) => notes.push(meta),
                Err(e) => log::warn!("[INDEX] Skipping unreadable entry {}: {}", key, e),
            }
        }
        Ok(notes)
    }
}
