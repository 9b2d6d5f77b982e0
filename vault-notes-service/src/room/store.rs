//! Durable storage for room entries.

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use vault_notes_types::ReplyEntry;

use super::RoomId;
use crate::error::Result;

/// Storage for one room. Calls block, so actors run them on the blocking
/// pool.
pub trait RoomStorage: Send + Sync {
    /// Highest key written so far
    fn last_key(&self) -> Result<Option<i64>>;

    /// Store `payload` under `key`. Fails rather than overwriting.
    fn put(&self, key: i64, payload: &[u8]) -> Result<()>;

    /// Up to `limit` entries, newest first
    fn list_newest(&self, limit: usize) -> Result<Vec<ReplyEntry>>;
}

/// Hands out the storage for a room the first time it is routed to.
/// Must not do I/O: it runs while the router holds its registry entry.
pub trait RoomStorageOpener: Send + Sync {
    fn open(&self, room: &RoomId) -> Result<Arc<dyn RoomStorage>>;
}

/// One SQLite connection shared by every room. Rooms only touch rows
/// tagged with their `RoomId`, so opening a room costs no file handles.
pub struct SqliteRoomOpener {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRoomOpener {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS room_entries (
                room_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                payload BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (room_id, ts)
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl RoomStorageOpener for SqliteRoomOpener {
    fn open(&self, room: &RoomId) -> Result<Arc<dyn RoomStorage>> {
        Ok(Arc::new(SqliteRoomStorage {
            conn: self.conn.clone(),
            room: room.clone(),
        }))
    }
}

pub struct SqliteRoomStorage {
    conn: Arc<Mutex<Connection>>,
    room: RoomId,
}

impl SqliteRoomStorage {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Poisoning leaves the connection usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RoomStorage for SqliteRoomStorage {
    fn last_key(&self) -> Result<Option<i64>> {
        let key = self.lock().query_row(
            "SELECT MAX(ts) FROM room_entries WHERE room_id = ?1",
            rusqlite::params![self.room.as_str()],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(key)
    }

    fn put(&self, key: i64, payload: &[u8]) -> Result<()> {
        self.lock().execute(
            "INSERT INTO room_entries (room_id, ts, payload) VALUES (?1, ?2, ?3)",
            rusqlite::params![self.room.as_str(), key, payload],
        )?;
        Ok(())
    }

    fn list_newest(&self, limit: usize) -> Result<Vec<ReplyEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT ts, payload FROM room_entries
             WHERE room_id = ?1
             ORDER BY ts DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![self.room.as_str(), limit as i64],
            |row| {
                let payload: Vec<u8> = row.get(1)?;
                Ok(ReplyEntry {
                    timestamp: row.get(0)?,
                    payload: String::from_utf8_lossy(&payload).into_owned(),
                })
            },
        )?;
        let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
