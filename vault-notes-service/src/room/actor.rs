//! The room actor: a tokio task that exclusively writes one room's storage.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use vault_notes_types::{AppendAck, ReplyEntry};

use super::store::RoomStorage;
use super::RoomId;
use crate::error::{AppError, Result};

/// Pending commands per room before senders wait
const ROOM_MAILBOX_SIZE: usize = 256;

/// Live actors by room, owned by the router.
pub type RoomRegistry = DashMap<RoomId, RoomHandle>;

/// Commands understood by a room actor.
#[derive(Debug)]
pub enum RoomCommand {
    Append {
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<AppendAck>>,
    },
    List {
        limit: usize,
        reply: oneshot::Sender<Result<Vec<ReplyEntry>>>,
    },
}

/// State of one discussion room.
pub struct Room {
    id: RoomId,
    storage: Arc<dyn RoomStorage>,
    last_key: Option<i64>,
    /// Whether `last_key` has been read back from storage yet
    resumed: bool,
}

impl Room {
    pub fn new(id: RoomId, storage: Arc<dyn RoomStorage>) -> Self {
        Self {
            id,
            storage,
            last_key: None,
            resumed: false,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub async fn append(&mut self, payload: Vec<u8>) -> Result<AppendAck> {
        self.append_at(chrono::Utc::now().timestamp_millis(), payload)
            .await
    }

    /// Keys never repeat: when the clock has not advanced past the last key
    /// the new entry takes `last_key + 1`.
    pub async fn append_at(&mut self, now_ms: i64, payload: Vec<u8>) -> Result<AppendAck> {
        if !self.resumed {
            self.last_key = self.blocking(|s| s.last_key()).await?;
            self.resumed = true;
        }
        let key = next_key(now_ms, self.last_key);
        self.blocking(move |s| s.put(key, &payload)).await?;
        self.last_key = Some(key);
        Ok(AppendAck::ok())
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<ReplyEntry>> {
        self.blocking(move |s| s.list_newest(limit)).await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn RoomStorage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || f(storage.as_ref()))
            .await
            .map_err(|e| AppError::RoomUnavailable(format!("{}: {}", self.id, e)))?
    }

    async fn apply(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Append { payload, reply } => {
                let result = self.append(payload).await;
                if let Err(e) = &result {
                    log::error!("[ROOM] {} append failed: {}", self.id, e);
                }
                // The caller may have gone away; the write stands either way.
                let _ = reply.send(result);
            }
            RoomCommand::List { limit, reply } => {
                let _ = reply.send(self.list(limit).await);
            }
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>, retirement: Option<Retirement>) {
        log::debug!("[ROOM] {} started", self.id);
        loop {
            let next = match &retirement {
                Some(r) => match tokio::time::timeout(r.idle_timeout, rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => break,
                },
                None => rx.recv().await,
            };
            match next {
                Some(cmd) => self.apply(cmd).await,
                None => break,
            }
        }

        // Refuse new commands, then answer everything already queued before
        // giving up the registry slot, so a successor never runs alongside.
        rx.close();
        while let Some(cmd) = rx.recv().await {
            self.apply(cmd).await;
        }
        if let Some(r) = retirement {
            r.registry
                .remove_if(&self.id, |_, handle| handle.generation == r.generation);
        }
        log::debug!("[ROOM] {} stopped", self.id);
    }
}

fn next_key(now_ms: i64, last_key: Option<i64>) -> i64 {
    match last_key {
        Some(last) if now_ms <= last => last + 1,
        _ => now_ms,
    }
}

/// Lets a registered actor remove itself after `idle_timeout` without
/// commands.
pub struct Retirement {
    pub registry: Arc<RoomRegistry>,
    pub generation: u64,
    pub idle_timeout: Duration,
}

/// Cloneable address of a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    id: RoomId,
    generation: u64,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Spawn an actor that runs until every handle is dropped. Must be
    /// called inside a tokio runtime.
    #[cfg(test)]
    pub fn spawn(room: Room) -> Self {
        Self::start(room, 0, None)
    }

    /// Spawn an actor that retires from `retirement.registry` when idle.
    pub fn spawn_registered(room: Room, retirement: Retirement) -> Self {
        Self::start(room, retirement.generation, Some(retirement))
    }

    fn start(room: Room, generation: u64, retirement: Option<Retirement>) -> Self {
        let (tx, rx) = mpsc::channel(ROOM_MAILBOX_SIZE);
        let id = room.id().clone();
        tokio::spawn(room.run(rx, retirement));
        Self { id, generation, tx }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Queue `cmd`. A retired actor hands the command back undelivered.
    pub async fn send(&self, cmd: RoomCommand) -> std::result::Result<(), RoomCommand> {
        self.tx.send(cmd).await.map_err(|e| e.0)
    }

    #[cfg(test)]
    pub async fn append(&self, payload: Vec<u8>) -> Result<AppendAck> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Append { payload, reply })
            .await
            .map_err(|_| self.unavailable())?;
        rx.await.map_err(|_| self.unavailable())?
    }

    #[cfg(test)]
    pub async fn list(&self, limit: usize) -> Result<Vec<ReplyEntry>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::List { limit, reply })
            .await
            .map_err(|_| self.unavailable())?;
        rx.await.map_err(|_| self.unavailable())?
    }

    pub fn unavailable(&self) -> AppError {
        AppError::RoomUnavailable(self.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::store::{RoomStorageOpener, SqliteRoomOpener};

    fn memory_room(slug: &str) -> Room {
        let id = RoomId::from_slug(slug);
        let opener = SqliteRoomOpener::open(":memory:").unwrap();
        Room::new(id.clone(), opener.open(&id).unwrap())
    }

    #[test]
    fn test_next_key() {
        assert_eq!(next_key(100, None), 100);
        assert_eq!(next_key(100, Some(50)), 100);
        assert_eq!(next_key(100, Some(100)), 101);
        assert_eq!(next_key(90, Some(100)), 101);
    }

    #[tokio::test]
    async fn test_same_millisecond_appends_are_kept() {
        let mut room = memory_room("alpha");
        room.append_at(1_000, b"one".to_vec()).await.unwrap();
        room.append_at(1_000, b"two".to_vec()).await.unwrap();
        room.append_at(1_000, b"three".to_vec()).await.unwrap();

        let entries = room.list(100).await.unwrap();
        let got: Vec<(i64, &str)> = entries
            .iter()
            .map(|e| (e.timestamp, e.payload.as_str()))
            .collect();
        assert_eq!(got, vec![(1_002, "three"), (1_001, "two"), (1_000, "one")]);
    }

    #[tokio::test]
    async fn test_clock_going_backwards_keeps_order() {
        let mut room = memory_room("alpha");
        room.append_at(5_000, b"late".to_vec()).await.unwrap();
        room.append_at(4_000, b"skewed".to_vec()).await.unwrap();
        let entries = room.list(100).await.unwrap();
        assert_eq!(entries[0].payload, "skewed");
        assert_eq!(entries[0].timestamp, 5_001);
    }

    #[tokio::test]
    async fn test_new_room_resumes_after_last_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.db");
        let path = path.to_str().unwrap();
        let id = RoomId::from_slug("alpha");

        {
            let opener = SqliteRoomOpener::open(path).unwrap();
            let mut room = Room::new(id.clone(), opener.open(&id).unwrap());
            room.append_at(i64::MAX / 2, b"future".to_vec()).await.unwrap();
        }

        let opener = SqliteRoomOpener::open(path).unwrap();
        let mut room = Room::new(id.clone(), opener.open(&id).unwrap());
        room.append(b"now".to_vec()).await.unwrap();
        let entries = room.list(100).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload, "now");
        assert_eq!(entries[0].timestamp, i64::MAX / 2 + 1);
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let handle = RoomHandle::spawn(memory_room("alpha"));
        assert_eq!(handle.append(b"hello".to_vec()).await.unwrap(), AppendAck::ok());
        let entries = handle.list(100).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, "hello");
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let handle = RoomHandle::spawn(memory_room("alpha"));
        for i in 0..5 {
            handle.append(format!("m{}", i).into_bytes()).await.unwrap();
        }
        let entries = handle.list(3).await.unwrap();
        let payloads: Vec<&str> = entries.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, vec!["m4", "m3", "m2"]);
    }

    #[tokio::test]
    async fn test_idle_actor_leaves_registry() {
        let registry = Arc::new(RoomRegistry::new());
        let room = memory_room("alpha");
        let id = room.id().clone();
        let handle = RoomHandle::spawn_registered(
            room,
            Retirement {
                registry: registry.clone(),
                generation: 7,
                idle_timeout: Duration::from_millis(50),
            },
        );
        registry.insert(id.clone(), handle.clone());

        handle.append(b"hello".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(registry.get(&id).is_none());
        let (reply, _rx) = oneshot::channel();
        let cmd = RoomCommand::List { limit: 1, reply };
        assert!(handle.send(cmd).await.is_err());
    }

    #[tokio::test]
    async fn test_retiring_actor_keeps_a_newer_registration() {
        let registry = Arc::new(RoomRegistry::new());
        let id = RoomId::from_slug("alpha");
        let old = RoomHandle::spawn_registered(
            memory_room("alpha"),
            Retirement {
                registry: registry.clone(),
                generation: 1,
                idle_timeout: Duration::from_millis(50),
            },
        );
        // A successor already took the slot
        let newer = RoomHandle::spawn(memory_room("alpha"));
        registry.insert(id.clone(), RoomHandle { generation: 2, ..newer });
        drop(old);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(registry.get(&id).map(|h| h.generation), Some(2));
    }
}
