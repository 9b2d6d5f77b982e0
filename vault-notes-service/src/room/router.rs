use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use vault_notes_types::{AppendAck, ReplyEntry};

use super::actor::{Retirement, Room, RoomCommand, RoomHandle, RoomRegistry};
use super::store::RoomStorageOpener;
use super::RoomId;
use crate::error::Result;

/// Maps note slugs to room actors and forwards calls to them.
///
/// The registry only guarantees that each `RoomId` has at most one live
/// actor; it holds no room data and never locks across an append or list.
/// Actors idle for `idle_timeout` remove themselves.
pub struct RoomRouter {
    opener: Arc<dyn RoomStorageOpener>,
    rooms: Arc<RoomRegistry>,
    idle_timeout: Duration,
    next_generation: AtomicU64,
}

impl RoomRouter {
    pub fn new(opener: Arc<dyn RoomStorageOpener>, idle_timeout: Duration) -> Self {
        Self {
            opener,
            rooms: Arc::new(RoomRegistry::new()),
            idle_timeout,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Handle of the room for `slug`, starting its actor on first use.
    pub fn route_for(&self, slug: &str) -> Result<RoomHandle> {
        let id = RoomId::from_slug(slug);
        if let Some(handle) = self.rooms.get(&id) {
            return Ok(handle.clone());
        }

        match self.rooms.entry(id) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let id = e.key().clone();
                let storage = self.opener.open(&id)?;
                let handle = RoomHandle::spawn_registered(
                    Room::new(id, storage),
                    Retirement {
                        registry: self.rooms.clone(),
                        generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                        idle_timeout: self.idle_timeout,
                    },
                );
                log::info!("[ROOM] Opened room {} for '{}'", handle.id(), slug);
                e.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    /// Deliver `cmd` to the live actor for `slug`. An actor that retired
    /// between lookup and send hands the command back; it is re-routed
    /// once the registry slot frees up.
    async fn dispatch(&self, slug: &str, mut cmd: RoomCommand) -> Result<RoomHandle> {
        loop {
            let handle = self.route_for(slug)?;
            match handle.send(cmd).await {
                Ok(()) => return Ok(handle),
                Err(returned) => {
                    cmd = returned;
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    pub async fn append(&self, slug: &str, payload: Vec<u8>) -> Result<AppendAck> {
        let (reply, rx) = oneshot::channel();
        let handle = self
            .dispatch(slug, RoomCommand::Append { payload, reply })
            .await?;
        rx.await.map_err(|_| handle.unavailable())?
    }

    pub async fn list(&self, slug: &str, limit: usize) -> Result<Vec<ReplyEntry>> {
        let (reply, rx) = oneshot::channel();
        let handle = self.dispatch(slug, RoomCommand::List { limit, reply }).await?;
        rx.await.map_err(|_| handle.unavailable())?
    }

    pub fn open_rooms(&self) -> usize {
        self.rooms.len()
    }
}
