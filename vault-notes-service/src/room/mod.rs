//! Per-note discussion rooms.
//!
//! Every note slug maps to at most one live room actor. The actor is the
//! only writer of the room's storage and applies commands one at a time,
//! which is what gives each room a single total order over its entries.
//! Idle actors are released and restarted on the next request.

mod actor;
mod router;
mod store;

pub use router::RoomRouter;
pub use store::{RoomStorage, RoomStorageOpener, SqliteRoomOpener};

use sha2::{Digest, Sha256};
use std::fmt;

/// Default and upper bound for `list` page sizes
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

/// Stable identity of a room: lowercase hex SHA-256 of the note slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    pub fn from_slug(slug: &str) -> Self {
        RoomId(hex::encode(Sha256::digest(slug.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs
        f.write_str(&self.0[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_is_deterministic() {
        assert_eq!(RoomId::from_slug("alpha"), RoomId::from_slug("alpha"));
        assert_ne!(RoomId::from_slug("alpha"), RoomId::from_slug("beta"));
        assert_ne!(RoomId::from_slug("alpha"), RoomId::from_slug("Alpha"));
    }

    #[test]
    fn test_room_id_shape() {
        let id = RoomId::from_slug("research/quantum-notes");
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.to_string().len(), 12);
    }
}
