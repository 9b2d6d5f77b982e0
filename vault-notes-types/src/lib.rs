//! Shared types for the vault notes service and its HTTP clients.

use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// Metadata index entry stored under `NOTE:{slug}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteMeta {
    /// Object storage key of the markdown source, e.g. `public/Note.md`
    pub key: String,
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One entry of a note's discussion log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyEntry {
    /// Milliseconds since the Unix epoch, strictly increasing within a room
    pub timestamp: i64,
    pub payload: String,
}

/// Acknowledgement returned by a successful append
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppendAck {
    pub ok: bool,
}

impl AppendAck {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// A metadata search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub slug: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

impl From<NoteMeta> for SearchHit {
    fn from(meta: NoteMeta) -> Self {
        Self {
            slug: meta.slug,
            title: meta.title,
            tags: meta.tags,
        }
    }
}

// =====================================================
// Request Types
// =====================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListRepliesQuery {
    pub limit: Option<usize>,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub open_rooms: usize,
    pub hmac_algorithm: String,
    pub last_maintenance_at: Option<String>,
    pub maintenance_interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_meta_optional_fields() {
        let meta: NoteMeta =
            serde_json::from_str(r#"{"key":"public/Note.md","slug":"note"}"#).unwrap();
        assert_eq!(meta.title, None);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_reply_entry_wire_shape() {
        let entry = ReplyEntry {
            timestamp: 1_700_000_000_000,
            payload: "hello".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["payload"], "hello");
    }

    #[test]
    fn test_rpc_error_omits_data() {
        let resp: RpcResponse<()> = RpcResponse::err("boom");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"boom"}"#);
    }
}
