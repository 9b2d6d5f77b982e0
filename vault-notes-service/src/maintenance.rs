//! Index maintenance trigger.
//!
//! Runs on a fixed interval and on `POST /_cron`. A tick currently only
//! takes stock of the index and records when it ran; rebuilding the index
//! from the vault is done out of band.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::notes::NoteIndex;

#[derive(Default)]
pub struct Maintenance {
    last_run_at: Mutex<Option<String>>,
}

impl Maintenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_run_at(&self) -> Option<String> {
        self.last_run_at.lock().await.clone()
    }

    /// One maintenance pass. Returns the number of indexed notes.
    pub async fn tick(&self, index: &dyn NoteIndex, trigger: &str) -> Result<usize> {
        let notes = index.all_notes().await?;
        let now = chrono::Utc::now().to_rfc3339();
        log::info!(
            "[CRON] Maintenance tick ({}): {} note(s) indexed",
            trigger,
            notes.len()
        );
        *self.last_run_at.lock().await = Some(now);
        Ok(notes.len())
    }
}

pub async fn run_worker(
    maintenance: Arc<Maintenance>,
    index: Arc<dyn NoteIndex>,
    interval_secs: u64,
) {
    log::info!("[CRON] Worker started (interval: {}s)", interval_secs);
    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        if let Err(e) = maintenance.tick(index.as_ref(), "scheduled").await {
            log::error!("[CRON] Tick error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvStore;
    use vault_notes_types::NoteMeta;

    #[tokio::test]
    async fn test_tick_records_last_run() {
        let kv = KvStore::open(":memory:").unwrap();
        kv.put_note(&NoteMeta {
            key: "a.md".to_string(),
            slug: "a".to_string(),
            title: None,
            tags: vec![],
        })
        .unwrap();
        let maintenance = Maintenance::new();
        assert_eq!(maintenance.last_run_at().await, None);

        assert_eq!(maintenance.tick(&kv, "manual").await.unwrap(), 1);
        assert!(maintenance.last_run_at().await.is_some());
    }
}
