use std::env;
use std::path::PathBuf;

use crate::auth::HmacAlgorithm;
use crate::error::{AppError, Result};

pub const DEFAULT_PORT: u16 = 9110;
pub const DEFAULT_CRON_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_ROOM_IDLE_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Root directory of the markdown vault (object storage)
    pub vault_dir: PathBuf,
    /// Key/value namespace holding `NOTE:` and `AIKEY:` entries
    pub kv_path: String,
    pub rooms_path: String,
    pub hmac_algorithm: HmacAlgorithm,
    /// 0 disables the scheduled maintenance tick
    pub cron_interval_secs: u64,
    /// Seconds without commands before a room actor is released
    pub room_idle_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("VAULT_NOTES_PORT") {
            Ok(s) => s
                .parse()
                .map_err(|_| AppError::Config(format!("VAULT_NOTES_PORT is not a port: {}", s)))?,
            Err(_) => DEFAULT_PORT,
        };

        let hmac_algorithm = match env::var("HMAC_ALGO") {
            Ok(s) => s.parse()?,
            Err(_) => HmacAlgorithm::default(),
        };

        let cron_interval_secs = match env::var("VAULT_NOTES_CRON_INTERVAL") {
            Ok(s) => s.parse().map_err(|_| {
                AppError::Config(format!("VAULT_NOTES_CRON_INTERVAL is not a number: {}", s))
            })?,
            Err(_) => DEFAULT_CRON_INTERVAL_SECS,
        };

        let room_idle_secs = match env::var("VAULT_NOTES_ROOM_IDLE_SECS") {
            Ok(s) => match s.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(AppError::Config(format!(
                        "VAULT_NOTES_ROOM_IDLE_SECS must be a positive number: {}",
                        s
                    )))
                }
            },
            Err(_) => DEFAULT_ROOM_IDLE_SECS,
        };

        Ok(Self {
            bind: env::var("VAULT_NOTES_BIND").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            vault_dir: env::var("VAULT_NOTES_DIR")
                .unwrap_or_else(|_| "./vault".to_string())
                .into(),
            kv_path: env::var("VAULT_NOTES_KV_PATH")
                .unwrap_or_else(|_| "./vault_notes_kv.db".to_string()),
            rooms_path: env::var("VAULT_NOTES_ROOMS_PATH")
                .unwrap_or_else(|_| "./vault_notes_rooms.db".to_string()),
            hmac_algorithm,
            cron_interval_secs,
            room_idle_secs,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
