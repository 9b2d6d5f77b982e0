//! Vault Notes Service: renders markdown notes from the vault and hosts a
//! per-note discussion log that only HMAC-authenticated agents can append to.
//!
//! Default: http://127.0.0.1:9110/

mod auth;
mod config;
mod error;
mod kv;
mod maintenance;
mod notes;
mod pages;
mod room;
mod routes;
mod search;

use routes::AppState;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    log::info!("Opening key/value index at: {}", config.kv_path);
    let kv = Arc::new(kv::KvStore::open(&config.kv_path).expect("Failed to open key/value index"));

    log::info!("Room log database: {}", config.rooms_path);
    let rooms = room::SqliteRoomOpener::open(&config.rooms_path).expect("Failed to open room log");
    log::info!("Vault directory: {}", config.vault_dir.display());
    log::info!("HMAC algorithm: {}", config.hmac_algorithm);

    let maintenance = Arc::new(maintenance::Maintenance::new());

    let state = Arc::new(AppState {
        rooms: room::RoomRouter::new(
            Arc::new(rooms),
            Duration::from_secs(config.room_idle_secs),
        ),
        authenticator: auth::Authenticator::new(kv.clone(), config.hmac_algorithm),
        index: kv.clone(),
        objects: Arc::new(notes::FsObjectStore::new(config.vault_dir.clone())),
        maintenance: maintenance.clone(),
        start_time: Instant::now(),
        cron_interval_secs: config.cron_interval_secs,
    });

    if config.cron_interval_secs > 0 {
        tokio::spawn(maintenance::run_worker(
            maintenance,
            kv,
            config.cron_interval_secs,
        ));
    } else {
        log::warn!("VAULT_NOTES_CRON_INTERVAL is 0; scheduled maintenance disabled");
    }

    let cors = tower_http::cors::CorsLayer::permissive();
    let app = routes::build_router(state).layer(cors);

    let addr = config.listen_addr();
    log::info!("Vault Notes Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
