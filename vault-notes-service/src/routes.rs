//! Axum route handlers: note pages, search, discussion replies and service
//! endpoints.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use vault_notes_types::*;

use crate::auth::Authenticator;
use crate::error::{AppError, Result};
use crate::maintenance::Maintenance;
use crate::notes::{self, NoteIndex, ObjectStore};
use crate::pages;
use crate::room::{RoomRouter, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::search;

pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const SIGNATURE_HEADER: &str = "x-signature";

pub struct AppState {
    pub rooms: RoomRouter,
    pub authenticator: Authenticator,
    pub index: Arc<dyn NoteIndex>,
    pub objects: Arc<dyn ObjectStore>,
    pub maintenance: Arc<Maintenance>,
    pub start_time: Instant,
    pub cron_interval_secs: u64,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home).fallback(not_found))
        .route("/n/*slug", get(render_note).fallback(not_found))
        .route("/api/search", get(search_notes).fallback(not_found))
        .route(
            "/api/n/*path",
            get(list_replies).post(append_reply).fallback(not_found),
        )
        .route("/api/status", get(status).fallback(not_found))
        .route("/_cron", post(cron).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Split `{slug}/replies` into a validated slug.
fn replies_slug(path: &str) -> Option<&str> {
    let slug = path.trim_start_matches('/').strip_suffix("/replies")?;
    notes::is_valid_slug(slug).then_some(slug)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// GET /
async fn home() -> Response {
    pages::home()
}

// GET /n/{slug}
async fn render_note(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let slug = slug.trim_start_matches('/');
    if !notes::is_valid_slug(slug) {
        return Err(AppError::NotFound("Not found"));
    }
    let note = notes::load_note(state.index.as_ref(), state.objects.as_ref(), slug).await?;
    Ok(pages::note(&note, slug))
}

/// Unparseable query strings are treated like unknown routes.
fn query_or_not_found<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    match query {
        Ok(Query(q)) => Ok(q),
        Err(e) => {
            log::debug!("[HTTP] Rejected query string: {}", e);
            Err(AppError::NotFound("Not Found"))
        }
    }
}

// GET /api/search?q=
async fn search_notes(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<SearchHit>>> {
    let q = query_or_not_found(query)?.q.unwrap_or_default();
    let hits = search::search(state.index.as_ref(), &q).await?;
    Ok(Json(hits))
}

// POST /api/n/{slug}/replies
async fn append_reply(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AppendAck>> {
    let slug = replies_slug(&path).ok_or(AppError::NotFound("Not Found"))?;

    let authorized = state
        .authenticator
        .authenticate(
            header_str(&headers, AGENT_ID_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            &body,
        )
        .await;
    if !authorized {
        return Err(AppError::AuthenticationDenied);
    }

    let ack = state.rooms.append(slug, body.to_vec()).await?;
    log::info!(
        "[REPLIES] Appended {} byte(s) to '{}' from '{}'",
        body.len(),
        slug,
        header_str(&headers, AGENT_ID_HEADER).unwrap_or_default()
    );
    Ok(Json(ack))
}

// GET /api/n/{slug}/replies?limit=
async fn list_replies(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    query: std::result::Result<Query<ListRepliesQuery>, QueryRejection>,
) -> Result<Json<Vec<ReplyEntry>>> {
    let slug = replies_slug(&path).ok_or(AppError::NotFound("Not Found"))?;
    let limit = query_or_not_found(query)?
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let entries = state.rooms.list(slug, limit).await?;
    Ok(Json(entries))
}

// POST /_cron
async fn cron(State(state): State<Arc<AppState>>) -> Result<&'static str> {
    state.maintenance.tick(state.index.as_ref(), "http").await?;
    Ok("ok")
}

// GET /api/status
async fn status(State(state): State<Arc<AppState>>) -> Json<RpcResponse<ServiceStatus>> {
    Json(RpcResponse::ok(ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        open_rooms: state.rooms.open_rooms(),
        hmac_algorithm: state.authenticator.algorithm().to_string(),
        last_maintenance_at: state.maintenance.last_run_at().await,
        maintenance_interval_secs: state.cron_interval_secs,
    }))
}
