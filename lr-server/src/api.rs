//! REST API and SSE routes

use crate::replay::{DriverSelection, ReplaySession};
use crate::state::AppState;
use crate::ticker;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use lr_adapters::{SessionFile, SessionFileProvider, SessionFormat};
use lr_core::{ConfigError, ReplayMode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::Path;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

type ApiError = (StatusCode, String);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/replay/info", get(replay_info))
        .route("/api/replay/stream", get(replay_stream))
        .route(
            "/api/replay/snapshot",
            get(replay_snapshot).layer(CompressionLayer::new()),
        )
        .route("/api/replay/control", post(replay_control))
        .route(
            "/api/replay/upload",
            post(replay_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/replay", delete(replay_delete))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn no_replay() -> ApiError {
    (StatusCode::NOT_FOUND, "No active replay".to_string())
}

fn invalid(e: ConfigError) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

// === Encoding ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Format {
    #[default]
    Json,
    Msgpack,
}

fn encode<T: Serialize>(value: &T, format: Format) -> Result<Response, ApiError> {
    match format {
        Format::Json => Ok(Json(value).into_response()),
        Format::Msgpack => {
            let bytes = rmp_serde::to_vec_named(value).map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to encode MessagePack: {}", e),
                )
            })?;
            Ok(([(header::CONTENT_TYPE, "application/msgpack")], bytes).into_response())
        }
    }
}

// === Replay Endpoints ===

async fn replay_info(State(state): State<AppState>) -> Result<Response, ApiError> {
    let replay = state.replay.read().await;
    let session = replay.as_ref().ok_or_else(no_replay)?;
    Ok(Json(session.info()).into_response())
}

/// Render requests as they are produced by the tick task
async fn replay_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(frame) => match serde_json::to_string(&frame) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    tracing::error!("Failed to serialize render request: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Broadcast stream error: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct SnapshotQuery {
    t: Option<f64>,
    #[serde(default)]
    format: Format,
}

/// Standings at `t`, or without `t` an immediate render of the current frame
async fn replay_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Response, ApiError> {
    match query.t {
        Some(t) => {
            if !t.is_finite() {
                return Err(invalid(ConfigError::InvalidScrubTime(t)));
            }
            let replay = state.replay.read().await;
            let session = replay.as_ref().ok_or_else(no_replay)?;
            encode(&session.controller().snapshot_at(t), query.format)
        }
        None => {
            let mut replay = state.replay.write().await;
            let session = replay.as_mut().ok_or_else(no_replay)?;
            encode(&session.controller_mut().render(), query.format)
        }
    }
}

#[derive(Deserialize)]
struct ReplayControlRequest {
    action: String,
    value: Option<f64>,
}

async fn replay_control(
    State(state): State<AppState>,
    Json(request): Json<ReplayControlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut replay = state.replay.write().await;
    let controller = replay.as_mut().ok_or_else(no_replay)?.controller_mut();

    let missing_value = || {
        (
            StatusCode::BAD_REQUEST,
            format!("Missing 'value' for {}", request.action),
        )
    };

    match request.action.as_str() {
        "toggle" => {
            let status = controller.toggle_play_pause();
            Ok(Json(serde_json::json!({"status": status})))
        }
        "play" => {
            controller.play();
            Ok(Json(serde_json::json!({"status": controller.status()})))
        }
        "pause" => {
            controller.pause();
            Ok(Json(serde_json::json!({"status": controller.status()})))
        }
        "speed" => {
            let speed = request.value.ok_or_else(missing_value)?;
            let applied = controller.set_speed(speed).map_err(invalid)?;
            Ok(Json(serde_json::json!({"status": "speed_set", "speed": applied})))
        }
        "scrub" => {
            let target = request.value.ok_or_else(missing_value)?;
            controller.scrub(target).map_err(invalid)?;
            Ok(Json(serde_json::json!({"status": "scrub_pending", "target": target})))
        }
        _ => Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown action: {}", request.action),
        )),
    }
}

#[derive(Deserialize)]
struct UploadQuery {
    mode: Option<String>,
    drivers: Option<String>,
}

/// Handle a session file upload, load it and start playback
async fn replay_upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.replay.read().await.is_some() {
        return Err((
            StatusCode::CONFLICT,
            "A replay is already active. Delete it first.".to_string(),
        ));
    }

    let mode = match query.mode.as_deref() {
        Some(mode) => mode.parse::<ReplayMode>().map_err(invalid)?,
        None => ReplayMode::FastestLap,
    };
    let selection = match query.drivers.as_deref() {
        Some(drivers) => drivers
            .parse::<DriverSelection>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => DriverSelection::All,
    };

    let field = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)))?
        .ok_or((StatusCode::BAD_REQUEST, "No file provided".to_string()))?;

    let file_name = field.file_name().unwrap_or("upload.lrs").to_string();
    let format = SessionFormat::from_path(Path::new(&file_name))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let data = field
        .bytes()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file data: {}", e)))?;

    tracing::info!("Received session file: {} ({} bytes)", file_name, data.len());

    let session = SessionFile::from_bytes(&data, format).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to parse session file: {:#}", e),
        )
    })?;
    let provider = SessionFileProvider::new(session);

    let replay_session = ReplaySession::load(&provider, &selection, mode, &state.config)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{:#}", e)))?;
    let info = replay_session.info();

    {
        let mut replay = state.replay.write().await;
        if replay.is_some() {
            return Err((
                StatusCode::CONFLICT,
                "A replay is already active. Delete it first.".to_string(),
            ));
        }
        *replay = Some(replay_session);
    }

    ticker::start(&state).await;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "info": info
    })))
}

async fn replay_delete(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.cancel_playback().await;

    {
        let mut replay = state.replay.write().await;
        if replay.take().is_none() {
            return Err(no_replay());
        }
    }

    tracing::info!("Replay stopped and cleaned up");
    Ok(StatusCode::NO_CONTENT)
}
