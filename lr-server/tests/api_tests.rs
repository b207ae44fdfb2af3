//! Integration tests for the lr-server HTTP API
//!
//! Uses tower::ServiceExt::oneshot to test routes directly without binding a port.

use axum::body::Body;
use axum::response::Response;
use http_body_util::BodyExt;
use hyper::Request;
use lr_adapters::{DemoProvider, SessionFile, SessionFormat};
use lr_core::{ReplayConfig, ReplayMode, StandingsSnapshot, TelemetryProvider};
use lr_server::{
    api::create_router,
    replay::{DriverSelection, ReplaySession},
    state::AppState,
    ticker,
};
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "lapreplay-test-boundary";

/// Helper: AppState with a two-lap demo race loaded and no tick task
async fn state_with_replay() -> AppState {
    let state = AppState::default();
    let session = ReplaySession::load(
        &DemoProvider::with_laps(2),
        &DriverSelection::All,
        ReplayMode::FullSession,
        &ReplayConfig::default(),
    )
    .unwrap();
    *state.replay.write().await = Some(session);
    state
}

/// Helper: send one request through a fresh router over `state`
async fn send(state: &AppState, request: Request<Body>) -> Response {
    create_router(state.clone()).oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn control(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/replay/control")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload(uri: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY,
        f = file_name
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Helper: collect response body into bytes
async fn body_bytes(body: Body) -> Vec<u8> {
    let collected = body.collect().await.unwrap();
    collected.to_bytes().to_vec()
}

async fn body_json(body: Body) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}

fn demo_session_json() -> Vec<u8> {
    let provider = DemoProvider::with_laps(1);
    SessionFile::record(&provider, &provider.entities(), "Upload GP")
        .unwrap()
        .to_bytes(SessionFormat::Json)
        .unwrap()
}

// ==================== GET /api/replay/info ====================

#[tokio::test]
async fn test_info_without_replay_returns_404() {
    let state = AppState::default();
    let response = send(&state, get("/api/replay/info")).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_info_describes_loaded_replay() {
    let state = state_with_replay().await;
    let response = send(&state, get("/api/replay/info")).await;
    assert_eq!(response.status(), 200);

    let info = body_json(response.into_body()).await;
    assert_eq!(info["name"], "Demo");
    assert_eq!(info["mode"], "full_session");
    assert_eq!(info["entities"].as_array().unwrap().len(), 5);
    assert_eq!(info["entities"][0]["id"], "VER");
    assert_eq!(info["entities"][0]["team"], "Red Bull Racing");
    assert_eq!(info["excluded"], serde_json::json!(["SAR"]));
    assert_eq!(info["status"], "playing");
    assert_eq!(info["current_time"], 0.0);
    assert_eq!(info["fps"], 30);

    // VER's fastest lap is the reference outline, padded by the default margin
    let outline = info["track_outline"].as_array().unwrap();
    assert!(outline.len() > 300);
    let xs: Vec<f64> = outline.iter().map(|p| p["x"].as_f64().unwrap()).collect();
    let ys: Vec<f64> = outline.iter().map(|p| p["y"].as_f64().unwrap()).collect();
    let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let bounds = &info["bounds"];
    let close = |a: f64, b: f64| (a - b).abs() < 1e-3;
    assert!(close(bounds["min_x"].as_f64().unwrap(), min_x - 20.0));
    assert!(close(bounds["max_x"].as_f64().unwrap(), max_x + 20.0));
    assert!(close(bounds["min_y"].as_f64().unwrap(), min_y - 20.0));
    assert!(close(bounds["max_y"].as_f64().unwrap(), max_y + 20.0));
}

// ==================== POST /api/replay/control ====================

#[tokio::test]
async fn test_control_without_replay_returns_404() {
    let state = AppState::default();
    let response = send(&state, control(serde_json::json!({"action": "toggle"}))).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_control_toggle_pauses_and_resumes() {
    let state = state_with_replay().await;

    let response = send(&state, control(serde_json::json!({"action": "toggle"}))).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(response.into_body()).await["status"], "paused");

    let response = send(&state, control(serde_json::json!({"action": "play"}))).await;
    assert_eq!(body_json(response.into_body()).await["status"], "playing");

    let response = send(&state, control(serde_json::json!({"action": "pause"}))).await;
    assert_eq!(body_json(response.into_body()).await["status"], "paused");

    let replay = state.replay.read().await;
    assert!(!replay.as_ref().unwrap().controller().is_playing());
}

#[tokio::test]
async fn test_control_speed_is_clamped() {
    let state = state_with_replay().await;
    let response = send(
        &state,
        control(serde_json::json!({"action": "speed", "value": 10.0})),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(response.into_body()).await["speed"], 3.0);
}

#[tokio::test]
async fn test_control_invalid_speed_returns_400_and_keeps_speed() {
    let state = state_with_replay().await;
    let response = send(
        &state,
        control(serde_json::json!({"action": "speed", "value": 0.0})),
    )
    .await;
    assert_eq!(response.status(), 400);

    let replay = state.replay.read().await;
    assert_eq!(replay.as_ref().unwrap().controller().speed(), 1.0);
}

#[tokio::test]
async fn test_control_missing_value_returns_400() {
    let state = state_with_replay().await;
    let response = send(&state, control(serde_json::json!({"action": "scrub"}))).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_control_unknown_action_returns_400() {
    let state = state_with_replay().await;
    let response = send(&state, control(serde_json::json!({"action": "rewind"}))).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_scrub_then_render_reports_target_time() {
    let state = state_with_replay().await;
    send(&state, control(serde_json::json!({"action": "pause"}))).await;

    let response = send(
        &state,
        control(serde_json::json!({"action": "scrub", "value": 42.0})),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(response.into_body()).await["status"], "scrub_pending");

    let response = send(&state, get("/api/replay/snapshot")).await;
    assert_eq!(response.status(), 200);
    let frame = body_json(response.into_body()).await;
    assert_eq!(frame["time"], 42.0);
    assert_eq!(frame["status"], "paused");
    assert_eq!(frame["positions"].as_object().unwrap().len(), 5);

    let replay = state.replay.read().await;
    assert_eq!(replay.as_ref().unwrap().controller().current_time(), 42.0);
}

// ==================== GET /api/replay/snapshot ====================

#[tokio::test]
async fn test_snapshot_at_time_leaves_playback_untouched() {
    let state = state_with_replay().await;
    let response = send(&state, get("/api/replay/snapshot?t=60")).await;
    assert_eq!(response.status(), 200);

    let snapshot = body_json(response.into_body()).await;
    assert_eq!(snapshot["time"], 60.0);
    let standings = snapshot["standings"].as_array().unwrap();
    assert_eq!(standings.len(), 5);
    assert_eq!(standings[0]["rank"], 0);
    assert_eq!(standings[0]["gap"]["kind"], "leader");

    let replay = state.replay.read().await;
    assert_eq!(replay.as_ref().unwrap().controller().current_time(), 0.0);
}

#[tokio::test]
async fn test_snapshot_as_msgpack() {
    let state = state_with_replay().await;
    let response = send(&state, get("/api/replay/snapshot?t=30&format=msgpack")).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/msgpack"
    );

    let bytes = body_bytes(response.into_body()).await;
    let snapshot: StandingsSnapshot = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot.leader().unwrap().rank, 0);
}

#[tokio::test]
async fn test_snapshot_without_replay_returns_404() {
    let state = AppState::default();
    let response = send(&state, get("/api/replay/snapshot?t=10")).await;
    assert_eq!(response.status(), 404);
}

// ==================== DELETE /api/replay ====================

#[tokio::test]
async fn test_delete_replay_returns_204_then_404() {
    let state = state_with_replay().await;
    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/replay")
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&state, delete()).await.status(), 204);
    assert_eq!(send(&state, get("/api/replay/info")).await.status(), 404);
    assert_eq!(send(&state, delete()).await.status(), 404);
}

// ==================== POST /api/replay/upload ====================

#[tokio::test]
async fn test_upload_starts_replay_and_rejects_second_upload() {
    let state = AppState::default();
    let data = demo_session_json();

    let response = send(
        &state,
        upload("/api/replay/upload?mode=race&drivers=VER,NOR", "session.json", &data),
    )
    .await;
    assert_eq!(response.status(), 200);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["info"]["name"], "Upload GP");
    assert_eq!(body["info"]["mode"], "full_session");
    assert_eq!(body["info"]["entities"].as_array().unwrap().len(), 2);
    assert!(state.replay_cancel.read().await.is_some());

    let response = send(&state, upload("/api/replay/upload", "session.json", &data)).await;
    assert_eq!(response.status(), 409);

    state.cancel_playback().await;
}

#[tokio::test]
async fn test_upload_unsupported_extension_returns_400() {
    let state = AppState::default();
    let response = send(&state, upload("/api/replay/upload", "session.ibt", b"nope")).await;
    assert_eq!(response.status(), 400);
    assert!(state.replay.read().await.is_none());
}

#[tokio::test]
async fn test_upload_invalid_mode_returns_400() {
    let state = AppState::default();
    let response = send(
        &state,
        upload("/api/replay/upload?mode=qualifying", "session.json", &demo_session_json()),
    )
    .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_upload_corrupt_session_returns_400() {
    let state = AppState::default();
    let response = send(&state, upload("/api/replay/upload", "session.lrs", b"not zstd")).await;
    assert_eq!(response.status(), 400);
}

// ==================== GET /api/replay/stream ====================

#[tokio::test]
async fn test_stream_delivers_render_requests() {
    let state = state_with_replay().await;
    ticker::start(&state).await;

    let response = send(&state, get("/api/replay/stream")).await;
    assert_eq!(response.status(), 200);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(
        content_type.contains("text/event-stream"),
        "Expected text/event-stream content-type, got: {}",
        content_type
    );

    // Read the body with a timeout
    let body = response.into_body();
    let text = tokio::time::timeout(Duration::from_secs(3), async {
        let mut stream = body.into_data_stream();
        use futures::StreamExt;
        while let Some(Ok(chunk)) = stream.next().await {
            let text = String::from_utf8(chunk.to_vec()).unwrap();
            if text.contains("data:") {
                return Some(text);
            }
        }
        None
    })
    .await
    .expect("stream should produce a frame")
    .expect("stream ended without a frame");

    // SSE format: "data: {json}\n\n"
    let data_line = text.lines().find(|l| l.starts_with("data:")).unwrap();
    let frame: serde_json::Value =
        serde_json::from_str(data_line.trim_start_matches("data:").trim()).unwrap();
    assert!(frame.get("positions").is_some());
    assert!(frame.get("snapshot").is_some());
    assert!(frame.get("current_lap").is_some());

    state.cancel_playback().await;
}

// ==================== Tick task ====================

#[tokio::test]
async fn test_tick_task_advances_time() {
    let state = state_with_replay().await;
    let mut rx = state.subscribe();
    ticker::start(&state).await;

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(second.time > first.time);

    state.cancel_playback().await;
}

#[tokio::test]
async fn test_tick_task_stops_when_replay_dropped() {
    let state = state_with_replay().await;
    let mut rx = state.subscribe();
    ticker::start(&state).await;

    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();

    state.replay.write().await.take();

    // The sender side stays alive in AppState, so drain until frames stop
    let stopped = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
                Err(_) => return true,
                Ok(Ok(_)) => continue,
                Ok(Err(_)) => continue,
            }
        }
    })
    .await;
    assert!(matches!(stopped, Ok(true)), "tick task kept broadcasting");
}

// ==================== AppState unit tests ====================

#[tokio::test]
async fn test_app_state_default() {
    let state = AppState::default();
    assert!(state.replay.read().await.is_none());
    assert!(state.replay_cancel.read().await.is_none());
    assert_eq!(state.config.fps, 30);
}
