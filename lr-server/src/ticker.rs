//! Playback tick task
//!
//! Drives the active replay's controller at the session's frame rate and
//! broadcasts every render request. Control requests take the same write
//! lock as a tick, so they always land between two ticks.

use crate::replay::ReplaySession;
use crate::state::AppState;
use lr_core::RenderRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Start the tick task for the active replay, replacing any previous one
pub async fn start(state: &AppState) {
    let token = CancellationToken::new();
    {
        let mut cancel = state.replay_cancel.write().await;
        if let Some(previous) = cancel.replace(token.clone()) {
            previous.cancel();
        }
    }

    tokio::spawn(run(state.replay.clone(), state.render_tx.clone(), token));
}

/// Tick until cancelled or until the replay is dropped
pub async fn run(
    replay: Arc<RwLock<Option<ReplaySession>>>,
    tx: broadcast::Sender<RenderRequest>,
    cancel: CancellationToken,
) {
    let fps = match &*replay.read().await {
        Some(session) => session.fps().max(1),
        None => return,
    };

    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Tick task started at {} fps", fps);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let frame = {
            let mut guard = replay.write().await;
            match guard.as_mut() {
                Some(session) => session.controller_mut().tick(),
                None => break,
            }
        };

        // Ignore error if no receivers (they'll get the next frame)
        let _ = tx.send(frame);
    }

    info!("Tick task ended");
}
