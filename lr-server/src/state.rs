//! Application state management

use crate::replay::ReplaySession;
use lr_core::{RenderRequest, ReplayConfig};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

/// Render requests buffered per subscriber before it starts lagging
const RENDER_CHANNEL_CAPACITY: usize = 64;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Settings used for every replay started by this server
    pub config: Arc<ReplayConfig>,

    /// Active replay (None until a session is loaded)
    pub replay: Arc<RwLock<Option<ReplaySession>>>,

    /// Broadcast channel for render requests
    /// Multiple renderers can subscribe to receive frames
    pub render_tx: broadcast::Sender<RenderRequest>,

    /// Cancellation token for the tick task
    pub replay_cancel: Arc<RwLock<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new(config: ReplayConfig) -> Self {
        let (render_tx, _) = broadcast::channel(RENDER_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config),
            replay: Arc::new(RwLock::new(None)),
            render_tx,
            replay_cancel: Arc::new(RwLock::new(None)),
        }
    }

    /// Subscribe to render requests
    pub fn subscribe(&self) -> broadcast::Receiver<RenderRequest> {
        self.render_tx.subscribe()
    }

    /// Stop the tick task, if one is running
    pub async fn cancel_playback(&self) {
        let mut cancel = self.replay_cancel.write().await;
        if let Some(token) = cancel.take() {
            token.cancel();
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}
