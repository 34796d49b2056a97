use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::{Config, PipelineConfig};
use crate::vision::landmarks::FaceLandmarker;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    landmarker: Arc<dyn FaceLandmarker>,
    sessions: Arc<SessionRegistry>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

/// Counts live telemetry sessions and hands out session ids.
pub struct SessionRegistry {
    active: AtomicUsize,
    next_id: AtomicU64,
    max_sessions: usize,
}

/// Held for the lifetime of one session; releases its slot on drop.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            max_sessions,
        }
    }

    pub fn try_open(self: &Arc<Self>) -> Option<SessionGuard> {
        let current = self.active.fetch_add(1, Ordering::SeqCst);
        if current >= self.max_sessions {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(SessionGuard {
            registry: Arc::clone(self),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AppState {
    pub fn new(
        config: &Config,
        landmarker: Arc<dyn FaceLandmarker>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            config: Arc::new(config.clone()),
            landmarker,
            sessions: Arc::new(SessionRegistry::new(config.limits.max_sessions)),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.config.pipeline
    }

    pub fn landmarker(&self) -> &Arc<dyn FaceLandmarker> {
        &self.landmarker
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
