//! Video surfaces and the registry that fans commands out to them.
//!
//! Every registered surface gets its own worker task fed by a bounded
//! queue. Enqueuing never waits on a surface; each command runs under a
//! timeout and its failure only affects that surface.

use crate::probe::ScriptHost;
use crate::types::{SurfaceCommand, SurfaceError, SurfaceId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// A region hosting autoplaying video
#[async_trait::async_trait]
pub trait Surface: Send + Sync {
    fn id(&self) -> SurfaceId;

    async fn pause_all(&self) -> Result<(), SurfaceError>;

    async fn play_all(&self) -> Result<(), SurfaceError>;
}

/// Apply one command to a surface
pub async fn apply(surface: &dyn Surface, command: SurfaceCommand) -> Result<(), SurfaceError> {
    match command {
        SurfaceCommand::Pause => surface.pause_all().await,
        SurfaceCommand::Play => surface.play_all().await,
    }
}

async fn run_worker(
    surface: Arc<dyn Surface>,
    mut commands: mpsc::Receiver<SurfaceCommand>,
    command_timeout: Duration,
) {
    let id = surface.id();

    while let Some(command) = commands.recv().await {
        match tokio::time::timeout(command_timeout, apply(surface.as_ref(), command)).await {
            Ok(Ok(())) => trace!("Surface {} applied {}", id, command.as_str()),
            Ok(Err(e)) => debug!("Surface {} failed to {}: {}", id, command.as_str(), e),
            Err(_) => debug!(
                "Surface {} failed to {}: {}",
                id,
                command.as_str(),
                SurfaceError::Timeout(command_timeout.as_millis() as u64)
            ),
        }
    }

    trace!("Worker for surface {} stopped", id);
}

/// Live surfaces, keyed by id. No ordering among surfaces.
pub struct SurfaceRegistry {
    slots: HashMap<SurfaceId, mpsc::Sender<SurfaceCommand>>,
    workers: Vec<JoinHandle<()>>,
    command_timeout: Duration,
    queue_depth: usize,
}

impl SurfaceRegistry {
    pub fn new(command_timeout: Duration, queue_depth: usize) -> Self {
        Self {
            slots: HashMap::new(),
            workers: Vec::new(),
            command_timeout,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Register a surface, replacing any surface with the same id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&mut self, surface: Arc<dyn Surface>) -> SurfaceId {
        let id = surface.id();
        let (tx, rx) = mpsc::channel(self.queue_depth);

        self.workers.retain(|worker| !worker.is_finished());
        self.workers
            .push(tokio::spawn(run_worker(surface, rx, self.command_timeout)));

        if self.slots.insert(id.clone(), tx).is_some() {
            debug!("Surface {} replaced", id);
        } else {
            info!("Surface {} registered", id);
        }
        id
    }

    /// Remove a surface. Commands already queued still drain.
    pub fn unregister(&mut self, id: &SurfaceId) -> bool {
        let removed = self.slots.remove(id).is_some();
        if removed {
            info!("Surface {} unregistered", id);
        }
        removed
    }

    pub fn for_each<F: FnMut(&SurfaceId)>(&self, mut f: F) {
        for id in self.slots.keys() {
            f(id);
        }
    }

    /// Queue a command for one surface. Returns whether it was queued.
    pub fn send(&self, id: &SurfaceId, command: SurfaceCommand) -> bool {
        match self.slots.get(id) {
            Some(tx) => enqueue(id, tx, command),
            None => false,
        }
    }

    /// Queue a command for every surface. Returns how many accepted it.
    pub fn broadcast(&self, command: SurfaceCommand) -> usize {
        self.slots
            .iter()
            .filter(|(id, tx)| enqueue(id, tx, command))
            .count()
    }

    pub fn contains(&self, id: &SurfaceId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<_> = self.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Unregister everything and wait for queued commands to drain
    pub async fn close(&mut self) {
        self.slots.clear();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

fn enqueue(id: &SurfaceId, tx: &mpsc::Sender<SurfaceCommand>, command: SurfaceCommand) -> bool {
    match tx.try_send(command) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Surface {} queue full, dropping {}", id, command.as_str());
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Surface {} worker gone, dropping {}", id, command.as_str());
            false
        }
    }
}

/// Surface that only logs the commands it receives
pub struct LogSurface {
    id: SurfaceId,
}

impl LogSurface {
    pub fn new(id: impl Into<SurfaceId>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait::async_trait]
impl Surface for LogSurface {
    fn id(&self) -> SurfaceId {
        self.id.clone()
    }

    async fn pause_all(&self) -> Result<(), SurfaceError> {
        info!("[{}] pause", self.id);
        Ok(())
    }

    async fn play_all(&self) -> Result<(), SurfaceError> {
        info!("[{}] play", self.id);
        Ok(())
    }
}

const PAUSE_VIDEOS_SCRIPT: &str = r#"(function() {
  const videos = document.querySelectorAll('video');
  videos.forEach(v => v.pause());
  return videos.length;
})()"#;

const PLAY_VIDEOS_SCRIPT: &str = r#"(function() {
  const videos = document.querySelectorAll('video');
  videos.forEach(v => v.play().catch(() => {}));
  return videos.length;
})()"#;

/// Surface living in an isolated context (webview, frame); video elements
/// are driven by evaluated scripts
pub struct ScriptSurface<H> {
    id: SurfaceId,
    host: Arc<H>,
}

impl<H: ScriptHost> ScriptSurface<H> {
    pub fn new(id: impl Into<SurfaceId>, host: Arc<H>) -> Self {
        Self {
            id: id.into(),
            host,
        }
    }

    async fn run(&self, script: &str) -> Result<(), SurfaceError> {
        let videos = match self.host.evaluate(script).await? {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            _ => 0,
        };

        if videos == 0 {
            return Err(SurfaceError::NoVideo(self.id.clone()));
        }
        trace!("Surface {} drove {} videos", self.id, videos);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<H: ScriptHost> Surface for ScriptSurface<H> {
    fn id(&self) -> SurfaceId {
        self.id.clone()
    }

    async fn pause_all(&self) -> Result<(), SurfaceError> {
        self.run(PAUSE_VIDEOS_SCRIPT).await
    }

    async fn play_all(&self) -> Result<(), SurfaceError> {
        self.run(PLAY_VIDEOS_SCRIPT).await
    }
}
