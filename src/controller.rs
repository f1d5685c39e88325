//! Playback controller.
//!
//! Owns the `PlaybackState` and the surface registry. Edges from the
//! debouncer move the state machine between `Paused` and `Playing`, and
//! every transition is fanned out to all live surfaces.

use crate::config::Config;
use crate::surface::{Surface, SurfaceRegistry};
use crate::types::{Edge, Phase, PlaybackState, StatusView, SurfaceCommand, SurfaceId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

pub struct PlaybackController {
    state: PlaybackState,
    surfaces: SurfaceRegistry,
    status: watch::Sender<StatusView>,
    /// Pause on `FinishedGenerating` even when no start was observed
    pause_on_unmatched_finish: bool,
    /// Whether any generation was seen since the last reset
    generated: bool,
}

impl PlaybackController {
    pub fn new(surfaces: SurfaceRegistry, pause_on_unmatched_finish: bool) -> Self {
        let (status, _) = watch::channel(StatusView::Paused);

        Self {
            state: PlaybackState::new(),
            surfaces,
            status,
            pause_on_unmatched_finish,
            generated: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let surfaces = SurfaceRegistry::new(
            Duration::from_millis(config.timing.surface_timeout_ms),
            config.timing.surface_queue_depth,
        );
        Self::new(surfaces, config.playback.pause_on_unmatched_finish)
    }

    /// Apply a debouncer edge. Returns the command broadcast, if any.
    pub fn on_edge(&mut self, edge: Edge) -> Option<SurfaceCommand> {
        match edge {
            Edge::StartedGenerating => {
                self.generated = true;
                self.publish(StatusView::Generating);

                if self.state.phase == Phase::Playing {
                    trace!("Already playing, ignoring start");
                    return None;
                }

                self.state.transition(Phase::Playing);
                let delivered = self.surfaces.broadcast(SurfaceCommand::Play);
                info!("AI started generating, resuming {} surfaces", delivered);
                Some(SurfaceCommand::Play)
            }
            Edge::FinishedGenerating => {
                self.publish(StatusView::Paused);

                if self.state.phase == Phase::Paused {
                    debug!(
                        "Finish observed while already paused (no matching start), pause_on_unmatched_finish={}",
                        self.pause_on_unmatched_finish
                    );
                    if !self.pause_on_unmatched_finish {
                        return None;
                    }
                }

                self.state.transition(Phase::Paused);
                let delivered = self.surfaces.broadcast(SurfaceCommand::Pause);
                info!("AI finished generating, pausing {} surfaces", delivered);
                Some(SurfaceCommand::Pause)
            }
        }
    }

    /// Register a surface that just became ready and bring it to the
    /// current phase
    pub fn attach(&mut self, surface: Arc<dyn Surface>) -> SurfaceId {
        let id = self.surfaces.register(surface);
        self.surfaces.send(&id, self.state.phase.command());

        if self.state.phase == Phase::Paused && !self.generated {
            self.publish(StatusView::Ready);
        }
        id
    }

    /// Remove a torn-down surface
    pub fn detach(&mut self, id: &SurfaceId) -> bool {
        self.surfaces.unregister(id)
    }

    /// Swap the surface for a new platform and force a known paused state
    pub fn switch_surface(
        &mut self,
        old: Option<&SurfaceId>,
        surface: Arc<dyn Surface>,
    ) -> SurfaceId {
        if let Some(old) = old {
            self.surfaces.unregister(old);
        }
        let id = self.surfaces.register(surface);

        self.state.transition(Phase::Paused);
        let delivered = self.surfaces.broadcast(SurfaceCommand::Pause);
        self.publish(StatusView::Paused);
        info!("Switched to surface {}, paused {} surfaces", id, delivered);
        id
    }

    /// Re-send the command for the current phase to every surface
    pub fn resync(&self) -> usize {
        let command = self.state.phase.command();
        let delivered = self.surfaces.broadcast(command);
        trace!("Resync sent {} to {} surfaces", command.as_str(), delivered);
        delivered
    }

    /// Reinitialise to `Paused` for a new monitoring session
    pub fn reset(&mut self) {
        if self.state.phase == Phase::Playing {
            self.surfaces.broadcast(SurfaceCommand::Pause);
        }
        self.state = PlaybackState::new();
        self.generated = false;
        self.publish(StatusView::Paused);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn status(&self) -> StatusView {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.status.subscribe()
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    /// Drop every surface once its queued commands have been applied
    pub async fn close(&mut self) {
        self.surfaces.close().await;
    }

    fn publish(&self, view: StatusView) {
        let previous = self.status.send_replace(view);
        if previous != view {
            debug!("Status: {}", view.label());
        }
    }
}
