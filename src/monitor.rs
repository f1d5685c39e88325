//! Poll loop tying the probe, debouncer and controller together.
//!
//! The loop is the only concurrency primitive: each tick samples the
//! signal once and awaits it before the next tick can run, so at most one
//! probe is ever in flight. Ticks that come due while a probe is still
//! running are skipped, not queued. UI events (surface ready, platform
//! switch, navigation) arrive as `MonitorCommand`s and are applied between
//! ticks on the same loop.

use crate::config::{Config, TimingConfig};
use crate::controller::PlaybackController;
use crate::debouncer::StateDebouncer;
use crate::heuristics::{HeuristicRegistry, ProviderProfile};
use crate::probe::GenerationSignal;
use crate::surface::Surface;
use crate::types::{Edge, Phase, StatusView, SurfaceId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

/// UI-side events applied between ticks
pub enum MonitorCommand {
    /// A surface finished loading
    Attach(Arc<dyn Surface>),
    /// A surface was torn down
    Detach(SurfaceId),
    /// The user picked another platform
    SwitchPlatform {
        old: Option<SurfaceId>,
        surface: Arc<dyn Surface>,
    },
    /// The chat page navigated; restart the session
    Navigate { origin: String },
}

/// Summary of a monitoring session
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub provider: String,
    pub ticks: u64,
    pub edges: u64,
    /// Samples that completed after a stop was requested
    pub discarded: u64,
    pub phase: Phase,
    pub surfaces: usize,
}

pub struct Monitor<S> {
    registry: HeuristicRegistry,
    profile: ProviderProfile,
    origin: String,
    signal: S,
    debouncer: StateDebouncer,
    controller: PlaybackController,
    poll_interval: Duration,
    resync_interval: Option<Duration>,
    ticks: u64,
    edges: u64,
    discarded: u64,
}

impl<S: GenerationSignal + 'static> Monitor<S> {
    pub fn new(
        registry: HeuristicRegistry,
        controller: PlaybackController,
        origin: &str,
        signal: S,
        timing: &TimingConfig,
    ) -> Self {
        let profile = registry.resolve(origin).clone();

        Self {
            registry,
            profile,
            origin: origin.to_string(),
            signal,
            debouncer: StateDebouncer::new(),
            controller,
            poll_interval: Duration::from_millis(timing.poll_interval_ms.max(1)),
            resync_interval: match timing.resync_interval_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            ticks: 0,
            edges: 0,
            discarded: 0,
        }
    }

    pub fn from_config(config: &Config, origin: &str, signal: S) -> Self {
        Self::new(
            config.heuristic_registry(),
            PlaybackController::from_config(config),
            origin,
            signal,
            &config.timing,
        )
    }

    /// Sample once and feed the result through debouncer and controller
    pub async fn tick(&mut self) -> Option<Edge> {
        let signal = self.signal.sample(&self.profile).await;
        self.apply_sample(signal)
    }

    fn apply_sample(&mut self, signal: bool) -> Option<Edge> {
        self.ticks += 1;
        trace!("Tick {}: generating={}", self.ticks, signal);

        let edge = self.debouncer.tick(signal)?;
        self.edges += 1;
        self.controller.on_edge(edge);
        Some(edge)
    }

    /// Apply a UI event
    pub fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::Attach(surface) => {
                self.controller.attach(surface);
            }
            MonitorCommand::Detach(id) => {
                if !self.controller.detach(&id) {
                    debug!("Detach for unknown surface {}", id);
                }
            }
            MonitorCommand::SwitchPlatform { old, surface } => {
                self.controller.switch_surface(old.as_ref(), surface);
            }
            MonitorCommand::Navigate { origin } => self.navigate(&origin),
        }
    }

    /// Restart the session for a new page origin
    pub fn navigate(&mut self, origin: &str) {
        self.profile = self.registry.resolve(origin).clone();
        self.origin = origin.to_string();
        self.debouncer.reset();
        self.controller.reset();
        info!("Monitoring {} with {} heuristics", self.origin, self.profile.name);
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn report(&self) -> MonitorReport {
        MonitorReport {
            provider: self.profile.name.clone(),
            ticks: self.ticks,
            edges: self.edges,
            discarded: self.discarded,
            phase: self.controller.phase(),
            surfaces: self.controller.surfaces().len(),
        }
    }

    /// Run the poll loop on its own task
    pub fn spawn(self) -> MonitorHandle {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (stop_tx, stop_rx) = watch::channel(false);
        let status = self.controller.subscribe();

        let task = tokio::spawn(self.run(commands_rx, stop_rx));

        MonitorHandle {
            commands: commands_tx,
            stop: stop_tx,
            status,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<MonitorCommand>,
        mut stop: watch::Receiver<bool>,
    ) -> MonitorReport {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let resync_period = self.resync_interval.unwrap_or(Duration::from_secs(60));
        let mut resync = tokio::time::interval_at(Instant::now() + resync_period, resync_period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Monitoring {} with {} heuristics every {:?}",
            self.origin, self.profile.name, self.poll_interval
        );

        loop {
            tokio::select! {
                biased;

                _ = stop.changed() => break,

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                _ = poll.tick() => {
                    let signal = self.signal.sample(&self.profile).await;
                    let stopped = *stop.borrow();
                    if stopped {
                        self.discarded += 1;
                        debug!("Monitor stopped during probe, discarding sample");
                        break;
                    }
                    self.apply_sample(signal);
                }

                _ = resync.tick(), if self.resync_interval.is_some() => {
                    self.controller.resync();
                }
            }
        }

        let report = self.report();
        self.controller.close().await;
        info!(
            "Monitoring stopped after {} ticks, {} edges",
            report.ticks, report.edges
        );
        report
    }
}

/// Handle to a spawned monitor
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    stop: watch::Sender<bool>,
    status: watch::Receiver<StatusView>,
    task: JoinHandle<MonitorReport>,
}

impl MonitorHandle {
    /// Queue a UI event. Returns false once the monitor has stopped.
    pub async fn send(&self, command: MonitorCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Status projection of the playback phase
    pub fn status(&self) -> watch::Receiver<StatusView> {
        self.status.clone()
    }

    /// Ask the loop to stop without waiting for it
    pub fn request_stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the loop to finish
    pub async fn join(self) -> Result<MonitorReport, JoinError> {
        self.task.await
    }

    /// Stop the loop and wait for its report
    pub async fn stop(self) -> Result<MonitorReport, JoinError> {
        self.request_stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceRegistry;
    use crate::types::{SurfaceCommand, SurfaceError};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::sync::Notify;

    /// Replays a fixed list of signals, then reads idle
    struct ScriptedSignal(Mutex<VecDeque<bool>>);

    impl ScriptedSignal {
        fn new(signals: &[bool]) -> Self {
            Self(Mutex::new(signals.iter().copied().collect()))
        }
    }

    #[async_trait::async_trait]
    impl GenerationSignal for ScriptedSignal {
        async fn sample(&self, _profile: &ProviderProfile) -> bool {
            self.0.lock().unwrap().pop_front().unwrap_or(false)
        }
    }

    /// Blocks inside `sample` until released
    struct GatedSignal {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl GenerationSignal for GatedSignal {
        async fn sample(&self, _profile: &ProviderProfile) -> bool {
            self.entered.notify_one();
            self.release.notified().await;
            true
        }
    }

    /// Stalls on the first sample only, counting every sample taken
    struct SlowFirstSignal {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        samples: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl GenerationSignal for SlowFirstSignal {
        async fn sample(&self, _profile: &ProviderProfile) -> bool {
            if self.samples.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            false
        }
    }

    struct RecordingSurface {
        id: SurfaceId,
        log: UnboundedSender<SurfaceCommand>,
    }

    #[async_trait::async_trait]
    impl Surface for RecordingSurface {
        fn id(&self) -> SurfaceId {
            self.id.clone()
        }

        async fn pause_all(&self) -> Result<(), SurfaceError> {
            let _ = self.log.send(SurfaceCommand::Pause);
            Ok(())
        }

        async fn play_all(&self) -> Result<(), SurfaceError> {
            let _ = self.log.send(SurfaceCommand::Play);
            Ok(())
        }
    }

    fn timing() -> TimingConfig {
        TimingConfig {
            poll_interval_ms: 10,
            ..TimingConfig::default()
        }
    }

    fn monitor<S: GenerationSignal + 'static>(origin: &str, signal: S) -> Monitor<S> {
        Monitor::new(
            HeuristicRegistry::new(),
            PlaybackController::new(SurfaceRegistry::new(Duration::from_millis(200), 8), false),
            origin,
            signal,
            &timing(),
        )
    }

    #[tokio::test]
    async fn test_tick_emits_edges() {
        let mut monitor = monitor(
            "https://chatgpt.com",
            ScriptedSignal::new(&[false, false, true, true, false]),
        );

        let mut edges = Vec::new();
        for _ in 0..5 {
            edges.push(monitor.tick().await);
        }

        assert_eq!(
            edges,
            vec![
                None,
                None,
                Some(Edge::StartedGenerating),
                None,
                Some(Edge::FinishedGenerating),
            ]
        );
        let report = monitor.report();
        assert_eq!(report.ticks, 5);
        assert_eq!(report.edges, 2);
        assert_eq!(report.phase, Phase::Paused);
    }

    #[tokio::test]
    async fn test_navigate_resets_session() {
        let mut monitor = monitor("https://chatgpt.com", ScriptedSignal::new(&[true, true]));
        monitor.tick().await;
        assert_eq!(monitor.controller().phase(), Phase::Playing);

        monitor.navigate("https://claude.ai/new");
        assert_eq!(monitor.profile().name, "Claude");
        assert_eq!(monitor.controller().phase(), Phase::Paused);

        // Debouncer forgot the previous sample, so this is a fresh start
        assert_eq!(monitor.tick().await, Some(Edge::StartedGenerating));
    }

    #[tokio::test]
    async fn test_spawned_monitor_fans_out() {
        let mut monitor = monitor(
            "https://gemini.google.com",
            ScriptedSignal::new(&[false, true, true, false]),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.controller_mut().attach(Arc::new(RecordingSurface {
            id: "sidepanel".into(),
            log: tx,
        }));
        let handle = monitor.spawn();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            let command = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(command);
        }

        assert_eq!(
            seen,
            vec![SurfaceCommand::Pause, SurfaceCommand::Play, SurfaceCommand::Pause]
        );

        let report = handle.stop().await.unwrap();
        assert_eq!(report.edges, 2);
        assert_eq!(report.surfaces, 1);
        assert_eq!(report.provider, "Gemini");
    }

    #[tokio::test]
    async fn test_sample_after_stop_is_discarded() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let monitor = monitor(
            "https://claude.ai",
            GatedSignal {
                entered: entered.clone(),
                release: release.clone(),
            },
        );
        let handle = monitor.spawn();

        entered.notified().await;
        handle.request_stop();
        release.notify_one();

        let report = handle.join().await.unwrap();
        assert_eq!(report.discarded, 1);
        assert_eq!(report.ticks, 0);
        assert_eq!(report.edges, 0);
        assert_eq!(report.phase, Phase::Paused);
    }

    #[tokio::test]
    async fn test_slow_sample_skips_missed_ticks() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let samples = Arc::new(AtomicUsize::new(0));
        let monitor = monitor(
            "https://chatgpt.com",
            SlowFirstSignal {
                entered: entered.clone(),
                release: release.clone(),
                samples: samples.clone(),
            },
        );
        let handle = monitor.spawn();

        // Hold the first sample across roughly ten poll periods
        entered.notified().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(samples.load(Ordering::SeqCst), 1);

        release.notify_one();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let report = handle.stop().await.unwrap();

        // Missed ticks are not replayed as a burst
        let after_release = samples.load(Ordering::SeqCst) - 1;
        assert!(after_release <= 5, "{} samples after release", after_release);
        assert_eq!(report.edges, 0);
    }

    #[tokio::test]
    async fn test_status_projection() {
        let monitor = monitor("https://chatgpt.com", ScriptedSignal::new(&[true; 100]));
        let handle = monitor.spawn();
        let mut status = handle.status();

        tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| *s == StatusView::Generating),
        )
        .await
        .unwrap()
        .unwrap();

        handle.stop().await.unwrap();
    }
}
