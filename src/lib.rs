//! reelsmax - keep short videos playing only while an AI is generating
//!
//! A poll loop samples the chat page for a "generating" signal, turns the
//! raw samples into start/finish edges and fans pause/play commands out to
//! every registered video surface.
//!
//! # Architecture
//!
//! - **heuristics**: per-provider selector rules, resolved by page origin
//! - **probe**: evaluates a profile against a page (in-process, in an
//!   isolated context, or from recorded snapshots)
//! - **debouncer**: collapses samples into edges
//! - **controller**: the Paused/Playing state machine and status projection
//! - **surface**: per-surface command workers
//! - **monitor**: the tick loop that drives all of the above

pub mod config;
pub mod controller;
pub mod debouncer;
pub mod dom;
pub mod heuristics;
pub mod monitor;
pub mod native_messaging;
pub mod platforms;
pub mod probe;
pub mod surface;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use controller::PlaybackController;
pub use debouncer::StateDebouncer;
pub use dom::{Document, HtmlSnapshot};
pub use heuristics::{HeuristicRegistry, ProviderProfile, SelectorRule};
pub use monitor::{Monitor, MonitorCommand, MonitorHandle, MonitorReport};
pub use native_messaging::{RelayMessage, RelaySurface};
pub use platforms::SocialPlatform;
pub use probe::{probe, GenerationSignal, RemoteProbe, ReplaySource, ScriptHost};
pub use surface::{LogSurface, ScriptSurface, Surface, SurfaceRegistry};
pub use types::{
    DomError, Edge, ElementMetrics, Phase, PlaybackState, ProbeError, StatusView,
    SurfaceCommand, SurfaceError, SurfaceId,
};
