//! Core types used throughout the monitor.
//!
//! This module defines the generation edges, the playback state machine,
//! element layout metrics reported by a document, and the error enums for
//! each failure domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A detected transition of the "is the AI generating" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    /// Signal went from idle to generating
    StartedGenerating,
    /// Signal went from generating to idle
    FinishedGenerating,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::StartedGenerating => "started_generating",
            Edge::FinishedGenerating => "finished_generating",
        }
    }
}

/// Playback phase of the video surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Paused,
    Playing,
}

impl Phase {
    /// Command that brings a surface into this phase
    pub fn command(&self) -> SurfaceCommand {
        match self {
            Phase::Paused => SurfaceCommand::Pause,
            Phase::Playing => SurfaceCommand::Play,
        }
    }
}

/// Playback state owned by the controller.
///
/// `phase` records the last command issued to the surfaces. No per-surface
/// state is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub phase: Phase,
    pub last_transition_at: DateTime<Utc>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Paused,
            last_transition_at: Utc::now(),
        }
    }

    /// Move to `phase`, stamping the transition time
    pub fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.last_transition_at = Utc::now();
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// User-visible status, a projection of the playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusView {
    /// A surface is ready and nothing has been generated yet
    Ready,
    /// The AI is generating and the surfaces are playing
    Generating,
    /// The response is ready and the surfaces are paused
    Paused,
}

impl StatusView {
    pub fn label(&self) -> &'static str {
        match self {
            StatusView::Ready => "Ready",
            StatusView::Generating => "Generating...",
            StatusView::Paused => "Paused",
        }
    }
}

/// Command delivered to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceCommand {
    Pause,
    Play,
}

impl SurfaceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceCommand::Pause => "pause",
            SurfaceCommand::Play => "play",
        }
    }
}

/// Identifier of a registered video surface (e.g. `sidepanel:instagram`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(String);

impl SurfaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SurfaceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SurfaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// CSS `display` as far as visibility is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Display {
    Shown,
    None,
}

/// CSS `visibility` as far as visibility is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Layout metrics of one element matched by a selector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementMetrics {
    /// Whether the element is still attached to the document
    pub attached: bool,
    pub display: Display,
    pub visibility: Visibility,
    pub opacity: f32,
    /// Bounding box width in CSS pixels
    pub width: f64,
    /// Bounding box height in CSS pixels
    pub height: f64,
}

impl ElementMetrics {
    /// An attached, fully shown element with the given box
    pub fn shown(width: f64, height: f64) -> Self {
        Self {
            attached: true,
            display: Display::Shown,
            visibility: Visibility::Visible,
            opacity: 1.0,
            width,
            height,
        }
    }

    /// Visibility test applied to every candidate element.
    ///
    /// Attached, not `display:none`, not `visibility:hidden`, not fully
    /// transparent, and a bounding box with both sides greater than zero.
    pub fn is_visible(&self) -> bool {
        self.attached
            && self.display != Display::None
            && self.visibility != Visibility::Hidden
            && self.opacity != 0.0
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Errors raised while querying a document
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Document access denied: {0}")]
    AccessDenied(String),
}

/// Errors raised while evaluating a probe in an isolated context
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Execution context destroyed")]
    ContextDestroyed,

    #[error("Probe timed out after {0}ms")]
    Timeout(u64),

    #[error("Probe returned a non-boolean value: {0}")]
    NonBoolean(String),
}

/// Errors raised by a surface while applying a command
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Surface is gone: {0}")]
    Gone(SurfaceId),

    #[error("No video elements on surface {0}")]
    NoVideo(SurfaceId),

    #[error("Playback rejected: {0}")]
    Rejected(String),

    #[error("Command timed out after {0}ms")]
    Timeout(u64),

    #[error("Script error: {0}")]
    Script(#[from] ProbeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
