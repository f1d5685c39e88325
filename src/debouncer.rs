//! Edge detection over the sampled generating signal.
//!
//! The only debounce applied is the sampling cadence itself: a single
//! affirmative sample flips the state.

use crate::types::Edge;
use tracing::trace;

/// Converts a sampled boolean into `StartedGenerating` / `FinishedGenerating` edges
#[derive(Debug, Default)]
pub struct StateDebouncer {
    previous_signal: bool,
}

impl StateDebouncer {
    pub fn new() -> Self {
        Self {
            previous_signal: false,
        }
    }

    /// Feed one sample, returning the edge it completes (if any)
    pub fn tick(&mut self, current_signal: bool) -> Option<Edge> {
        let edge = match (self.previous_signal, current_signal) {
            (false, true) => Some(Edge::StartedGenerating),
            (true, false) => Some(Edge::FinishedGenerating),
            _ => None,
        };
        self.previous_signal = current_signal;

        if let Some(edge) = edge {
            trace!("Signal edge: {:?}", edge);
        }
        edge
    }

    pub fn previous_signal(&self) -> bool {
        self.previous_signal
    }

    /// Forget the last sample (monitor restart)
    pub fn reset(&mut self) {
        self.previous_signal = false;
    }
}
