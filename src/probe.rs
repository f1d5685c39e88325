//! Generation probe.
//!
//! One probe pass evaluates a provider profile against the page and yields
//! a boolean "generating" signal. Nothing is cached between passes.
//!
//! - `probe`: runs in-process against a `Document`
//! - `RemoteProbe`: sends a generated script into an isolated browsing
//!   context through a `ScriptHost` and reads back a primitive boolean
//! - `ReplaySource`: feeds recorded HTML snapshots, one per sample

use crate::config::TimingConfig;
use crate::dom::{Document, HtmlSnapshot};
use crate::heuristics::ProviderProfile;
use crate::types::{ElementMetrics, ProbeError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Source of the raw generating signal, sampled once per tick
#[async_trait::async_trait]
pub trait GenerationSignal: Send + Sync {
    /// Sample the signal. Failures must read as `false`.
    async fn sample(&self, profile: &ProviderProfile) -> bool;
}

/// Evaluates scripts inside an isolated browsing context (webview, frame)
#[async_trait::async_trait]
pub trait ScriptHost: Send + Sync {
    async fn evaluate(&self, script: &str) -> Result<Value, ProbeError>;
}

/// Evaluate `profile` against `document`.
///
/// Main rules are OR-combined over every matching element and short-circuit
/// on the first visible one. Fallback rules are then tried in order against
/// the first matching element only. A rule that fails to evaluate counts as
/// no match.
pub fn probe<D: Document + ?Sized>(profile: &ProviderProfile, document: &D) -> bool {
    for rule in &profile.rules {
        match document.query_all(rule.as_str()) {
            Ok(elements) => {
                if elements.iter().any(ElementMetrics::is_visible) {
                    trace!("{}: visible match for {}", profile.name, rule.as_str());
                    return true;
                }
            }
            Err(e) => debug!("{}: rule skipped: {}", profile.name, e),
        }
    }

    for rule in &profile.fallback_rules {
        match document.query_first(rule.as_str()) {
            Ok(Some(element)) if element.is_visible() => {
                trace!("{}: fallback match for {}", profile.name, rule.as_str());
                return true;
            }
            Ok(_) => {}
            Err(e) => debug!("{}: fallback rule skipped: {}", profile.name, e),
        }
    }

    false
}

const PROBE_SCRIPT: &str = r#"(function() {
  const rules = __RULES__;
  const fallbacks = __FALLBACKS__;
  function isVisible(el) {
    try {
      if (!el || !el.isConnected) return false;
      const style = window.getComputedStyle(el);
      if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
        return false;
      }
      const rect = el.getBoundingClientRect();
      return rect.width > 0 && rect.height > 0;
    } catch (e) {
      return false;
    }
  }
  for (const selector of rules) {
    try {
      for (const el of document.querySelectorAll(selector)) {
        if (isVisible(el)) return true;
      }
    } catch (e) {}
  }
  for (const selector of fallbacks) {
    try {
      if (isVisible(document.querySelector(selector))) return true;
    } catch (e) {}
  }
  return false;
})()"#;

/// Build the self-contained probe script for an isolated context
pub fn build_probe_script(profile: &ProviderProfile) -> String {
    let rules = serde_json::to_string(&profile.rules).unwrap_or_else(|_| "[]".to_string());
    let fallbacks =
        serde_json::to_string(&profile.fallback_rules).unwrap_or_else(|_| "[]".to_string());

    PROBE_SCRIPT
        .replace("__RULES__", &rules)
        .replace("__FALLBACKS__", &fallbacks)
}

/// Probe executed remotely in an isolated browsing context
pub struct RemoteProbe<H> {
    host: Arc<H>,
    timeout: Duration,
}

impl<H: ScriptHost> RemoteProbe<H> {
    pub fn new(host: Arc<H>, timeout: Duration) -> Self {
        Self { host, timeout }
    }

    /// Probe bounded by `probe_timeout_ms`
    pub fn from_config(host: Arc<H>, timing: &TimingConfig) -> Self {
        Self::new(host, Duration::from_millis(timing.probe_timeout_ms))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the probe script, surfacing failures
    pub async fn evaluate(&self, profile: &ProviderProfile) -> Result<bool, ProbeError> {
        let script = build_probe_script(profile);

        match tokio::time::timeout(self.timeout, self.host.evaluate(&script)).await {
            Ok(Ok(Value::Bool(generating))) => Ok(generating),
            Ok(Ok(other)) => Err(ProbeError::NonBoolean(other.to_string())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProbeError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait::async_trait]
impl<H: ScriptHost> GenerationSignal for RemoteProbe<H> {
    async fn sample(&self, profile: &ProviderProfile) -> bool {
        match self.evaluate(profile).await {
            Ok(generating) => generating,
            Err(e) => {
                debug!("Remote probe for {} failed, treating as idle: {}", profile.name, e);
                false
            }
        }
    }
}

/// Replays recorded HTML snapshots, one per sample.
///
/// Once every snapshot has been consumed, samples read as idle and the
/// drained notifier fires.
pub struct ReplaySource {
    pages: Mutex<VecDeque<String>>,
    drained: Arc<Notify>,
}

impl ReplaySource {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Notifier fired on the first sample after the last snapshot
    pub fn drained(&self) -> Arc<Notify> {
        self.drained.clone()
    }

    pub fn remaining(&self) -> usize {
        match self.pages.lock() {
            Ok(pages) => pages.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn next_page(&self) -> Option<String> {
        match self.pages.lock() {
            Ok(mut pages) => pages.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

#[async_trait::async_trait]
impl GenerationSignal for ReplaySource {
    async fn sample(&self, profile: &ProviderProfile) -> bool {
        match self.next_page() {
            Some(html) => {
                let document = HtmlSnapshot::parse(&html);
                probe(profile, &document)
            }
            None => {
                self.drained.notify_one();
                false
            }
        }
    }
}
