//! Registry of per-provider generation heuristics.
//!
//! Maps a page origin to the ordered selector rules that indicate an AI
//! provider is currently streaming a response.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// A DOM query expression (CSS selector) interpreted against the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorRule(String);

impl SelectorRule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SelectorRule {
    fn from(selector: &str) -> Self {
        Self::new(selector)
    }
}

/// Detection rules for one AI provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Substring matched against the page origin
    pub origin_match: String,
    /// Display name
    pub name: String,
    /// Rules OR-combined over every matching element
    #[serde(default)]
    pub rules: Vec<SelectorRule>,
    /// Provider-specific checks tried in order after `rules`, first element only
    #[serde(default)]
    pub fallback_rules: Vec<SelectorRule>,
}

impl ProviderProfile {
    pub fn new(origin_match: &str, name: &str, rules: &[&str]) -> Self {
        Self {
            origin_match: origin_match.to_string(),
            name: name.to_string(),
            rules: rules.iter().map(|r| SelectorRule::from(*r)).collect(),
            fallback_rules: Vec::new(),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: &[&str]) -> Self {
        self.fallback_rules = fallbacks.iter().map(|r| SelectorRule::from(*r)).collect();
        self
    }

    /// Profile with no rules; never reports generation
    pub fn unknown() -> Self {
        Self::new("", "Unknown", &[])
    }

    pub fn matches(&self, origin: &str) -> bool {
        !self.origin_match.is_empty() && origin.contains(&self.origin_match)
    }
}

/// Origin key of the profile used when nothing else matches
pub const DEFAULT_PROVIDER: &str = "chatgpt.com";

/// Built-in provider table
pub fn builtin_profiles() -> Vec<ProviderProfile> {
    vec![
        ProviderProfile::new(
            "chatgpt.com",
            "ChatGPT",
            &[
                r#"button[aria-label="Stop generating"]"#,
                r#"button[aria-label="Stop streaming"]"#,
                r#"button[data-testid="stop-button"]"#,
                r#"button[class*="stop"]"#,
                r#"[class*="result-streaming"]"#,
                r#"[data-message-author-role="assistant"][class*="streaming"]"#,
            ],
        )
        .with_fallbacks(&[
            r#"[class*="cursor"]"#,
            r#"[class*="thinking"], [class*="Thinking"]"#,
        ]),
        ProviderProfile::new(
            "chat.openai.com",
            "ChatGPT",
            &[
                r#"button[aria-label="Stop generating"]"#,
                r#"button[data-testid="stop-button"]"#,
                r#"button[class*="stop"]"#,
            ],
        ),
        ProviderProfile::new(
            "claude.ai",
            "Claude",
            &[
                r#"button[aria-label="Stop Response"]"#,
                r#"button[aria-label*="Stop"]"#,
                r#"[data-testid="stop-button"]"#,
                r#"[class*="streaming"]"#,
            ],
        ),
        ProviderProfile::new(
            "gemini.google.com",
            "Gemini",
            &[
                r#"button[aria-label="Stop generating"]"#,
                r#"button[data-testid="stop-button"]"#,
                r#"button[mattooltip="Stop"]"#,
                "mat-spinner",
                r#"[class*="loading-indicator"]"#,
            ],
        ),
    ]
}

/// Registry of provider profiles, tried in registration order
#[derive(Debug, Clone)]
pub struct HeuristicRegistry {
    profiles: Vec<ProviderProfile>,
    default_profile: ProviderProfile,
}

impl HeuristicRegistry {
    /// Registry with the built-in providers and ChatGPT as default
    pub fn new() -> Self {
        Self::with_profiles(builtin_profiles(), DEFAULT_PROVIDER)
    }

    /// Build a registry from `profiles`, picking the default by origin key.
    ///
    /// The default keeps only its main rules; provider-specific fallbacks
    /// apply only to origins that actually matched. An unknown default key
    /// falls back to a rule-less profile.
    pub fn with_profiles(profiles: Vec<ProviderProfile>, default_origin: &str) -> Self {
        let default_profile = match profiles.iter().find(|p| p.origin_match == default_origin) {
            Some(profile) => ProviderProfile {
                fallback_rules: Vec::new(),
                ..profile.clone()
            },
            None => {
                warn!(
                    "Default provider '{}' is not registered, unknown origins will never report generation",
                    default_origin
                );
                ProviderProfile::unknown()
            }
        };

        Self {
            profiles,
            default_profile,
        }
    }

    /// Resolve the profile for a page origin.
    ///
    /// First substring match wins; no match yields the default profile.
    pub fn resolve(&self, origin: &str) -> &ProviderProfile {
        match self.profiles.iter().find(|p| p.matches(origin)) {
            Some(profile) => {
                trace!("Origin {} resolved to {}", origin, profile.name);
                profile
            }
            None => {
                debug!(
                    "No provider matches {}, using default {}",
                    origin, self.default_profile.name
                );
                &self.default_profile
            }
        }
    }

    /// Append a provider after the existing ones
    pub fn register(&mut self, profile: ProviderProfile) {
        debug!("Registering provider {} ({})", profile.name, profile.origin_match);
        self.profiles.push(profile);
    }

    pub fn profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    pub fn default_profile(&self) -> &ProviderProfile {
        &self.default_profile
    }
}

impl Default for HeuristicRegistry {
    fn default() -> Self {
        Self::new()
    }
}
