//! Group configuration.

use serde::{Deserialize, Serialize};

/// Default maximum composite nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// Configuration shared by every run started from a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Maximum nesting depth for composite pipelines.
    ///
    /// A composite stage that would exceed it fails with kind `RecursionLimit`.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Whether a panicking pipe is recorded as a failed stage.
    ///
    /// When false the panic unwinds through the run.
    #[serde(default = "default_capture_panics")]
    pub capture_panics: bool,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_capture_panics() -> bool {
    true
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            capture_panics: default_capture_panics(),
        }
    }
}

impl GroupConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum composite nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets whether pipe panics are captured.
    #[must_use]
    pub fn with_capture_panics(mut self, capture: bool) -> Self {
        self.capture_panics = capture;
        self
    }

    /// Parses a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
