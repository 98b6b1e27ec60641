use serde::{Deserialize, Serialize};

/// Maximum number of preresolves running at once, shared by every batch and
/// hint.
pub const MAX_INFLIGHT_PRERESOLVES: usize = 3;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreconnectConfig {
    /// Global cap on in-flight resolutions. Values below 1 are raised to 1.
    pub max_inflight_preresolves: usize,
}

impl Default for PreconnectConfig {
    fn default() -> Self {
        Self { max_inflight_preresolves: MAX_INFLIGHT_PRERESOLVES }
    }
}

impl PreconnectConfig {
    pub fn with_max_inflight_preresolves(mut self, max: usize) -> Self {
        self.max_inflight_preresolves = max;
        self
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
