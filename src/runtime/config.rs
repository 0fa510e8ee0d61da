use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Tuning knobs for one executor. Every field has a default, so an empty
/// `executor:` block (or none at all) in a plan file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// Maximum resolution depth before the run is reported as cyclic.
    pub max_depth: usize,
    /// Deadline for a whole run of the concurrent executor.
    pub timeout_ms: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            timeout_ms: None,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
