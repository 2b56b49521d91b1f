use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

/// Retry policy for live playback reads (`[live]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Sleep between two starved read attempts.
    pub backoff: HumanDuration,
    /// Consecutive starved attempts before a read gives up.
    pub max_retries: u32,
    /// Keep reading partial chunks until the caller's buffer is full.
    pub fill_buffer: bool,
    /// Pause after a successful tune before the first read.
    pub tune_delay: HumanDuration,
}

impl LiveConfig {
    /// Worst-case time a single read may spend sleeping before giving up.
    /// `None` when it does not fit in a `Duration`.
    pub fn worst_case_stall(&self) -> Option<std::time::Duration> {
        self.backoff.as_duration().checked_mul(self.max_retries)
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            backoff: std::time::Duration::from_millis(40).into(),
            max_retries: 25,
            fill_buffer: false,
            tune_delay: std::time::Duration::ZERO.into(),
        }
    }
}
