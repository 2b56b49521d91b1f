//! Retry policy for reads against a buffer the producer is still writing.
//!
//! A live read that comes back empty usually means the producer is a little
//! behind. [`LiveReadLoop`] sleeps a short backoff and tries again, but gives
//! up after a bounded number of consecutive attempts so playback never blocks
//! for more than about `backoff * max_retries`.

use std::time::Duration;

use log::{debug, warn};
use ts_config::LiveConfig;

use crate::error::{CoreError, CoreResult};
use crate::source::StreamSource;

/// Blocks the calling thread between starved attempts.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_retries: u32,
    /// Keep accumulating partial reads until the buffer is full.
    pub fill_buffer: bool,
}

impl RetryPolicy {
    /// Saturates at `Duration::MAX`.
    pub fn worst_case_stall(&self) -> Duration {
        self.backoff
            .checked_mul(self.max_retries)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&LiveConfig::default())
    }
}

impl From<&LiveConfig> for RetryPolicy {
    fn from(cfg: &LiveConfig) -> Self {
        Self {
            backoff: cfg.backoff.as_duration(),
            max_retries: cfg.max_retries.max(1),
            fill_buffer: cfg.fill_buffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The last attempt returned data.
    Draining,
    /// The last attempt returned nothing.
    Starved,
}

#[derive(Debug)]
pub struct LiveReadLoop<S = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
    state: LoopState,
    /// Consecutive unsatisfied attempts since the last full read or reset.
    retries: u32,
    give_ups: u64,
    /// Error hit after some bytes were already handed back.
    pending_error: Option<CoreError>,
}

impl LiveReadLoop<ThreadSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, ThreadSleeper)
    }
}

impl<S: Sleeper> LiveReadLoop<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            policy,
            sleeper,
            state: LoopState::Draining,
            retries: 0,
            give_ups: 0,
            pending_error: None,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Reads abandoned at the retry ceiling since construction.
    pub fn give_ups(&self) -> u64 {
        self.give_ups
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Clear retry state, e.g. on open.
    pub fn reset(&mut self) {
        self.state = LoopState::Draining;
        self.retries = 0;
        self.pending_error = None;
    }

    /// Clear retry state and reset `source` after a (re-)tune.
    pub fn notify_retuned(&mut self, source: &mut StreamSource) -> CoreResult<()> {
        self.reset();
        source.notify_retuned()
    }

    /// Read from `source`, retrying starved attempts when it is live.
    ///
    /// Static sources are read once: their end of file is final.
    pub fn read(&mut self, source: &mut StreamSource, buf: &mut [u8]) -> CoreResult<usize> {
        if !source.is_realtime() {
            return source.read(buf);
        }
        self.read_with(buf, |chunk| Some(source.read(chunk)))
    }

    /// Drive the loop over an arbitrary attempt.
    ///
    /// `attempt` fills the unfilled remainder of `buf` and returns how many
    /// bytes it wrote, or `None` once the source has gone away, in which case
    /// the bytes gathered so far are returned.
    pub fn read_with<F>(&mut self, buf: &mut [u8], mut attempt: F) -> CoreResult<usize>
    where
        F: FnMut(&mut [u8]) -> Option<CoreResult<usize>>,
    {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }

        let mut filled = 0;
        while filled < buf.len() {
            let n = match attempt(&mut buf[filled..]) {
                None => {
                    debug!("source closed during live read after {filled} bytes");
                    break;
                }
                Some(Ok(n)) => n,
                Some(Err(e)) if filled > 0 => {
                    self.pending_error = Some(e);
                    break;
                }
                Some(Err(e)) => return Err(e),
            };
            filled += n;

            if n > 0 {
                self.state = LoopState::Draining;
                if filled == buf.len() || !self.policy.fill_buffer {
                    self.retries = 0;
                    break;
                }
            } else {
                self.state = LoopState::Starved;
            }

            self.retries += 1;
            if self.retries >= self.policy.max_retries {
                warn!(
                    "live read gave up after {} attempts with {filled}/{} bytes",
                    self.retries,
                    buf.len()
                );
                self.retries = 0;
                self.give_ups += 1;
                break;
            }
            self.sleeper.sleep(self.policy.backoff);
        }
        Ok(filled)
    }
}
