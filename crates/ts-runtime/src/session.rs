use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use orion_error::op_context;
use orion_error::prelude::*;
use ts_config::{ReaderConfig, TimeshiftConfig};
use ts_core::{Sleeper, Target, ThreadSleeper};

use crate::error::{RuntimeReason, RuntimeResult};
use crate::handle::StreamHandle;

/// Why the backend could not deliver a live stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TuneError {
    #[error("no free tuner")]
    NoFreeTuner,
    #[error("scrambled channel")]
    Scrambled,
    #[error("tuning failed")]
    TuneFailed,
    /// The backend must stop the current stream before tuning again.
    #[error("retune not possible while streaming")]
    RetuneNotPossible,
    #[error("{0}")]
    Other(String),
}

/// The tuning service that produces rotating buffers.
pub trait TuneBackend {
    /// Tune `channel` and return the path of its buffer (index file,
    /// segment directory, or plain file).
    fn tune(&mut self, channel: &str) -> Result<PathBuf, TuneError>;
    /// Stop the current live stream.
    fn stop(&mut self);
}

/// Keeps one [`StreamHandle`] pointed at whatever channel is being watched.
pub struct LiveSession<S = ThreadSleeper> {
    handle: Arc<StreamHandle<S>>,
    reader: ReaderConfig,
    tune_delay: Duration,
    channel: Option<String>,
}

impl<S: Sleeper> LiveSession<S> {
    pub fn new(handle: Arc<StreamHandle<S>>, config: &TimeshiftConfig) -> Self {
        Self {
            handle,
            reader: config.reader.clone(),
            tune_delay: config.live.tune_delay.as_duration(),
            channel: None,
        }
    }

    pub fn handle(&self) -> &Arc<StreamHandle<S>> {
        &self.handle
    }

    /// Channel currently streaming, if any.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Switch to `channel`.
    ///
    /// Does nothing when `channel` is already streaming. On success the
    /// handle is open on the new buffer, reset to its start.
    pub fn tune(&mut self, channel: &str, backend: &mut dyn TuneBackend) -> RuntimeResult<()> {
        if self.channel.as_deref() == Some(channel) && self.handle.is_open() {
            ts_debug!(tune, channel, "already streaming, not retuning");
            return Ok(());
        }

        let mut op = op_context!("live-tune").with_auto_log();
        op.record("channel", channel);

        let tuned = match backend.tune(channel) {
            Err(TuneError::RetuneNotPossible) => {
                ts_info!(tune, channel, "backend cannot retune in place, restarting stream");
                self.stop(backend);
                backend.tune(channel)
            }
            other => other,
        };
        // Whatever was streaming before is no longer the current channel,
        // even if it keeps playing after a failed tune.
        self.channel = None;
        let path = match tuned {
            Ok(path) if path.as_os_str().is_empty() => {
                ts_warn!(tune, channel, "backend returned no buffer path");
                self.stop(backend);
                return Err(StructError::from(RuntimeReason::Tune)
                    .with_detail("could not start the timeshift buffer"));
            }
            Ok(path) => path,
            Err(e) => {
                ts_warn!(tune, channel, error = %e, "tune failed");
                return Err(StructError::from(RuntimeReason::Tune).with_detail(e.to_string()));
            }
        };

        let target = Target::resolve(&path, &self.reader);
        self.handle.open(&target)?;
        self.handle.notify_retuned()?;
        self.channel = Some(channel.to_string());
        ts_info!(
            tune,
            channel,
            path = %path.display(),
            realtime = target.is_realtime(),
            "tuned"
        );

        if !self.tune_delay.is_zero() {
            std::thread::sleep(self.tune_delay);
        }
        op.mark_suc();
        Ok(())
    }

    /// Close the stream and tell the backend to stop.
    pub fn stop(&mut self, backend: &mut dyn TuneBackend) {
        self.handle.close();
        backend.stop();
        if let Some(channel) = self.channel.take() {
            ts_info!(tune, channel = %channel, "live stream stopped");
        }
    }
}
