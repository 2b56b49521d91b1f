use std::io::SeekFrom;
use std::sync::{Mutex, MutexGuard};

use orion_error::op_context;
use orion_error::prelude::*;
use ts_core::{LiveReadLoop, RetryPolicy, Sleeper, StreamSource, Target, ThreadSleeper};

use crate::error::{RuntimeReason, RuntimeResult};

/// The currently open stream, if any.
struct Slot {
    source: Option<StreamSource>,
    /// Bumped on every open, close and retune. A read that started under an
    /// older generation stops touching the source.
    generation: u64,
}

struct ReaderState<S> {
    live: LiveReadLoop<S>,
    /// Generation the retry state belongs to.
    generation: u64,
}

/// Owned handle on at most one open stream, shared between a playback
/// thread that reads and control threads that open, close and retune.
///
/// Reads are serialized among themselves. The stream lock is only held for
/// one attempt at a time, so a close issued while a live read is backing off
/// takes effect at once and the read returns what it gathered so far.
pub struct StreamHandle<S = ThreadSleeper> {
    slot: Mutex<Slot>,
    reader: Mutex<ReaderState<S>>,
}

impl StreamHandle<ThreadSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, ThreadSleeper)
    }
}

impl Default for StreamHandle<ThreadSleeper> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<S: Sleeper> StreamHandle<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            slot: Mutex::new(Slot {
                source: None,
                generation: 0,
            }),
            reader: Mutex::new(ReaderState {
                live: LiveReadLoop::with_sleeper(policy, sleeper),
                generation: 0,
            }),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().expect("stream slot lock poisoned")
    }

    /// Open `target`, replacing whatever was open before.
    pub fn open(&self, target: &Target) -> RuntimeResult<()> {
        let mut op = op_context!("stream-open").with_auto_log();
        op.record("target", target.location().display().to_string().as_str());

        let source = StreamSource::open(target).err_conv()?;
        let realtime = source.is_realtime();

        let previous = {
            let mut slot = self.lock_slot();
            slot.generation += 1;
            slot.source.replace(source)
        };
        if let Some(previous) = previous {
            ts_debug!(io, "replaced previously open stream");
            previous.close();
        }

        ts_info!(
            io,
            path = %target.location().display(),
            realtime,
            "stream opened"
        );
        op.mark_suc();
        Ok(())
    }

    /// Close the open stream. Closing twice is harmless.
    pub fn close(&self) {
        let closed = {
            let mut slot = self.lock_slot();
            slot.generation += 1;
            slot.source.take()
        };
        if let Some(source) = closed {
            ts_info!(io, position = source.position(), "stream closed");
            source.close();
        }
    }

    /// Read into `buf`.
    ///
    /// Live streams go through the retry loop and may return fewer bytes
    /// (or none) once it gives up; static streams are read once.
    pub fn read(&self, buf: &mut [u8]) -> RuntimeResult<usize> {
        let mut state = self.reader.lock().expect("stream reader lock poisoned");

        let generation = {
            let mut slot = self.lock_slot();
            let generation = slot.generation;
            let Some(source) = slot.source.as_mut() else {
                return Err(closed());
            };
            if !source.is_realtime() {
                return source.read(buf).err_conv();
            }
            generation
        };
        if state.generation != generation {
            state.live.reset();
            state.generation = generation;
        }

        let give_ups = state.live.give_ups();
        let n = state
            .live
            .read_with(buf, |chunk| {
                let mut slot = self.lock_slot();
                if slot.generation != generation {
                    return None;
                }
                slot.source.as_mut().map(|source| source.read(chunk))
            })
            .err_conv()?;

        if state.live.give_ups() > give_ups {
            ts_warn!(
                live,
                bytes = n,
                requested = buf.len(),
                stall_ms = state.live.policy().worst_case_stall().as_millis() as u64,
                "producer stalled, live read gave up"
            );
        }
        Ok(n)
    }

    pub fn seek(&self, pos: SeekFrom) -> RuntimeResult<u64> {
        let mut slot = self.lock_slot();
        let source = slot.source.as_mut().ok_or_else(closed)?;
        let offset = source.seek(pos).err_conv()?;
        ts_debug!(io, ?pos, offset, "seek");
        Ok(offset)
    }

    /// Total readable length, or `None` when closed or unknown.
    pub fn length(&self) -> Option<u64> {
        let mut slot = self.lock_slot();
        let source = slot.source.as_mut()?;
        match source.length() {
            Ok(len) => Some(len),
            Err(e) => {
                ts_warn!(io, error = %e, "length unavailable");
                None
            }
        }
    }

    pub fn position(&self) -> Option<u64> {
        self.lock_slot().source.as_ref().map(StreamSource::position)
    }

    pub fn is_open(&self) -> bool {
        self.lock_slot().source.is_some()
    }

    pub fn is_realtime(&self) -> bool {
        self.lock_slot()
            .source
            .as_ref()
            .is_some_and(StreamSource::is_realtime)
    }

    /// Reset position and retry state after the backend (re-)tuned.
    pub fn notify_retuned(&self) -> RuntimeResult<()> {
        let mut slot = self.lock_slot();
        slot.generation += 1;
        let source = slot.source.as_mut().ok_or_else(closed)?;
        source.notify_retuned().err_conv()?;
        ts_debug!(tune, "stream reset after tune");
        Ok(())
    }
}

fn closed() -> crate::error::RuntimeError {
    StructError::from(RuntimeReason::Closed)
}
