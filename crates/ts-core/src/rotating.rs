use std::io::{self, SeekFrom};

use log::{debug, info, warn};
use orion_error::prelude::*;

use crate::accessor::SegmentFileAccessor;
use crate::error::{CoreReason, CoreResult};
use crate::segment::{Location, SegmentCatalog, SegmentSet};

/// Reader over a live, rotating window of segment files.
///
/// Positions are logical offsets into the whole capture; they stay valid
/// while segments rotate out underneath, until they fall before the window.
#[derive(Debug)]
pub struct RotatingBufferReader {
    set: SegmentSet,
    position: u64,
    /// Handle on the segment last read from.
    accessor: Option<SegmentFileAccessor>,
    /// Producer restarts already followed.
    rebases: u64,
}

/// Outcome of one read step against a single segment.
enum Step {
    Read(usize),
    /// The tail has not grown past the position yet.
    Drained,
    /// Segment shorter than recorded or gone from disk.
    Race,
}

impl RotatingBufferReader {
    /// Open the buffer at the start of its current window.
    pub fn open(catalog: SegmentCatalog, segment_size: u64) -> CoreResult<Self> {
        let location = catalog.location().to_path_buf();
        let mut set = SegmentSet::new(catalog, segment_size);
        set.refresh().map_err(|e| {
            StructError::from(CoreReason::Open).with_detail(format!("{}: {e}", location.display()))
        })?;

        let Some(first) = set.segments().first() else {
            return Err(StructError::from(CoreReason::Open)
                .with_detail(format!("{}: no segments present", location.display())));
        };
        let accessor = SegmentFileAccessor::open(first.index, &first.path).map_err(|e| {
            StructError::from(CoreReason::Open)
                .with_detail(format!("{}: {e}", first.path.display()))
        })?;

        let position = set.window_start();
        let rebases = set.rebases();
        info!(
            "opened rotating buffer {} window=[{}, {}) segments={}",
            location.display(),
            position,
            set.logical_end(),
            set.len()
        );
        Ok(Self {
            set,
            position,
            accessor: Some(accessor),
            rebases,
        })
    }

    /// Read from the current position, crossing segment boundaries.
    ///
    /// Returns fewer bytes than requested (possibly zero) when the producer
    /// has not written further yet.
    pub fn read(&mut self, buf: &mut [u8]) -> CoreResult<usize> {
        let mut filled = 0;
        let mut refreshed = false;

        while filled < buf.len() {
            match self.set.locate(self.position) {
                Location::Within { slot, offset, .. } => {
                    match self.read_slot(slot, offset, &mut buf[filled..]) {
                        Ok(Step::Read(n)) => {
                            filled += n;
                            self.position += n as u64;
                        }
                        Ok(Step::Drained) => {
                            if !self.refresh_once(&mut refreshed, filled)? {
                                break;
                            }
                        }
                        Ok(Step::Race) => {
                            debug!("segment set changed under read at {}", self.position);
                            self.accessor = None;
                            if !self.refresh_once(&mut refreshed, filled)? {
                                break;
                            }
                        }
                        Err(e) if filled > 0 => {
                            debug!("read error after {filled} bytes, deferring: {e}");
                            break;
                        }
                        Err(e) => {
                            return Err(StructError::from(CoreReason::Io)
                                .with_detail(format!("read at {}: {e}", self.position)));
                        }
                    }
                }
                Location::BeyondTail { .. } => {
                    if !self.refresh_once(&mut refreshed, filled)? {
                        break;
                    }
                }
                Location::Gap { resume_at } => {
                    warn!(
                        "bytes [{}, {resume_at}) rotated out before they were read, skipping",
                        self.position
                    );
                    self.position = resume_at;
                }
            }
        }
        Ok(filled)
    }

    /// Refresh the set unless this read already did. Returns whether the
    /// caller should look again.
    fn refresh_once(&mut self, refreshed: &mut bool, filled: usize) -> CoreResult<bool> {
        if *refreshed {
            return Ok(false);
        }
        *refreshed = true;
        match self.refresh_set() {
            Ok(()) => Ok(true),
            Err(e) if filled > 0 => {
                debug!("refresh failed after {filled} bytes: {e}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh the set, following the producer back to the new window start
    /// when it restarted its sequence.
    fn refresh_set(&mut self) -> CoreResult<()> {
        self.set.refresh()?;
        if self.set.rebases() != self.rebases {
            self.rebases = self.set.rebases();
            self.accessor = None;
            let from = self.position;
            self.position = self.set.window_start();
            warn!(
                "{}: producer restarted, moving from {from} to {}",
                self.set.catalog().location().display(),
                self.position
            );
        }
        Ok(())
    }

    fn read_slot(&mut self, slot: usize, offset: u64, buf: &mut [u8]) -> io::Result<Step> {
        let Some(seg) = self.set.get(slot) else {
            return Ok(Step::Race);
        };
        let (index, recorded) = (seg.index, seg.length);

        let reuse = match self.accessor.as_ref() {
            Some(acc) if acc.index() == index => match acc.is_current(&seg.path) {
                Ok(true) => true,
                Ok(false) => {
                    debug!("{} was replaced, reopening", seg.path.display());
                    false
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Step::Race),
                Err(e) => return Err(e),
            },
            _ => false,
        };
        if !reuse {
            match SegmentFileAccessor::open(index, &seg.path) {
                Ok(acc) => self.accessor = Some(acc),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Step::Race),
                Err(e) => return Err(e),
            }
        }
        let Some(acc) = self.accessor.as_mut() else {
            return Ok(Step::Race);
        };

        let available = if self.set.is_tail(slot) {
            let length = acc.current_length()?;
            self.set.observe_length(slot, length);
            length
        } else {
            recorded
        };
        let want = (buf.len() as u64).min(available.saturating_sub(offset)) as usize;
        if want == 0 {
            return Ok(if self.set.is_tail(slot) {
                Step::Drained
            } else {
                Step::Race
            });
        }

        match acc.read_at(offset, &mut buf[..want])? {
            0 => Ok(Step::Race),
            n => Ok(Step::Read(n)),
        }
    }

    /// Move the logical position. Positions before the window clamp to its
    /// start; positions past the end are kept and read as zero bytes.
    pub fn seek(&mut self, pos: SeekFrom) -> CoreResult<u64> {
        self.refresh_set()?;
        let target = match pos {
            SeekFrom::Start(o) => i128::from(o),
            SeekFrom::Current(d) => i128::from(self.position) + i128::from(d),
            SeekFrom::End(d) => i128::from(self.set.logical_end()) + i128::from(d),
        };
        let start = self.set.window_start();
        self.position = if target < i128::from(start) {
            debug!("seek {pos:?} lands before window start {start}, clamping");
            start
        } else {
            u64::try_from(target).unwrap_or(u64::MAX)
        };
        Ok(self.position)
    }

    /// Discard everything known about the previous session and restart at
    /// logical offset 0.
    pub fn on_tune_reset(&mut self) -> CoreResult<()> {
        self.set.reset();
        self.accessor = None;
        self.position = 0;
        self.refresh_set()?;
        info!(
            "{}: tune reset, window=[{}, {})",
            self.set.catalog().location().display(),
            self.set.window_start(),
            self.set.logical_end()
        );
        Ok(())
    }

    /// First logical offset not yet written.
    pub fn length(&mut self) -> CoreResult<u64> {
        self.refresh_set()?;
        Ok(self.set.logical_end())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn refresh(&mut self) -> CoreResult<()> {
        self.refresh_set()
    }

    pub fn segment_set(&self) -> &SegmentSet {
        &self.set
    }
}
