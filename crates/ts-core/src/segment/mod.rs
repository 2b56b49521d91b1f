mod catalog;
pub mod tsbuffer;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogEntry, SegmentCatalog};

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{debug, trace, warn};
use orion_error::prelude::*;
use serde::Serialize;

use crate::error::{CoreReason, CoreResult};

/// One physical segment file of a rotating buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Producer sequence index, strictly increasing within a session.
    pub index: u64,
    pub path: PathBuf,
    /// Logical offset of the segment's first byte.
    pub start: u64,
    /// Length at the last refresh (or last observation of the tail).
    pub length: u64,
}

impl Segment {
    /// Logical offset one past the segment's last byte.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Where a logical offset falls in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Readable now: `slot` is the position in [`SegmentSet::segments`].
    Within { slot: usize, index: u64, offset: u64 },
    /// At or past the end of what has been written so far.
    BeyondTail { end: u64 },
    /// The data was rotated away. `resume_at` is the first readable offset
    /// after the lost range.
    Gap { resume_at: u64 },
}

/// The segment files present on disk for one buffer, with the logical
/// offset each one starts at.
///
/// Known segments keep their logical start across refreshes; segments appear
/// at the tail and vanish from the head as the producer rotates.
#[derive(Debug)]
pub struct SegmentSet {
    catalog: SegmentCatalog,
    segment_size: u64,
    segments: Vec<Segment>,
    /// Last tail seen, kept so offsets stay anchored when the window is
    /// momentarily empty.
    anchor: Option<Segment>,
    refreshes: u64,
    rebases: u64,
}

impl SegmentSet {
    /// Create an empty set. Nothing is read until [`refresh`](Self::refresh).
    pub fn new(catalog: SegmentCatalog, segment_size: u64) -> Self {
        Self {
            catalog,
            segment_size: segment_size.max(1),
            segments: Vec::new(),
            anchor: None,
            refreshes: 0,
            rebases: 0,
        }
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    /// Re-enumerate the catalog and re-query every segment's length.
    ///
    /// Safe to call while the producer writes; files that vanish between the
    /// listing and the length query are skipped.
    pub fn refresh(&mut self) -> CoreResult<()> {
        let entries = self.catalog.list()?;

        let known_first = self
            .segments
            .first()
            .or(self.anchor.as_ref())
            .map(|s| s.index);
        let known_last = self
            .segments
            .last()
            .or(self.anchor.as_ref())
            .map(|s| s.index);
        // Indices only grow within a session.
        let restarted = match (entries.first(), entries.last(), known_first, known_last) {
            (Some(first), Some(last), Some(kf), Some(kl)) => first.index < kf || last.index < kl,
            _ => false,
        };
        if restarted {
            warn!(
                "{}: sequence restarted ({} segments listed, newest known was {:?}), rebasing offsets",
                self.catalog.location().display(),
                entries.len(),
                known_last
            );
            self.reset();
            self.rebases += 1;
        }

        let mut next: Vec<Segment> = Vec::with_capacity(entries.len());
        for entry in entries {
            let length = match fs::metadata(&entry.path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("segment {} vanished during refresh", entry.path.display());
                    continue;
                }
                Err(e) => {
                    return Err(StructError::from(CoreReason::Io)
                        .with_detail(format!("{}: {e}", entry.path.display())));
                }
            };
            let start = self.place(entry.index, next.last());
            next.push(Segment {
                index: entry.index,
                path: entry.path,
                start,
                length,
            });
        }

        if let Some(tail) = next.last() {
            self.anchor = Some(tail.clone());
        }
        self.segments = next;
        self.refreshes += 1;

        trace!(
            "{}: refresh #{} window=[{}, {}) segments={}",
            self.catalog.location().display(),
            self.refreshes,
            self.window_start(),
            self.logical_end(),
            self.segments.len()
        );
        Ok(())
    }

    /// Logical start for segment `index`, given the segment placed just
    /// before it in this refresh.
    fn place(&self, index: u64, prev: Option<&Segment>) -> u64 {
        if let Ok(slot) = self.segments.binary_search_by_key(&index, |s| s.index) {
            return self.segments[slot].start;
        }
        let missing = |from: u64| index.saturating_sub(from + 1) * self.segment_size;
        if let Some(prev) = prev {
            return prev.end() + missing(prev.index);
        }
        // First present segment is new: continue after the highest known one.
        let known = self
            .segments
            .iter()
            .rev()
            .find(|s| s.index < index)
            .or(self.anchor.as_ref().filter(|a| a.index < index));
        match known {
            Some(k) => {
                let was_tail = self.segments.last().is_none_or(|t| t.index == k.index);
                let length = if was_tail {
                    // Its final length was never observed.
                    k.length.max(self.segment_size)
                } else {
                    k.length
                };
                k.start + length + missing(k.index)
            }
            None => 0,
        }
    }

    /// Forget every known segment; the next refresh starts at offset 0.
    pub fn reset(&mut self) {
        self.segments.clear();
        self.anchor = None;
    }

    /// Translate a logical offset against the set as of the last refresh.
    pub fn locate(&self, offset: u64) -> Location {
        let Some(first) = self.segments.first() else {
            let end = self.logical_end();
            return if offset < end {
                Location::Gap { resume_at: end }
            } else {
                Location::BeyondTail { end }
            };
        };
        if offset < first.start {
            return Location::Gap {
                resume_at: first.start,
            };
        }

        let slot = self.segments.partition_point(|s| s.start <= offset) - 1;
        let seg = &self.segments[slot];
        if offset < seg.end() {
            Location::Within {
                slot,
                index: seg.index,
                offset: offset - seg.start,
            }
        } else if let Some(next) = self.segments.get(slot + 1) {
            Location::Gap {
                resume_at: next.start,
            }
        } else {
            Location::BeyondTail { end: seg.end() }
        }
    }

    /// Sum of the lengths of all present segments.
    pub fn total_logical_length(&self) -> u64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    /// Logical offset of the oldest byte still on disk.
    pub fn window_start(&self) -> u64 {
        self.segments
            .first()
            .map(|s| s.start)
            .unwrap_or_else(|| self.logical_end())
    }

    /// Logical offset one past the newest byte written (as of the last
    /// refresh or tail observation).
    pub fn logical_end(&self) -> u64 {
        self.segments
            .last()
            .or(self.anchor.as_ref())
            .map(Segment::end)
            .unwrap_or(0)
    }

    /// Fold in a freshly queried length for the segment at `slot`.
    pub fn observe_length(&mut self, slot: usize, length: u64) {
        let is_tail = self.is_tail(slot);
        if let Some(seg) = self.segments.get_mut(slot) {
            seg.length = length;
            if is_tail {
                self.anchor = Some(seg.clone());
            }
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, slot: usize) -> Option<&Segment> {
        self.segments.get(slot)
    }

    pub fn is_tail(&self, slot: usize) -> bool {
        slot + 1 == self.segments.len()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of refreshes since construction.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Number of producer restarts detected by [`refresh`](Self::refresh).
    /// Each one moved the logical origin back to 0.
    pub fn rebases(&self) -> u64 {
        self.rebases
    }
}
