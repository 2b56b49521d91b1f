//! A fake producer that writes a rotating buffer into a temp directory.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::segment::SegmentCatalog;
use crate::segment::tsbuffer::{IndexSnapshot, encode_index};

/// Byte the producer writes at logical offset `o`.
pub(crate) fn byte_at(o: u64) -> u8 {
    (o % 251) as u8
}

pub(crate) fn pattern(range: Range<u64>) -> Vec<u8> {
    range.map(byte_at).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Listing {
    IndexFile,
    Directory,
}

pub(crate) struct Producer {
    dir: TempDir,
    session: String,
    listing: Listing,
    next_index: u64,
    removed: u64,
    present: VecDeque<u64>,
    /// Logical bytes written so far across all segments.
    written: u64,
}

impl Producer {
    pub(crate) fn new(listing: Listing) -> Self {
        let producer = Self {
            dir: tempfile::tempdir().unwrap(),
            session: "live".into(),
            listing,
            next_index: 0,
            removed: 0,
            present: VecDeque::new(),
            written: 0,
        };
        producer.write_index();
        producer
    }

    pub(crate) fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn index_path(&self) -> PathBuf {
        self.dir.path().join(format!("{}.tsbuffer", self.session))
    }

    pub(crate) fn segment_path(&self, index: u64) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}-{index}.ts", self.session))
    }

    pub(crate) fn catalog(&self) -> SegmentCatalog {
        match self.listing {
            Listing::IndexFile => SegmentCatalog::index_file(self.index_path(), 3),
            Listing::Directory => SegmentCatalog::directory(self.dir.path(), &self.session, "ts"),
        }
    }

    /// Create the next (empty) segment and publish it.
    pub(crate) fn start_segment(&mut self) -> u64 {
        let index = self.next_index;
        fs::write(self.segment_path(index), b"").unwrap();
        self.next_index += 1;
        self.present.push_back(index);
        self.write_index();
        index
    }

    /// Append `n` pattern bytes to the newest segment.
    pub(crate) fn append(&mut self, n: u64) {
        let tail = *self.present.back().expect("no segment started");
        let bytes = pattern(self.written..self.written + n);
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.segment_path(tail))
            .unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        self.written += n;
    }

    /// Start a segment and fill it with `n` bytes.
    pub(crate) fn segment(&mut self, n: u64) -> u64 {
        let index = self.start_segment();
        self.append(n);
        index
    }

    /// Delete the oldest segment.
    pub(crate) fn rotate_out(&mut self) {
        let oldest = self.present.pop_front().expect("nothing to rotate");
        fs::remove_file(self.segment_path(oldest)).unwrap();
        self.removed += 1;
        self.write_index();
    }

    /// Delete everything and restart numbering at 0.
    pub(crate) fn restart(&mut self) {
        while let Some(index) = self.present.pop_front() {
            fs::remove_file(self.segment_path(index)).unwrap();
        }
        self.next_index = 0;
        self.removed = 0;
        self.written = 0;
        self.write_index();
    }

    fn write_index(&self) {
        if self.listing != Listing::IndexFile {
            return;
        }
        let snapshot = IndexSnapshot {
            write_position: self.written as i64,
            files_added: self.next_index as u32,
            files_removed: self.removed as u32,
            files: self
                .present
                .iter()
                .map(|i| format!("{}-{i}.ts", self.session))
                .collect(),
        };
        fs::write(self.index_path(), encode_index(&snapshot)).unwrap();
    }
}
