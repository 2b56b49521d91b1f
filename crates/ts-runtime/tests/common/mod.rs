#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use ts_core::segment::tsbuffer::{IndexSnapshot, encode_index};

pub fn byte_at(o: u64) -> u8 {
    (o % 251) as u8
}

pub fn pattern(range: Range<u64>) -> Vec<u8> {
    range.map(byte_at).collect()
}

/// Writes `live-<N>.ts` segments plus a `live.tsbuffer` index into `dir`.
pub struct IndexProducer {
    dir: PathBuf,
    next_index: u64,
    removed: u64,
    present: VecDeque<u64>,
    written: u64,
}

impl IndexProducer {
    pub fn new(dir: &Path) -> Self {
        let producer = Self {
            dir: dir.to_path_buf(),
            next_index: 0,
            removed: 0,
            present: VecDeque::new(),
            written: 0,
        };
        producer.write_index();
        producer
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join("live.tsbuffer")
    }

    fn segment_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("live-{index}.ts"))
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn start_segment(&mut self) {
        fs::write(self.segment_path(self.next_index), b"").unwrap();
        self.present.push_back(self.next_index);
        self.next_index += 1;
        self.write_index();
    }

    pub fn append(&mut self, n: u64) {
        let tail = *self.present.back().unwrap();
        let mut f = OpenOptions::new()
            .append(true)
            .open(self.segment_path(tail))
            .unwrap();
        f.write_all(&pattern(self.written..self.written + n)).unwrap();
        self.written += n;
    }

    /// Delete the oldest segments until at most `keep` remain.
    pub fn trim_to(&mut self, keep: usize) {
        while self.present.len() > keep {
            let oldest = self.present.pop_front().unwrap();
            fs::remove_file(self.segment_path(oldest)).unwrap();
            self.removed += 1;
        }
        self.write_index();
    }

    fn write_index(&self) {
        let snapshot = IndexSnapshot {
            write_position: self.written as i64,
            files_added: self.next_index as u32,
            files_removed: self.removed as u32,
            files: self.present.iter().map(|i| format!("live-{i}.ts")).collect(),
        };
        // Rename over the old index so readers never see a half-written file.
        let tmp = self.dir.join("live.tsbuffer.tmp");
        fs::write(&tmp, encode_index(&snapshot)).unwrap();
        fs::rename(&tmp, self.index_path()).unwrap();
    }
}
