use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use ts_config::ReaderConfig;

use crate::error::CoreResult;
use crate::plain::PlainFileReader;
use crate::rotating::RotatingBufferReader;
use crate::segment::SegmentCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Static,
    Rotating,
}

/// What to open: a finished recording or a live rotating buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Buffer {
        catalog: SegmentCatalog,
        segment_size: u64,
    },
}

impl Target {
    /// Decide how to read `path`.
    ///
    /// An index file (by suffix) or a directory of segments is a rotating
    /// buffer; anything else is read as a plain file.
    pub fn resolve(path: impl AsRef<Path>, config: &ReaderConfig) -> Self {
        Self::resolve_with_session(path, config, None)
    }

    /// Like [`resolve`](Self::resolve), naming the segment session of a
    /// directory target explicitly instead of using the directory name.
    pub fn resolve_with_session(
        path: impl AsRef<Path>,
        config: &ReaderConfig,
        session: Option<&str>,
    ) -> Self {
        let path = path.as_ref();
        let segment_size = config.segment_size.as_bytes();

        if has_suffix(path, &config.index_suffix) {
            return Self::Buffer {
                catalog: SegmentCatalog::index_file(path, config.index_read_attempts),
                segment_size,
            };
        }
        if path.is_dir() {
            let session = session
                .map(str::to_string)
                .or_else(|| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                })
                .unwrap_or_default();
            return Self::Buffer {
                catalog: SegmentCatalog::directory(path, session, &config.segment_extension),
                segment_size,
            };
        }
        Self::File(path.to_path_buf())
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::File(_) => TargetKind::Static,
            Self::Buffer { .. } => TargetKind::Rotating,
        }
    }

    pub fn is_realtime(&self) -> bool {
        self.kind() == TargetKind::Rotating
    }

    pub fn location(&self) -> &Path {
        match self {
            Self::File(path) => path,
            Self::Buffer { catalog, .. } => catalog.location(),
        }
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    let Some(name) = path.to_str() else {
        return false;
    };
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// One readable stream, static or live, behind a single dispatch surface.
#[derive(Debug)]
pub enum StreamSource {
    Plain(PlainFileReader),
    Rotating(RotatingBufferReader),
}

impl StreamSource {
    pub fn open(target: &Target) -> CoreResult<Self> {
        debug!("opening {:?} target {}", target.kind(), target.location().display());
        match target {
            Target::File(path) => PlainFileReader::open(path).map(Self::Plain),
            Target::Buffer {
                catalog,
                segment_size,
            } => RotatingBufferReader::open(catalog.clone(), *segment_size).map(Self::Rotating),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> CoreResult<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Rotating(r) => r.read(buf),
        }
    }

    pub fn seek(&mut self, pos: SeekFrom) -> CoreResult<u64> {
        match self {
            Self::Plain(r) => r.seek(pos),
            Self::Rotating(r) => r.seek(pos),
        }
    }

    pub fn length(&mut self) -> CoreResult<u64> {
        match self {
            Self::Plain(r) => r.length(),
            Self::Rotating(r) => r.length(),
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            Self::Plain(r) => r.position(),
            Self::Rotating(r) => r.position(),
        }
    }

    /// Forget stale offsets after the session was (re-)tuned.
    pub fn notify_retuned(&mut self) -> CoreResult<()> {
        match self {
            Self::Plain(_) => Ok(()),
            Self::Rotating(r) => r.on_tune_reset(),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Plain(_) => TargetKind::Static,
            Self::Rotating(_) => TargetKind::Rotating,
        }
    }

    pub fn is_realtime(&self) -> bool {
        self.kind() == TargetKind::Rotating
    }

    pub fn close(self) {
        debug!("closing {:?} source at {}", self.kind(), self.position());
    }
}

impl io::Read for StreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        StreamSource::read(self, buf).map_err(io::Error::other)
    }
}

impl io::Seek for StreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        StreamSource::seek(self, pos).map_err(io::Error::other)
    }
}
