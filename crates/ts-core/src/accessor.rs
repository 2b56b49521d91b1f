use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Identity of the file behind a handle, to tell a replaced file apart from
/// the one that was opened.
#[cfg(unix)]
type FileId = (u64, u64);
#[cfg(not(unix))]
type FileId = Option<std::time::SystemTime>;

#[cfg(unix)]
fn file_id(meta: &Metadata) -> FileId {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), meta.ino())
}

#[cfg(not(unix))]
fn file_id(meta: &Metadata) -> FileId {
    meta.created().ok()
}

/// An open handle on one segment file.
///
/// The file may still be growing when it is the tail of a rotating buffer, or
/// disappear underneath the handle once the producer rotates it out.
#[derive(Debug)]
pub struct SegmentFileAccessor {
    index: u64,
    path: PathBuf,
    file: File,
    id: FileId,
    length: u64,
}

impl SegmentFileAccessor {
    pub fn open(index: u64, path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let meta = file.metadata()?;
        Ok(Self {
            index,
            path,
            file,
            id: file_id(&meta),
            length: meta.len(),
        })
    }

    /// Read up to `buf.len()` bytes starting at `offset` within this file.
    ///
    /// Returns fewer bytes only when the end of the file is reached.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Query the file's length now.
    pub fn current_length(&mut self) -> io::Result<u64> {
        self.length = self.file.metadata()?.len();
        Ok(self.length)
    }

    /// Length as of the last query.
    pub fn cached_length(&self) -> u64 {
        self.length
    }

    /// Whether `path` still names the file this handle was opened on.
    /// Fails with `NotFound` once nothing is there any more.
    pub fn is_current(&self, path: &Path) -> io::Result<bool> {
        Ok(file_id(&fs::metadata(path)?) == self.id)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
