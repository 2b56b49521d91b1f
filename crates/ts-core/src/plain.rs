use std::io::SeekFrom;
use std::path::Path;

use log::debug;
use orion_error::ErrorOweBase;
use orion_error::prelude::*;

use crate::accessor::SegmentFileAccessor;
use crate::error::{CoreReason, CoreResult};

/// Reader over a single, already complete recording.
#[derive(Debug)]
pub struct PlainFileReader {
    file: SegmentFileAccessor,
    position: u64,
}

impl PlainFileReader {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let file = SegmentFileAccessor::open(0, path).map_err(|e| {
            StructError::from(CoreReason::Open).with_detail(format!("{}: {e}", path.display()))
        })?;
        debug!("opened {} ({} bytes)", path.display(), file.cached_length());
        Ok(Self { file, position: 0 })
    }

    /// Read from the current position. `Ok(0)` means end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> CoreResult<usize> {
        let n = self.file.read_at(self.position, buf).owe(CoreReason::Io)?;
        self.position += n as u64;
        Ok(n)
    }

    pub fn seek(&mut self, pos: SeekFrom) -> CoreResult<u64> {
        let target = match pos {
            SeekFrom::Start(o) => Some(o),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
            SeekFrom::End(d) => self.length()?.checked_add_signed(d),
        };
        let Some(target) = target else {
            return Err(StructError::from(CoreReason::Seek)
                .with_detail(format!("{pos:?} from position {}", self.position)));
        };
        self.position = target;
        Ok(target)
    }

    pub fn length(&mut self) -> CoreResult<u64> {
        self.file.current_length().owe(CoreReason::Io)
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(len: usize) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.ts");
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_to_eof_then_zero() {
        let (_dir, path) = recording(300);
        let mut reader = PlainFileReader::open(&path).unwrap();
        let mut buf = [0u8; 188];
        assert_eq!(reader.read(&mut buf).unwrap(), 188);
        assert_eq!(reader.read(&mut buf).unwrap(), 112);
        assert_eq!(buf[0], (188 % 251) as u8);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.position(), 300);
    }

    #[test]
    fn seek_variants() {
        let (_dir, path) = recording(1000);
        let mut reader = PlainFileReader::open(&path).unwrap();
        assert_eq!(reader.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(reader.seek(SeekFrom::Current(5)).unwrap(), 15);
        assert_eq!(reader.seek(SeekFrom::End(-100)).unwrap(), 900);
        let mut buf = [0u8; 200];
        assert_eq!(reader.read(&mut buf).unwrap(), 100);
        assert_eq!(buf[0], (900 % 251) as u8);
    }

    #[test]
    fn seek_past_end_reads_nothing() {
        let (_dir, path) = recording(10);
        let mut reader = PlainFileReader::open(&path).unwrap();
        assert_eq!(reader.seek(SeekFrom::End(5)).unwrap(), 15);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn seek_before_start_is_error() {
        let (_dir, path) = recording(10);
        let mut reader = PlainFileReader::open(&path).unwrap();
        reader.seek(SeekFrom::Start(4)).unwrap();
        assert!(reader.seek(SeekFrom::Current(-5)).is_err());
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(PlainFileReader::open("/nonexistent/show.ts").is_err());
    }
}
