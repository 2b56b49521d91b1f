//! Binary layout of a `.tsbuffer` index file.
//!
//! The producer rewrites the whole index every time it creates or deletes a
//! segment. All integers are little-endian:
//!
//! ```text
//! i64        current write position (informational)
//! i32        files added   (total ever created)
//! i32        files removed (total ever deleted)
//! [u16]      file name, UTF-16, NUL terminated      } repeated once per
//!                                                   } present segment
//! u16        0 (end of list)
//! i32        files added   (trailer, must match the header)
//! i32        files removed (trailer, must match the header)
//! ```
//!
//! A reader can observe the file mid-rewrite, so a trailer that disagrees
//! with the header is reported as [`DecodeError::TornWrite`] and the caller
//! is expected to read again.

/// Decoded contents of an index file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexSnapshot {
    pub write_position: i64,
    pub files_added: u32,
    pub files_removed: u32,
    /// Names of the present segments, oldest first.
    pub files: Vec<String>,
}

impl IndexSnapshot {
    /// Sequence index of the oldest present segment.
    pub fn first_index(&self) -> u64 {
        u64::from(self.files_removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("index truncated at byte {0}")]
    Truncated(usize),
    #[error("negative file counter {0}")]
    NegativeCounter(i32),
    #[error("header ({added}/{removed}) and trailer ({trailer_added}/{trailer_removed}) disagree")]
    TornWrite {
        added: u32,
        removed: u32,
        trailer_added: u32,
        trailer_removed: u32,
    },
    #[error("index lists {listed} files but counters account for {expected}")]
    CountMismatch { listed: usize, expected: u64 },
    #[error("file name {0} is not valid UTF-16")]
    BadName(usize),
}

impl DecodeError {
    /// Whether re-reading the index may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Truncated(_) | Self::TornWrite { .. } | Self::CountMismatch { .. }
        )
    }
}

/// Decode an index file's raw bytes.
pub fn decode_index(bytes: &[u8]) -> Result<IndexSnapshot, DecodeError> {
    let mut cur = Cursor { bytes, pos: 0 };

    let write_position = i64::from_le_bytes(cur.take::<8>()?);
    let added = counter(i32::from_le_bytes(cur.take::<4>()?))?;
    let removed = counter(i32::from_le_bytes(cur.take::<4>()?))?;

    let mut files = Vec::new();
    loop {
        let mut units = Vec::new();
        loop {
            let unit = u16::from_le_bytes(cur.take::<2>()?);
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        if units.is_empty() {
            break;
        }
        let name = String::from_utf16(&units).map_err(|_| DecodeError::BadName(files.len()))?;
        files.push(name);
    }

    let trailer_added = counter(i32::from_le_bytes(cur.take::<4>()?))?;
    let trailer_removed = counter(i32::from_le_bytes(cur.take::<4>()?))?;
    if trailer_added != added || trailer_removed != removed {
        return Err(DecodeError::TornWrite {
            added,
            removed,
            trailer_added,
            trailer_removed,
        });
    }

    let expected = u64::from(added).saturating_sub(u64::from(removed));
    if added < removed || files.len() as u64 != expected {
        return Err(DecodeError::CountMismatch {
            listed: files.len(),
            expected,
        });
    }

    Ok(IndexSnapshot {
        write_position,
        files_added: added,
        files_removed: removed,
        files,
    })
}

/// Encode a snapshot in the layout [`decode_index`] reads.
pub fn encode_index(snapshot: &IndexSnapshot) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        24 + snapshot
            .files
            .iter()
            .map(|f| (f.len() + 1) * 2)
            .sum::<usize>(),
    );
    out.extend_from_slice(&snapshot.write_position.to_le_bytes());
    out.extend_from_slice(&(snapshot.files_added as i32).to_le_bytes());
    out.extend_from_slice(&(snapshot.files_removed as i32).to_le_bytes());
    for name in &snapshot.files {
        for unit in name.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(snapshot.files_added as i32).to_le_bytes());
    out.extend_from_slice(&(snapshot.files_removed as i32).to_le_bytes());
    out
}

fn counter(raw: i32) -> Result<u32, DecodeError> {
    u32::try_from(raw).map_err(|_| DecodeError::NegativeCounter(raw))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::Truncated(self.pos))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }
}
