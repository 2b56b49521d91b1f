use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use orion_error::ErrorOweBase;
use orion_error::prelude::*;

use super::tsbuffer::{DecodeError, decode_index};
use crate::error::{CoreReason, CoreResult};

/// One segment file as reported by a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub index: u64,
    pub path: PathBuf,
}

/// Where the list of present segment files comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentCatalog {
    /// A producer-maintained `.tsbuffer` index file.
    IndexFile { path: PathBuf, attempts: u32 },
    /// Every `<session>-<N>.<extension>` file in a directory.
    Directory {
        dir: PathBuf,
        session: String,
        extension: String,
    },
}

impl SegmentCatalog {
    pub fn index_file(path: impl Into<PathBuf>, attempts: u32) -> Self {
        Self::IndexFile {
            path: path.into(),
            attempts: attempts.max(1),
        }
    }

    pub fn directory(
        dir: impl Into<PathBuf>,
        session: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self::Directory {
            dir: dir.into(),
            session: session.into(),
            extension: extension.into(),
        }
    }

    /// The index file or directory this catalog reads.
    pub fn location(&self) -> &Path {
        match self {
            Self::IndexFile { path, .. } => path,
            Self::Directory { dir, .. } => dir,
        }
    }

    /// Enumerate the segment files present right now, sorted by index.
    pub fn list(&self) -> CoreResult<Vec<CatalogEntry>> {
        let mut entries = match self {
            Self::IndexFile { path, attempts } => list_index_file(path, *attempts)?,
            Self::Directory {
                dir,
                session,
                extension,
            } => list_directory(dir, session, extension)?,
        };
        entries.sort_by_key(|e| e.index);
        entries.dedup_by_key(|e| e.index);
        Ok(entries)
    }
}

fn list_index_file(path: &Path, attempts: u32) -> CoreResult<Vec<CatalogEntry>> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut last_err: Option<DecodeError> = None;

    for attempt in 1..=attempts {
        let bytes = fs::read(path).owe(CoreReason::Index)?;
        match decode_index(&bytes) {
            Ok(snapshot) => {
                trace!(
                    "index {}: added={} removed={} present={}",
                    path.display(),
                    snapshot.files_added,
                    snapshot.files_removed,
                    snapshot.files.len()
                );
                let first = snapshot.first_index();
                return Ok(snapshot
                    .files
                    .iter()
                    .enumerate()
                    .map(|(i, name)| CatalogEntry {
                        index: first + i as u64,
                        path: resolve_name(base_dir, name),
                    })
                    .collect());
            }
            Err(e) if e.is_transient() => {
                debug!("index {} attempt {attempt}: {e}", path.display());
                last_err = Some(e);
                std::thread::yield_now();
            }
            Err(e) => {
                return Err(StructError::from(CoreReason::Index)
                    .with_detail(format!("{}: {e}", path.display())));
            }
        }
    }

    let reason = last_err.map(|e| e.to_string()).unwrap_or_default();
    Err(StructError::from(CoreReason::Index).with_detail(format!(
        "{}: unreadable after {attempts} attempts: {reason}",
        path.display()
    )))
}

/// Map a name recorded by the producer onto a local path.
///
/// Relative names live next to the index. Absolute names are used as-is when
/// they exist; otherwise only the file name is kept, since the producer may
/// record paths as seen from its own host.
fn resolve_name(base_dir: &Path, name: &str) -> PathBuf {
    let as_path = Path::new(name);
    if as_path.is_absolute() && as_path.exists() {
        return as_path.to_path_buf();
    }
    if as_path.is_relative() && !name.contains('\\') {
        return base_dir.join(as_path);
    }
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base_dir.join(file_name)
}

fn list_directory(dir: &Path, session: &str, extension: &str) -> CoreResult<Vec<CatalogEntry>> {
    let read_dir = fs::read_dir(dir).owe(CoreReason::Index)?;
    let mut entries = Vec::new();
    for item in read_dir {
        let item = match item {
            Ok(item) => item,
            // Entry deleted while iterating.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(StructError::from(CoreReason::Index)
                    .with_detail(format!("{}: {e}", dir.display())));
            }
        };
        let file_name = item.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(index) = parse_segment_name(name, session, extension) {
            entries.push(CatalogEntry {
                index,
                path: item.path(),
            });
        }
    }
    Ok(entries)
}

/// Parse `<session>-<N>.<extension>` into `N`.
pub(crate) fn parse_segment_name(name: &str, session: &str, extension: &str) -> Option<u64> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    let digits = stem.strip_prefix(session)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
