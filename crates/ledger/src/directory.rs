//! Chunk file naming and multi-directory discovery.
//!
//! A chunk carries its identity in its file name: `ledger_<start>` while the
//! chunk is pending, `ledger_<start>-<last>.committed` once the commit rename
//! has happened. The directory set pairs the single writable directory with
//! an ordered list of read-only directories; read-only directories only ever
//! contribute committed files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::error::{Error, Result};

/// Fixed name prefix shared by every chunk file of a ledger.
pub const FILE_PREFIX: &str = "ledger";

/// Name suffix marking a committed chunk.
pub const COMMITTED_SUFFIX: &str = ".committed";

/// Returns the file name of a pending chunk starting at `start_idx`.
#[must_use]
pub fn pending_file_name(start_idx: u64) -> String {
    format!("{FILE_PREFIX}_{start_idx}")
}

/// Returns the file name of a committed chunk covering `[start_idx, last_idx]`.
#[must_use]
pub fn committed_file_name(start_idx: u64, last_idx: u64) -> String {
    format!("{FILE_PREFIX}_{start_idx}-{last_idx}{COMMITTED_SUFFIX}")
}

/// Recognises the committed-name suffix.
///
/// Exposed for host-side tooling that partitions a ledger directory into
/// committed and uncommitted sets (e.g. when seeding a recovery node).
#[must_use]
pub fn is_committed_file_name(name: &str) -> bool {
    name.ends_with(COMMITTED_SUFFIX)
}

/// Identity parsed out of a chunk file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFileName {
    /// Index of the first entry in the chunk.
    pub start_idx: u64,
    /// Last index recorded in the name; present iff the chunk is committed.
    pub committed_last_idx: Option<u64>,
}

/// Parses a chunk file name into its identity.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the name does not follow the
/// `ledger_<start>` / `ledger_<start>-<last>.committed` pattern, or if the
/// encoded indices are zero or inverted.
pub fn parse_file_name(name: &str) -> Result<ParsedFileName> {
    let malformed = || Error::Malformed { reason: format!("unrecognised chunk file name: {name}") };

    let body = name
        .strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(malformed)?;

    if let Some(range) = body.strip_suffix(COMMITTED_SUFFIX) {
        let (start, last) = range.split_once('-').ok_or_else(malformed)?;
        let start_idx: u64 = start.parse().map_err(|_| malformed())?;
        let last_idx: u64 = last.parse().map_err(|_| malformed())?;
        if start_idx == 0 || last_idx < start_idx {
            return Err(malformed());
        }
        Ok(ParsedFileName { start_idx, committed_last_idx: Some(last_idx) })
    } else {
        let start_idx: u64 = body.parse().map_err(|_| malformed())?;
        if start_idx == 0 {
            return Err(malformed());
        }
        Ok(ParsedFileName { start_idx, committed_last_idx: None })
    }
}

/// The writable directory plus the ordered read-only directories.
///
/// When the same start index appears in several places the writable
/// directory wins, then read-only directories in declaration order.
#[derive(Debug)]
pub struct DirectorySet {
    writable: PathBuf,
    read_only: Vec<PathBuf>,
}

impl DirectorySet {
    /// Opens a directory set, creating the writable directory if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the writable directory cannot be created and
    /// [`Error::Config`] if a read-only directory does not exist.
    pub fn open(writable: PathBuf, read_only: Vec<PathBuf>) -> Result<Self> {
        fs::create_dir_all(&writable)?;
        for dir in &read_only {
            if !dir.is_dir() {
                return Err(Error::Config {
                    message: format!("read-only ledger directory not found: {}", dir.display()),
                });
            }
        }
        Ok(Self { writable, read_only })
    }

    /// Path of the writable directory.
    #[must_use]
    pub fn writable_dir(&self) -> &Path {
        &self.writable
    }

    /// Path of a pending chunk in the writable directory.
    #[must_use]
    pub fn pending_path(&self, start_idx: u64) -> PathBuf {
        self.writable.join(pending_file_name(start_idx))
    }

    /// Path of a committed chunk in the writable directory.
    #[must_use]
    pub fn committed_path(&self, start_idx: u64, last_idx: u64) -> PathBuf {
        self.writable.join(committed_file_name(start_idx, last_idx))
    }

    /// Enumerates the writable directory, strictly parsing every name.
    ///
    /// Returns entries sorted by ascending start index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be read and
    /// [`Error::Malformed`] on any file name the ledger does not own:
    /// recovery refuses to guess about foreign files in its directory.
    pub fn enumerate_writable(&self) -> Result<Vec<(ParsedFileName, PathBuf)>> {
        let mut chunks = Vec::new();
        for entry in fs::read_dir(&self.writable)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_str().ok_or_else(|| Error::Malformed {
                reason: format!("non-UTF-8 file name in ledger directory: {file_name:?}"),
            })?;
            let parsed = parse_file_name(name)?;
            chunks.push((parsed, entry.path()));
        }
        chunks.sort_by_key(|(parsed, _)| parsed.start_idx);
        Ok(chunks)
    }

    /// Searches the read-only directories, in order, for a committed chunk
    /// covering `idx`.
    ///
    /// Pending and unrecognised files are ignored; the first directory that
    /// yields a covering chunk wins. Scan failures are logged and treated as
    /// "not found" so a flaky read-only mount cannot poison the ledger.
    #[must_use]
    pub fn find_committed_in_read_only(&self, idx: u64) -> Option<(ParsedFileName, PathBuf)> {
        for dir in &self.read_only {
            match Self::scan_dir_for(dir, idx) {
                Ok(Some(found)) => return Some(found),
                Ok(None) => {},
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "failed to scan read-only ledger directory");
                },
            }
        }
        None
    }

    /// Scans one directory for the committed chunk with the largest start
    /// index ≤ `idx` whose last index covers `idx`.
    fn scan_dir_for(dir: &Path, idx: u64) -> std::io::Result<Option<(ParsedFileName, PathBuf)>> {
        let mut best: Option<(ParsedFileName, PathBuf)> = None;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            let Ok(parsed) = parse_file_name(name) else { continue };
            let Some(last_idx) = parsed.committed_last_idx else { continue };
            if parsed.start_idx <= idx
                && last_idx >= idx
                && best.as_ref().is_none_or(|(b, _)| parsed.start_idx > b.start_idx)
            {
                best = Some((parsed, entry.path()));
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs::File;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_pending_name_roundtrip() {
        let name = pending_file_name(42);
        assert_eq!(name, "ledger_42");
        assert!(!is_committed_file_name(&name));

        let parsed = parse_file_name(&name).expect("parse");
        assert_eq!(parsed, ParsedFileName { start_idx: 42, committed_last_idx: None });
    }

    #[test]
    fn test_committed_name_roundtrip() {
        let name = committed_file_name(10, 25);
        assert_eq!(name, "ledger_10-25.committed");
        assert!(is_committed_file_name(&name));

        let parsed = parse_file_name(&name).expect("parse");
        assert_eq!(parsed, ParsedFileName { start_idx: 10, committed_last_idx: Some(25) });
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        for name in ["journal_1", "ledger-1", "ledger_", "ledger_abc", "ledger_0", "ledger_5-4.committed", "ledger_3-x.committed"] {
            assert!(parse_file_name(name).is_err(), "accepted: {name}");
        }
    }

    #[test]
    fn test_enumerate_sorted_by_start() {
        let dir = tempdir().unwrap();
        for name in ["ledger_11", "ledger_1-10.committed", "ledger_21"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let set = DirectorySet::open(dir.path().to_path_buf(), Vec::new()).expect("open");
        let chunks = set.enumerate_writable().expect("enumerate");

        let starts: Vec<u64> = chunks.iter().map(|(parsed, _)| parsed.start_idx).collect();
        assert_eq!(starts, vec![1, 11, 21]);
    }

    #[test]
    fn test_enumerate_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("ledger_1")).unwrap();
        File::create(dir.path().join("stray.txt")).unwrap();

        let set = DirectorySet::open(dir.path().to_path_buf(), Vec::new()).expect("open");
        assert!(set.enumerate_writable().is_err());
    }

    #[test]
    fn test_read_only_lookup_ignores_pending() {
        let ro = tempdir().unwrap();
        File::create(ro.path().join("ledger_1-5.committed")).unwrap();
        File::create(ro.path().join("ledger_6")).unwrap();

        let writable = tempdir().unwrap();
        let set = DirectorySet::open(writable.path().to_path_buf(), vec![ro.path().to_path_buf()])
            .expect("open");

        assert!(set.find_committed_in_read_only(3).is_some());
        // Index 7 only exists in the pending file, which read-only dirs never serve
        assert!(set.find_committed_in_read_only(7).is_none());
    }

    #[test]
    fn test_read_only_lookup_prefers_largest_covering_start() {
        let ro = tempdir().unwrap();
        File::create(ro.path().join("ledger_1-10.committed")).unwrap();
        File::create(ro.path().join("ledger_11-20.committed")).unwrap();

        let writable = tempdir().unwrap();
        let set = DirectorySet::open(writable.path().to_path_buf(), vec![ro.path().to_path_buf()])
            .expect("open");

        let (parsed, _) = set.find_committed_in_read_only(15).expect("found");
        assert_eq!(parsed.start_idx, 11);
    }

    #[test]
    fn test_read_only_dirs_searched_in_order() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        File::create(first.path().join("ledger_1-5.committed")).unwrap();
        File::create(second.path().join("ledger_1-8.committed")).unwrap();

        let writable = tempdir().unwrap();
        let set = DirectorySet::open(
            writable.path().to_path_buf(),
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
        )
        .expect("open");

        // Both directories cover index 3; the first declared wins.
        let (parsed, path) = set.find_committed_in_read_only(3).expect("found");
        assert_eq!(parsed.committed_last_idx, Some(5));
        assert!(path.starts_with(first.path()));
    }

    #[test]
    fn test_missing_read_only_dir_rejected() {
        let writable = tempdir().unwrap();
        let result = DirectorySet::open(
            writable.path().to_path_buf(),
            vec![writable.path().join("does-not-exist")],
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
