//! A single chunk file: a contiguous run of framed entries behind one file
//! handle, with an in-memory table of entry byte offsets.
//!
//! Every chunk file begins with a little-endian `u64` holding the byte
//! offset of the first framed entry - today always the header width itself;
//! the prefix is reserved for future in-file metadata. Framed entries follow
//! back-to-back with no trailing padding.
//!
//! All file access is position-based (`pread`/`pwrite` on Unix via
//! [`std::os::unix::fs::FileExt`]), so reads never touch a shared cursor and
//! read-only handles can serve lookups with `&self`.

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use chronicle_types::frame::{FRAME_HEADER_SIZE, decode_frame, encode_frame_into, framed_len};

use crate::error::{Error, Result};

/// Width of the chunk file header: a `u64` giving the offset of the first
/// framed entry.
pub const FILE_HEADER_SIZE: u64 = 8;

/// One open chunk file and the offset table for every entry it holds.
///
/// A writable handle is owned by the write head (or transiently by recovery
/// and truncation); read-only handles are owned by the read cache. Dropping
/// the handle closes the file.
#[derive(Debug)]
pub struct ChunkFile {
    file: File,
    path: PathBuf,
    start_idx: u64,
    /// `offsets[k]` = byte position of the k-th entry's frame.
    offsets: Vec<u64>,
    /// Byte position one past the last complete frame.
    end_offset: u64,
    writable: bool,
}

impl ChunkFile {
    /// Creates a fresh, empty chunk at `path` and writes its file header.
    ///
    /// The caller appends the first entry before the handle is ever visible
    /// elsewhere, so empty chunk files never persist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file already exists or cannot be written.
    pub fn create(path: PathBuf, start_idx: u64) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;
        write_all_at_offset(&file, &FILE_HEADER_SIZE.to_le_bytes(), 0)?;
        Ok(Self {
            file,
            path,
            start_idx,
            offsets: Vec::new(),
            end_offset: FILE_HEADER_SIZE,
            writable: true,
        })
    }

    /// Opens an existing chunk file and scans it once, rebuilding the offset
    /// table up to the last complete frame.
    ///
    /// A truncated trailing frame (length prefix present, payload short) is
    /// treated as absent: the chunk logically ends at the last complete
    /// frame, and a writable open physically truncates the torn bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on read failure and [`Error::Malformed`] when
    /// the file header is corrupt, a frame declares a zero length, or no
    /// complete entry is present.
    pub fn open(path: PathBuf, start_idx: u64, writable: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(writable).open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < FILE_HEADER_SIZE {
            return Err(Error::Malformed {
                reason: format!("chunk file shorter than its header: {}", path.display()),
            });
        }
        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        read_exact_at_offset(&file, &mut header, 0)?;
        let first_entry_offset = u64::from_le_bytes(header);
        if first_entry_offset < FILE_HEADER_SIZE || first_entry_offset > file_len {
            return Err(Error::Malformed {
                reason: format!(
                    "chunk file header declares first entry at {first_entry_offset}: {}",
                    path.display()
                ),
            });
        }

        let mut offsets = Vec::new();
        let mut pos = first_entry_offset;
        loop {
            let remaining = file_len - pos;
            if remaining < FRAME_HEADER_SIZE as u64 {
                break;
            }
            let mut len_buf = [0u8; FRAME_HEADER_SIZE];
            read_exact_at_offset(&file, &mut len_buf, pos)?;
            let payload_len = u32::from_le_bytes(len_buf) as u64;
            if payload_len == 0 {
                return Err(Error::Malformed {
                    reason: format!(
                        "zero-length frame at offset {pos} in {}",
                        path.display()
                    ),
                });
            }
            let frame_len = FRAME_HEADER_SIZE as u64 + payload_len;
            if remaining < frame_len {
                // Torn trailing frame from an interrupted write
                break;
            }
            offsets.push(pos);
            pos += frame_len;
        }

        if offsets.is_empty() {
            return Err(Error::Malformed {
                reason: format!("chunk file contains no complete entry: {}", path.display()),
            });
        }
        if writable && pos < file_len {
            file.set_len(pos)?;
        }

        Ok(Self { file, path, start_idx, offsets, end_offset: pos, writable })
    }

    /// Index of the first entry.
    #[must_use]
    pub fn start_idx(&self) -> u64 {
        self.start_idx
    }

    /// Index of the last entry.
    ///
    /// One less than the start index while the chunk is still empty (only a
    /// freshly created chunk, before its first append).
    #[must_use]
    pub fn last_idx(&self) -> u64 {
        self.start_idx + self.offsets.len() as u64 - 1
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    /// Whether `idx` falls inside `[start_idx, last_idx]`.
    #[must_use]
    pub fn contains(&self, idx: u64) -> bool {
        idx >= self.start_idx && idx - self.start_idx < self.offsets.len() as u64
    }

    /// Logical on-disk length in bytes (header plus complete frames).
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.end_offset
    }

    /// Path this handle was opened at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one framed entry and returns its assigned index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on write failure. A partial write leaves a torn
    /// trailing frame that the next open discards.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        debug_assert!(self.writable, "append on read-only chunk handle");

        let mut buf = Vec::with_capacity(framed_len(payload.len()));
        encode_frame_into(&mut buf, payload);
        write_all_at_offset(&self.file, &buf, self.end_offset)?;

        self.offsets.push(self.end_offset);
        self.end_offset += buf.len() as u64;
        Ok(self.last_idx())
    }

    /// Flushes written data to disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sync fails.
    pub fn flush(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Reads the payload of the entry at `idx` (frame header stripped).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] outside `[start_idx, last_idx]`,
    /// [`Error::Io`] on read failure, and [`Error::Malformed`] when the
    /// stored frame disagrees with the offset table.
    pub fn read(&self, idx: u64) -> Result<Vec<u8>> {
        let frame = self.read_frame_bytes(idx, idx)?;
        let (payload, rest) = decode_frame(&frame)?;
        if !rest.is_empty() {
            return Err(Error::Malformed {
                reason: format!("frame at index {idx} shorter than its slot in {}", self.path.display()),
            });
        }
        Ok(payload.to_vec())
    }

    /// Reads the framed bytes (headers included) for `[from, to]` in one
    /// positional read; frames are contiguous on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if either bound falls outside the chunk
    /// and [`Error::Io`] on read failure.
    pub fn read_framed(&self, from: u64, to: u64) -> Result<Vec<u8>> {
        debug_assert!(from <= to);
        self.read_frame_bytes(from, to)
    }

    fn read_frame_bytes(&self, from: u64, to: u64) -> Result<Vec<u8>> {
        for idx in [from, to] {
            if !self.contains(idx) {
                return Err(Error::OutOfRange {
                    idx,
                    start_idx: self.start_idx,
                    last_idx: self.last_idx(),
                });
            }
        }

        let begin = self.offsets[(from - self.start_idx) as usize];
        let end = self.frame_end((to - self.start_idx) as usize);
        let mut buf = vec![0u8; (end - begin) as usize];
        read_exact_at_offset(&self.file, &mut buf, begin)?;
        Ok(buf)
    }

    /// Byte offset one past the `k`-th entry's frame.
    fn frame_end(&self, k: usize) -> u64 {
        if k + 1 < self.offsets.len() { self.offsets[k + 1] } else { self.end_offset }
    }

    /// Truncates the chunk so `idx` becomes its last entry, discarding later
    /// frames on disk and in the offset table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `idx` is outside the chunk and
    /// [`Error::Io`] if the file truncation fails.
    pub fn truncate_at(&mut self, idx: u64) -> Result<()> {
        debug_assert!(self.writable, "truncate on read-only chunk handle");
        if !self.contains(idx) {
            return Err(Error::OutOfRange {
                idx,
                start_idx: self.start_idx,
                last_idx: self.last_idx(),
            });
        }

        let keep = (idx - self.start_idx + 1) as usize;
        let new_end = self.frame_end(keep - 1);
        self.file.set_len(new_end)?;
        self.offsets.truncate(keep);
        self.end_offset = new_end;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform-specific position-based I/O helpers
// ---------------------------------------------------------------------------

/// Reads exactly `buf.len()` bytes from `file` at the given byte `offset`.
///
/// On Unix this is `pread(2)` via [`FileExt::read_exact_at`] - no lock, no
/// cursor mutation. On Windows this falls back to `seek_read()` which does
/// update the cursor; the ledger's single-threaded discipline makes that
/// safe.
#[cfg(unix)]
fn read_exact_at_offset(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    file.read_exact_at(buf, offset)?;
    Ok(())
}

#[cfg(windows)]
fn read_exact_at_offset(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    let mut pos = 0;
    while pos < buf.len() {
        let n = file.seek_read(&mut buf[pos..], offset + pos as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unexpected end of file during seek_read",
            )
            .into());
        }
        pos += n;
    }
    Ok(())
}

/// Writes all of `data` to `file` at the given byte `offset`.
#[cfg(unix)]
fn write_all_at_offset(file: &File, data: &[u8], offset: u64) -> Result<()> {
    file.write_all_at(data, offset)?;
    Ok(())
}

#[cfg(windows)]
fn write_all_at_offset(file: &File, data: &[u8], offset: u64) -> Result<()> {
    let mut pos = 0;
    while pos < data.len() {
        let n = file.seek_write(&data[pos..], offset + pos as u64)?;
        pos += n;
    }
    Ok(())
}
