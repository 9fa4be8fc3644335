//! The write head: the single chunk currently open for append, the chunk
//! threshold, and the seal-on-next-write flag.
//!
//! Chunk creation is lazy. Completing a chunk (a committable write crossing
//! the threshold, or a committable write with `force_chunk`) flushes it and
//! arms the pending-seal flag; the handle stays open - it still holds the
//! highest index - until the next append closes it and starts a fresh file.
//! Empty chunk files are therefore never persisted.
//!
//! Non-committable entries never complete a chunk: their content may still
//! be truncated away, and a sealed chunk must never be revised underneath a
//! reader.

use tracing::debug;

use crate::{
    chunk::ChunkFile,
    directory::DirectorySet,
    error::Result,
};

/// Identity of a chunk the head has finished with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedChunkMeta {
    /// First index in the sealed chunk.
    pub start_idx: u64,
    /// Last index in the sealed chunk.
    pub last_idx: u64,
}

/// Result of one append.
#[derive(Debug)]
pub struct AppendOutcome {
    /// Index assigned to the written entry.
    pub idx: u64,
    /// Metadata of the previous chunk, when this append closed it.
    pub sealed: Option<SealedChunkMeta>,
}

/// Owner of the currently-writing chunk.
#[derive(Debug)]
pub struct WriteHead {
    threshold: u64,
    chunk: Option<ChunkFile>,
    /// The current chunk is complete; the next append seals it and opens a
    /// fresh one.
    pending_seal: bool,
    /// Highest index assigned so far (0 when the ledger is empty).
    last_idx: u64,
}

impl WriteHead {
    /// Builds the head over recovered state.
    ///
    /// `chunk` is the final uncommitted chunk of the writable directory, if
    /// any; when it already meets the threshold the next write starts a
    /// fresh chunk instead of extending it.
    #[must_use]
    pub fn restore(threshold: u64, chunk: Option<ChunkFile>, last_idx: u64) -> Self {
        debug_assert!(threshold > 0, "threshold validated at construction");
        let pending_seal =
            chunk.as_ref().is_some_and(|chunk| chunk.size_bytes() >= threshold);
        Self { threshold, chunk, pending_seal, last_idx }
    }

    /// Highest index assigned so far.
    #[must_use]
    pub fn last_idx(&self) -> u64 {
        self.last_idx
    }

    /// The currently-open chunk, if one exists.
    #[must_use]
    pub fn current(&self) -> Option<&ChunkFile> {
        self.chunk.as_ref()
    }

    /// Last index of the current chunk when it is complete and only waiting
    /// to be closed - the one head state `commit` may act on.
    #[must_use]
    pub fn completed_last_idx(&self) -> Option<u64> {
        match (&self.chunk, self.pending_seal) {
            (Some(chunk), true) => Some(chunk.last_idx()),
            _ => None,
        }
    }

    /// Appends one entry, sealing the previous chunk first if it completed.
    ///
    /// Returns the assigned index and, when a seal happened, the sealed
    /// chunk's identity for the caller's registry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Io`] on any write failure; the caller
    /// must treat that as fatal to the instance, since a partial write can
    /// no longer guarantee contiguous indices.
    pub fn append(
        &mut self,
        dirs: &DirectorySet,
        payload: &[u8],
        committable: bool,
        force_chunk: bool,
    ) -> Result<AppendOutcome> {
        let mut sealed = None;
        if self.pending_seal || self.chunk.is_none() {
            if let Some(prev) = self.chunk.take() {
                let meta =
                    SealedChunkMeta { start_idx: prev.start_idx(), last_idx: prev.last_idx() };
                debug!(start_idx = meta.start_idx, last_idx = meta.last_idx, "sealing chunk");
                drop(prev);
                sealed = Some(meta);
            }
            let start_idx = self.last_idx + 1;
            self.chunk = Some(ChunkFile::create(dirs.pending_path(start_idx), start_idx)?);
            self.pending_seal = false;
        }

        #[allow(clippy::expect_used)]
        let chunk = self.chunk.as_mut().expect("chunk exists after init above");
        let idx = chunk.append(payload)?;
        self.last_idx = idx;

        if committable && (force_chunk || chunk.size_bytes() >= self.threshold) {
            chunk.flush()?;
            self.pending_seal = true;
        }

        Ok(AppendOutcome { idx, sealed })
    }

    /// Detaches the current chunk, clearing the pending-seal flag.
    ///
    /// Used when `commit` seals a completed head chunk and when `truncate`
    /// discards the head entirely.
    pub fn take_chunk(&mut self) -> Option<ChunkFile> {
        self.pending_seal = false;
        self.chunk.take()
    }

    /// Installs a chunk reopened by `truncate` as the new writing chunk.
    pub fn adopt_chunk(&mut self, chunk: ChunkFile) {
        debug_assert!(self.chunk.is_none(), "adopt over an open chunk");
        self.last_idx = chunk.last_idx();
        self.chunk = Some(chunk);
        self.pending_seal = false;
    }

    /// Truncates the current chunk so `idx` becomes its last entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::OutOfRange`] when `idx` is not held by
    /// the current chunk and [`crate::error::Error::Io`] on truncation
    /// failure.
    pub fn truncate_within(&mut self, idx: u64) -> Result<()> {
        #[allow(clippy::expect_used)]
        let chunk = self.chunk.as_mut().expect("truncate_within requires an open chunk");
        chunk.truncate_at(idx)?;
        self.pending_seal = false;
        self.last_idx = idx;
        Ok(())
    }

    /// Rewinds the highest assigned index after a truncation.
    pub fn set_last_idx(&mut self, idx: u64) {
        self.last_idx = idx;
    }
}
