//! The ledger facade: public operations, the chunk registry, and
//! construction-time recovery.
//!
//! The facade owns the directory set, the write head, the read cache, and a
//! registry of sealed chunks in the writable directory keyed by start index.
//! Ownership is strict: the write head uniquely owns the writing chunk, the
//! read cache uniquely owns each reopened read handle, and the registry
//! holds only identities - "which chunk contains index i" is a lookup, never
//! a second reference.

use std::{collections::BTreeMap, fs, sync::Arc};

use chronicle_types::LedgerConfig;
use tracing::{debug, info, warn};

use crate::{
    chunk::{ChunkFile, FILE_HEADER_SIZE},
    directory::DirectorySet,
    error::{Error, Result},
    read_cache::{CacheStats, ReadCache},
    transport::{CompletionSink, ReadResponse, RingBufferSink},
    write_head::WriteHead,
};

/// Identity of a sealed chunk resident in the writable directory.
#[derive(Debug, Clone, Copy)]
struct SealedChunk {
    last_idx: u64,
    committed: bool,
}

/// A chunk resolved for reading: either the open writing chunk or a handle
/// owned by the read cache.
enum ChunkRef<'a> {
    Head(&'a ChunkFile),
    Sealed(Arc<ChunkFile>),
}

impl ChunkRef<'_> {
    fn last_idx(&self) -> u64 {
        match self {
            ChunkRef::Head(chunk) => chunk.last_idx(),
            ChunkRef::Sealed(chunk) => chunk.last_idx(),
        }
    }

    fn read(&self, idx: u64) -> Result<Vec<u8>> {
        match self {
            ChunkRef::Head(chunk) => chunk.read(idx),
            ChunkRef::Sealed(chunk) => chunk.read(idx),
        }
    }

    fn read_framed(&self, from: u64, to: u64) -> Result<Vec<u8>> {
        match self {
            ChunkRef::Head(chunk) => chunk.read_framed(from, to),
            ChunkRef::Sealed(chunk) => chunk.read_framed(from, to),
        }
    }
}

/// The on-disk append-only ledger of a replicated state-machine node.
///
/// Entries are opaque bytes with strictly increasing indices starting at 1,
/// stored as length-framed records across chunk files. `commit` renames
/// chunks to their immutable committed form; `truncate` discards a suffix.
/// Historical ranges are re-read through a bounded LRU of read handles, and
/// batched reads post their completions to the host transport sink.
///
/// All operations run on one executor thread; writes take `&mut self` and
/// complete synchronously against the writable directory.
pub struct Ledger<S: CompletionSink = RingBufferSink> {
    dirs: DirectorySet,
    head: WriteHead,
    /// Sealed chunks in the writable directory, keyed by start index.
    sealed: BTreeMap<u64, SealedChunk>,
    cache: ReadCache,
    commit_idx: u64,
    sink: S,
}

impl<S: CompletionSink> Ledger<S> {
    /// Opens a ledger over the configured directories, recovering any
    /// existing chunks.
    ///
    /// Recovery scans every file in the writable directory, rebuilds each
    /// offset table, and promotes the final chunk to the write head when its
    /// name is not committed. A torn trailing frame in that chunk is
    /// discarded; any other inconsistency - unparseable names, a gap or
    /// overlap between chunks, a committed name disagreeing with its content
    /// - refuses construction rather than silently dropping entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid parameters, and
    /// [`Error::Io`] / [`Error::Malformed`] for unreadable or corrupt state.
    pub fn open(config: &LedgerConfig, sink: S) -> Result<Self> {
        config.validate().map_err(|err| Error::Config { message: err.to_string() })?;

        let dirs =
            DirectorySet::open(config.writable_dir.clone(), config.read_only_dirs.clone())?;
        let mut discovered = dirs.enumerate_writable()?;

        // A crash during the very first append to a fresh chunk leaves a
        // final file with no complete entry; it holds nothing recoverable,
        // so removal is safe.
        if let Some((parsed, path)) = discovered.last() {
            if parsed.committed_last_idx.is_none() && !holds_complete_entry(path)? {
                warn!(path = %path.display(), "removing entryless chunk file left by an interrupted write");
                fs::remove_file(path)?;
                discovered.pop();
            }
        }

        let mut sealed = BTreeMap::new();
        let mut head_chunk = None;
        let mut commit_idx = 0;
        let mut prev_last: Option<u64> = None;

        let chunk_count = discovered.len();
        for (i, (parsed, path)) in discovered.into_iter().enumerate() {
            let is_final = i + 1 == chunk_count;
            let promote = is_final && parsed.committed_last_idx.is_none();

            let chunk = ChunkFile::open(path, parsed.start_idx, promote)?;

            if let Some(prev) = prev_last {
                if chunk.start_idx() != prev + 1 {
                    return Err(Error::Malformed {
                        reason: format!(
                            "chunk starting at {} does not follow previous last index {prev}",
                            chunk.start_idx()
                        ),
                    });
                }
            }

            if let Some(named_last) = parsed.committed_last_idx {
                if chunk.last_idx() != named_last {
                    return Err(Error::Malformed {
                        reason: format!(
                            "committed chunk {} holds entries up to {}, name claims {named_last}",
                            chunk.start_idx(),
                            chunk.last_idx()
                        ),
                    });
                }
                commit_idx = named_last;
            }

            prev_last = Some(chunk.last_idx());
            if promote {
                head_chunk = Some(chunk);
            } else {
                sealed.insert(
                    chunk.start_idx(),
                    SealedChunk {
                        last_idx: chunk.last_idx(),
                        committed: parsed.committed_last_idx.is_some(),
                    },
                );
            }
        }

        let last_idx = prev_last.unwrap_or(0);
        let head = WriteHead::restore(config.chunk_threshold, head_chunk, last_idx);
        info!(
            dir = %dirs.writable_dir().display(),
            chunks = chunk_count,
            last_idx,
            commit_idx,
            "ledger recovered"
        );

        Ok(Self {
            dirs,
            head,
            sealed,
            cache: ReadCache::new(config.read_cache_bound),
            commit_idx,
            sink,
        })
    }

    /// Highest index currently resident; 0 when the ledger is empty.
    #[must_use]
    pub fn last_idx(&self) -> u64 {
        self.head.last_idx()
    }

    /// Highest index whose containing chunk is committed on disk.
    #[must_use]
    pub fn commit_idx(&self) -> u64 {
        self.commit_idx
    }

    /// Read-cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Appends one entry and returns its assigned index.
    ///
    /// `committable` marks the index as a legal chunk boundary; `force_chunk`
    /// additionally requests a seal at this index, taking effect on the next
    /// write (and only for committable entries).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for a zero-length payload and
    /// [`Error::Io`] on write failure - fatal to the instance, since a
    /// partial write can no longer guarantee contiguous indices.
    pub fn write_entry(
        &mut self,
        bytes: &[u8],
        committable: bool,
        force_chunk: bool,
    ) -> Result<u64> {
        if bytes.is_empty() {
            return Err(Error::Malformed { reason: "zero-length entries are not storable".into() });
        }

        let outcome = self.head.append(&self.dirs, bytes, committable, force_chunk)?;
        if let Some(meta) = outcome.sealed {
            self.sealed
                .insert(meta.start_idx, SealedChunk { last_idx: meta.last_idx, committed: false });
        }
        Ok(outcome.idx)
    }

    /// Reads the payload of the entry at `idx`.
    ///
    /// Returns `None` when `idx` is 0, beyond [`last_idx`](Self::last_idx),
    /// or not resident in the configured directories. Read failures are
    /// logged and reported as `None`; they do not poison the ledger.
    #[must_use]
    pub fn read_entry(&self, idx: u64) -> Option<Vec<u8>> {
        if idx == 0 || idx > self.last_idx() {
            return None;
        }
        let chunk = self.resolve_chunk(idx)?;
        match chunk.read(idx) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(idx, %err, "ledger read failed");
                None
            },
        }
    }

    /// Reads the framed entries (headers included) for `[from, to]`,
    /// stitching segments across chunk boundaries in index order.
    ///
    /// Returns `None` when `from` is 0, the range is inverted or extends
    /// beyond [`last_idx`](Self::last_idx), or any index in it is
    /// unresolvable.
    #[must_use]
    pub fn read_framed_entries(&self, from: u64, to: u64) -> Option<Vec<u8>> {
        if from == 0 || from > to || to > self.last_idx() {
            return None;
        }

        let mut framed = Vec::new();
        let mut cursor = from;
        while cursor <= to {
            let chunk = self.resolve_chunk(cursor)?;
            let segment_end = to.min(chunk.last_idx());
            match chunk.read_framed(cursor, segment_end) {
                Ok(bytes) => framed.extend_from_slice(&bytes),
                Err(err) => {
                    warn!(from = cursor, to = segment_end, %err, "ledger range read failed");
                    return None;
                },
            }
            cursor = segment_end + 1;
        }
        Some(framed)
    }

    /// Performs a batched historical read and posts its completion to the
    /// host transport.
    ///
    /// The response carries the requested range, the framed bytes (`None`
    /// when the range was unresolvable), and the caller's correlation id.
    pub fn fetch_framed_entries(&self, from: u64, to: u64, request_id: u64) {
        let data = self.read_framed_entries(from, to);
        debug!(request_id, from, to, found = data.is_some(), "posting read completion");
        self.sink.post(ReadResponse { request_id, from, to, data });
    }

    /// Commits every chunk whose last index is at most `idx`.
    ///
    /// Each covered chunk not yet bearing the committed suffix is atomically
    /// renamed; a completed head chunk whose last index is exactly `idx` is
    /// sealed and renamed too. When `idx` is not the last index of any
    /// completed chunk - it is stale, beyond the ledger, or lands strictly
    /// inside a chunk - nothing happens; callers needing certainty inspect
    /// [`commit_idx`](Self::commit_idx).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a rename fails.
    pub fn commit(&mut self, idx: u64) -> Result<()> {
        if idx <= self.commit_idx || idx > self.last_idx() {
            return Ok(());
        }

        let on_sealed_seam =
            self.sealed.values().any(|meta| meta.last_idx == idx && !meta.committed);
        let on_head_seam = self.head.completed_last_idx() == Some(idx);
        if !on_sealed_seam && !on_head_seam {
            debug!(idx, "commit target is not a sealed chunk boundary; ignoring");
            return Ok(());
        }

        let covered: Vec<u64> = self
            .sealed
            .iter()
            .filter(|(_, meta)| !meta.committed && meta.last_idx <= idx)
            .map(|(&start_idx, _)| start_idx)
            .collect();
        for start_idx in covered {
            #[allow(clippy::expect_used)]
            let meta = self.sealed.get_mut(&start_idx).expect("start collected above");
            fs::rename(
                self.dirs.pending_path(start_idx),
                self.dirs.committed_path(start_idx, meta.last_idx),
            )?;
            meta.committed = true;
            debug!(start_idx, last_idx = meta.last_idx, "chunk committed");
        }

        if on_head_seam {
            if let Some(chunk) = self.head.take_chunk() {
                let (start_idx, last_idx) = (chunk.start_idx(), chunk.last_idx());
                drop(chunk);
                fs::rename(
                    self.dirs.pending_path(start_idx),
                    self.dirs.committed_path(start_idx, last_idx),
                )?;
                self.sealed.insert(start_idx, SealedChunk { last_idx, committed: true });
                debug!(start_idx, last_idx, "head chunk committed");
            }
        }

        self.commit_idx = idx;
        Ok(())
    }

    /// Discards every entry above `idx`.
    ///
    /// Chunks starting above `idx` are deleted; when `idx` lands strictly
    /// inside a chunk that chunk is truncated and reopened as the write
    /// head; when it lands exactly on a chunk seam the boundary chunk stays
    /// sealed and the next write opens a fresh one. Committed chunks are
    /// never modified: a target below [`commit_idx`](Self::commit_idx) (or
    /// at or above [`last_idx`](Self::last_idx)) is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a file deletion or truncation fails.
    pub fn truncate(&mut self, idx: u64) -> Result<()> {
        if idx >= self.last_idx() || idx < self.commit_idx {
            return Ok(());
        }
        debug!(idx, last_idx = self.last_idx(), "truncating ledger");

        // The head chunk either starts above the target (delete it) or
        // contains it (cut it down); it cannot end at the target, because it
        // holds last_idx and the target is strictly below that.
        let head_info =
            self.head.current().map(|chunk| (chunk.start_idx(), chunk.path().to_path_buf()));
        if let Some((start_idx, path)) = head_info {
            if start_idx > idx {
                drop(self.head.take_chunk());
                fs::remove_file(&path)?;
            } else {
                self.head.truncate_within(idx)?;
            }
        }

        // Sealed chunks wholly above the target are deleted. All of them are
        // still pending: a committed chunk above idx >= commit_idx cannot
        // exist.
        let doomed: Vec<u64> = self.sealed.range(idx + 1..).map(|(&start_idx, _)| start_idx).collect();
        for start_idx in doomed {
            #[allow(clippy::expect_used)]
            let meta = self.sealed.remove(&start_idx).expect("start collected above");
            debug_assert!(!meta.committed, "deleting a committed chunk");
            fs::remove_file(self.dirs.pending_path(start_idx))?;
        }

        // A sealed chunk holding the target strictly inside becomes the new
        // write head.
        if let Some((&start_idx, meta)) = self.sealed.range(..=idx).next_back() {
            if meta.last_idx > idx {
                debug_assert!(!meta.committed, "truncating inside a committed chunk");
                self.sealed.remove(&start_idx);
                let mut chunk =
                    ChunkFile::open(self.dirs.pending_path(start_idx), start_idx, true)?;
                chunk.truncate_at(idx)?;
                self.head.adopt_chunk(chunk);
            }
        }

        self.cache.invalidate_beyond(idx);
        self.head.set_last_idx(idx);
        Ok(())
    }

    /// Resolves the chunk holding `idx`: write head first, then the read
    /// cache, then the writable directory's sealed chunks, then the
    /// read-only directories in declaration order.
    fn resolve_chunk(&self, idx: u64) -> Option<ChunkRef<'_>> {
        if let Some(chunk) = self.head.current() {
            if chunk.contains(idx) {
                return Some(ChunkRef::Head(chunk));
            }
        }

        if let Some(chunk) = self.cache.find_covering(idx) {
            return Some(ChunkRef::Sealed(chunk));
        }

        if let Some((&start_idx, meta)) = self.sealed.range(..=idx).next_back() {
            if meta.last_idx >= idx {
                let path = if meta.committed {
                    self.dirs.committed_path(start_idx, meta.last_idx)
                } else {
                    self.dirs.pending_path(start_idx)
                };
                match self.cache.get_or_open(start_idx, &path) {
                    Ok(chunk) => return Some(ChunkRef::Sealed(chunk)),
                    Err(err) => {
                        warn!(start_idx, %err, "failed to reopen sealed chunk");
                        return None;
                    },
                }
            }
        }

        let (parsed, path) = self.dirs.find_committed_in_read_only(idx)?;
        match self.cache.get_or_open(parsed.start_idx, &path) {
            Ok(chunk) if chunk.contains(idx) => Some(ChunkRef::Sealed(chunk)),
            Ok(chunk) => {
                warn!(
                    start_idx = parsed.start_idx,
                    last_idx = chunk.last_idx(),
                    "read-only chunk holds fewer entries than its name claims"
                );
                None
            },
            Err(err) => {
                warn!(start_idx = parsed.start_idx, %err, "failed to open read-only chunk");
                None
            },
        }
    }
}

/// Whether the file at `path` holds at least one complete framed entry.
///
/// Only the fast no-entry cases answer `false`; anything unusual (an
/// unexpected header, a zero frame length) answers `true` so the strict
/// chunk open decides what is corrupt and what is recoverable.
fn holds_complete_entry(path: &std::path::Path) -> Result<bool> {
    use std::io::Read;

    let file_len = fs::metadata(path)?.len();
    let mut prefix = [0u8; FILE_HEADER_SIZE as usize + chronicle_types::FRAME_HEADER_SIZE];
    let mut file = fs::File::open(path)?;
    match file.read_exact(&mut prefix) {
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
        other => other?,
    }

    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    header.copy_from_slice(&prefix[..FILE_HEADER_SIZE as usize]);
    if u64::from_le_bytes(header) != FILE_HEADER_SIZE {
        return Ok(true);
    }

    let mut len_buf = [0u8; chronicle_types::FRAME_HEADER_SIZE];
    len_buf.copy_from_slice(&prefix[FILE_HEADER_SIZE as usize..]);
    let payload_len = u32::from_le_bytes(len_buf) as u64;
    if payload_len == 0 {
        return Ok(true);
    }
    Ok(file_len >= FILE_HEADER_SIZE + chronicle_types::FRAME_HEADER_SIZE as u64 + payload_len)
}
