//! chronicle-ledger: the durable, append-only ledger of a replicated
//! state-machine node.
//!
//! Entries are opaque byte strings with strictly increasing indices stored
//! as length-framed records in chunk files. Committable entries mark legal
//! chunk boundaries; `commit` renames covered chunks to their immutable
//! committed form, and `truncate` discards an uncommitted suffix. Historical
//! ranges stay cheaply re-readable through a bounded LRU of read handles,
//! with completions of batched reads posted onto the host transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Ledger API                   │
//! │ (write_entry, read_entry, commit, truncate) │
//! └───────┬─────────────────┬───────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌─────────┐
//! │  Write head   │ │  Read cache   │ │Directory│
//! │ (one Writing  │ │ (LRU-bounded  │ │   set   │
//! │    chunk)     │ │ read handles) │ │         │
//! └───────┬───────┘ └───────┬───────┘ └────┬────┘
//!         │                 │              │
//! ┌───────▼─────────────────▼──────────────▼────┐
//! │                 Chunk files                  │
//! │   (8-byte header, back-to-back u32-framed    │
//! │    entries, offset table rebuilt on open)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use chronicle_ledger::{Ledger, RingBufferSink};
//! use chronicle_types::LedgerConfig;
//!
//! let config = LedgerConfig::builder()
//!     .writable_dir("/var/lib/node/ledger")
//!     .chunk_threshold(5 * 1024 * 1024)
//!     .build()?;
//! let mut ledger = Ledger::open(&config, RingBufferSink::new(256))?;
//!
//! let idx = ledger.write_entry(b"entry bytes", true, false)?;
//! ledger.commit(ledger.last_idx())?;
//! assert_eq!(ledger.read_entry(idx).as_deref(), Some(b"entry bytes".as_slice()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod read_cache;
pub mod transport;
pub mod write_head;

// Re-export commonly used types
pub use chunk::{ChunkFile, FILE_HEADER_SIZE};
pub use directory::{
    COMMITTED_SUFFIX, DirectorySet, FILE_PREFIX, committed_file_name, is_committed_file_name,
    pending_file_name,
};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use read_cache::{CacheStats, ReadCache};
pub use transport::{CompletionSink, MemorySink, ReadResponse, RingBufferSink};
