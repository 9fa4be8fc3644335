//! chronicle-types: shared types for the chronicle ledger.
//!
//! This crate holds the pieces that both the storage engine and any host
//! binary need to agree on:
//!
//! - [`config`] - validated construction parameters for a ledger instance
//! - [`frame`] - the length-prefixed entry framing used on disk and on the
//!   wire of batched reads

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod frame;

pub use config::{ConfigError, DEFAULT_READ_CACHE_BOUND, LedgerConfig};
pub use frame::{FRAME_HEADER_SIZE, FrameError, decode_frame, encode_frame_into, framed_len};
