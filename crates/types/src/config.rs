//! Ledger construction parameters.
//!
//! Configuration is loaded from TOML files or built programmatically; all
//! values are validated at construction time via the fallible builder.
//! Post-deserialization validation is available via [`LedgerConfig::validate`].

// The schemars `JsonSchema` derive macro internally uses `.unwrap()` in its
// expansions. Allow it at module level since config types are declarative
// structs with minimal procedural code.
#![allow(clippy::disallowed_methods)]

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Default number of sealed-chunk read handles kept open by the read cache.
pub const DEFAULT_READ_CACHE_BOUND: usize = 5;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Construction parameters for a ledger instance.
///
/// # Validation Rules
///
/// - `chunk_threshold` must be strictly positive
/// - `read_cache_bound` must be >= 1
///
/// # Example
///
/// ```no_run
/// # use chronicle_types::LedgerConfig;
/// let config = LedgerConfig::builder()
///     .writable_dir("/var/lib/node/ledger")
///     .chunk_threshold(5 * 1024 * 1024)
///     .build()
///     .expect("valid ledger config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerConfig {
    /// Directory receiving new chunk files. Created if absent. The ledger
    /// assumes exclusive write access to it.
    pub writable_dir: PathBuf,
    /// Byte size above which a committable write seals the current chunk.
    ///
    /// Must be strictly positive.
    pub chunk_threshold: u64,
    /// Maximum number of sealed chunks kept open for read at once.
    ///
    /// Bounds only read-side handles; the write head is not counted.
    #[serde(default = "default_read_cache_bound")]
    pub read_cache_bound: usize,
    /// Directories consulted, in order, for committed chunks not present in
    /// the writable directory. Never written to.
    #[serde(default)]
    pub read_only_dirs: Vec<PathBuf>,
}

#[bon::bon]
impl LedgerConfig {
    /// Creates a new ledger configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if:
    /// - `chunk_threshold` is 0
    /// - `read_cache_bound` is 0
    #[builder]
    pub fn new(
        #[builder(into)] writable_dir: PathBuf,
        chunk_threshold: u64,
        #[builder(default = default_read_cache_bound())] read_cache_bound: usize,
        #[builder(default)] read_only_dirs: Vec<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let config = Self { writable_dir, chunk_threshold, read_cache_bound, read_only_dirs };
        config.validate()?;
        Ok(config)
    }
}

impl LedgerConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_threshold == 0 {
            return Err(ConfigError::Validation {
                message: "chunk_threshold must be strictly positive".to_string(),
            });
        }
        if self.read_cache_bound == 0 {
            return Err(ConfigError::Validation {
                message: "read_cache_bound must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

fn default_read_cache_bound() -> usize {
    DEFAULT_READ_CACHE_BOUND
}
