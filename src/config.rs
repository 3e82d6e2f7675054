//! Registry-wide configuration.
//!
//! ```no_run
//! use bioreg::config::IoConfig;
//! use bioreg::compression::Compression;
//!
//! let config = IoConfig::default()
//!     .sniff_prefix_len(16 * 1024)
//!     .write_compression(Compression::Zstd);
//! # let _ = config;
//! ```
//!
//! The same structure loads from JSON; every field is optional:
//!
//! ```json
//! {
//!   "sniff_prefix_len": 65536,
//!   "verify": true,
//!   "write_compression": "zstd",
//!   "compression_level": 3,
//!   "format_defaults": { "fasta": { "max_width": 60 } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compression::{Compression, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{IoError, Result};
use crate::options::Options;
use crate::sniff::DEFAULT_SNIFF_PREFIX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Bytes of decoded input handed to sniffers.
    pub sniff_prefix_len:  usize,
    /// Default for `ReadRequest::verify` when the caller leaves it unset.
    pub verify:            bool,
    /// Output compression when a write request does not choose one.
    pub write_compression: Compression,
    /// zstd level (gzip and brotli clamp it to 0–9 and 0–11).
    pub compression_level: i32,
    /// Site-wide option defaults per format, layered above plugin defaults
    /// and below sniffer recommendations.
    pub format_defaults:   HashMap<String, Options>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            sniff_prefix_len:  DEFAULT_SNIFF_PREFIX,
            verify:            true,
            write_compression: Compression::None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            format_defaults:   HashMap::new(),
        }
    }
}

impl IoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: IoConfig = serde_json::from_str(text).map_err(|e| IoError::Config(e.to_string()))?;
        config.format_defaults = config.format_defaults
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        config.check()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    #[must_use]
    pub fn sniff_prefix_len(mut self, len: usize) -> Self {
        self.sniff_prefix_len = len;
        self
    }

    #[must_use]
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn write_compression(mut self, compression: Compression) -> Self {
        self.write_compression = compression;
        self
    }

    #[must_use]
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    #[must_use]
    pub fn format_default(mut self, format: &str, option: &str, value: impl Into<crate::options::OptionValue>) -> Self {
        self.format_defaults
            .entry(format.to_lowercase())
            .or_default()
            .insert(option, value);
        self
    }

    /// Configured defaults for `format`, if any.
    pub fn defaults_for(&self, format: &str) -> Option<&Options> {
        self.format_defaults.get(&format.to_lowercase())
    }

    fn check(&self) -> Result<()> {
        if self.sniff_prefix_len == 0 {
            return Err(IoError::Config("sniff_prefix_len must be positive".into()));
        }
        Ok(())
    }
}
