//! Error taxonomy for registry dispatch, sniffing and format plugins.
//!
//! Every failure surfaces as a typed [`IoError`].  Non-fatal conditions
//! (an overridden sniffer recommendation, a format that does not look like
//! what the caller asked for) are [`crate::registry::IoWarning`] values and
//! never travel through this type.

use std::io;
use thiserror::Error;

use crate::quality::QualityError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    /// No registered sniffer claimed a non-empty input.
    #[error("Could not determine the format of {input}")]
    UnrecognizedFormat { input: String },

    /// More than one sniffer claimed the input.  No tie-break is attempted.
    #[error("Ambiguous format for {input}: matched by {}", candidates.join(", "))]
    AmbiguousFormat { input: String, candidates: Vec<String> },

    /// The input has zero bytes, so there is nothing to sniff.
    #[error("{input} is empty")]
    EmptyFile { input: String },

    #[error("Unknown format '{0}'")]
    UnknownFormat(String),

    #[error("Format '{0}' is already registered")]
    DuplicateFormat(String),

    #[error("Format '{format}' does not support {operation}")]
    Unsupported { format: String, operation: &'static str },

    #[error("Option '{option}' is not accepted by format '{format}'")]
    UnknownOption { format: String, option: String },

    #[error("Invalid value for option '{option}' of format '{format}': {msg}")]
    InvalidOption { format: String, option: String, msg: String },

    #[error("Format '{format}' has no auxiliary channel '{channel}'")]
    UnknownChannel { format: String, channel: String },

    /// Structural error reported by a format plugin.  `line` is 1-based and
    /// `0` when the plugin cannot attribute the error to a line.
    #[error("Invalid {format} input at line {line}: {msg}")]
    Format { format: &'static str, line: usize, msg: String },

    /// Quality decoding produced a value outside the variant's range.
    #[error(transparent)]
    Quality(#[from] QualityError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IoError {
    /// Build a structural error for `format` at `line`.
    pub fn format(format: &'static str, line: usize, msg: impl Into<String>) -> Self {
        IoError::Format { format, line, msg: msg.into() }
    }

    /// Shorthand for a type or choice mismatch on an option.
    pub(crate) fn invalid_option(format: &str, option: &str, msg: impl Into<String>) -> Self {
        IoError::InvalidOption {
            format: format.to_owned(),
            option: option.to_owned(),
            msg:    msg.into(),
        }
    }
}
