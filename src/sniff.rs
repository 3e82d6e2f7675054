//! Format sniffing over a bounded input prefix.
//!
//! The engine reads at most `prefix_len` bytes of the decoded input, runs
//! every readable plugin's sniffer over that prefix, and then chains the
//! prefix back in front of the unread remainder so the chosen reader starts
//! from offset 0.  Sources are never seeked.
//!
//! Policy:
//! - zero bytes → [`SniffResult::EmptyFile`]; no sniffer runs
//! - exactly one match → [`SniffResult::Matched`]
//! - several matches → [`IoError::AmbiguousFormat`]; there is no tie-break
//! - no match → [`IoError::UnrecognizedFormat`]

use std::borrow::Cow;
use std::io;

use tracing::debug;

use crate::compression::{read_prefix, rewind, BoxedRead};
use crate::error::{IoError, Result};
use crate::options::Options;
use crate::plugin::{FormatPlugin, SniffVerdict};

/// Default number of bytes handed to sniffers.
pub const DEFAULT_SNIFF_PREFIX: usize = 64 * 1024;

/// Marker returned by `Registry::sniff` for empty inputs.
pub const EMPTY_FILE_MARKER: &str = "<emptyfile>";

// ── SniffView ────────────────────────────────────────────────────────────────

/// Read-only view of an input prefix.
#[derive(Debug, Clone, Copy)]
pub struct SniffView<'a> {
    bytes:    &'a [u8],
    text:     &'a str,
    complete: bool,
}

impl<'a> SniffView<'a> {
    /// `complete` is true when `bytes` is the entire input.
    pub fn new(bytes: &'a [u8], complete: bool) -> Self {
        // A cut may land inside a multi-byte character; keep the valid part.
        let text = match std::str::from_utf8(bytes) {
            Ok(t)  => t,
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        };
        Self { bytes, text, complete }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Longest valid UTF-8 prefix of the bytes.
    pub fn text(&self) -> Cow<'a, str> {
        Cow::Borrowed(self.text)
    }

    /// Whole lines only: a trailing line cut off by the prefix limit is
    /// dropped unless the view is complete.
    pub fn lines(&self) -> std::str::Lines<'a> {
        let body = if self.complete {
            self.text
        } else {
            match self.text.rfind('\n') {
                Some(i) => &self.text[..=i],
                None    => "",
            }
        };
        body.lines()
    }

    /// Whole lines that are not blank.
    pub fn non_blank_lines(&self) -> impl Iterator<Item = &'a str> {
        self.lines().filter(|l| !l.trim().is_empty())
    }
}

// ── Prefix capture ───────────────────────────────────────────────────────────

/// Materialised prefix plus the stream positioned back at offset 0.
pub struct Captured {
    pub prefix:   Vec<u8>,
    pub complete: bool,
    pub stream:   BoxedRead,
}

impl Captured {
    pub fn view(&self) -> SniffView<'_> {
        SniffView::new(&self.prefix, self.complete)
    }
}

/// Read up to `limit` bytes and rewind.  At least one byte is read, so an
/// empty prefix always means an empty input.
pub fn capture(mut reader: BoxedRead, limit: usize) -> io::Result<Captured> {
    let limit    = limit.max(1);
    let prefix   = read_prefix(&mut reader, limit)?;
    let complete = prefix.len() < limit;
    let stream   = rewind(prefix.clone(), reader);
    Ok(Captured { prefix, complete, stream })
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SniffResult {
    NoMatch,
    EmptyFile,
    Matched(&'static str, Options),
}

impl SniffResult {
    /// `(format name or empty marker, options)`, for the public `sniff` call.
    pub fn into_pair(self) -> Option<(String, Options)> {
        match self {
            SniffResult::NoMatch               => None,
            SniffResult::EmptyFile             => Some((EMPTY_FILE_MARKER.to_owned(), Options::new())),
            SniffResult::Matched(name, opts)   => Some((name.to_owned(), opts)),
        }
    }
}

pub struct SnifferEngine<'r> {
    plugins: Vec<&'r dyn FormatPlugin>,
}

impl<'r> SnifferEngine<'r> {
    pub fn new(plugins: impl IntoIterator<Item = &'r dyn FormatPlugin>) -> Self {
        Self { plugins: plugins.into_iter().filter(|p| p.can_read()).collect() }
    }

    /// Run one plugin's sniffer.
    pub fn sniff_one(plugin: &dyn FormatPlugin, view: &SniffView<'_>) -> SniffResult {
        if view.is_empty() {
            return SniffResult::EmptyFile;
        }
        match plugin.sniff(view) {
            SniffVerdict::Matched(opts) => SniffResult::Matched(plugin.name(), opts),
            SniffVerdict::NoMatch       => SniffResult::NoMatch,
        }
    }

    /// Identify the format of `view`.  `input` names the source in errors.
    pub fn identify(&self, input: &str, view: &SniffView<'_>) -> Result<SniffResult> {
        if view.is_empty() {
            debug!(input, "empty input, sniffers skipped");
            return Ok(SniffResult::EmptyFile);
        }

        let mut matches: Vec<(&'static str, Options)> = Vec::new();
        for plugin in &self.plugins {
            if let SniffVerdict::Matched(opts) = plugin.sniff(view) {
                debug!(input, format = plugin.name(), "sniffer matched");
                matches.push((plugin.name(), opts));
            }
        }

        match matches.len() {
            0 => Err(IoError::UnrecognizedFormat { input: input.to_owned() }),
            1 => {
                let (name, opts) = matches.remove(0);
                Ok(SniffResult::Matched(name, opts))
            }
            _ => Err(IoError::AmbiguousFormat {
                input:      input.to_owned(),
                candidates: matches.into_iter().map(|(n, _)| n.to_owned()).collect(),
            }),
        }
    }
}
