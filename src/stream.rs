//! Streaming reader/writer protocol.
//!
//! # Reader
//! A plugin turns an [`Input`] into a [`RecordReader`].  Each call to
//! `next_record` decodes exactly one record.  The registry wraps the reader
//! in a [`RecordStream`], an ordinary `Iterator<Item = Result<Record>>` that
//! owns the input (and any auxiliary inputs) until it is exhausted, fails,
//! is closed, or is dropped, whichever comes first.  A stream that yielded
//! an error yields nothing afterwards; records already handed out stay valid.
//!
//! # Writer
//! A plugin turns an [`Output`] into a [`RecordSink`].  Sinks serialise one
//! record into a scratch buffer and hand it to [`Output::commit`] in a single
//! `write_all`, so a record that fails to serialise never reaches the
//! destination.  [`RecordWriter`] owns the sink and finishes it exactly once.
//!
//! Neither side buffers more than the record in flight plus whatever
//! look-ahead the format grammar needs (one line for FASTA headers).

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::compression::{BoxedRead, BoxedWrite, CompressedWriter};
use crate::error::Result;
use crate::options::Options;
use crate::record::Record;
use crate::registry::IoWarning;

// ── Sources and destinations ─────────────────────────────────────────────────

/// Where records are read from.
pub enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// Any reader; `name` is used in diagnostics only.
    Reader { name: String, reader: BoxedRead },
}

impl Source {
    pub fn reader(name: impl Into<String>, reader: impl io::Read + Send + 'static) -> Self {
        Source::Reader { name: name.into(), reader: Box::new(reader) }
    }

    /// Human-readable identifier for errors and logs.
    pub fn describe(&self) -> String {
        match self {
            Source::Path(p)            => p.display().to_string(),
            Source::Bytes(_)           => "<bytes>".to_owned(),
            Source::Reader { name, .. } => name.clone(),
        }
    }

    pub(crate) fn open(self) -> io::Result<BoxedRead> {
        Ok(match self {
            Source::Path(p)              => Box::new(File::open(p)?),
            Source::Bytes(b)             => Box::new(Cursor::new(b)),
            Source::Reader { reader, .. } => reader,
        })
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({})", self.describe())
    }
}

impl From<PathBuf> for Source { fn from(p: PathBuf) -> Self { Source::Path(p) } }
impl From<&Path>   for Source { fn from(p: &Path)   -> Self { Source::Path(p.to_owned()) } }
impl From<&str>    for Source { fn from(p: &str)    -> Self { Source::Path(PathBuf::from(p)) } }
impl From<Vec<u8>> for Source { fn from(b: Vec<u8>) -> Self { Source::Bytes(b) } }
impl From<&[u8]>   for Source { fn from(b: &[u8])   -> Self { Source::Bytes(b.to_vec()) } }

/// In-memory destination that stays readable after the writer is gone.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "shared buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where records are written to.
pub enum Destination {
    Path(PathBuf),
    Buffer(SharedBuffer),
    Writer { name: String, writer: BoxedWrite },
}

impl Destination {
    pub fn writer(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Destination::Writer { name: name.into(), writer: Box::new(writer) }
    }

    pub fn describe(&self) -> String {
        match self {
            Destination::Path(p)            => p.display().to_string(),
            Destination::Buffer(_)          => "<buffer>".to_owned(),
            Destination::Writer { name, .. } => name.clone(),
        }
    }

    pub(crate) fn open(self) -> io::Result<BoxedWrite> {
        Ok(match self {
            Destination::Path(p)              => Box::new(File::create(p)?),
            Destination::Buffer(b)            => Box::new(b),
            Destination::Writer { writer, .. } => writer,
        })
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Destination({})", self.describe())
    }
}

impl From<PathBuf>      for Destination { fn from(p: PathBuf)      -> Self { Destination::Path(p) } }
impl From<&Path>        for Destination { fn from(p: &Path)        -> Self { Destination::Path(p.to_owned()) } }
impl From<&str>         for Destination { fn from(p: &str)         -> Self { Destination::Path(PathBuf::from(p)) } }
impl From<SharedBuffer> for Destination { fn from(b: SharedBuffer) -> Self { Destination::Buffer(b) } }

// ── Plugin-facing handles ────────────────────────────────────────────────────

/// Line-oriented view of a (decompressed) input stream.
pub struct Input {
    name:   String,
    reader: BufReader<BoxedRead>,
    line:   usize,
    peeked: Option<String>,
    buf:    String,
}

impl Input {
    pub fn new(name: impl Into<String>, reader: BoxedRead) -> Self {
        Self {
            name:   name.into(),
            reader: BufReader::new(reader),
            line:   0,
            peeked: None,
            buf:    String::new(),
        }
    }

    /// Convenience for tests and in-memory callers.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, Box::new(Cursor::new(bytes.into())))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based number of the line most recently returned.
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Next line without its terminator, or `None` at EOF.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.peeked.take() {
            self.line += 1;
            return Ok(Some(line));
        }
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        let trimmed = self.buf.trim_end_matches(&['\n', '\r'][..]);
        Ok(Some(trimmed.to_owned()))
    }

    /// Hand a line back; the next `next_line` returns it again.
    pub fn unread(&mut self, line: String) {
        debug_assert!(self.peeked.is_none(), "only one line of look-ahead");
        self.line = self.line.saturating_sub(1);
        self.peeked = Some(line);
    }

    /// Next line that is not blank.
    pub fn next_non_blank(&mut self) -> io::Result<Option<String>> {
        while let Some(line) = self.next_line()? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

/// Buffered, optionally compressed output stream handed to a sink.
pub struct Output {
    name:   String,
    writer: CompressedWriter,
}

impl Output {
    pub fn new(name: impl Into<String>, writer: CompressedWriter) -> Self {
        Self { name: name.into(), writer }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one fully serialised record.
    pub fn commit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    pub fn finish(self) -> io::Result<()> {
        self.writer.finish()
    }
}

/// Named auxiliary streams (`qual` for FASTA) handed to a plugin.
pub struct AuxChannels<T> {
    entries: Vec<(String, T)>,
}

impl<T> AuxChannels<T> {
    pub fn new(entries: Vec<(String, T)>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Remove and return the channel called `name`.
    pub fn take(&mut self, name: &str) -> Option<T> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

// ── Protocol traits ──────────────────────────────────────────────────────────

/// Pull side: decode one record per call, `None` once the input is exhausted.
pub trait RecordReader: Send {
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Push side: accept one record per call, flush everything on `finish`.
pub trait RecordSink: Send {
    fn write_record(&mut self, record: &Record) -> Result<()>;
    fn finish(self: Box<Self>) -> Result<()>;
}

// ── RecordStream ─────────────────────────────────────────────────────────────

/// Lazy, forward-only sequence of records returned by `Registry::read`.
pub struct RecordStream {
    format:   &'static str,
    source:   String,
    options:  Options,
    warnings: Vec<IoWarning>,
    reader:   Option<Box<dyn RecordReader>>,
    yielded:  usize,
}

impl RecordStream {
    pub fn new(
        format:   &'static str,
        source:   String,
        options:  Options,
        warnings: Vec<IoWarning>,
        reader:   Box<dyn RecordReader>,
    ) -> Self {
        debug!(format, source = %source, "record stream opened");
        Self { format, source, options, warnings, reader: Some(reader), yielded: 0 }
    }

    pub fn format(&self) -> &'static str {
        self.format
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Options the reader was opened with, after resolution.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Non-fatal notifications raised while opening the stream.
    pub fn warnings(&self) -> &[IoWarning] {
        &self.warnings
    }

    /// Records handed out so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Release the underlying input.  Idempotent.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(format = self.format, source = %self.source, records = self.yielded, "record stream closed");
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        match reader.next_record() {
            Ok(Some(record)) => {
                self.yielded += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("format", &self.format)
            .field("source", &self.source)
            .field("yielded", &self.yielded)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── RecordWriter ─────────────────────────────────────────────────────────────

/// Outcome of a finished write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub format:       &'static str,
    pub records:      usize,
    /// Primary destination first, then auxiliary channels.
    pub destinations: Vec<String>,
}

/// Incremental writer returned by `Registry::open_writer`.
///
/// Dropping an unfinished writer finishes it on a best-effort basis; call
/// [`RecordWriter::finish`] to observe errors.
pub struct RecordWriter {
    format:       &'static str,
    destinations: Vec<String>,
    sink:         Option<Box<dyn RecordSink>>,
    written:      usize,
}

impl RecordWriter {
    pub fn new(format: &'static str, destinations: Vec<String>, sink: Box<dyn RecordSink>) -> Self {
        debug!(format, destinations = ?destinations, "record writer opened");
        Self { format, destinations, sink: Some(sink), written: 0 }
    }

    pub fn format(&self) -> &'static str {
        self.format
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        let sink = self.sink.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "record writer already finished")
        })?;
        sink.write_record(record)?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<WriteSummary> {
        self.finish_inner()?;
        Ok(WriteSummary {
            format:       self.format,
            records:      self.written,
            destinations: std::mem::take(&mut self.destinations),
        })
    }

    fn finish_inner(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(sink) => {
                sink.finish()?;
                debug!(format = self.format, records = self.written, "record writer finished");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordWriter")
            .field("format", &self.format)
            .field("destinations", &self.destinations)
            .field("written", &self.written)
            .finish()
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish_inner() {
            warn!(format = self.format, error = %e, "failed to finish dropped record writer");
        }
    }
}
