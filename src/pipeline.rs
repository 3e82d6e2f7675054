//! Streaming conversion: one reader pushed into one writer.
//!
//! [`convert`] never materialises the input.  Exactly one decoded record is
//! in flight between the reader and the writer at any time, so memory stays
//! flat regardless of input size.
//!
//! # Batches
//!
//! [`convert_many`] runs independent conversions concurrently with Rayon when
//! the `parallel` feature is enabled, and one after another otherwise.  Each
//! job has its own source and destination; results come back in job order.

use tracing::{debug, info};

use crate::error::Result;
use crate::registry::{IoWarning, ReadRequest, Registry, WriteRequest};
use crate::stream::{Destination, RecordStream, RecordWriter, Source};

/// Outcome of one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertSummary {
    pub from:         &'static str,
    pub to:           &'static str,
    pub records:      usize,
    /// Warnings raised while opening the reader.
    pub warnings:     Vec<IoWarning>,
    pub destinations: Vec<String>,
}

/// Move every record from `stream` into `writer`; returns the count moved.
///
/// Stops at the first read or write error.  The writer is left unfinished.
pub fn pipe(stream: &mut RecordStream, writer: &mut RecordWriter) -> Result<usize> {
    let mut moved = 0usize;
    for record in stream.by_ref() {
        writer.write(&record?)?;
        moved += 1;
    }
    Ok(moved)
}

/// Read `source` and write it to `destination` as `to`.
pub fn convert(
    registry:    &Registry,
    source:      impl Into<Source>,
    read:        ReadRequest,
    destination: impl Into<Destination>,
    to:          &str,
    write:       WriteRequest,
) -> Result<ConvertSummary> {
    let mut stream = registry.read(source, read)?;
    let mut writer = registry.open_writer(destination, to, write)?;
    debug!(from = stream.format(), to = writer.format(), source = stream.source(), "conversion started");

    let from     = stream.format();
    let warnings = stream.warnings().to_vec();
    pipe(&mut stream, &mut writer)?;
    stream.close();

    let summary = writer.finish()?;
    info!(from, to = summary.format, records = summary.records, "conversion finished");
    Ok(ConvertSummary {
        from,
        to:           summary.format,
        records:      summary.records,
        warnings,
        destinations: summary.destinations,
    })
}

// ── Batches ──────────────────────────────────────────────────────────────────

/// One independent conversion for [`convert_many`].
#[derive(Debug)]
pub struct ConvertJob {
    pub source:      Source,
    pub read:        ReadRequest,
    pub destination: Destination,
    pub to:          String,
    pub write:       WriteRequest,
}

impl ConvertJob {
    pub fn new(source: impl Into<Source>, destination: impl Into<Destination>, to: impl Into<String>) -> Self {
        Self {
            source:      source.into(),
            read:        ReadRequest::new(),
            destination: destination.into(),
            to:          to.into(),
            write:       WriteRequest::new(),
        }
    }

    #[must_use]
    pub fn read(mut self, request: ReadRequest) -> Self {
        self.read = request;
        self
    }

    #[must_use]
    pub fn write(mut self, request: WriteRequest) -> Self {
        self.write = request;
        self
    }

    fn run(self, registry: &Registry) -> Result<ConvertSummary> {
        convert(registry, self.source, self.read, self.destination, &self.to, self.write)
    }
}

/// Run every job; one result per job, in job order.
///
/// A failing job does not stop the others.
pub fn convert_many(registry: &Registry, jobs: Vec<ConvertJob>) -> Vec<Result<ConvertSummary>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        jobs.into_par_iter().map(|job| job.run(registry)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.into_iter().map(|job| job.run(registry)).collect()
    }
}
