//! Object-style entry points over the procedural registry API.
//!
//! ```no_run
//! use bioreg::facade::IoObject;
//! use bioreg::formats::default_registry;
//! use bioreg::record::DistanceMatrix;
//! use bioreg::registry::{ReadRequest, WriteRequest};
//!
//! let registry = default_registry();
//! let dm = DistanceMatrix::read_from(&registry, "dm.tsv", ReadRequest::new())?;
//! dm.write_to(&registry, "dm.csv", "lsmat", WriteRequest::new().option("delimiter", ","))?;
//! # Ok::<(), bioreg::error::IoError>(())
//! ```

use crate::error::{IoError, Result};
use crate::record::{DistanceMatrix, Record, SequenceRecord, TreeRecord};
use crate::registry::{ReadRequest, Registry, WriteRequest};
use crate::stream::{Destination, RecordStream, Source, WriteSummary};

pub trait IoObject: Sized {
    fn read_from(registry: &Registry, source: impl Into<Source>, request: ReadRequest) -> Result<Self>;

    fn write_to(
        &self,
        registry:    &Registry,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<WriteSummary>;
}

/// First record of `stream`, which must exist.
fn first(stream: &mut RecordStream, wanted: &str) -> Result<Record> {
    match stream.next() {
        Some(record) => record,
        None => Err(IoError::format(stream.format(), 0, format!("input holds no {wanted}"))),
    }
}

fn wrong_kind(format: &'static str, wanted: &str, found: &Record) -> IoError {
    IoError::format(format, 0, format!("expected a {wanted}, found a {}", found.kind()))
}

impl IoObject for DistanceMatrix {
    fn read_from(registry: &Registry, source: impl Into<Source>, request: ReadRequest) -> Result<Self> {
        let mut stream = registry.read(source, request)?;
        match first(&mut stream, "distance matrix")? {
            Record::Matrix(m) => Ok(m),
            other             => Err(wrong_kind(stream.format(), "distance matrix", &other)),
        }
    }

    fn write_to(
        &self,
        registry:    &Registry,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<WriteSummary> {
        registry.write([Record::Matrix(self.clone())], destination, format, request)
    }
}

impl IoObject for TreeRecord {
    fn read_from(registry: &Registry, source: impl Into<Source>, request: ReadRequest) -> Result<Self> {
        let mut stream = registry.read(source, request)?;
        match first(&mut stream, "tree")? {
            Record::Tree(t) => Ok(t),
            other           => Err(wrong_kind(stream.format(), "tree", &other)),
        }
    }

    fn write_to(
        &self,
        registry:    &Registry,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<WriteSummary> {
        registry.write([Record::Tree(self.clone())], destination, format, request)
    }
}

impl IoObject for Vec<SequenceRecord> {
    fn read_from(registry: &Registry, source: impl Into<Source>, request: ReadRequest) -> Result<Self> {
        let stream = registry.read(source, request)?;
        let format = stream.format();
        stream
            .map(|record| match record? {
                Record::Sequence(s) => Ok(s),
                other               => Err(wrong_kind(format, "sequence", &other)),
            })
            .collect()
    }

    fn write_to(
        &self,
        registry:    &Registry,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<WriteSummary> {
        registry.write(self.iter().cloned(), destination, format, request)
    }
}
