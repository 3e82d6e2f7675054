//! Built-in format plugins and the stock registry.
//!
//! | name     | read | write | aux    |
//! |----------|------|-------|--------|
//! | `fasta`  | yes  | yes   | `qual` |
//! | `fastq`  | yes  | yes   |        |
//! | `qseq`   | yes  | no    |        |
//! | `newick` | yes  | yes   |        |
//! | `lsmat`  | yes  | yes   |        |

pub mod fasta;
pub mod fastq;
pub mod lsmat;
pub mod newick;
pub mod qseq;

use crate::config::IoConfig;
use crate::error::{IoError, Result};
use crate::record::{Record, SequenceRecord};
use crate::registry::Registry;

pub use fasta::FastaFormat;
pub use fastq::FastqFormat;
pub use lsmat::LsmatFormat;
pub use newick::NewickFormat;
pub use qseq::QseqFormat;

/// Registry holding every built-in plugin with the default configuration.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    // The default configuration has no format defaults to reject.
    let _ = install(&mut registry);
    registry
}

/// Registry holding every built-in plugin under `config`.
///
/// Fails with [`IoError::Config`] when `config.format_defaults` names an
/// option a built-in format does not declare, or gives it the wrong kind.
pub fn default_registry_with(config: IoConfig) -> Result<Registry> {
    let mut registry = Registry::with_config(config);
    install(&mut registry)?;
    Ok(registry)
}

/// Add the built-in plugins to `registry`.  Names already taken are skipped.
pub fn install(registry: &mut Registry) -> Result<()> {
    skip_taken(registry.register(FastaFormat))?;
    skip_taken(registry.register(FastqFormat))?;
    skip_taken(registry.register(QseqFormat))?;
    skip_taken(registry.register(NewickFormat))?;
    skip_taken(registry.register(LsmatFormat))
}

fn skip_taken(registered: Result<()>) -> Result<()> {
    match registered {
        Err(IoError::DuplicateFormat(_)) => Ok(()),
        other                            => other,
    }
}

// ── Shared helpers ───────────────────────────────────────────────────────────

/// Split a header body (marker already removed) into id and description.
pub(crate) fn split_header(body: &str) -> (String, String) {
    let body = body.trim_start();
    match body.find(char::is_whitespace) {
        Some(i) => (body[..i].to_owned(), body[i..].trim().to_owned()),
        None    => (body.to_owned(), String::new()),
    }
}

/// Header body for writing: whitespace in the id and newlines in the
/// description are replaced so the header stays one `id description` line.
pub(crate) fn join_header(record: &SequenceRecord, id_ws: &str, desc_nl: &str) -> String {
    let id: String = record.id.split(char::is_whitespace).collect::<Vec<_>>().join(id_ws);
    let description = record.description.replace("\r\n", "\n").replace('\n', desc_nl);
    if description.is_empty() {
        id
    } else {
        format!("{id} {description}")
    }
}

/// Borrow the sequence inside `record` or fail for formats that only hold sequences.
pub(crate) fn expect_sequence<'r>(format: &'static str, record: &'r Record) -> Result<&'r SequenceRecord> {
    record.as_sequence().ok_or_else(|| unsupported_record(format, record))
}

/// Error for a record variant `format` cannot serialise.
pub(crate) fn unsupported_record(format: &'static str, record: &Record) -> IoError {
    let operation = match record {
        Record::Sequence(_) => "writing sequences",
        Record::Tree(_)     => "writing trees",
        Record::Matrix(_)   => "writing distance matrices",
    };
    IoError::Unsupported { format: format.to_owned(), operation }
}

/// Append `data` to `out`, one line per `width` bytes (`0` = single line).
pub(crate) fn push_wrapped(out: &mut Vec<u8>, data: &[u8], width: usize) {
    if width == 0 || data.is_empty() {
        out.extend_from_slice(data);
        out.push(b'\n');
        return;
    }
    for chunk in data.chunks(width) {
        out.extend_from_slice(chunk);
        out.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_registry_lists_formats() {
        let r = default_registry();
        assert_eq!(r.list_read_formats(), vec!["fasta", "fastq", "qseq", "newick", "lsmat"]);
        assert_eq!(r.list_write_formats(), vec!["fasta", "fastq", "newick", "lsmat"]);
    }

    #[test]
    fn header_split_and_join() {
        assert_eq!(split_header("seq1  a b "), ("seq1".into(), "a b".into()));
        assert_eq!(split_header("seq1"), ("seq1".into(), String::new()));

        let rec = SequenceRecord::new("my seq", "AC").with_description("line1\nline2");
        assert_eq!(join_header(&rec, "_", " "), "my_seq line1 line2");
    }

    #[test]
    fn wrapping() {
        let mut out = Vec::new();
        push_wrapped(&mut out, b"ACGTACG", 3);
        assert_eq!(out, b"ACG\nTAC\nG\n");
        out.clear();
        push_wrapped(&mut out, b"ACGT", 0);
        assert_eq!(out, b"ACGT\n");
    }

    #[test]
    fn tree_into_sequence_format_is_unsupported() {
        let rec: Record = crate::record::TreeRecord::new("(a);").into();
        assert!(matches!(expect_sequence("fasta", &rec), Err(IoError::Unsupported { .. })));
    }
}
