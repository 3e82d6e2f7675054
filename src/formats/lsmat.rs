//! Labelled square matrix (distance matrices).
//!
//! ```text
//! <d>a<d>b<d>c
//! a<d>0.0<d>0.5<d>0.2
//! b<d>0.5<d>0.0<d>0.3
//! c<d>0.2<d>0.3<d>0.0
//! ```
//!
//! `<d>` is the `delimiter` option (tab by default).  The header starts with
//! the delimiter, and every row repeats its id in header order.  A file holds
//! exactly one matrix.

use crate::error::{IoError, Result};
use crate::options::{OptionSpec, Options};
use crate::plugin::{FormatPlugin, SniffVerdict};
use crate::record::{DistanceMatrix, Record};
use crate::sniff::SniffView;
use crate::stream::{AuxChannels, Input, Output, RecordReader, RecordSink};

use super::unsupported_record;

const NAME: &str = "lsmat";

/// Delimiters the sniffer tries, in order.
const CANDIDATES: [&str; 2] = ["\t", ","];

pub struct LsmatFormat;

impl FormatPlugin for LsmatFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Labelled square distance matrix"
    }

    fn option_specs(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::str("delimiter", "\t")]
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict {
        for delimiter in CANDIDATES {
            if looks_like(view, delimiter) {
                return SniffVerdict::Matched(Options::new().with("delimiter", delimiter));
            }
        }
        SniffVerdict::NoMatch
    }

    fn open_reader(
        &self,
        input:   Input,
        _aux:    AuxChannels<Input>,
        options: &Options,
    ) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(LsmatReader { input, delimiter: delimiter_of(options)?, done: false }))
    }

    fn open_writer(
        &self,
        output:  Output,
        _aux:    AuxChannels<Output>,
        options: &Options,
    ) -> Result<Box<dyn RecordSink>> {
        Ok(Box::new(LsmatSink { output, delimiter: delimiter_of(options)?, buf: String::new() }))
    }
}

fn delimiter_of(options: &Options) -> Result<String> {
    match options.get_str("delimiter") {
        Some(d) if !d.is_empty() => Ok(d.to_owned()),
        _ => Err(IoError::invalid_option(NAME, "delimiter", "must be a non-empty string")),
    }
}

fn looks_like(view: &SniffView<'_>, delimiter: &str) -> bool {
    let mut lines = view.non_blank_lines();
    let header: Vec<&str> = match lines.next() {
        Some(h) => h.split(delimiter).collect(),
        None    => return false,
    };
    if header.len() < 2 || !header[0].trim().is_empty() {
        return false;
    }
    match lines.next() {
        Some(row) => {
            let fields: Vec<&str> = row.split(delimiter).collect();
            fields.len() == header.len() && fields[1..].iter().all(|f| f.trim().parse::<f64>().is_ok())
        }
        // A header cut off from its rows still counts; a lone header does not.
        None => !view.is_complete(),
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

struct LsmatReader {
    input:     Input,
    delimiter: String,
    done:      bool,
}

impl LsmatReader {
    fn read_matrix(&mut self) -> Result<Option<DistanceMatrix>> {
        let header = match self.input.next_non_blank()? {
            Some(h) => h,
            None    => return Ok(None),
        };
        let at = self.input.line_number();
        let mut fields = header.split(self.delimiter.as_str());
        if fields.next().map(str::trim) != Some("") {
            return Err(IoError::format(
                NAME,
                at,
                format!("header must start with the delimiter {:?}", self.delimiter),
            ));
        }
        let ids: Vec<String> = fields.map(|f| f.trim().to_owned()).collect();

        let mut data = Vec::with_capacity(ids.len());
        for expected in &ids {
            let row = self.input.next_non_blank()?.ok_or_else(|| {
                IoError::format(NAME, self.input.line_number(), format!("expected a row for '{expected}', found end of input"))
            })?;
            let at = self.input.line_number();
            let fields: Vec<&str> = row.split(self.delimiter.as_str()).collect();
            if fields.len() != ids.len() + 1 {
                return Err(IoError::format(
                    NAME,
                    at,
                    format!("expected {} fields, found {}", ids.len() + 1, fields.len()),
                ));
            }
            if fields[0].trim() != expected {
                return Err(IoError::format(
                    NAME,
                    at,
                    format!("expected row '{expected}', found '{}'", fields[0].trim()),
                ));
            }
            let values = fields[1..]
                .iter()
                .map(|f| {
                    f.trim().parse::<f64>().map_err(|_| {
                        IoError::format(NAME, at, format!("'{}' is not a number", f.trim()))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            data.push(values);
        }

        if let Some(extra) = self.input.next_non_blank()? {
            return Err(IoError::format(
                NAME,
                self.input.line_number(),
                format!("unexpected line after the last row: {extra:?}"),
            ));
        }
        Ok(Some(DistanceMatrix::new(ids, data)))
    }
}

impl RecordReader for LsmatReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(self.read_matrix()?.map(Record::from))
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

struct LsmatSink {
    output:    Output,
    delimiter: String,
    buf:       String,
}

impl RecordSink for LsmatSink {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        let matrix = match record {
            Record::Matrix(m) => m,
            other             => return Err(unsupported_record(NAME, other)),
        };
        let n = matrix.ids.len();
        if n == 0 {
            return Err(IoError::format(NAME, 0, "matrix has no ids"));
        }
        if matrix.data.len() != n || matrix.data.iter().any(|row| row.len() != n) {
            return Err(IoError::format(NAME, 0, format!("matrix is not {n}x{n}")));
        }
        if let Some(id) = matrix.ids.iter().find(|id| id.contains(self.delimiter.as_str())) {
            return Err(IoError::format(NAME, 0, format!("id '{id}' contains the delimiter")));
        }

        self.buf.clear();
        for id in &matrix.ids {
            self.buf.push_str(&self.delimiter);
            self.buf.push_str(id);
        }
        self.buf.push('\n');
        for (id, row) in matrix.ids.iter().zip(&matrix.data) {
            self.buf.push_str(id);
            for value in row {
                self.buf.push_str(&self.delimiter);
                self.buf.push_str(&value.to_string());
            }
            self.buf.push('\n');
        }
        self.output.commit(self.buf.as_bytes())?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.output.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{CompressedWriter, Compression};
    use crate::stream::SharedBuffer;

    const TSV: &str = "\ta\tb\na\t0\t0.5\nb\t0.5\t0\n";
    const CSV: &str = ",a,b\na,0,0.5\nb,0.5,0\n";

    fn read(text: &str, delimiter: &str) -> Result<Option<DistanceMatrix>> {
        let opts = Options::new().with("delimiter", delimiter);
        let mut reader = LsmatFormat.open_reader(Input::from_bytes("mem", text), AuxChannels::empty(), &opts)?;
        let first = reader.next_record()?;
        assert!(reader.next_record()?.is_none());
        Ok(first.map(|r| match r {
            Record::Matrix(m) => m,
            other => panic!("unexpected {}", other.kind()),
        }))
    }

    #[test]
    fn reads_tab_matrix() {
        let m = read(TSV, "\t").unwrap().unwrap();
        assert_eq!(m.ids, vec!["a", "b"]);
        assert_eq!(m.get("a", "b"), Some(0.5));
    }

    #[test]
    fn wrong_delimiter_is_structural() {
        let err = read(CSV, "\t").unwrap_err();
        assert!(matches!(err, IoError::Format { format: "lsmat", line: 1, .. }));
    }

    #[test]
    fn row_errors() {
        assert!(matches!(read("\ta\tb\na\t0\t1\nc\t1\t0\n", "\t"), Err(IoError::Format { line: 3, .. })));
        assert!(matches!(read("\ta\tb\na\t0\n", "\t"), Err(IoError::Format { line: 2, .. })));
        assert!(matches!(read("\ta\na\tx\n", "\t"), Err(IoError::Format { .. })));
    }

    #[test]
    fn sniffer_prefers_tab_then_comma() {
        let v = LsmatFormat.sniff(&SniffView::new(TSV.as_bytes(), true));
        assert_eq!(v, SniffVerdict::Matched(Options::new().with("delimiter", "\t")));
        let v = LsmatFormat.sniff(&SniffView::new(CSV.as_bytes(), true));
        assert_eq!(v, SniffVerdict::Matched(Options::new().with("delimiter", ",")));
        assert_eq!(LsmatFormat.sniff(&SniffView::new(b"(a,b);", true)), SniffVerdict::NoMatch);
    }

    #[test]
    fn writes_with_delimiter() {
        let buf = SharedBuffer::new();
        let output = Output::new("buf", CompressedWriter::new(Box::new(buf.clone()), Compression::None, 0).unwrap());
        let mut sink = LsmatFormat
            .open_writer(output, AuxChannels::empty(), &Options::new().with("delimiter", ","))
            .unwrap();
        let m = DistanceMatrix::new(vec!["a".into(), "b".into()], vec![vec![0.0, 0.5], vec![0.5, 0.0]]);
        sink.write_record(&m.into()).unwrap();
        sink.finish().unwrap();
        assert_eq!(buf.to_string_lossy(), CSV);
    }

    #[test]
    fn empty_matrix_is_not_written() {
        let buf = SharedBuffer::new();
        let output = Output::new("buf", CompressedWriter::new(Box::new(buf.clone()), Compression::None, 0).unwrap());
        let opts = Options::new().with("delimiter", "\t");
        let mut sink = LsmatFormat.open_writer(output, AuxChannels::empty(), &opts).unwrap();
        let err = sink.write_record(&DistanceMatrix::new(Vec::new(), Vec::new()).into()).unwrap_err();
        assert!(matches!(err, IoError::Format { format: "lsmat", line: 0, .. }));
        sink.finish().unwrap();
        assert!(buf.contents().is_empty());
    }
}
