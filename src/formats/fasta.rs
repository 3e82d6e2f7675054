//! FASTA, with an optional QUAL companion on the `qual` channel.
//!
//! ```text
//! >seq1 optional description
//! ACGTACGT
//! ACGT
//! ```
//!
//! Sequence lines are joined; blank lines are ignored.  A QUAL file has the
//! same layout with whitespace-separated integer Phred scores as its body.
//! When a `qual` input is given, its records pair up with the FASTA records
//! in order and must agree on id and length.
//!
//! Options:
//! - `max_width` (Int, 0): wrap sequence lines (and QUAL score lines) on
//!   write; 0 writes one line per record.
//! - `id_whitespace_replacement` (Str, `_`), `description_newline_replacement`
//!   (Str, space): header cleanup on write.
//! - `lowercase` (Bool, false): lower-case sequences on read and write.

use crate::error::{IoError, Result};
use crate::options::{OptionSpec, Options};
use crate::plugin::{FormatPlugin, SniffVerdict};
use crate::record::{Record, SequenceRecord};
use crate::sniff::SniffView;
use crate::stream::{AuxChannels, Input, Output, RecordReader, RecordSink};

use super::{expect_sequence, join_header, push_wrapped, split_header};

const NAME: &str = "fasta";
const QUAL: &str = "qual";

/// Records inspected by the sniffer.
const SNIFF_RECORDS: usize = 10;

pub struct FastaFormat;

impl FormatPlugin for FastaFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "FASTA sequences, optionally paired with QUAL scores"
    }

    fn option_specs(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::int("max_width", 0),
            OptionSpec::str("id_whitespace_replacement", "_"),
            OptionSpec::str("description_newline_replacement", " "),
            OptionSpec::bool("lowercase", false),
        ]
    }

    fn aux_channels(&self) -> &'static [&'static str] {
        &[QUAL]
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict {
        let mut lines = view.non_blank_lines();
        match lines.next() {
            Some(first) if first.starts_with('>') => {}
            _ => return SniffVerdict::NoMatch,
        }

        let mut headers = 1usize;
        let mut body_lines = 0usize;
        let mut numeric_lines = 0usize;
        for line in lines {
            if line.starts_with('>') {
                headers += 1;
                if headers > SNIFF_RECORDS {
                    break;
                }
                continue;
            }
            body_lines += 1;
            if is_numeric_body(line) {
                numeric_lines += 1;
            }
        }

        // A body made only of integers is a QUAL file, not FASTA.
        if body_lines > 0 && numeric_lines == body_lines {
            return SniffVerdict::NoMatch;
        }
        SniffVerdict::Matched(Options::new())
    }

    fn open_reader(
        &self,
        input:   Input,
        mut aux: AuxChannels<Input>,
        options: &Options,
    ) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(FastaReader {
            input,
            qual:      aux.take(QUAL),
            lowercase: options.get_bool("lowercase").unwrap_or(false),
        }))
    }

    fn open_writer(
        &self,
        output:  Output,
        mut aux: AuxChannels<Output>,
        options: &Options,
    ) -> Result<Box<dyn RecordSink>> {
        let width = options.get_int("max_width").unwrap_or(0);
        if width < 0 {
            return Err(IoError::invalid_option(NAME, "max_width", "must not be negative"));
        }
        Ok(Box::new(FastaSink {
            output,
            qual:      aux.take(QUAL),
            width:     width as usize,
            id_ws:     options.get_str("id_whitespace_replacement").unwrap_or("_").to_owned(),
            desc_nl:   options.get_str("description_newline_replacement").unwrap_or(" ").to_owned(),
            lowercase: options.get_bool("lowercase").unwrap_or(false),
            buf:       Vec::new(),
            qbuf:      Vec::new(),
        }))
    }
}

fn is_numeric_body(line: &str) -> bool {
    line.split_whitespace().all(|t| t.bytes().all(|b| b.is_ascii_digit() || b == b'-'))
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Header body plus raw body lines of one `>`-delimited entry.
struct Entry {
    id:          String,
    description: String,
    line:        usize,
    body:        Vec<String>,
}

/// Read the next `>` entry, leaving the following header unread.
fn next_entry(input: &mut Input, format: &'static str) -> Result<Option<Entry>> {
    let header = match input.next_non_blank()? {
        Some(h) => h,
        None    => return Ok(None),
    };
    let line = input.line_number();
    let body = header.strip_prefix('>').ok_or_else(|| {
        IoError::format(format, line, format!("expected a '>' header, found {header:?}"))
    })?;
    let (id, description) = split_header(body);

    let mut lines = Vec::new();
    while let Some(next) = input.next_line()? {
        if next.starts_with('>') {
            input.unread(next);
            break;
        }
        if !next.trim().is_empty() {
            lines.push(next);
        }
    }
    if lines.is_empty() {
        return Err(IoError::format(format, line, format!("record '{id}' has no data")));
    }
    Ok(Some(Entry { id, description, line, body: lines }))
}

fn parse_scores(entry: &Entry) -> Result<Vec<u8>> {
    let mut scores = Vec::new();
    for token in entry.body.iter().flat_map(|l| l.split_whitespace()) {
        let score: u8 = token.parse().map_err(|_| {
            IoError::format(QUAL, entry.line, format!("'{token}' is not a quality score in record '{}'", entry.id))
        })?;
        scores.push(score);
    }
    Ok(scores)
}

struct FastaReader {
    input:     Input,
    qual:      Option<Input>,
    lowercase: bool,
}

impl RecordReader for FastaReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let entry = match next_entry(&mut self.input, NAME)? {
            Some(e) => e,
            None => {
                if let Some(qual) = self.qual.as_mut() {
                    if let Some(extra) = next_entry(qual, QUAL)? {
                        return Err(IoError::format(
                            QUAL,
                            extra.line,
                            format!("quality record '{}' has no matching sequence", extra.id),
                        ));
                    }
                }
                return Ok(None);
            }
        };

        let mut sequence: Vec<u8> = entry.body.iter().flat_map(|l| l.trim().bytes()).collect();
        if self.lowercase {
            sequence.make_ascii_lowercase();
        }
        let mut record = SequenceRecord::new(entry.id.clone(), sequence).with_description(entry.description.clone());

        if let Some(qual) = self.qual.as_mut() {
            let q = next_entry(qual, QUAL)?.ok_or_else(|| {
                IoError::format(QUAL, qual.line_number(), format!("missing quality scores for '{}'", entry.id))
            })?;
            if q.id != entry.id {
                return Err(IoError::format(
                    QUAL,
                    q.line,
                    format!("expected scores for '{}', found '{}'", entry.id, q.id),
                ));
            }
            let scores = parse_scores(&q)?;
            if scores.len() != record.len() {
                return Err(IoError::format(
                    QUAL,
                    q.line,
                    format!("'{}' has {} bases but {} quality scores", entry.id, record.len(), scores.len()),
                ));
            }
            record = record.with_quality(scores);
        }
        Ok(Some(record.into()))
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

struct FastaSink {
    output:    Output,
    qual:      Option<Output>,
    width:     usize,
    id_ws:     String,
    desc_nl:   String,
    lowercase: bool,
    buf:       Vec<u8>,
    qbuf:      Vec<u8>,
}

impl FastaSink {
    fn render_quality(&mut self, header: &str, record: &SequenceRecord) -> Result<()> {
        let scores = record.quality.as_deref().ok_or_else(|| {
            IoError::format(QUAL, 0, format!("record '{}' has no quality scores to write", record.id))
        })?;
        self.qbuf.clear();
        self.qbuf.push(b'>');
        self.qbuf.extend_from_slice(header.as_bytes());
        self.qbuf.push(b'\n');
        let per_line = if self.width == 0 { scores.len().max(1) } else { self.width };
        for chunk in scores.chunks(per_line) {
            let line = chunk.iter().map(u8::to_string).collect::<Vec<_>>().join(" ");
            self.qbuf.extend_from_slice(line.as_bytes());
            self.qbuf.push(b'\n');
        }
        if scores.is_empty() {
            self.qbuf.push(b'\n');
        }
        Ok(())
    }
}

impl RecordSink for FastaSink {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        let record = expect_sequence(NAME, record)?;
        let header = join_header(record, &self.id_ws, &self.desc_nl);

        if self.qual.is_some() {
            self.render_quality(&header, record)?;
        }

        self.buf.clear();
        self.buf.push(b'>');
        self.buf.extend_from_slice(header.as_bytes());
        self.buf.push(b'\n');
        if self.lowercase {
            push_wrapped(&mut self.buf, &record.sequence.to_ascii_lowercase(), self.width);
        } else {
            push_wrapped(&mut self.buf, &record.sequence, self.width);
        }

        self.output.commit(&self.buf)?;
        if let Some(qual) = self.qual.as_mut() {
            qual.commit(&self.qbuf)?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.output.finish()?;
        if let Some(qual) = this.qual {
            qual.finish()?;
        }
        Ok(())
    }
}
