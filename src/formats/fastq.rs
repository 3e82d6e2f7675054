//! FASTQ.
//!
//! ```text
//! @read1 optional description
//! ACGTACGT
//! +
//! IIIIHHHH
//! ```
//!
//! Sequence and quality may wrap over several lines.  Sequence lines run up
//! to the `+` separator; quality lines are then consumed until they cover the
//! sequence length, so a quality line starting with `@` is not mistaken for
//! the next header.  The separator may repeat the header.
//!
//! Qualities are decoded under `variant` unless `phred_offset` is non-zero,
//! in which case the offset picks the variant.

use crate::error::{IoError, Result};
use crate::options::{OptionSpec, Options};
use crate::plugin::{FormatPlugin, SniffVerdict};
use crate::quality::{guess_variant, QualityVariant};
use crate::record::{Record, SequenceRecord};
use crate::sniff::SniffView;
use crate::stream::{AuxChannels, Input, Output, RecordReader, RecordSink};

use super::{expect_sequence, join_header, split_header};

const NAME: &str = "fastq";

/// Records the sniffer parses before deciding.
const SNIFF_RECORDS: usize = 10;

pub struct FastqFormat;

impl FormatPlugin for FastqFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "FASTQ reads with Sanger or Illumina quality encodings"
    }

    fn option_specs(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::choice("variant", QualityVariant::NAMES, "sanger"),
            OptionSpec::int("phred_offset", 0),
            OptionSpec::str("id_whitespace_replacement", "_"),
            OptionSpec::str("description_newline_replacement", " "),
        ]
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict {
        let mut text = String::new();
        for line in view.lines() {
            text.push_str(line);
            text.push('\n');
        }
        let mut input = Input::from_bytes("sniff", text);

        let mut parsed = 0usize;
        let mut quality = Vec::new();
        while parsed < SNIFF_RECORDS {
            match parse_raw(&mut input) {
                Ok(Some(raw)) => {
                    quality.extend_from_slice(&raw.quality);
                    parsed += 1;
                }
                Ok(None) => break,
                // A record cut off by the prefix limit does not count against the input.
                Err(_) if !view.is_complete() && parsed > 0 => break,
                Err(_) => return SniffVerdict::NoMatch,
            }
        }
        if parsed == 0 {
            return SniffVerdict::NoMatch;
        }

        match guess_variant(&quality) {
            Some(v) => SniffVerdict::Matched(Options::new().with("variant", v.name())),
            None    => SniffVerdict::Matched(Options::new()),
        }
    }

    fn open_reader(
        &self,
        input:   Input,
        _aux:    AuxChannels<Input>,
        options: &Options,
    ) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(FastqReader { input, variant: variant_of(options)? }))
    }

    fn open_writer(
        &self,
        output:  Output,
        _aux:    AuxChannels<Output>,
        options: &Options,
    ) -> Result<Box<dyn RecordSink>> {
        Ok(Box::new(FastqSink {
            output,
            variant: variant_of(options)?,
            id_ws:   options.get_str("id_whitespace_replacement").unwrap_or("_").to_owned(),
            desc_nl: options.get_str("description_newline_replacement").unwrap_or(" ").to_owned(),
            buf:     Vec::new(),
        }))
    }
}

fn variant_of(options: &Options) -> Result<QualityVariant> {
    match options.get_int("phred_offset").unwrap_or(0) {
        0 => Ok(QualityVariant::from_name(options.get_str("variant").unwrap_or("sanger"))?),
        offset => QualityVariant::from_offset(offset)
            .map_err(|e| IoError::invalid_option(NAME, "phred_offset", e.to_string())),
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// One record with its quality still encoded.
struct RawRecord {
    header:   String,
    sequence: Vec<u8>,
    quality:  Vec<u8>,
}

fn parse_raw(input: &mut Input) -> Result<Option<RawRecord>> {
    let header = match input.next_non_blank()? {
        Some(h) => h,
        None    => return Ok(None),
    };
    let line = input.line_number();
    let header = header
        .strip_prefix('@')
        .ok_or_else(|| IoError::format(NAME, line, format!("expected an '@' header, found {header:?}")))?
        .to_owned();

    let mut sequence = Vec::new();
    loop {
        let next = input.next_line()?.ok_or_else(|| {
            IoError::format(NAME, input.line_number(), "input ends before the '+' separator")
        })?;
        if let Some(repeat) = next.strip_prefix('+') {
            let repeat = repeat.trim();
            if !repeat.is_empty() && repeat != header.trim() && repeat != split_header(&header).0 {
                return Err(IoError::format(
                    NAME,
                    input.line_number(),
                    format!("separator repeats {repeat:?}, header is {header:?}"),
                ));
            }
            break;
        }
        if next.starts_with('@') && sequence.is_empty() {
            return Err(IoError::format(NAME, input.line_number(), "record has no '+' separator"));
        }
        sequence.extend(next.trim().bytes());
    }

    let mut quality = Vec::with_capacity(sequence.len());
    while quality.len() < sequence.len() {
        let next = input.next_line()?.ok_or_else(|| {
            IoError::format(NAME, input.line_number(), "input ends inside the quality lines")
        })?;
        quality.extend(next.trim().bytes());
    }
    if quality.len() != sequence.len() {
        return Err(IoError::format(
            NAME,
            input.line_number(),
            format!("{} bases but {} quality characters", sequence.len(), quality.len()),
        ));
    }
    Ok(Some(RawRecord { header, sequence, quality }))
}

struct FastqReader {
    input:   Input,
    variant: QualityVariant,
}

impl RecordReader for FastqReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let raw = match parse_raw(&mut self.input)? {
            Some(r) => r,
            None    => return Ok(None),
        };
        let quality = self.variant.decode_all(&raw.quality)?;
        let (id, description) = split_header(&raw.header);
        Ok(Some(
            SequenceRecord::new(id, raw.sequence)
                .with_description(description)
                .with_quality(quality)
                .into(),
        ))
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

struct FastqSink {
    output:  Output,
    variant: QualityVariant,
    id_ws:   String,
    desc_nl: String,
    buf:     Vec<u8>,
}

impl RecordSink for FastqSink {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        let record = expect_sequence(NAME, record)?;
        let quality = record.quality.as_deref().ok_or_else(|| {
            IoError::format(NAME, 0, format!("record '{}' has no quality scores", record.id))
        })?;
        if quality.len() != record.len() {
            return Err(IoError::format(
                NAME,
                0,
                format!("record '{}' has {} bases but {} quality scores", record.id, record.len(), quality.len()),
            ));
        }

        self.buf.clear();
        self.buf.push(b'@');
        self.buf.extend_from_slice(join_header(record, &self.id_ws, &self.desc_nl).as_bytes());
        self.buf.push(b'\n');
        self.buf.extend_from_slice(&record.sequence);
        self.buf.extend_from_slice(b"\n+\n");
        self.buf.extend_from_slice(&self.variant.encode_all(quality));
        self.buf.push(b'\n');
        self.output.commit(&self.buf)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.output.finish()?;
        Ok(())
    }
}
