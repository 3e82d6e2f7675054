//! Illumina QSeq (read only).
//!
//! One read per line, eleven tab-separated fields:
//!
//! ```text
//! machine  run  lane  tile  x  y  index  read  sequence  quality  filter
//! ```
//!
//! The record id is `machine_run:lane:tile:x:y#index/read`.  A `.` in the
//! sequence is an uncalled base and reads back as `N`.  With `filter` set,
//! reads whose filter field is `0` are skipped.

use crate::error::{IoError, Result};
use crate::options::{OptionSpec, Options};
use crate::plugin::{FormatPlugin, SniffVerdict};
use crate::quality::{guess_variant, QualityVariant};
use crate::record::{Record, SequenceRecord};
use crate::sniff::SniffView;
use crate::stream::{AuxChannels, Input, RecordReader};

const NAME: &str = "qseq";
const FIELDS: usize = 11;
const SNIFF_LINES: usize = 10;

pub struct QseqFormat;

impl FormatPlugin for QseqFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Illumina QSeq reads (read only)"
    }

    fn option_specs(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::choice("variant", QualityVariant::NAMES, "illumina1.3"),
            OptionSpec::bool("filter", true),
        ]
    }

    fn can_write(&self) -> bool {
        false
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict {
        let mut seen = 0usize;
        let mut quality = Vec::new();
        for line in view.non_blank_lines().take(SNIFF_LINES) {
            match split_fields(line) {
                Some(fields) if plausible(&fields) => quality.extend_from_slice(fields[9].as_bytes()),
                _ => return SniffVerdict::NoMatch,
            }
            seen += 1;
        }
        if seen == 0 {
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
        Ok(Box::new(QseqReader {
            input,
            variant: QualityVariant::from_name(options.get_str("variant").unwrap_or("illumina1.3"))?,
            filter:  options.get_bool("filter").unwrap_or(true),
        }))
    }
}

fn split_fields(line: &str) -> Option<Vec<&str>> {
    let fields: Vec<&str> = line.split('\t').collect();
    (fields.len() == FIELDS).then_some(fields)
}

fn plausible(fields: &[&str]) -> bool {
    let numeric = fields[2..6].iter().all(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit() || b == b'-'));
    let sequence = fields[8];
    let bases = !sequence.is_empty() && sequence.bytes().all(|b| b.is_ascii_alphabetic() || b == b'.');
    numeric && bases && fields[9].len() == sequence.len() && matches!(fields[10], "0" | "1")
}

struct QseqReader {
    input:   Input,
    variant: QualityVariant,
    filter:  bool,
}

impl QseqReader {
    fn parse(&self, line: &str) -> Result<Option<SequenceRecord>> {
        let at = self.input.line_number();
        let fields = split_fields(line).ok_or_else(|| {
            IoError::format(NAME, at, format!("expected {FIELDS} tab-separated fields, found {}", line.split('\t').count()))
        })?;
        let passed = match fields[10] {
            "1" => true,
            "0" => false,
            other => return Err(IoError::format(NAME, at, format!("filter field must be 0 or 1, found {other:?}"))),
        };
        if self.filter && !passed {
            return Ok(None);
        }

        let sequence: Vec<u8> = fields[8].bytes().map(|b| if b == b'.' { b'N' } else { b }).collect();
        if fields[9].len() != sequence.len() {
            return Err(IoError::format(
                NAME,
                at,
                format!("{} bases but {} quality characters", sequence.len(), fields[9].len()),
            ));
        }
        let quality = self.variant.decode_all(fields[9].as_bytes())?;
        let id = format!(
            "{}_{}:{}:{}:{}:{}#{}/{}",
            fields[0], fields[1], fields[2], fields[3], fields[4], fields[5], fields[6], fields[7]
        );
        Ok(Some(SequenceRecord::new(id, sequence).with_quality(quality)))
    }
}

impl RecordReader for QseqReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        while let Some(line) = self.input.next_non_blank()? {
            if let Some(record) = self.parse(&line)? {
                return Ok(Some(record.into()));
            }
        }
        Ok(None)
    }
}
