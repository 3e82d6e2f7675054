//! Quality-score variants: frozen offset/range table + codec.
//!
//! # Canonical value
//! A decoded quality score is a Phred value held as `u8`.  Records carry
//! canonical values only; the encoded character form exists solely on disk.
//!
//! # Variant rules
//! A variant is an `(offset, min, max)` triple.  Decoding subtracts the
//! offset and MUST fail when the result leaves `[min, max]`.  Encoding is a
//! pure function of `(value, target variant)`: the source variant never
//! influences the output, so transcoding between two variants is
//! `encode(decode(raw, a), b)`.  Values above the target maximum are clipped.
//!
//! Variants that share an offset (`sanger`, `illumina1.8`) produce identical
//! bytes for every value inside their common range.

use thiserror::Error;
use tracing::warn;

// ── Frozen variant table ─────────────────────────────────────────────────────

/// Sanger / Illumina 1.8+ ASCII offset.
pub const OFFSET_33: u8 = 33;
/// Illumina 1.3–1.7 ASCII offset.
pub const OFFSET_64: u8 = 64;

/// Highest Phred value representable in printable ASCII from offset 33.
pub const SANGER_MAX: u8 = 93;
/// Highest Phred value emitted by Illumina pipelines.
pub const ILLUMINA_MAX: u8 = 62;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityError {
    /// Decoded value outside the variant's valid range.
    #[error("Quality character {raw:?} decodes to {value} under {variant}, outside {min}..={max}")]
    InvalidRange {
        raw:     char,
        value:   i16,
        variant: &'static str,
        min:     u8,
        max:     u8,
    },
    #[error("Unknown quality variant '{0}'")]
    UnknownVariant(String),
    #[error("Unsupported Phred offset {0} (expected 33 or 64)")]
    UnsupportedOffset(i64),
}

// ── QualityVariant ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityVariant {
    Sanger,
    Illumina13,
    Illumina18,
}

impl QualityVariant {
    pub const ALL: [QualityVariant; 3] = [
        QualityVariant::Sanger,
        QualityVariant::Illumina13,
        QualityVariant::Illumina18,
    ];

    /// Names accepted by [`QualityVariant::from_name`], in table order.
    pub const NAMES: &'static [&'static str] = &["sanger", "illumina1.3", "illumina1.8"];

    #[inline]
    pub fn offset(self) -> u8 {
        match self {
            QualityVariant::Sanger     => OFFSET_33,
            QualityVariant::Illumina13 => OFFSET_64,
            QualityVariant::Illumina18 => OFFSET_33,
        }
    }

    /// Inclusive `(min, max)` canonical range.
    #[inline]
    pub fn range(self) -> (u8, u8) {
        match self {
            QualityVariant::Sanger     => (0, SANGER_MAX),
            QualityVariant::Illumina13 => (0, ILLUMINA_MAX),
            QualityVariant::Illumina18 => (0, ILLUMINA_MAX),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityVariant::Sanger     => "sanger",
            QualityVariant::Illumina13 => "illumina1.3",
            QualityVariant::Illumina18 => "illumina1.8",
        }
    }

    pub fn from_name(s: &str) -> Result<Self, QualityError> {
        match s.to_lowercase().as_str() {
            "sanger"      => Ok(QualityVariant::Sanger),
            "illumina1.3" => Ok(QualityVariant::Illumina13),
            "illumina1.8" => Ok(QualityVariant::Illumina18),
            _             => Err(QualityError::UnknownVariant(s.to_owned())),
        }
    }

    /// Widest variant for a bare `phred_offset`.
    pub fn from_offset(offset: i64) -> Result<Self, QualityError> {
        match offset {
            33 => Ok(QualityVariant::Sanger),
            64 => Ok(QualityVariant::Illumina13),
            _  => Err(QualityError::UnsupportedOffset(offset)),
        }
    }

    /// Decode one quality character to its canonical Phred value.
    pub fn decode(self, raw: u8) -> Result<u8, QualityError> {
        let value = raw as i16 - self.offset() as i16;
        let (min, max) = self.range();
        if value < min as i16 || value > max as i16 {
            return Err(QualityError::InvalidRange {
                raw: raw as char,
                value,
                variant: self.name(),
                min,
                max,
            });
        }
        Ok(value as u8)
    }

    /// Encode a canonical Phred value, clipping to the variant maximum.
    #[inline]
    pub fn encode(self, value: u8) -> u8 {
        let (_, max) = self.range();
        value.min(max) + self.offset()
    }

    pub fn decode_all(self, raw: &[u8]) -> Result<Vec<u8>, QualityError> {
        raw.iter().map(|&b| self.decode(b)).collect()
    }

    /// Encode a slice, logging once when any value had to be clipped.
    pub fn encode_all(self, values: &[u8]) -> Vec<u8> {
        let (_, max) = self.range();
        if let Some(&over) = values.iter().find(|&&v| v > max) {
            warn!(variant = self.name(), value = over, max, "quality scores clipped to variant maximum");
        }
        values.iter().map(|&v| self.encode(v)).collect()
    }
}

/// Guess the variant of raw quality bytes for sniffer recommendations.
///
/// Any byte below 64 rules out offset 64.  A sample made only of bytes at or
/// above 64 fits both offsets and yields `None`.
pub fn guess_variant(raw: &[u8]) -> Option<QualityVariant> {
    let min = *raw.iter().min()?;
    if min < OFFSET_64 && QualityVariant::Sanger.decode_all(raw).is_ok() {
        Some(QualityVariant::Sanger)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn phred_40_under_both_offsets() {
        assert_eq!(QualityVariant::Illumina13.encode(40), b'h');
        assert_eq!(QualityVariant::Illumina13.decode(b'h').unwrap(), 40);
        assert_eq!(QualityVariant::Sanger.encode(40), b'I');
        assert_eq!(QualityVariant::Illumina18.encode(40), 73);
    }

    #[test]
    fn decode_rejects_out_of_range() {
        // '!' is Q0 under offset 33 but -31 under offset 64.
        let err = QualityVariant::Illumina13.decode(b'!').unwrap_err();
        assert!(matches!(err, QualityError::InvalidRange { value: -31, .. }));
        // '~' is Q93: fine for sanger, too high for illumina1.8.
        assert_eq!(QualityVariant::Sanger.decode(b'~').unwrap(), 93);
        assert!(QualityVariant::Illumina18.decode(b'~').is_err());
    }

    #[test]
    fn encode_clips_to_variant_max() {
        assert_eq!(QualityVariant::Illumina18.encode(80), 33 + 62);
        assert_eq!(QualityVariant::Sanger.encode(93), b'~');
    }

    #[test]
    fn names_and_offsets_resolve() {
        for v in QualityVariant::ALL {
            assert_eq!(QualityVariant::from_name(v.name()).unwrap(), v);
        }
        assert_eq!(QualityVariant::from_name("ILLUMINA1.3").unwrap(), QualityVariant::Illumina13);
        assert_eq!(QualityVariant::from_offset(64).unwrap(), QualityVariant::Illumina13);
        assert!(QualityVariant::from_offset(59).is_err());
        assert!(QualityVariant::from_name("solexa").is_err());
    }

    #[test]
    fn guess_prefers_offset_33_when_low_bytes_seen() {
        assert_eq!(guess_variant(b"II#5"), Some(QualityVariant::Sanger));
        assert_eq!(guess_variant(b"hhhB"), None);
        assert_eq!(guess_variant(b""), None);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(v in 0u8..=62, i in 0usize..3) {
            let variant = QualityVariant::ALL[i];
            prop_assert_eq!(variant.decode(variant.encode(v)).unwrap(), v);
        }

        #[test]
        fn transcoding_is_independent_of_source(v in 0u8..=62, a in 0usize..3, b in 0usize..3) {
            let (va, vb) = (QualityVariant::ALL[a], QualityVariant::ALL[b]);
            let canonical = va.decode(va.encode(v)).unwrap();
            prop_assert_eq!(vb.encode(canonical), vb.encode(v));
            prop_assert_eq!(vb.decode(vb.encode(canonical)).unwrap(), v);
        }

        #[test]
        fn shared_offset_is_byte_identical(values in proptest::collection::vec(0u8..=62, 0..64)) {
            prop_assert_eq!(
                QualityVariant::Sanger.encode_all(&values),
                QualityVariant::Illumina18.encode_all(&values)
            );
        }
    }
}
