//! Transparent stream (de)compression around format plugins.
//!
//! Plugins only ever see plain text.  On input, `gzip` members (including
//! BGZF blocks), `zstd` and `lz4` frames are detected by their magic bytes and decoded before the sniffer runs;
//! `brotli` streams carry no magic and must be named explicitly.  On output
//! the caller (or [`crate::config::IoConfig`]) picks the codec.
//!
//! Magic detection reads at most [`MAGIC_LEN`] bytes and chains them back in
//! front of the stream, so no seek is ever required.

use std::fmt;
use std::io::{self, BufWriter, Cursor, Read, Write};

use serde::{Deserialize, Serialize};

/// gzip member magic (RFC 1952 §2.3.1).
pub const GZIP_MAGIC:      [u8; 2] = [0x1F, 0x8B];
/// zstd frame magic (RFC 8878 §3.1.1), little-endian 0xFD2FB528.
pub const ZSTD_MAGIC:      [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
/// LZ4 frame magic, little-endian 0x184D2204.
pub const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];
pub const MAGIC_LEN:       usize   = 4;

/// Default zstd level for compressed outputs.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

const BROTLI_BUFFER: usize = 4096;
const BROTLI_LGWIN:  u32   = 22;

pub type BoxedRead  = Box<dyn Read + Send>;
pub type BoxedWrite = Box<dyn Write + Send>;

// ── Compression ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
    Lz4,
    Brotli,
}

impl Compression {
    pub fn name(self) -> &'static str {
        match self {
            Compression::None   => "none",
            Compression::Gzip   => "gzip",
            Compression::Zstd   => "zstd",
            Compression::Lz4    => "lz4",
            Compression::Brotli => "brotli",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"   => Some(Compression::None),
            "gzip" | "gz" => Some(Compression::Gzip),
            "zstd"   => Some(Compression::Zstd),
            "lz4"    => Some(Compression::Lz4),
            "brotli" => Some(Compression::Brotli),
            _        => None,
        }
    }

    /// Identify a compressed stream from its first bytes.
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else if prefix.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else if prefix.starts_with(&LZ4_FRAME_MAGIC) {
            Compression::Lz4
        } else {
            Compression::None
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Input side ───────────────────────────────────────────────────────────────

/// Read up to `limit` bytes, stopping early only at EOF.
pub fn read_prefix<R: Read + ?Sized>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    reader.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Put `prefix` back in front of `rest`.
pub fn rewind(prefix: Vec<u8>, rest: BoxedRead) -> BoxedRead {
    Box::new(Cursor::new(prefix).chain(rest))
}

/// Wrap `reader` in the decoder for `compression`; `None` auto-detects.
///
/// Returns the decoded stream and the compression that was applied.
pub fn decompress(mut reader: BoxedRead, compression: Option<Compression>) -> io::Result<(BoxedRead, Compression)> {
    let compression = match compression {
        Some(c) => c,
        None => {
            let magic = read_prefix(&mut reader, MAGIC_LEN)?;
            let detected = Compression::detect(&magic);
            reader = rewind(magic, reader);
            detected
        }
    };
    let decoded: BoxedRead = match compression {
        Compression::None   => reader,
        Compression::Gzip   => Box::new(flate2::read::MultiGzDecoder::new(reader)),
        Compression::Zstd   => Box::new(zstd::stream::read::Decoder::new(reader)?),
        Compression::Lz4    => Box::new(lz4_flex::frame::FrameDecoder::new(reader)),
        Compression::Brotli => Box::new(brotli::Decompressor::new(reader, BROTLI_BUFFER)),
    };
    Ok((decoded, compression))
}

// ── Output side ──────────────────────────────────────────────────────────────

/// Buffered, optionally compressed output stream.
///
/// Must be closed with [`CompressedWriter::finish`]; dropping it loses the
/// final compression frame.
pub enum CompressedWriter {
    Plain(BufWriter<BoxedWrite>),
    Gzip(flate2::write::GzEncoder<BufWriter<BoxedWrite>>),
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<BoxedWrite>>),
    Lz4(lz4_flex::frame::FrameEncoder<BufWriter<BoxedWrite>>),
    Brotli(brotli::CompressorWriter<BufWriter<BoxedWrite>>),
}

impl CompressedWriter {
    pub fn new(inner: BoxedWrite, compression: Compression, level: i32) -> io::Result<Self> {
        let buffered = BufWriter::new(inner);
        Ok(match compression {
            Compression::None => CompressedWriter::Plain(buffered),
            Compression::Gzip => {
                let level = flate2::Compression::new(level.clamp(0, 9) as u32);
                CompressedWriter::Gzip(flate2::write::GzEncoder::new(buffered, level))
            }
            Compression::Zstd => CompressedWriter::Zstd(zstd::stream::write::Encoder::new(buffered, level)?),
            Compression::Lz4  => CompressedWriter::Lz4(lz4_flex::frame::FrameEncoder::new(buffered)),
            Compression::Brotli => {
                let quality = level.clamp(0, 11) as u32;
                CompressedWriter::Brotli(brotli::CompressorWriter::new(buffered, BROTLI_BUFFER, quality, BROTLI_LGWIN))
            }
        })
    }

    /// Write the trailing frame (if any) and flush everything.
    pub fn finish(self) -> io::Result<()> {
        let mut inner = match self {
            CompressedWriter::Plain(w)  => w,
            CompressedWriter::Gzip(e)   => e.finish()?,
            CompressedWriter::Zstd(e)   => e.finish()?,
            CompressedWriter::Lz4(e)    => e.finish().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            CompressedWriter::Brotli(w) => w.into_inner(),
        };
        inner.flush()
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(w)  => w.write(buf),
            CompressedWriter::Gzip(w)   => w.write(buf),
            CompressedWriter::Zstd(w)   => w.write(buf),
            CompressedWriter::Lz4(w)    => w.write(buf),
            CompressedWriter::Brotli(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(w)  => w.flush(),
            CompressedWriter::Gzip(w)   => w.flush(),
            CompressedWriter::Zstd(w)   => w.flush(),
            CompressedWriter::Lz4(w)    => w.flush(),
            CompressedWriter::Brotli(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SharedBuffer;

    fn compress(data: &[u8], c: Compression) -> Vec<u8> {
        let sink = SharedBuffer::new();
        let mut w = CompressedWriter::new(Box::new(sink.clone()), c, DEFAULT_COMPRESSION_LEVEL).unwrap();
        w.write_all(data).unwrap();
        w.finish().unwrap();
        sink.contents()
    }

    #[test]
    fn detected_codecs_roundtrip() {
        let text = b">seq1\nACGTACGT\n".repeat(50);
        for c in [Compression::None, Compression::Gzip, Compression::Zstd, Compression::Lz4] {
            let packed = compress(&text, c);
            assert_eq!(Compression::detect(&packed), c);
            let (mut r, applied) = decompress(Box::new(Cursor::new(packed)), None).unwrap();
            assert_eq!(applied, c);
            let mut out = Vec::new();
            r.read_to_end(&mut out).unwrap();
            assert_eq!(out, text);
        }
    }

    #[test]
    fn concatenated_gzip_members_decode_fully() {
        let mut packed = compress(b"@r1\nACGT\n+\nIIII\n", Compression::Gzip);
        packed.extend(compress(b"@r2\nGG\n+\nII\n", Compression::Gzip));
        let (mut r, applied) = decompress(Box::new(Cursor::new(packed)), None).unwrap();
        assert_eq!(applied, Compression::Gzip);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"@r1\nACGT\n+\nIIII\n@r2\nGG\n+\nII\n");
    }

    #[test]
    fn brotli_needs_explicit_selection() {
        let text = b"(a,b);\n".repeat(20);
        let packed = compress(&text, Compression::Brotli);
        let (mut r, _) = decompress(Box::new(Cursor::new(packed)), Some(Compression::Brotli)).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn short_inputs_survive_detection() {
        let (mut r, c) = decompress(Box::new(Cursor::new(b"(".to_vec())), None).unwrap();
        assert_eq!(c, Compression::None);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"(");
    }
}
