//! Single-stream filter registry: magic-byte detection + streaming decoders.
//!
//! # Identity rules
//! A filter is identified by the leading bytes of the stream it wraps, never
//! by the archive's file extension.  Extensions only select the URL scheme.
//!
//! Every decoder here is a pull-based [`Read`] adapter over the compressed
//! stream, so a session can hand out a member's bytes without ever holding
//! more than one decoder window in memory.
//!
//! Filters that are recognised but not decodable in this build (lzip,
//! compress) fail hard with [`FilterError::Unsupported`] rather than
//! falling through to container detection on compressed garbage.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Longest magic sequence inspected by [`FilterId::detect`].
pub const FILTER_MAGIC_LEN: usize = 13;

// ── Magic numbers ─────────────────────────────────────────────────────────────

const MAGIC_GZIP:     &[u8] = &[0x1f, 0x8b];
const MAGIC_ZSTD:     &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const MAGIC_LZ4:      &[u8] = &[0x04, 0x22, 0x4d, 0x18];
const MAGIC_BZIP2:    &[u8] = b"BZh";
const MAGIC_XZ:       &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const MAGIC_LZIP:     &[u8] = b"LZIP";
const MAGIC_COMPRESS: &[u8] = &[0x1f, 0x9d];

/// lc=3, lp=0, pb=2: the properties byte nearly every `.lzma` encoder writes.
const LZMA_DEFAULT_PROPS: u8 = 0x5d;

// ── FilterId enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterId {
    None,
    Gzip,
    Zstd,
    Lz4,
    Lzma,
    Bzip2,
    Xz,
    Lzip,
    Compress,
}

impl FilterId {
    /// Human-readable name (for diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            FilterId::None     => "none",
            FilterId::Gzip     => "gzip",
            FilterId::Zstd     => "zstd",
            FilterId::Lz4      => "lz4",
            FilterId::Lzma     => "lzma",
            FilterId::Bzip2    => "bzip2",
            FilterId::Xz       => "xz",
            FilterId::Lzip     => "lzip",
            FilterId::Compress => "compress",
        }
    }

    /// Whether this build can decode the filter.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            FilterId::None
                | FilterId::Gzip
                | FilterId::Zstd
                | FilterId::Lz4
                | FilterId::Lzma
                | FilterId::Bzip2
                | FilterId::Xz
        )
    }

    /// Identify the filter wrapping a stream from its first bytes.
    ///
    /// `head` should hold at least [`FILTER_MAGIC_LEN`] bytes when the stream
    /// is that long; shorter heads simply match fewer filters.
    pub fn detect(head: &[u8]) -> FilterId {
        if head.starts_with(MAGIC_GZIP) {
            FilterId::Gzip
        } else if head.starts_with(MAGIC_ZSTD) {
            FilterId::Zstd
        } else if head.starts_with(MAGIC_LZ4) {
            FilterId::Lz4
        } else if head.starts_with(MAGIC_XZ) {
            FilterId::Xz
        } else if head.starts_with(MAGIC_BZIP2) && head.get(3).is_some_and(|b| (b'1'..=b'9').contains(b)) {
            FilterId::Bzip2
        } else if head.starts_with(MAGIC_LZIP) {
            FilterId::Lzip
        } else if head.starts_with(MAGIC_COMPRESS) {
            FilterId::Compress
        } else if looks_like_lzma_alone(head) {
            FilterId::Lzma
        } else {
            FilterId::None
        }
    }

    /// Wrap `inner` in this filter's streaming decoder.
    pub fn decoder<'a, R: Read + 'a>(self, inner: R) -> Result<Box<dyn Read + 'a>, FilterError> {
        match self {
            FilterId::None  => Ok(Box::new(inner)),
            FilterId::Gzip  => Ok(Box::new(flate2::read::MultiGzDecoder::new(inner))),
            FilterId::Zstd  => Ok(Box::new(zstd::stream::read::Decoder::new(inner)?)),
            FilterId::Lz4   => Ok(Box::new(lz4_flex::frame::FrameDecoder::new(inner))),
            FilterId::Lzma  => Ok(Box::new(LzmaReader::new(inner))),
            FilterId::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(inner))),
            FilterId::Xz    => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(inner))),
            other           => Err(FilterError::Unsupported(other.name())),
        }
    }
}

/// The `.lzma` ("LZMA alone") header has no magic: 1 properties byte, a
/// 4-byte LE dictionary size and an 8-byte LE uncompressed size that is
/// either all-ones (unknown) or a plausible length.
fn looks_like_lzma_alone(head: &[u8]) -> bool {
    if head.len() < FILTER_MAGIC_LEN || head[0] != LZMA_DEFAULT_PROPS {
        return false;
    }
    let dict = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);
    let size = &head[5..13];
    let size_known = size[5..].iter().all(|&b| b == 0);
    let size_unknown = size.iter().all(|&b| b == 0xff);
    dict >= 4096 && (size_known || size_unknown)
}

// ── Error type ────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum FilterError {
    /// The stream is wrapped in a filter this build cannot decode.
    #[error("Unsupported filter: {0}")]
    Unsupported(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── LZMA pull adapter ─────────────────────────────────────────────────────────

const LZMA_INPUT_CHUNK: usize = 8 * 1024;

/// Pull-based reader over `lzma-rs`'s push-based stream decoder.
///
/// Compressed input is fed in `LZMA_INPUT_CHUNK` pieces; whatever the decoder
/// emits is parked in `out` until the caller drains it.
pub struct LzmaReader<R> {
    inner:  R,
    stream: Option<lzma_rs::decompress::Stream<Vec<u8>>>,
    out:    Vec<u8>,
    pos:    usize,
    input:  Box<[u8]>,
}

impl<R: Read> LzmaReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            stream: Some(lzma_rs::decompress::Stream::new(Vec::new())),
            out:    Vec::new(),
            pos:    0,
            input:  vec![0u8; LZMA_INPUT_CHUNK].into_boxed_slice(),
        }
    }
}

impl<R: Read> Read for LzmaReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.out.len() {
                let n = buf.len().min(self.out.len() - self.pos);
                buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            self.out.clear();
            self.pos = 0;

            let Some(stream) = self.stream.as_mut() else {
                return Ok(0);
            };

            let n = self.inner.read(&mut self.input)?;
            if n == 0 {
                if let Some(stream) = self.stream.take() {
                    self.out = stream
                        .finish()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                }
                continue;
            }

            stream.write_all(&self.input[..n])?;
            if let Some(produced) = stream.get_output_mut() {
                std::mem::swap(&mut self.out, produced);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_magics() {
        assert_eq!(FilterId::detect(&[0x1f, 0x8b, 0x08, 0x00]), FilterId::Gzip);
        assert_eq!(FilterId::detect(&[0x28, 0xb5, 0x2f, 0xfd, 0x00]), FilterId::Zstd);
        assert_eq!(FilterId::detect(&[0x04, 0x22, 0x4d, 0x18, 0x64]), FilterId::Lz4);
        assert_eq!(FilterId::detect(b"BZh91AY&SY"), FilterId::Bzip2);
        assert_eq!(FilterId::detect(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]), FilterId::Xz);
        assert_eq!(FilterId::detect(b"LZIP\x01"), FilterId::Lzip);
        assert_eq!(FilterId::detect(&[0x1f, 0x9d, 0x90]), FilterId::Compress);
        assert_eq!(FilterId::detect(b"hello.txt\0\0\0\0\0"), FilterId::None);
        assert_eq!(FilterId::detect(b"BZhx"), FilterId::None);
        assert_eq!(FilterId::detect(&[]), FilterId::None);
    }

    #[test]
    fn unsupported_filters_refuse_to_decode() {
        for id in [FilterId::Lzip, FilterId::Compress] {
            assert!(!id.is_supported());
            match id.decoder(&b""[..]) {
                Err(FilterError::Unsupported(name)) => assert_eq!(name, id.name()),
                _ => panic!("{} should be unsupported", id.name()),
            }
        }
    }

    #[test]
    fn lzma_alone_detection_and_decode() {
        let data: Vec<u8> = (0u32..50_000).map(|i| (i % 251) as u8).collect();
        let mut packed = Vec::new();
        lzma_rs::lzma_compress(&mut std::io::Cursor::new(&data), &mut packed).unwrap();
        assert_eq!(FilterId::detect(&packed[..FILTER_MAGIC_LEN]), FilterId::Lzma);

        let mut out = Vec::new();
        FilterId::Lzma.decoder(&packed[..]).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn lzma_reader_serves_small_reads() {
        let data = b"small reads through the lzma adapter".repeat(100);
        let mut packed = Vec::new();
        lzma_rs::lzma_compress(&mut std::io::Cursor::new(&data), &mut packed).unwrap();

        let mut reader = LzmaReader::new(&packed[..]);
        let mut out    = Vec::new();
        let mut chunk  = [0u8; 7];
        loop {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 { break; }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn bzip2_and_xz_decoders() {
        let data = b"tar blocks behind a second-generation filter".repeat(50);

        let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        bz.write_all(&data).unwrap();
        let bz = bz.finish().unwrap();

        let mut xz = xz2::write::XzEncoder::new(Vec::new(), 6);
        xz.write_all(&data).unwrap();
        let xz = xz.finish().unwrap();

        for (id, packed) in [(FilterId::Bzip2, bz), (FilterId::Xz, xz)] {
            assert_eq!(FilterId::detect(&packed), id);
            assert!(id.is_supported());
            let mut out = Vec::new();
            id.decoder(&packed[..]).unwrap().read_to_end(&mut out).unwrap();
            assert_eq!(out, data, "{}", id.name());
        }
    }

    #[test]
    fn gzip_decoder_roundtrip() {
        use flate2::{write::GzEncoder, Compression};
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"gzip payload").unwrap();
        let packed = enc.finish().unwrap();

        assert_eq!(FilterId::detect(&packed), FilterId::Gzip);
        let mut out = String::new();
        FilterId::Gzip.decoder(&packed[..]).unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "gzip payload");
    }
}
