//! Forward-only entry walkers for archive containers.
//!
//! A walker reads entry headers from a decompressed byte stream one at a
//! time.  After [`EntryWalker::next_entry`] returns an entry, the stream is
//! positioned on that entry's first data byte; the caller may either read
//! the data itself (and stop walking) or call `next_entry` again, in which
//! case the walker discards the unread data and padding first.
//!
//! The walkers never seek.  They work the same over a plain file and over
//! the output of a decompressor.

mod ar;
mod tar;

use std::io::{self, Read};

pub use self::ar::ArWalker;
pub use self::tar::TarWalker;

/// Bytes of stream head needed to recognise any supported container.
pub const CONTAINER_MAGIC_LEN: usize = 512;

/// One entry header as seen by a walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Raw pathname bytes, exactly as stored (not normalised).
    pub pathname: Vec<u8>,
    /// Uncompressed data length.
    pub size:     u64,
}

impl EntryInfo {
    pub fn pathname_lossy(&self) -> String {
        String::from_utf8_lossy(&self.pathname).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Tar,
    Ar,
}

impl ContainerKind {
    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::Tar => "tar",
            ContainerKind::Ar  => "ar",
        }
    }

    /// Identify a container from the first bytes of its (decompressed) stream.
    pub fn detect(head: &[u8]) -> Option<ContainerKind> {
        if ar::is_ar(head) {
            Some(ContainerKind::Ar)
        } else if tar::is_tar(head) {
            Some(ContainerKind::Tar)
        } else {
            None
        }
    }
}

/// Header walker over any supported container.
#[derive(Debug)]
pub enum EntryWalker {
    Tar(TarWalker),
    Ar(ArWalker),
}

impl EntryWalker {
    pub fn new(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::Tar => EntryWalker::Tar(TarWalker::default()),
            ContainerKind::Ar  => EntryWalker::Ar(ArWalker::default()),
        }
    }

    /// Advance to the next entry header.  `Ok(None)` marks the end of the
    /// archive.
    pub fn next_entry<R: Read>(&mut self, src: &mut R) -> io::Result<Option<EntryInfo>> {
        match self {
            EntryWalker::Tar(w) => w.next_entry(src),
            EntryWalker::Ar(w)  => w.next_entry(src),
        }
    }
}

// ── Stream helpers ────────────────────────────────────────────────────────────

/// Byte-counting pass-through reader.  The count is the stream offset of the
/// next byte, which is what a seekable session needs to locate member data.
#[derive(Debug)]
pub struct Counted<R> {
    inner: R,
    pos:   u64,
}

impl<R> Counted<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> Read for Counted<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Discard exactly `n` bytes; a stream that ends early is truncated.
pub(crate) fn skip_exact<R: Read>(src: &mut R, n: u64) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    let skipped = io::copy(&mut src.by_ref().take(n), &mut io::sink())?;
    if skipped < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("archive truncated: {} of {} bytes left to skip", n - skipped, n),
        ));
    }
    Ok(())
}

/// Read an entry payload that the walker itself consumes (long names, pax
/// records).  Bounded so a corrupt size cannot exhaust memory.
pub(crate) fn read_payload<R: Read>(src: &mut R, len: u64) -> io::Result<Vec<u8>> {
    const MAX_META_PAYLOAD: u64 = 1024 * 1024;
    if len > MAX_META_PAYLOAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("metadata entry of {len} bytes exceeds {MAX_META_PAYLOAD}"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    src.read_exact(&mut buf)?;
    Ok(buf)
}
