//! Archive sessions: one forward-only decompression stream bound to one member.
//!
//! # Contract
//! A [`Session`] produces the decompressed bytes of a single member, from
//! its first byte, exactly once.  There is no way to go back: re-reading a
//! prefix means dropping the session and asking the [`SessionFactory`] for
//! a new one, which must reproduce the same byte sequence.
//!
//! # Built-in backend
//! [`ArchiveOpener`] opens local archive files:
//!
//! 1. Sniff the first bytes for a filter (gzip, bzip2, xz, zstd, lz4, lzma) and peel
//!    up to [`MAX_FILTER_DEPTH`] nested filter layers.
//! 2. Sniff the decompressed head for a container (tar, ar).
//! 3. Walk entry headers, skipping data, until a pathname matches the
//!    requested member byte-for-byte.
//!
//! When no filter is present the session keeps the file seekable and can
//! jump straight to any offset inside the member ([`Session::seek_native`]).

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace};

use crate::container::{read_full, ContainerKind, Counted, EntryInfo, EntryWalker, CONTAINER_MAGIC_LEN};
use crate::error::{Result, VfsError};
use crate::filter::{FilterId, FILTER_MAGIC_LEN};

/// Buffer size for archive reads (matches the classic libarchive block size).
pub const READ_BLOCK_SIZE: usize = 10 * 1024;
/// Deepest stack of filters peeled before giving up (e.g. `.tar.gz.zst`).
pub const MAX_FILTER_DEPTH: usize = 4;

// ── Traits ────────────────────────────────────────────────────────────────────

/// A live, forward-only decompression stream over one member.
pub trait Session {
    /// Uncompressed member length as recorded in the archive.
    fn size(&self) -> u64;

    /// Produce up to `buf.len()` bytes.  `Ok(0)` is end of member.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Reposition to `pos` without decompressing, if the backend can.
    ///
    /// Returning `false` is not an error; the caller falls back to replaying
    /// the stream.  On `true` the next `read` starts at `pos`.
    fn seek_native(&mut self, _pos: u64) -> bool {
        false
    }
}

/// Constructs sessions.  Must be a pure function of its arguments: two
/// sessions opened with the same path and member yield identical bytes.
pub trait SessionFactory {
    type Session: Session;

    fn open(&self, archive: &Path, member: &str) -> Result<Self::Session>;
}

// ── Input plumbing ────────────────────────────────────────────────────────────

/// Either the raw archive file (seekable) or a chain of decoders over it.
enum Input {
    Seekable(BufReader<File>),
    Filtered(Box<dyn Read>),
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Input::Seekable(r) => r.read(buf),
            Input::Filtered(r) => r.read(buf),
        }
    }
}

const HEAD_LEN: usize = if CONTAINER_MAGIC_LEN > FILTER_MAGIC_LEN { CONTAINER_MAGIC_LEN } else { FILTER_MAGIC_LEN };

/// Read the stream head and hand back a reader that still yields it.
fn peek_head(mut stream: Box<dyn Read>) -> io::Result<(Vec<u8>, Box<dyn Read>)> {
    let mut head = vec![0u8; HEAD_LEN];
    let n = read_full(&mut stream, &mut head)?;
    head.truncate(n);
    let rejoined: Box<dyn Read> = Box::new(Cursor::new(head.clone()).chain(stream));
    Ok((head, rejoined))
}

/// Open `path`, peel filters, and return the container-level stream plus its
/// head bytes for container detection.
fn open_input(path: &Path) -> std::result::Result<(Input, Vec<u8>), String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let mut head = vec![0u8; HEAD_LEN];
    let n = read_full(&mut file, &mut head).map_err(|e| e.to_string())?;
    head.truncate(n);
    file.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;

    let mut filter = FilterId::detect(&head);
    if filter == FilterId::None {
        return Ok((Input::Seekable(BufReader::with_capacity(READ_BLOCK_SIZE, file)), head));
    }

    let mut stream: Box<dyn Read> = Box::new(BufReader::with_capacity(READ_BLOCK_SIZE, file));
    for depth in 0..MAX_FILTER_DEPTH {
        trace!("peeling filter layer {depth}: {}", filter.name());
        let decoded = filter.decoder(stream).map_err(|e| e.to_string())?;
        let (next_head, rejoined) = peek_head(decoded).map_err(|e| e.to_string())?;
        stream = rejoined;
        head   = next_head;
        filter = FilterId::detect(&head);
        if filter == FilterId::None {
            return Ok((Input::Filtered(stream), head));
        }
    }
    Err(format!("more than {MAX_FILTER_DEPTH} nested filters"))
}

/// Open an archive and position a walker at its first entry.
fn open_walker(archive: &Path) -> Result<(Counted<Input>, EntryWalker)> {
    let (input, head) = open_input(archive).map_err(|reason| VfsError::format(archive, reason))?;
    let kind = ContainerKind::detect(&head)
        .ok_or_else(|| VfsError::format(archive, "unrecognised container format"))?;
    debug!("{}: {} container", archive.display(), kind.name());
    Ok((Counted::new(input), EntryWalker::new(kind)))
}

// ── ArchiveSession ────────────────────────────────────────────────────────────

/// Built-in session over a tar or ar member, optionally behind filters.
pub struct ArchiveSession {
    input:      Counted<Input>,
    /// File offset of the member's first byte when the input is seekable.
    data_start: Option<u64>,
    size:       u64,
    remaining:  u64,
}

impl ArchiveSession {
    pub fn open(archive: &Path, member: &str) -> Result<Self> {
        trace!("searching {} for '{member}'", archive.display());
        let (mut input, mut walker) = open_walker(archive)?;

        loop {
            let entry = walker
                .next_entry(&mut input)
                .map_err(|e| VfsError::format(archive, e))?;
            let Some(entry) = entry else {
                return Err(VfsError::NotFound {
                    archive: archive.to_path_buf(),
                    member:  member.to_owned(),
                });
            };
            if entry.pathname == member.as_bytes() {
                trace!("found '{member}' ({} bytes)", entry.size);
                let seekable   = matches!(input.get_mut(), Input::Seekable(_));
                let data_start = seekable.then(|| input.position());
                return Ok(Self { input, data_start, size: entry.size, remaining: entry.size });
            }
        }
    }

    pub fn is_seekable(&self) -> bool {
        self.data_start.is_some()
    }
}

impl Session for ArchiveSession {
    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.input.read(&mut buf[..want])?;
        self.remaining -= n as u64;
        Ok(n)
    }

    fn seek_native(&mut self, pos: u64) -> bool {
        let Some(start) = self.data_start else {
            return false;
        };
        if pos > self.size {
            return false;
        }
        let Input::Seekable(file) = self.input.get_mut() else {
            return false;
        };
        match file.seek(SeekFrom::Start(start + pos)) {
            Ok(_) => {
                self.remaining = self.size - pos;
                true
            }
            Err(e) => {
                debug!("native seek to {pos} failed: {e}");
                false
            }
        }
    }
}

// ── ArchiveOpener ─────────────────────────────────────────────────────────────

/// Default [`SessionFactory`]: opens local archive files with the built-in
/// filter and container support.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveOpener;

impl SessionFactory for ArchiveOpener {
    type Session = ArchiveSession;

    fn open(&self, archive: &Path, member: &str) -> Result<ArchiveSession> {
        ArchiveSession::open(archive, member)
    }
}

impl ArchiveOpener {
    /// Enumerate every entry of an archive, in stored order.
    pub fn list(&self, archive: &Path) -> Result<Vec<EntryInfo>> {
        let (mut input, mut walker) = open_walker(archive)?;
        let mut entries = Vec::new();
        while let Some(entry) = walker
            .next_entry(&mut input)
            .map_err(|e| VfsError::format(archive, e))?
        {
            entries.push(entry);
        }
        Ok(entries)
    }
}
