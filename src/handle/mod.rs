//! Member handle: a seekable byte view over one forward-only session.
//!
//! # Read path
//! Bytes come from the look-back ring first (when the cursor sits behind
//! the ring's write head), then from the session.  Every chunk the session
//! produces is appended to the ring as it is delivered, so the ring always
//! holds the tail of what the caller has seen.
//!
//! # Seek path
//! A resolved target is reached by the cheapest of, in order:
//!
//! 1. moving inside the ring (no I/O);
//! 2. the session's native seek (unfiltered archives only; resets the ring);
//! 3. for backward targets, replaying the session from the member start;
//! 4. forward catch-up through the normal read path, discarding bytes.
//!
//! A handle left without a session by a failed replay rebuilds it before
//! any of these, and the seek fails with `Replay` if that fails again.
//! Step 4 fills the ring on the way, so a forward skip followed by a small
//! step back is served without another replay.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::{Result, VfsError};
use crate::ring::LookbackRing;
use crate::session::{ArchiveOpener, Session, SessionFactory};

/// Scratch size for discarding bytes during forward catch-up.
const CATCH_UP_CHUNK: usize = 4096;

/// Origin of a [`MemberHandle::seek`] offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// One open member of one archive.
///
/// Not shareable between threads while in use; every operation takes
/// `&mut self`.  Dropping the handle releases the session and the ring.
pub struct MemberHandle<F: SessionFactory = ArchiveOpener> {
    opener:       F,
    archive_path: PathBuf,
    member_name:  String,
    size:         u64,
    cursor:       u64,
    /// `None` only after a failed replay.
    session:      Option<F::Session>,
    ring:         LookbackRing,
}

impl<F: SessionFactory> MemberHandle<F> {
    /// Open `member` inside `archive` and position the cursor at 0.
    pub fn open(
        opener:        F,
        archive:       impl Into<PathBuf>,
        member:        impl Into<String>,
        ring_capacity: usize,
    ) -> Result<Self> {
        let archive_path = archive.into();
        let member_name  = member.into();
        let session = opener.open(&archive_path, &member_name)?;
        let size    = session.size();
        trace!("opened '{member_name}' in {} ({size} bytes)", archive_path.display());
        Ok(Self {
            opener,
            archive_path,
            member_name,
            size,
            cursor:  0,
            session: Some(session),
            ring:    LookbackRing::new(ring_capacity),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[inline]
    pub fn tell(&self) -> u64 {
        self.cursor
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.size
    }

    /// Always `false`: the handle supports arbitrary seeks.
    pub fn is_streaming(&self) -> bool {
        false
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    pub fn ring(&self) -> &LookbackRing {
        &self.ring
    }

    /// Release the session and the ring.
    pub fn close(self) {
        trace!("closing '{}'", self.member_name);
    }

    // ── Reading ──────────────────────────────────────────────────────────────

    /// Read up to `dst.len()` bytes at the cursor.
    ///
    /// A return smaller than requested means the end of the member was
    /// reached.  Session errors are treated as end of stream.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let remaining = self.size - self.cursor;
        let want = dst.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let dst  = &mut dst[..want];

        let from_ring = self.ring.read(dst);
        let mut from_session = 0;
        if let Some(session) = self.session.as_mut() {
            while from_ring + from_session < want {
                let start = from_ring + from_session;
                let n = match session.read(&mut dst[start..]) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("session read for '{}' failed, treating as EOF: {e}", self.member_name);
                        break;
                    }
                };
                // The ring was drained above, so its read cursor is at the write head.
                self.ring.write(&dst[start..start + n]);
                from_session += n;
            }
        }

        let n = from_ring + from_session;
        self.cursor += n as u64;
        n
    }

    /// C-stdio style read of whole elements.
    ///
    /// Returns `bytes_read / elem_size`.  Bytes of a trailing partial element
    /// are still consumed: the cursor advances by the full byte count.
    pub fn read_elements(&mut self, buf: &mut [u8], elem_size: usize, nmemb: usize) -> usize {
        if elem_size == 0 {
            return 0;
        }
        let len = elem_size.saturating_mul(nmemb).min(buf.len());
        self.read(&mut buf[..len]) / elem_size
    }

    // ── Seeking ──────────────────────────────────────────────────────────────

    /// Move the cursor; returns the new absolute position.
    ///
    /// An out-of-range target fails with [`VfsError::OutOfRange`] and leaves
    /// the cursor untouched.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base: i128 = match whence {
            Whence::Set => 0,
            Whence::Cur => i128::from(self.cursor),
            Whence::End => i128::from(self.size),
        };
        let target = base + i128::from(offset);
        if target < 0 || target > i128::from(self.size) {
            return Err(VfsError::OutOfRange { target, size: self.size });
        }
        let target = target as u64;

        if self.session.is_none() {
            debug!("seek {} -> {target} rebuilds '{}' after a failed replay", self.cursor, self.member_name);
            self.replay()?;
        }

        if let Ok(delta) = i64::try_from(i128::from(target) - i128::from(self.cursor)) {
            if self.ring.seek(delta).is_ok() {
                trace!("seek {} -> {target} inside ring", self.cursor);
                self.cursor = target;
                return Ok(target);
            }
        }

        if let Some(session) = self.session.as_mut() {
            if session.seek_native(target) {
                trace!("seek {} -> {target} via native seek", self.cursor);
                self.ring.reset();
                self.cursor = target;
                return Ok(target);
            }
        }

        if target < self.cursor {
            debug!("seek {} -> {target} replays '{}'", self.cursor, self.member_name);
            self.replay()?;
        }

        let mut scratch = [0u8; CATCH_UP_CHUNK];
        while self.cursor < target {
            let step = usize::try_from(target - self.cursor).map_or(CATCH_UP_CHUNK, |n| n.min(CATCH_UP_CHUNK));
            if self.read(&mut scratch[..step]) == 0 {
                return Err(VfsError::UnexpectedEof { reached: self.cursor, target });
            }
        }
        Ok(self.cursor)
    }

    /// Rebuild the session from the member start and zero the cursor.
    pub fn rewind(&mut self) -> Result<()> {
        debug!("rewinding '{}'", self.member_name);
        self.replay()
    }

    /// Tear down the session and open a fresh one.  On failure the handle is
    /// left without a session and the cursor keeps its old value.
    fn replay(&mut self) -> Result<()> {
        self.session = None;
        self.ring.reset();
        let session = self
            .opener
            .open(&self.archive_path, &self.member_name)
            .map_err(|source| VfsError::Replay {
                member: self.member_name.clone(),
                source: Box::new(source),
            })?;
        self.session = Some(session);
        self.cursor  = 0;
        Ok(())
    }
}

// ── std::io adapters ─────────────────────────────────────────────────────────

impl<F: SessionFactory> io::Read for MemberHandle<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(MemberHandle::read(self, buf))
    }
}

impl<F: SessionFactory> io::Seek for MemberHandle<F> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => {
                let n = i64::try_from(n).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("seek offset {n} too large"))
                })?;
                (n, Whence::Set)
            }
            io::SeekFrom::Current(d) => (d, Whence::Cur),
            io::SeekFrom::End(d)     => (d, Whence::End),
        };
        MemberHandle::seek(self, offset, whence).map_err(|e| match e {
            VfsError::OutOfRange { .. }    => io::Error::new(io::ErrorKind::InvalidInput, e),
            VfsError::UnexpectedEof { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            VfsError::Io(inner)            => inner,
            other                          => io::Error::new(io::ErrorKind::Other, other),
        })
    }
}
