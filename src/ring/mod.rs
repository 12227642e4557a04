//! Look-back ring: a fixed-capacity circular record of delivered bytes.
//!
//! The ring keeps a read cursor and a write head in one `capacity`-byte
//! allocation:
//!
//! ```text
//!            behind              ahead
//!   ... ─────────────── cursor ───────── end ─── (oldest, being overwritten)
//! ```
//!
//! - `end` is the write head: where the next freshly decompressed byte lands.
//! - the read cursor trails `end` by `ahead` bytes after a backward seek and
//!   catches up again as the caller re-reads.
//! - `full` becomes true the first time `end` wraps, after which the whole
//!   allocation holds valid history.
//!
//! Writes are only legal when the read cursor sits on `end` and move both cursors
//! together: every byte written is simultaneously recorded and delivered.
//! A member handle therefore always drains the ring before it asks the
//! session for more data.

use thiserror::Error;

/// Default ring capacity: 5 KiB.
pub const DEFAULT_RING_CAPACITY: usize = 5 * 1024;

/// A ring-local move was requested that the recorded history cannot serve.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Ring seek by {delta} out of range (ahead {ahead}, behind {behind})")]
pub struct RingSeekError {
    pub delta:  i64,
    pub ahead:  usize,
    pub behind: usize,
}

#[derive(Debug, Clone)]
pub struct LookbackRing {
    data:  Box<[u8]>,
    end:   usize,
    /// Distance from the read cursor forward to `end`.  Stored rather than
    /// derived so that a cursor moved back by a full `capacity()` is not
    /// mistaken for one sitting on the write head.
    ahead: usize,
    full:  bool,
}

impl Default for LookbackRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl LookbackRing {
    /// Allocate a ring of `capacity` bytes (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            data:  vec![0u8; capacity.max(1)].into_boxed_slice(),
            end:   0,
            ahead: 0,
            full:  false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes between the read cursor and the write head.
    #[inline]
    pub fn ahead(&self) -> usize {
        self.ahead
    }

    /// Bytes the read cursor may move back over and still find valid data.
    #[inline]
    pub fn behind(&self) -> usize {
        let recorded = if self.full { self.capacity() } else { self.end };
        recorded - self.ahead
    }

    /// Physical index of the read cursor.
    #[inline]
    fn offset(&self) -> usize {
        (self.end + self.capacity() - self.ahead) % self.capacity()
    }

    /// Forget all history.  Called whenever the backing session is torn down.
    pub fn reset(&mut self) {
        self.end   = 0;
        self.ahead = 0;
        self.full  = false;
    }

    /// Copy up to `ahead()` bytes into `dst`, starting at the read cursor.
    ///
    /// Returns 0 when the cursor sits on the write head; the caller must then
    /// fetch fresh bytes from the session.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.ahead);
        if n == 0 {
            return 0;
        }

        let start = self.offset();
        let first = n.min(self.capacity() - start);
        dst[..first].copy_from_slice(&self.data[start..start + first]);
        if first < n {
            dst[first..n].copy_from_slice(&self.data[..n - first]);
        }
        self.ahead -= n;
        n
    }

    /// Record `src` as just delivered.
    ///
    /// Only the last `capacity()` bytes of `src` are kept; anything before
    /// them would be overwritten by the same write anyway.
    pub fn write(&mut self, src: &[u8]) {
        debug_assert_eq!(self.ahead, 0, "ring written before it was drained");

        let cap  = self.capacity();
        let tail = &src[src.len().saturating_sub(cap)..];
        let n    = tail.len();
        if n == 0 {
            return;
        }

        let gap = cap - self.end;
        if gap >= n {
            self.data[self.end..self.end + n].copy_from_slice(tail);
            self.end += n;
            if self.end == cap {
                self.end  = 0;
                self.full = true;
            }
        } else {
            self.data[self.end..].copy_from_slice(&tail[..gap]);
            self.data[..n - gap].copy_from_slice(&tail[gap..]);
            self.end  = n - gap;
            self.full = true;
        }

        self.ahead = 0;
    }

    /// Move the read cursor by `delta` bytes without touching the write head.
    pub fn seek(&mut self, delta: i64) -> Result<(), RingSeekError> {
        if delta == 0 {
            return Ok(());
        }

        let ahead  = self.ahead;
        let behind = self.behind();
        let reach  = delta.unsigned_abs();
        let fits   = if delta > 0 { reach <= ahead as u64 } else { reach <= behind as u64 };
        if !fits {
            return Err(RingSeekError { delta, ahead, behind });
        }

        // `reach` is bounded by the capacity here, so the casts are lossless.
        if delta > 0 {
            self.ahead -= reach as usize;
        } else {
            self.ahead += reach as usize;
        }
        Ok(())
    }
}
