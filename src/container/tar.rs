//! tar walker: ustar, GNU and pax headers.
//!
//! Header blocks are decoded with the `tar` crate's [`Header`]; the walk
//! itself is done here because `tar::Archive` borrows its reader for the
//! lifetime of every entry, which a long-lived session cannot hold.
//!
//! Honoured extensions:
//! - GNU `L` long names
//! - pax `x` records (`path`, `size`); `g` global records are skipped
//! - GNU `K` long link names are skipped
//!
//! Not supported: GNU sparse (`S`) and multi-volume (`M`) entries, and pax
//! `GNU.sparse.*` maps.  Such entries are reported as plain members whose
//! data is the stored bytes as they sit in the archive, so holes are not
//! expanded and the size is the stored size rather than the real file size.

use std::io::{self, Read};

use ::tar::{EntryType, Header, PaxExtensions};

use super::{read_full, read_payload, skip_exact, EntryInfo};

const BLOCK: u64 = 512;
const USTAR_MAGIC_OFFSET: usize = 257;
const CHECKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// Round `n` up to the next tar block boundary.
#[inline]
fn padded(n: u64) -> u64 {
    n.div_ceil(BLOCK) * BLOCK
}

/// Sum of header bytes with the checksum field taken as spaces.
fn header_checksum(block: &[u8]) -> u32 {
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| if CHECKSUM_RANGE.contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum()
}

fn checksum_matches(header: &Header) -> bool {
    header
        .cksum()
        .map(|stored| stored == header_checksum(header.as_bytes()))
        .unwrap_or(false)
}

pub(super) fn is_tar(head: &[u8]) -> bool {
    if head.len() < BLOCK as usize {
        return false;
    }
    let block = &head[..BLOCK as usize];
    if block.iter().all(|&b| b == 0) {
        // An empty archive is just its terminator.
        return true;
    }
    if head[USTAR_MAGIC_OFFSET..].starts_with(b"ustar") {
        return true;
    }
    let mut header = Header::new_old();
    header.as_mut_bytes().copy_from_slice(block);
    checksum_matches(&header)
}

#[derive(Debug, Default)]
pub struct TarWalker {
    /// Data and padding of the previous entry not yet consumed.
    pending: u64,
    done:    bool,
}

impl TarWalker {
    pub fn next_entry<R: Read>(&mut self, src: &mut R) -> io::Result<Option<EntryInfo>> {
        if self.done {
            return Ok(None);
        }
        skip_exact(src, std::mem::take(&mut self.pending))?;

        let mut long_name: Option<Vec<u8>> = None;
        let mut pax_path:  Option<Vec<u8>> = None;
        let mut pax_size:  Option<u64>     = None;

        loop {
            let mut header = Header::new_old();
            let got = read_full(src, header.as_mut_bytes())?;
            if got == 0 {
                // Missing terminator blocks are tolerated.
                self.done = true;
                return Ok(None);
            }
            if got < BLOCK as usize {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated tar header"));
            }
            if header.as_bytes().iter().all(|&b| b == 0) {
                self.done = true;
                return Ok(None);
            }
            if !checksum_matches(&header) {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "tar header checksum mismatch"));
            }

            let size = header.entry_size()?;
            match header.entry_type() {
                EntryType::GNULongName => {
                    let mut name = read_payload(src, size)?;
                    skip_exact(src, padded(size) - size)?;
                    while name.last() == Some(&0) {
                        name.pop();
                    }
                    long_name = Some(name);
                }
                EntryType::XHeader => {
                    let records = read_payload(src, size)?;
                    skip_exact(src, padded(size) - size)?;
                    for ext in PaxExtensions::new(&records) {
                        let ext = ext?;
                        match ext.key_bytes() {
                            b"path" => pax_path = Some(ext.value_bytes().to_vec()),
                            b"size" => {
                                pax_size = std::str::from_utf8(ext.value_bytes())
                                    .ok()
                                    .and_then(|v| v.parse().ok());
                            }
                            _ => {}
                        }
                    }
                }
                EntryType::XGlobalHeader | EntryType::GNULongLink => {
                    skip_exact(src, padded(size))?;
                }
                _ => {
                    let size = pax_size.unwrap_or(size);
                    let pathname = pax_path
                        .or(long_name)
                        .unwrap_or_else(|| header.path_bytes().into_owned());
                    self.pending = padded(size);
                    return Ok(Some(EntryInfo { pathname, size }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = ::tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn walk(bytes: &[u8]) -> Vec<EntryInfo> {
        let mut src    = bytes;
        let mut walker = TarWalker::default();
        let mut out    = Vec::new();
        while let Some(entry) = walker.next_entry(&mut src).unwrap() {
            out.push(entry);
        }
        out
    }

    #[test]
    fn walks_plain_entries() {
        let bytes = build(&[("a.txt", &b"alpha"[..]), ("dir/b.bin", &[7u8; 1000][..])]);
        assert!(is_tar(&bytes));
        let entries = walk(&bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], EntryInfo { pathname: b"a.txt".to_vec(), size: 5 });
        assert_eq!(entries[1], EntryInfo { pathname: b"dir/b.bin".to_vec(), size: 1000 });
    }

    #[test]
    fn honours_gnu_long_names() {
        let long = format!("{}/track01.flac", "deep".repeat(40));
        let bytes = build(&[(long.as_str(), &b"flac"[..]), ("short", &b"s"[..])]);
        let entries = walk(&bytes);
        assert_eq!(entries[0].pathname, long.as_bytes());
        assert_eq!(entries[0].size, 4);
        assert_eq!(entries[1].pathname, b"short");
    }

    #[test]
    fn stream_is_left_on_member_data() {
        let bytes = build(&[("skip.me", &[1u8; 600][..]), ("want", &b"payload"[..])]);
        let mut src    = &bytes[..];
        let mut walker = TarWalker::default();
        walker.next_entry(&mut src).unwrap().unwrap();
        let entry = walker.next_entry(&mut src).unwrap().unwrap();
        assert_eq!(entry.pathname, b"want");
        let mut data = vec![0u8; entry.size as usize];
        src.read_exact(&mut data).unwrap();
        assert_eq!(data, b"payload");
    }

    #[test]
    fn corrupt_checksum_is_invalid_data() {
        let mut bytes = build(&[("a", &b"x"[..])]);
        bytes[0] ^= 0xff;
        let mut walker = TarWalker::default();
        let err = walker.next_entry(&mut &bytes[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn sparse_entry_is_reported_with_stored_bytes() {
        let mut builder = ::tar::Builder::new(Vec::new());
        let mut sparse  = Header::new_gnu();
        sparse.set_entry_type(EntryType::GNUSparse);
        sparse.set_size(6);
        sparse.set_mode(0o644);
        builder.append_data(&mut sparse, "holes.img", &b"stored"[..]).unwrap();
        let mut plain = Header::new_gnu();
        plain.set_size(3);
        plain.set_mode(0o644);
        builder.append_data(&mut plain, "after", &b"end"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();

        assert_eq!(walk(&bytes), vec![
            EntryInfo { pathname: b"holes.img".to_vec(), size: 6 },
            EntryInfo { pathname: b"after".to_vec(), size: 3 },
        ]);

        let mut src    = &bytes[..];
        let mut walker = TarWalker::default();
        walker.next_entry(&mut src).unwrap().unwrap();
        let mut data = [0u8; 6];
        src.read_exact(&mut data).unwrap();
        assert_eq!(&data, b"stored");
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let bytes = build(&[]);
        assert!(is_tar(&bytes));
        assert!(walk(&bytes).is_empty());
    }
}
