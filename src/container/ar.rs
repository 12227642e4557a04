//! ar walker: System V / GNU and BSD variants.
//!
//! ```text
//! "!<arch>\n"
//! 60-byte header: name[16] mtime[12] uid[6] gid[6] mode[8] size[10] "`\n"
//! data, padded to an even length
//! ```
//!
//! GNU stores names longer than 15 bytes in a `//` table and refers to them
//! as `/<offset>`; BSD writes `#1/<len>` and prefixes the data with the name.
//! Symbol tables (`/`, `/SYM64/`, `__.SYMDEF*`) are skipped.

use std::io::{self, Read};
use std::str;

use super::{read_full, read_payload, skip_exact, EntryInfo};

pub(super) const AR_MAGIC: &[u8; 8] = b"!<arch>\n";
const HEADER_LEN: usize = 60;
const HEADER_END: &[u8; 2] = b"`\n";
const BSD_NAME_PREFIX: &[u8] = b"#1/";

pub(super) fn is_ar(head: &[u8]) -> bool {
    head.starts_with(AR_MAGIC)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn parse_decimal(field: &[u8]) -> io::Result<u64> {
    str::from_utf8(field)
        .ok()
        .map(str::trim)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(format!("bad ar number field {:?}", String::from_utf8_lossy(field))))
}

fn trim_end(mut field: &[u8], pad: u8) -> &[u8] {
    while let [rest @ .., last] = field {
        if *last != pad {
            break;
        }
        field = rest;
    }
    field
}

#[derive(Debug, Default)]
pub struct ArWalker {
    started: bool,
    done:    bool,
    pending: u64,
    /// GNU long-name table (`//` member).
    names:   Vec<u8>,
}

impl ArWalker {
    pub fn next_entry<R: Read>(&mut self, src: &mut R) -> io::Result<Option<EntryInfo>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            let mut magic = [0u8; 8];
            src.read_exact(&mut magic)?;
            if &magic != AR_MAGIC {
                return Err(invalid("missing ar signature"));
            }
            self.started = true;
        }
        skip_exact(src, std::mem::take(&mut self.pending))?;

        loop {
            let mut head = [0u8; HEADER_LEN];
            let got = read_full(src, &mut head)?;
            if got == 0 {
                self.done = true;
                return Ok(None);
            }
            if got < HEADER_LEN {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated ar header"));
            }
            if &head[58..60] != HEADER_END {
                return Err(invalid("ar header terminator missing"));
            }

            let name    = trim_end(&head[..16], b' ');
            let size    = parse_decimal(&head[48..58])?;
            let padding = size & 1;

            match name {
                b"/" | b"/SYM64/" | b"__.SYMDEF" | b"__.SYMDEF SORTED" => {
                    skip_exact(src, size + padding)?;
                }
                b"//" => {
                    self.names = read_payload(src, size)?;
                    skip_exact(src, padding)?;
                }
                _ if name.starts_with(BSD_NAME_PREFIX) => {
                    let name_len = parse_decimal(&name[BSD_NAME_PREFIX.len()..])?;
                    if name_len > size {
                        return Err(invalid("BSD ar name longer than its member"));
                    }
                    let raw = read_payload(src, name_len)?;
                    let pathname = trim_end(&raw, 0).to_vec();
                    let data_len = size - name_len;
                    self.pending = data_len + padding;
                    return Ok(Some(EntryInfo { pathname, size: data_len }));
                }
                [b'/', digits @ ..] if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) => {
                    let offset = parse_decimal(digits)? as usize;
                    let pathname = self.long_name(offset)?;
                    self.pending = size + padding;
                    return Ok(Some(EntryInfo { pathname, size }));
                }
                _ => {
                    let pathname = name.strip_suffix(b"/").unwrap_or(name).to_vec();
                    self.pending = size + padding;
                    return Ok(Some(EntryInfo { pathname, size }));
                }
            }
        }
    }

    fn long_name(&self, offset: usize) -> io::Result<Vec<u8>> {
        let table = self
            .names
            .get(offset..)
            .ok_or_else(|| invalid(format!("ar long-name offset {offset} outside table")))?;
        let end  = table.iter().position(|&b| b == b'\n').unwrap_or(table.len());
        let name = &table[..end];
        Ok(name.strip_suffix(b"/").unwrap_or(name).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, data: &[u8]) -> Vec<u8> {
        let mut out = format!("{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n", name, 0, 0, 0, 644, data.len())
            .into_bytes();
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(b'\n');
        }
        out
    }

    fn walk(bytes: &[u8]) -> Vec<EntryInfo> {
        let mut src    = bytes;
        let mut walker = ArWalker::default();
        let mut out    = Vec::new();
        while let Some(entry) = walker.next_entry(&mut src).unwrap() {
            out.push(entry);
        }
        out
    }

    #[test]
    fn gnu_names_and_symbol_table() {
        let table = b"a-very-long-member-name.mp3/\n".to_vec();
        let mut bytes = AR_MAGIC.to_vec();
        bytes.extend(member("/", &[0u8; 4]));
        bytes.extend(member("//", &table));
        bytes.extend(member("short.txt/", b"odd"));
        bytes.extend(member("/0", b"long member body"));

        assert!(is_ar(&bytes));
        let entries = walk(&bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], EntryInfo { pathname: b"short.txt".to_vec(), size: 3 });
        assert_eq!(entries[1].pathname, b"a-very-long-member-name.mp3");
        assert_eq!(entries[1].size, 16);
    }

    #[test]
    fn bsd_inline_names() {
        let mut body = b"bsd-name.ogg\0\0\0\0".to_vec();
        body.extend_from_slice(b"ogg data");
        let mut bytes = AR_MAGIC.to_vec();
        bytes.extend(member("#1/16", &body));
        bytes.extend(member("next", b"n"));

        let mut src    = &bytes[..];
        let mut walker = ArWalker::default();
        let entry = walker.next_entry(&mut src).unwrap().unwrap();
        assert_eq!(entry, EntryInfo { pathname: b"bsd-name.ogg".to_vec(), size: 8 });
        let mut data = [0u8; 8];
        src.read_exact(&mut data).unwrap();
        assert_eq!(&data, b"ogg data");
        assert_eq!(walker.next_entry(&mut src).unwrap().unwrap().pathname, b"next");
    }

    #[test]
    fn bsd_members_walk_without_reading_data() {
        let mut first = b"first-bsd-name.mp3\0\0".to_vec();
        first.extend_from_slice(b"mp3 frames");
        let mut second = b"second.ogg\0\0".to_vec();
        second.extend_from_slice(b"ogg!x");
        let mut bytes = AR_MAGIC.to_vec();
        bytes.extend(member("#1/20", &first));
        bytes.extend(member("#1/12", &second));

        let entries = walk(&bytes);
        assert_eq!(entries, vec![
            EntryInfo { pathname: b"first-bsd-name.mp3".to_vec(), size: 10 },
            EntryInfo { pathname: b"second.ogg".to_vec(), size: 5 },
        ]);
    }

    #[test]
    fn bad_terminator_is_invalid() {
        let mut bytes = AR_MAGIC.to_vec();
        let mut m = member("x", b"ab");
        m[58] = b'!';
        bytes.extend(m);
        let err = ArWalker::default().next_entry(&mut &bytes[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
