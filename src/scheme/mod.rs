//! URL scheme table and archive URL parsing.
//!
//! Every configured extension `ext` registers the scheme `ext://`.  A member
//! URL has the shape
//!
//! ```text
//! <scheme>://<archive_path>:<member_name>
//! ```
//!
//! where the first `:` after the scheme separates the archive from the
//! member.  Member names may contain further `:`; archive paths may not.

use std::path::{Path, PathBuf};

use crate::config::VfsConfig;
use crate::error::{Result, VfsError};

const SCHEME_SEP: &str = "://";

/// Registered schemes, in configuration order.  Built once and passed by
/// reference; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeTable {
    /// Bare names (`"tar"`, `"gz"`), without the `://` suffix.
    names: Vec<String>,
}

impl SchemeTable {
    /// Build from extension names; case-insensitive duplicates keep their
    /// first occurrence.
    pub fn new<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for ext in extensions {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(ext)) {
                names.push(ext.to_owned());
            }
        }
        Self { names }
    }

    pub fn from_config(config: &VfsConfig) -> Self {
        Self::new(config.extensions())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Schemes as presented to a host: `"tar://"`, `"gz://"`, ...
    pub fn schemes(&self) -> Vec<String> {
        self.names.iter().map(|n| format!("{n}{SCHEME_SEP}")).collect()
    }

    /// First registered scheme prefixing `url` (ASCII case-insensitive).
    /// Returns the bare scheme name and the rest of the URL after `://`.
    pub fn match_url<'u>(&self, url: &'u str) -> Option<(&str, &'u str)> {
        self.names.iter().find_map(|name| {
            let prefix_len = name.len() + SCHEME_SEP.len();
            let head = url.as_bytes().get(..prefix_len)?;
            let (scheme, sep) = head.split_at(name.len());
            if scheme.eq_ignore_ascii_case(name.as_bytes()) && sep == SCHEME_SEP.as_bytes() {
                Some((name.as_str(), url.get(prefix_len..)?))
            } else {
                None
            }
        })
    }

    /// Whether the file name's last extension names a registered scheme.
    pub fn is_container(&self, fname: &str) -> bool {
        self.scheme_for(Path::new(fname)).is_some()
    }

    /// Scheme whose name equals the path's extension, if any.
    pub fn scheme_for(&self, path: &Path) -> Option<&str> {
        let name = path.file_name()?.to_str()?;
        let (_, ext) = name.rsplit_once('.')?;
        self.names().find(|n| n.eq_ignore_ascii_case(ext))
    }

    /// Scheme to advertise for entries of `archive`: the extension match, or
    /// the first registered scheme.
    pub fn scheme_for_listing(&self, archive: &Path) -> Option<&str> {
        self.scheme_for(archive).or_else(|| self.names().next())
    }
}

impl Default for SchemeTable {
    fn default() -> Self {
        Self::from_config(&VfsConfig::default())
    }
}

/// A parsed member URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUrl {
    pub scheme:  String,
    pub archive: PathBuf,
    pub member:  String,
}

impl ArchiveUrl {
    pub fn parse(table: &SchemeTable, url: &str) -> Result<Self> {
        let (scheme, rest) = table
            .match_url(url)
            .ok_or_else(|| VfsError::BadUrl(format!("no registered scheme in '{url}'")))?;
        let (archive, member) = rest
            .split_once(':')
            .ok_or_else(|| VfsError::BadUrl(format!("missing ':' before member name in '{url}'")))?;
        if archive.is_empty() {
            return Err(VfsError::BadUrl(format!("empty archive path in '{url}'")));
        }
        Ok(Self {
            scheme:  scheme.to_owned(),
            archive: PathBuf::from(archive),
            member:  member.to_owned(),
        })
    }

    /// Render back to `<scheme>://<archive>:<member>`.
    pub fn to_url(&self) -> String {
        format!("{}{SCHEME_SEP}{}:{}", self.scheme, self.archive.display(), self.member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SchemeTable {
        SchemeTable::new(["tar", "gz", "Z", "xz", "tar"])
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(table().schemes(), ["tar://", "gz://", "Z://", "xz://"]);
        assert_eq!(SchemeTable::default().names().filter(|n| *n == "xz").count(), 1);
    }

    #[test]
    fn parses_member_url() {
        let url = ArchiveUrl::parse(&table(), "tar:///music/t.tar:hello.txt").unwrap();
        assert_eq!(url.scheme, "tar");
        assert_eq!(url.archive, PathBuf::from("/music/t.tar"));
        assert_eq!(url.member, "hello.txt");
        assert_eq!(url.to_url(), "tar:///music/t.tar:hello.txt");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let url = ArchiveUrl::parse(&table(), "TAR://t.tar:a").unwrap();
        assert_eq!(url.scheme, "tar");
        assert_eq!(url.archive, PathBuf::from("t.tar"));
        assert!(ArchiveUrl::parse(&table(), "z://x.Z:y").is_ok());
    }

    #[test]
    fn member_keeps_extra_colons() {
        let url = ArchiveUrl::parse(&table(), "gz://a.tar.gz:dir/b:c:d").unwrap();
        assert_eq!(url.archive, PathBuf::from("a.tar.gz"));
        assert_eq!(url.member, "dir/b:c:d");
    }

    #[test]
    fn malformed_urls() {
        for bad in ["tar://t.tar", "zip://t.zip:a", "tar:/t.tar:a", "tar://:a", "", "ta"] {
            assert!(matches!(ArchiveUrl::parse(&table(), bad), Err(VfsError::BadUrl(_))), "{bad}");
        }
    }

    #[test]
    fn container_detection_by_extension() {
        let t = table();
        assert!(t.is_container("album.TAR"));
        assert!(t.is_container("/x/y/set.tar.gz"));
        assert!(t.is_container("old.z"));
        assert!(!t.is_container("song.mp3"));
        assert!(!t.is_container("tar"));
        assert!(!t.is_container("trailing."));
    }

    #[test]
    fn listing_scheme_falls_back_to_first() {
        let t = table();
        assert_eq!(t.scheme_for_listing(Path::new("a.xz")), Some("xz"));
        assert_eq!(t.scheme_for_listing(Path::new("a.ar")), Some("tar"));
        assert_eq!(SchemeTable::new(Vec::<&str>::new()).scheme_for_listing(Path::new("a.ar")), None);
    }
}
