//! Host-facing virtual filesystem surface.
//!
//! [`ArchiveVfs`] bundles the immutable scheme table, the configuration and
//! a session factory.  It parses URLs and lists archives; everything after
//! `open` is the [`MemberHandle`]'s business.

use std::path::Path;

use log::debug;

use crate::config::VfsConfig;
use crate::container::EntryInfo;
use crate::error::Result;
use crate::handle::MemberHandle;
use crate::scheme::{ArchiveUrl, SchemeTable};
use crate::session::{ArchiveOpener, SessionFactory};

#[derive(Debug, Clone)]
pub struct ArchiveVfs<F = ArchiveOpener> {
    schemes: SchemeTable,
    config:  VfsConfig,
    opener:  F,
}

impl ArchiveVfs<ArchiveOpener> {
    pub fn new(config: VfsConfig) -> Self {
        Self::with_opener(config, ArchiveOpener)
    }

    /// Every entry of `archive` as a member URL, in stored order.
    pub fn scandir(&self, archive: &Path) -> Result<Vec<String>> {
        let entries = self.opener.list(archive)?;
        let scheme  = self.schemes.scheme_for_listing(archive).unwrap_or_default();
        debug!("{}: {} entries", archive.display(), entries.len());
        Ok(entries
            .iter()
            .map(|entry| member_url(scheme, archive, entry))
            .collect())
    }

    pub fn list(&self, archive: &Path) -> Result<Vec<EntryInfo>> {
        self.opener.list(archive)
    }
}

impl Default for ArchiveVfs<ArchiveOpener> {
    fn default() -> Self {
        Self::new(VfsConfig::default())
    }
}

impl<F: SessionFactory + Clone> ArchiveVfs<F> {
    pub fn with_opener(config: VfsConfig, opener: F) -> Self {
        Self { schemes: SchemeTable::from_config(&config), config, opener }
    }

    pub fn schemes(&self) -> &SchemeTable {
        &self.schemes
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Registered schemes as `"<ext>://"` strings.
    pub fn get_schemes(&self) -> Vec<String> {
        self.schemes.schemes()
    }

    pub fn parse_url(&self, url: &str) -> Result<ArchiveUrl> {
        ArchiveUrl::parse(&self.schemes, url)
    }

    /// Open the member named by `url`.
    pub fn open(&self, url: &str) -> Result<MemberHandle<F>> {
        let parsed = self.parse_url(url)?;
        debug!("open {url}");
        MemberHandle::open(self.opener.clone(), parsed.archive, parsed.member, self.config.ring_capacity)
    }

    pub fn is_container(&self, fname: &str) -> bool {
        self.schemes.is_container(fname)
    }

    /// Handles from this VFS always support seeking.
    pub fn is_streaming(&self, _url: &str) -> bool {
        false
    }
}

fn member_url(scheme: &str, archive: &Path, entry: &EntryInfo) -> String {
    format!("{scheme}://{}:{}", archive.display(), entry.pathname_lossy())
}
