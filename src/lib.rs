pub mod error;
pub mod ring;
pub mod filter;
pub mod container;
pub mod session;
pub mod handle;
pub mod scheme;
pub mod config;
pub mod vfs;

pub use error::{Result, VfsError};
pub use ring::{LookbackRing, DEFAULT_RING_CAPACITY};
pub use filter::FilterId;
pub use container::{ContainerKind, EntryInfo};
pub use session::{ArchiveOpener, ArchiveSession, Session, SessionFactory};
pub use handle::{MemberHandle, Whence};
pub use scheme::{ArchiveUrl, SchemeTable};
pub use config::VfsConfig;
pub use vfs::ArchiveVfs;
