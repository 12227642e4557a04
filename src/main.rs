use archive_vfs::{ArchiveVfs, MemberHandle, VfsConfig, Whence};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arcvfs", about = "Seekable access to files inside archives")]
struct Cli {
    /// JSON configuration file (archive.formats, archive.filters, ring_capacity)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Look-back ring size in bytes (overrides the config file)
    #[arg(long, global = true)]
    ring: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the registered URL schemes
    Schemes,
    /// List archive members as URLs
    Ls {
        archive: PathBuf,
        /// Also print member sizes
        #[arg(short, long)]
        long: bool,
    },
    /// Write member bytes to stdout
    Cat {
        url: String,
        /// Start offset within the member
        #[arg(short, long, default_value = "0")]
        offset: u64,
        /// Number of bytes to copy (default: to end of member)
        #[arg(short = 'n', long)]
        length: Option<u64>,
    },
    /// BLAKE3 hash of a member's content
    Hash {
        url: String,
    },
    /// Show member metadata
    Info {
        url: String,
    },
}

const COPY_CHUNK: usize = 64 * 1024;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VfsConfig::load(path)?,
        None       => VfsConfig::default(),
    };
    if let Some(ring) = cli.ring {
        config.ring_capacity = ring;
    }
    let vfs = ArchiveVfs::new(config);

    match cli.command {

        // ── Schemes ──────────────────────────────────────────────────────────
        Commands::Schemes => {
            for scheme in vfs.get_schemes() {
                println!("{scheme}");
            }
        }

        // ── Ls ───────────────────────────────────────────────────────────────
        Commands::Ls { archive, long } => {
            if long {
                for entry in vfs.list(&archive)? {
                    println!("{:>12}  {}", entry.size, entry.pathname_lossy());
                }
            } else {
                for url in vfs.scandir(&archive)? {
                    println!("{url}");
                }
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { url, offset, length } => {
            let mut handle = vfs.open(&url)?;
            let offset = i64::try_from(offset)?;
            handle.seek(offset, Whence::Set)?;
            let mut stdout = io::stdout().lock();
            copy_out(&mut handle, length, |chunk| stdout.write_all(chunk))?;
            stdout.flush()?;
        }

        // ── Hash ─────────────────────────────────────────────────────────────
        Commands::Hash { url } => {
            let mut handle = vfs.open(&url)?;
            let mut hasher = blake3::Hasher::new();
            let copied = copy_out(&mut handle, None, |chunk| {
                hasher.update(chunk);
                Ok(())
            })?;
            if copied != handle.length() {
                eprintln!("warning: member ended after {copied} of {} bytes", handle.length());
            }
            println!("{}  {url}", hex::encode(hasher.finalize().as_bytes()));
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { url } => {
            let handle = vfs.open(&url)?;
            println!("── Archive member ───────────────────────────────────────");
            println!("  Archive        {}", handle.archive_path().display());
            println!("  Member         {}", handle.member_name());
            println!("  Size           {} B", handle.length());
            println!("  Ring capacity  {} B", handle.ring().capacity());
            println!("  Streaming      {}", handle.is_streaming());
            handle.close();
        }
    }
    Ok(())
}

/// Feed up to `limit` bytes from the cursor to `sink`; returns the count.
fn copy_out(
    handle: &mut MemberHandle,
    limit:  Option<u64>,
    mut sink: impl FnMut(&[u8]) -> io::Result<()>,
) -> io::Result<u64> {
    let mut left = limit.unwrap_or(u64::MAX);
    let mut buf  = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    while left > 0 {
        let want = usize::try_from(left).map_or(COPY_CHUNK, |n| n.min(COPY_CHUNK));
        let n = handle.read(&mut buf[..want]);
        if n == 0 {
            break;
        }
        sink(&buf[..n])?;
        total += n as u64;
        left  -= n as u64;
    }
    Ok(total)
}
