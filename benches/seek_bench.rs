use archive_vfs::{ArchiveVfs, VfsConfig, Whence};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Write;
use tempfile::NamedTempFile;

const MEMBER_LEN: usize = 1024 * 1024;

fn gzipped_tar(data: &[u8]) -> NamedTempFile {
    use flate2::{write::GzEncoder, Compression};
    let mut builder = tar::Builder::new(Vec::new());
    let mut header  = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, "bench.wav", data).unwrap();

    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(&builder.into_inner().unwrap()).unwrap();
    let mut f = tempfile::Builder::new().suffix(".tar.gz").tempfile().unwrap();
    f.write_all(&enc.finish().unwrap()).unwrap();
    f
}

fn bench_seek_patterns(c: &mut Criterion) {
    let data: Vec<u8> = (0..MEMBER_LEN).map(|i| (i % 251) as u8).collect();
    let file = gzipped_tar(&data);
    let url  = format!("gz://{}:bench.wav", file.path().display());
    let vfs  = ArchiveVfs::new(VfsConfig::default());

    // Decoder-style probing: read a frame, step back a little, read again.
    c.bench_function("ring_local_backstep_1mb", |b| {
        b.iter(|| {
            let mut h   = vfs.open(&url).unwrap();
            let mut buf = [0u8; 1024];
            while h.read(&mut buf) == buf.len() {
                h.seek(-512, Whence::Cur).unwrap();
                h.read(&mut buf[..512]);
            }
            black_box(h.tell())
        })
    });

    // Tail read then jump back to the start: one full replay per iteration.
    c.bench_function("replay_backward_seek_1mb", |b| {
        b.iter(|| {
            let mut h   = vfs.open(&url).unwrap();
            let mut buf = [0u8; 128];
            h.seek(-128, Whence::End).unwrap();
            h.read(&mut buf);
            h.seek(0, Whence::Set).unwrap();
            h.read(&mut buf);
            black_box(buf[0])
        })
    });
}

criterion_group!(benches, bench_seek_patterns);
criterion_main!(benches);
