#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use block_dev::{BlockDevice, RamDisk};
use chain_fs::{ChainFileSystem, OpenMode, SECTOR_SIZE};

/// 8 MiB，支持的最小设备
pub const DISK_SECTORS: usize = 8 * 1024 * 1024 / SECTOR_SIZE;
/// 8 MiB 设备上可分配给文件的块数
pub const FREE_BLOCKS: usize = 2048 - 17;

pub fn ram_disk() -> Arc<dyn BlockDevice> {
    Arc::new(RamDisk::new(DISK_SECTORS))
}

pub fn mounted() -> (Arc<dyn BlockDevice>, ChainFileSystem) {
    let dev = ram_disk();
    ChainFileSystem::format(&dev).unwrap();
    let fs = ChainFileSystem::mount(dev.clone()).unwrap();
    (dev, fs)
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 253) as u8).collect()
}

pub fn write_file(fs: &mut ChainFileSystem, name: &str, data: &[u8]) {
    let fd = fs.open(name, OpenMode::Write).unwrap();
    assert_eq!(data.len(), fs.write(fd, data).unwrap());
    fs.close(fd).unwrap();
}

/// 以`chunk`字节为单位读出整个文件
pub fn read_file(fs: &mut ChainFileSystem, name: &str, chunk: usize) -> Vec<u8> {
    let fd = fs.open(name, OpenMode::Read).unwrap();
    let mut data = Vec::new();
    let mut buf = vec![0; chunk];
    loop {
        let n = fs.read(fd, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    fs.close(fd).unwrap();
    data
}

/// 可以让传输只完成一部分的内存设备
#[derive(Debug)]
pub struct FaultyDisk {
    inner: RamDisk,
    short_reads: AtomicBool,
    short_writes: AtomicBool,
}

impl FaultyDisk {
    pub fn new(sectors: usize) -> Self {
        Self {
            inner: RamDisk::new(sectors),
            short_reads: AtomicBool::new(false),
            short_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.short_reads.store(fail, Ordering::Relaxed);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.short_writes.store(fail, Ordering::Relaxed);
    }
}

impl BlockDevice for FaultyDisk {
    fn sectors(&self) -> usize {
        self.inner.sectors()
    }

    fn read_sectors(&self, start: usize, buf: &mut [u8], count: usize) -> usize {
        if self.short_reads.load(Ordering::Relaxed) {
            return count - 1;
        }
        self.inner.read_sectors(start, buf, count)
    }

    fn write_sectors(&self, start: usize, buf: &[u8], count: usize) -> usize {
        if self.short_writes.load(Ordering::Relaxed) {
            return count - 1;
        }
        self.inner.write_sectors(start, buf, count)
    }
}
