use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BlockDevice, SECTOR_SIZE};
use send_wrapper::SendWrapper;

/// 以宿主机上的镜像文件作为块设备，容量取自打开时的文件长度
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    sectors: usize,
}

impl BlockFile {
    pub fn new(fd: File) -> io::Result<Self> {
        let sectors = fd.metadata()?.len() as usize / SECTOR_SIZE;
        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            sectors,
        })
    }

    fn clamp(&self, start: usize, buf_len: usize, count: usize) -> usize {
        self.sectors
            .saturating_sub(start)
            .min(count)
            .min(buf_len / SECTOR_SIZE)
    }
}

impl BlockDevice for BlockFile {
    fn sectors(&self) -> usize {
        self.sectors
    }

    fn read_sectors(&self, start: usize, buf: &mut [u8], count: usize) -> usize {
        let n = self.clamp(start, buf.len(), count);
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((start * SECTOR_SIZE) as u64))
            .and_then(|_| file.read_exact(&mut buf[..n * SECTOR_SIZE]))
            .map_or_else(
                |e| {
                    log::error!("reading sector {start}: {e}");
                    0
                },
                |()| n,
            )
    }

    fn write_sectors(&self, start: usize, buf: &[u8], count: usize) -> usize {
        let n = self.clamp(start, buf.len(), count);
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((start * SECTOR_SIZE) as u64))
            .and_then(|_| file.write_all(&buf[..n * SECTOR_SIZE]))
            .map_or_else(
                |e| {
                    log::error!("writing sector {start}: {e}");
                    0
                },
                |()| n,
            )
    }
}
