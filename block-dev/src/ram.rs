use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, SECTOR_SIZE};

/// 内存上的块设备，越界部分的传输会被截断
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; sectors * SECTOR_SIZE]),
        }
    }

    /// 以字节计的容量
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.lock().len()
    }

    /// 复制设备的全部内容
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// 可传输的扇区数：受设备末尾与缓冲区长度两者限制
    fn clamp(&self, start: usize, buf_len: usize, count: usize) -> usize {
        self.sectors()
            .saturating_sub(start)
            .min(count)
            .min(buf_len / SECTOR_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn sectors(&self) -> usize {
        self.data.lock().len() / SECTOR_SIZE
    }

    fn read_sectors(&self, start: usize, buf: &mut [u8], count: usize) -> usize {
        let n = self.clamp(start, buf.len(), count);
        let data = self.data.lock();
        let offset = start * SECTOR_SIZE;
        buf[..n * SECTOR_SIZE].copy_from_slice(&data[offset..offset + n * SECTOR_SIZE]);
        n
    }

    fn write_sectors(&self, start: usize, buf: &[u8], count: usize) -> usize {
        let n = self.clamp(start, buf.len(), count);
        let mut data = self.data.lock();
        let offset = start * SECTOR_SIZE;
        data[offset..offset + n * SECTOR_SIZE].copy_from_slice(&buf[..n * SECTOR_SIZE]);
        n
    }
}
