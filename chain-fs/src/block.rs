//! 以块为单位访问块设备。
//!
//! 设备只报告实际传输的扇区数，这里把不完整的传输统一视为 [`Error::DeviceIo`]。

use alloc::sync::Arc;

use block_dev::BlockDevice;
use derive_more::{From, Into};
use vfs::Error;

use crate::{DataBlock, SECTOR_SIZE, SECTORS_PER_BLOCK};

/// 块编号。0号块恒属于服务区，因此在块链表中用作结束标记。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct BlockId(u32);

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.0 as usize
    }
}

impl BlockId {
    pub const NULL: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// 块的首个扇区号
    #[inline]
    pub fn sector(self) -> usize {
        usize::from(self) * SECTORS_PER_BLOCK
    }
}

pub fn read_sectors(
    dev: &Arc<dyn BlockDevice>,
    start: usize,
    buf: &mut [u8],
    count: usize,
) -> Result<(), Error> {
    let n = dev.read_sectors(start, buf, count);
    if n != count {
        log::error!("short read at sector {start}: {n}/{count}");
        return Err(Error::DeviceIo);
    }
    Ok(())
}

pub fn write_sectors(
    dev: &Arc<dyn BlockDevice>,
    start: usize,
    buf: &[u8],
    count: usize,
) -> Result<(), Error> {
    let n = dev.write_sectors(start, buf, count);
    if n != count {
        log::error!("short write at sector {start}: {n}/{count}");
        return Err(Error::DeviceIo);
    }
    Ok(())
}

#[inline]
pub fn read_block(
    dev: &Arc<dyn BlockDevice>,
    id: BlockId,
    buf: &mut DataBlock,
) -> Result<(), Error> {
    log::trace!("read block {id:?}");
    read_sectors(dev, id.sector(), buf, SECTORS_PER_BLOCK)
}

/// 写入块的前`sectors`个扇区
#[inline]
pub fn write_block(
    dev: &Arc<dyn BlockDevice>,
    id: BlockId,
    buf: &DataBlock,
    sectors: usize,
) -> Result<(), Error> {
    debug_assert!(sectors <= SECTORS_PER_BLOCK);
    log::trace!("write block {id:?} ({sectors} sectors)");
    write_sectors(dev, id.sector(), buf, sectors)
}

/// 读取块的首个扇区，续接块只用到这一部分
#[inline]
pub fn read_head(
    dev: &Arc<dyn BlockDevice>,
    id: BlockId,
    buf: &mut [u8; SECTOR_SIZE],
) -> Result<(), Error> {
    read_sectors(dev, id.sector(), buf, 1)
}

#[inline]
pub fn write_head(
    dev: &Arc<dyn BlockDevice>,
    id: BlockId,
    buf: &[u8; SECTOR_SIZE],
) -> Result<(), Error> {
    write_sectors(dev, id.sector(), buf, 1)
}
