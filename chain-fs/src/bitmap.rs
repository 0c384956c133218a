use alloc::vec::Vec;

use vfs::Error;

use crate::index::{IndexError, IndexManager};
use crate::BlockId;

/// 块位图：每个块占一字节，0 表示空闲，1 表示已用。
///
/// 服务区的块在格式化时被永久标记为已用，因此0号块不会分配给文件。
/// 预留的块已从可用数中扣除，但尚未分配，
/// 多块写入先一次预留全部所需，之后的分配不会失败。
#[derive(Debug)]
pub struct BlockBitmap {
    blocks: IndexManager,
    /// 服务区占用的块数
    service_blocks: usize,
    /// 已预留未分配的块数
    reserved: usize,
}

impl BlockBitmap {
    pub fn format(block_count: usize, service_blocks: usize) -> Self {
        let used = (0..block_count).map(|id| id < service_blocks).collect();
        Self {
            blocks: IndexManager::from_used(used),
            service_blocks,
            reserved: 0,
        }
    }

    /// 从磁盘上的位图区域解析，`bytes`至少包含`block_count`个字节
    pub fn decode(
        bytes: &[u8],
        block_count: usize,
        service_blocks: usize,
    ) -> Result<Self, Error> {
        let used: Vec<bool> = bytes[..block_count].iter().map(|&b| b != 0).collect();

        if let Some(id) = used[..service_blocks].iter().position(|&used| !used) {
            log::error!("service block {id} is marked free");
            return Err(Error::Corrupted);
        }

        Ok(Self {
            blocks: IndexManager::from_used(used),
            service_blocks,
            reserved: 0,
        })
    }

    pub fn encode(&self, bytes: &mut [u8]) {
        for (byte, &used) in bytes.iter_mut().zip(self.blocks.as_slice()) {
            *byte = used as u8;
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks.capacity()
    }

    /// 可供预留或分配的块数
    #[inline]
    pub fn available(&self) -> usize {
        self.blocks.free() - self.reserved
    }

    /// 编号是否指向一个已分配给文件的块
    pub fn is_file_block(&self, id: BlockId) -> bool {
        let id = usize::from(id);
        id >= self.service_blocks && self.blocks.is_used(id)
    }

    pub fn reserve(&mut self, count: usize) -> Result<(), Error> {
        if count > self.available() {
            log::debug!("cannot reserve {count} blocks, {} available", self.available());
            return Err(Error::NoSpace);
        }
        self.reserved += count;
        Ok(())
    }

    /// 归还未用到的预留，归还的数目不能超过尚存的预留
    pub fn unreserve(&mut self, count: usize) -> Result<(), Error> {
        if count > self.reserved {
            log::error!("unreserve {count} blocks, only {} reserved", self.reserved);
            return Err(Error::Corrupted);
        }
        self.reserved -= count;
        Ok(())
    }

    /// 将一个预留转化为实际分配的块
    pub fn alloc_reserved(&mut self) -> Result<BlockId, Error> {
        if self.reserved == 0 {
            log::error!("allocation without reservation");
            return Err(Error::NoSpace);
        }
        let id = self.blocks.acquire().map_err(|_| {
            log::error!("bitmap exhausted while {} blocks are reserved", self.reserved);
            Error::Corrupted
        })?;
        self.reserved -= 1;
        Ok(BlockId::new(id as u32))
    }

    /// 撤销一次 [`BlockBitmap::alloc_reserved`]，块重新回到预留中
    pub fn cancel(&mut self, id: BlockId) -> Result<(), Error> {
        self.dealloc(id)?;
        self.reserved += 1;
        Ok(())
    }

    pub fn dealloc(&mut self, id: BlockId) -> Result<(), Error> {
        if usize::from(id) < self.service_blocks {
            log::error!("attempt to free service block {id:?}");
            return Err(Error::Corrupted);
        }
        self.blocks.release(id.into()).map_err(|e| {
            debug_assert_eq!(e, IndexError::InvalidRelease);
            log::error!("double free of block {id:?}");
            Error::Corrupted
        })
    }
}
