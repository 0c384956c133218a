//! # 块链表
//!
//! 文件的数据块按顺序组成一条链表：
//! - 前 [`INLINE_COUNT`] 个地址存放在目录记录内；
//! - 之后每 [`CONTINUATION_COUNT`] 个地址存放在一个续接块内，
//!   续接块之间通过末尾的地址串联，首个续接块的地址存放在目录记录末尾。
//!
//! 地址为 0 即链表结束。
//!
//! [`ExtentChain`] 是只能前进的游标，同一时刻只有一个续接块驻留在内存中，
//! 游标越过它时，写模式下写回磁盘，读模式下直接丢弃。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use vfs::Error;

use crate::bitmap::BlockBitmap;
use crate::block;
use crate::layout::{CONTINUATION_COUNT, Continuation, FileRecord, INLINE_COUNT};
use crate::{BLOCK_SIZE, BlockId, SECTOR_SIZE};

/// 容纳`size`字节需要多少个块：数据块与续接块之和
pub fn blocks_for(size: usize) -> usize {
    chain_blocks(size.div_ceil(BLOCK_SIZE))
}

/// 链表上有`data`个数据块时，总共占用的块数
#[inline]
fn chain_blocks(data: usize) -> usize {
    data + data.saturating_sub(INLINE_COUNT).div_ceil(CONTINUATION_COUNT)
}

/// 链表上的位置
enum Slot {
    /// 目录记录内的第n个地址
    Inline(usize),
    /// 当前续接块内的第n个地址
    Continued(usize),
}

impl Slot {
    fn of(position: usize) -> Self {
        if position < INLINE_COUNT {
            Self::Inline(position)
        } else {
            Self::Continued((position - INLINE_COUNT) % CONTINUATION_COUNT)
        }
    }
}

/// 驻留在内存中的续接块
#[derive(Debug)]
struct Resident {
    id: BlockId,
    block: Continuation,
}

impl Resident {
    fn load(id: BlockId, dev: &Arc<dyn BlockDevice>) -> Result<Self, Error> {
        let mut sector = [0; SECTOR_SIZE];
        block::read_head(dev, id, &mut sector)?;
        Ok(Self {
            id,
            block: Continuation::decode(&sector),
        })
    }

    fn store(&self, dev: &Arc<dyn BlockDevice>) -> Result<(), Error> {
        let mut sector = [0; SECTOR_SIZE];
        self.block.encode(&mut sector);
        block::write_head(dev, self.id, &sector)
    }
}

#[derive(Debug, Default)]
pub struct ExtentChain {
    /// 下一个数据块在链表中的序号
    position: usize,
    /// 写模式下已分配的块数，含续接块
    allocated: usize,
    resident: Option<Resident>,
    /// 已读到结束标记
    finished: bool,
}

impl ExtentChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写模式下已分配的块数
    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// 读模式：取出下一个数据块的地址，链表结束时返回`None`
    pub fn next(
        &mut self,
        record: &FileRecord,
        bitmap: &BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
    ) -> Result<Option<BlockId>, Error> {
        if self.finished {
            return Ok(None);
        }

        let id = match Slot::of(self.position) {
            Slot::Inline(i) => record.extents[i],
            Slot::Continued(offset) => {
                if offset == 0 {
                    let next = self
                        .resident
                        .as_ref()
                        .map_or(record.continuation, |r| r.block.next);
                    if next.is_null() {
                        self.finished = true;
                        return Ok(None);
                    }
                    check(bitmap, next)?;
                    self.resident = Some(Resident::load(next, dev)?);
                }
                self.resident
                    .as_ref()
                    .map(|r| r.block.extents[offset])
                    .ok_or(Error::Corrupted)?
            }
        };

        if id.is_null() {
            self.finished = true;
            return Ok(None);
        }
        check(bitmap, id)?;
        self.position += 1;

        Ok(Some(id))
    }

    /// 写模式：分配一个数据块接在链表末尾，必要时先分配新的续接块。
    /// 调用者须已为这些块预留空间。
    pub fn append(
        &mut self,
        record: &mut FileRecord,
        bitmap: &mut BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
    ) -> Result<BlockId, Error> {
        let data = match Slot::of(self.position) {
            Slot::Inline(i) => {
                let data = bitmap.alloc_reserved()?;
                record.extents[i] = data;
                data
            }
            Slot::Continued(offset) => {
                if offset == 0 {
                    let id = bitmap.alloc_reserved()?;
                    if let Err(e) = self.link(record, id, dev) {
                        bitmap.cancel(id)?;
                        return Err(e);
                    }
                    self.allocated += 1;
                }

                let resident = self.resident.as_mut().ok_or(Error::Corrupted)?;
                let data = bitmap.alloc_reserved()?;
                resident.block.extents[offset] = data;
                data
            }
        };
        self.allocated += 1;
        self.position += 1;

        Ok(data)
    }

    /// 把新的续接块接在链表末尾并使其驻留。
    /// 前一个续接块须先写回成功，否则保持原状。
    fn link(
        &mut self,
        record: &mut FileRecord,
        id: BlockId,
        dev: &Arc<dyn BlockDevice>,
    ) -> Result<(), Error> {
        match &mut self.resident {
            None => record.continuation = id,
            Some(prev) => {
                prev.block.next = id;
                if let Err(e) = prev.store(dev) {
                    prev.block.next = BlockId::NULL;
                    return Err(e);
                }
            }
        }
        log::debug!(
            "{:?}: continuation block {id:?} at position {}",
            record.name,
            self.position
        );
        self.resident = Some(Resident {
            id,
            block: Continuation::default(),
        });

        Ok(())
    }

    /// 写回驻留的续接块
    pub fn persist(&self, dev: &Arc<dyn BlockDevice>) -> Result<(), Error> {
        match &self.resident {
            Some(resident) => resident.store(dev),
            None => Ok(()),
        }
    }
}

/// 遍历整条链表，收集文件占用的全部块（数据块与续接块）。
///
/// 只读取磁盘、不修改位图，发现不一致时整体失败。
pub fn collect(
    record: &FileRecord,
    bitmap: &BlockBitmap,
    dev: &Arc<dyn BlockDevice>,
) -> Result<Vec<BlockId>, Error> {
    let mut blocks = Vec::with_capacity(blocks_for(record.size));
    blocks.extend(record.extents.iter().take_while(|id| !id.is_null()));

    let mut next = record.continuation;
    while !next.is_null() {
        check(bitmap, next)?;
        let resident = Resident::load(next, dev)?;
        blocks.push(next);
        blocks.extend(
            resident
                .block
                .extents
                .iter()
                .take_while(|id| !id.is_null()),
        );
        next = resident.block.next;

        // 成环的链表
        if blocks.len() > bitmap.capacity() {
            log::error!("{:?}: extent chain does not terminate", record.name);
            return Err(Error::Corrupted);
        }
    }

    if let Some(&id) = blocks.iter().find(|&&id| !bitmap.is_file_block(id)) {
        log::error!("{:?}: block {id:?} is not allocated", record.name);
        return Err(Error::Corrupted);
    }

    let mut sorted = blocks.clone();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        log::error!("{:?}: block shared within the chain", record.name);
        return Err(Error::Corrupted);
    }

    if blocks.len() != blocks_for(record.size) {
        log::warn!(
            "{:?}: {} bytes but {} blocks in chain",
            record.name,
            record.size,
            blocks.len()
        );
    }

    Ok(blocks)
}

fn check(bitmap: &BlockBitmap, id: BlockId) -> Result<(), Error> {
    if bitmap.is_file_block(id) {
        Ok(())
    } else {
        log::error!("extent points at unallocated block {id:?}");
        Err(Error::Corrupted)
    }
}
