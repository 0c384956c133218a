use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use vfs::Error;

use crate::bitmap::BlockBitmap;
use crate::extent;
use crate::index::IndexManager;
use crate::layout::{DirSlot, FileName, FileRecord};
use crate::{DIR_ENTRIES_MAX, SECTOR_SIZE};

/// 目录表：固定 [`DIR_ENTRIES_MAX`] 个槽位的平坦命名空间
#[derive(Debug)]
pub struct DirectoryTable {
    slots: Vec<DirSlot>,
    /// 由槽位状态推导，不落盘
    index: IndexManager,
}

impl DirectoryTable {
    pub fn format() -> Self {
        Self {
            slots: (0..DIR_ENTRIES_MAX).map(|_| DirSlot::Empty).collect(),
            index: IndexManager::new(DIR_ENTRIES_MAX),
        }
    }

    /// 从服务区开头的 [`DIR_ENTRIES_MAX`] 个扇区解析目录表
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let slots = bytes
            .chunks_exact(SECTOR_SIZE)
            .take(DIR_ENTRIES_MAX)
            .enumerate()
            .map(|(i, sector)| {
                let sector: &[u8; SECTOR_SIZE] =
                    sector.try_into().map_err(|_| Error::Corrupted)?;
                DirSlot::decode(sector).inspect_err(|_| log::error!("bad directory slot {i}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if slots.len() != DIR_ENTRIES_MAX {
            return Err(Error::Corrupted);
        }

        let mut names: Vec<&str> = slots
            .iter()
            .filter_map(DirSlot::record)
            .map(|record| record.name.as_str())
            .collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            log::error!("duplicate file names in directory");
            return Err(Error::Corrupted);
        }

        let index = IndexManager::from_used(slots.iter().map(DirSlot::is_occupied).collect());
        Ok(Self { slots, index })
    }

    pub fn encode(&self, bytes: &mut [u8]) {
        for (slot, sector) in self.slots.iter().zip(bytes.chunks_exact_mut(SECTOR_SIZE)) {
            if let Ok(sector) = <&mut [u8; SECTOR_SIZE]>::try_from(sector) {
                slot.encode(sector);
            }
        }
    }

    /// 在用的文件数
    #[inline]
    pub fn len(&self) -> usize {
        self.index.capacity() - self.index.free()
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.record().is_some_and(|r| r.name.as_str() == name))
    }

    pub fn record(&self, slot: usize) -> Result<&FileRecord, Error> {
        self.slots
            .get(slot)
            .and_then(DirSlot::record)
            .ok_or(Error::Corrupted)
    }

    pub fn record_mut(&mut self, slot: usize) -> Result<&mut FileRecord, Error> {
        self.slots
            .get_mut(slot)
            .and_then(DirSlot::record_mut)
            .ok_or(Error::Corrupted)
    }

    /// 在最小的空闲槽位上创建空文件
    pub fn create(&mut self, name: FileName) -> Result<usize, Error> {
        let slot = self.index.acquire().map_err(|_| Error::DirectoryFull)?;
        log::debug!("create {name:?} in slot {slot}");
        self.slots[slot] = DirSlot::Occupied(FileRecord::new(name));
        Ok(slot)
    }

    /// 删除文件，释放它占用的全部块，返回释放的块数
    pub fn remove(
        &mut self,
        slot: usize,
        bitmap: &mut BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
    ) -> Result<usize, Error> {
        let blocks = extent::collect(self.record(slot)?, bitmap, dev)?;
        for &id in &blocks {
            bitmap.dealloc(id)?;
        }

        self.slots[slot] = DirSlot::Empty;
        self.index.release(slot).map_err(|_| Error::Corrupted)?;
        log::debug!("removed slot {slot}, {} blocks freed", blocks.len());

        Ok(blocks.len())
    }

    /// 从`from`号槽位起的第一个文件
    pub fn next_occupied(&self, from: usize) -> Option<(usize, &FileRecord)> {
        self.slots
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, slot)| slot.record().map(|record| (i, record)))
    }
}
