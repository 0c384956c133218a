use alloc::string::String;

use vfs::Error;

use super::{get_u32, put_u32};
use crate::{BlockId, FILE_SIZE_MAX, NAME_MAX_LEN, SECTOR_SIZE};

/*
 * 目录记录占一个扇区：
 *
 * | 偏移 | 长度 | 字段                          |
 * | 0    | 4    | 文件大小(i32)，负数表示空槽位 |
 * | 4    | 29   | 文件名，以\0结尾              |
 * | 33   | 3    | 填充                          |
 * | 36   | 472  | 内联块地址                    |
 * | 508  | 4    | 首个续接块的地址              |
 */

const SIZE_OFFSET: usize = 0;
const NAME_OFFSET: usize = 4;
const NAME_FIELD_LEN: usize = NAME_MAX_LEN + 1;
const EXTENTS_OFFSET: usize = (NAME_OFFSET + NAME_FIELD_LEN).next_multiple_of(4);
const CONTINUATION_OFFSET: usize = SECTOR_SIZE - 4;

/// 记录内联的块地址个数。
/// 记录末尾留出一个地址的位置指向首个续接块，与续接块自身的布局一致。
pub const INLINE_COUNT: usize = (CONTINUATION_OFFSET - EXTENTS_OFFSET) / 4;

/// 空槽位的文件大小
const ABSENT: i32 = -1;

/// 文件名：1 至 [`NAME_MAX_LEN`] 字节，不含`\0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName(String);

impl FileName {
    pub fn new(name: &str) -> Result<Self, Error> {
        if name.is_empty() || name.len() > NAME_MAX_LEN || name.contains('\0') {
            return Err(Error::InvalidName);
        }
        Ok(Self(name.into()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn decode(field: &[u8]) -> Result<Self, Error> {
        let len = field
            .iter()
            .position(|&c| c == 0)
            .ok_or(Error::Corrupted)?;
        let name = core::str::from_utf8(&field[..len]).map_err(|_| Error::Corrupted)?;
        Self::new(name).map_err(|_| Error::Corrupted)
    }

    fn encode(&self, field: &mut [u8]) {
        let bytes = self.0.as_bytes();
        field.fill(0);
        field[..bytes.len()].copy_from_slice(bytes);
    }
}

/// 在用的目录记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: FileName,
    pub size: usize,
    /// 前 [`INLINE_COUNT`] 个数据块的地址，0 表示链表结束
    pub extents: [BlockId; INLINE_COUNT],
    /// 首个续接块
    pub continuation: BlockId,
}

impl FileRecord {
    pub fn new(name: FileName) -> Self {
        Self {
            name,
            size: 0,
            extents: [BlockId::NULL; INLINE_COUNT],
            continuation: BlockId::NULL,
        }
    }
}

/// 目录表的槽位
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DirSlot {
    #[default]
    Empty,
    Occupied(FileRecord),
}

impl DirSlot {
    pub fn decode(sector: &[u8; SECTOR_SIZE]) -> Result<Self, Error> {
        let size = get_u32(sector, SIZE_OFFSET) as i32;
        if size < 0 {
            return Ok(Self::Empty);
        }

        let size = size as usize;
        if size > FILE_SIZE_MAX {
            log::error!("file size {size} exceeds the limit");
            return Err(Error::Corrupted);
        }

        let name = FileName::decode(&sector[NAME_OFFSET..NAME_OFFSET + NAME_FIELD_LEN])?;
        let mut extents = [BlockId::NULL; INLINE_COUNT];
        for (i, id) in extents.iter_mut().enumerate() {
            *id = get_u32(sector, EXTENTS_OFFSET + i * 4).into();
        }

        Ok(Self::Occupied(FileRecord {
            name,
            size,
            extents,
            continuation: get_u32(sector, CONTINUATION_OFFSET).into(),
        }))
    }

    pub fn encode(&self, sector: &mut [u8; SECTOR_SIZE]) {
        sector.fill(0);

        let Self::Occupied(record) = self else {
            put_u32(sector, SIZE_OFFSET, ABSENT as u32);
            return;
        };

        put_u32(sector, SIZE_OFFSET, record.size as u32);
        record
            .name
            .encode(&mut sector[NAME_OFFSET..NAME_OFFSET + NAME_FIELD_LEN]);
        for (i, &id) in record.extents.iter().enumerate() {
            put_u32(sector, EXTENTS_OFFSET + i * 4, id.into());
        }
        put_u32(sector, CONTINUATION_OFFSET, record.continuation.into());
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        matches!(self, Self::Occupied(_))
    }

    #[inline]
    pub fn record(&self) -> Option<&FileRecord> {
        match self {
            Self::Occupied(record) => Some(record),
            Self::Empty => None,
        }
    }

    #[inline]
    pub fn record_mut(&mut self) -> Option<&mut FileRecord> {
        match self {
            Self::Occupied(record) => Some(record),
            Self::Empty => None,
        }
    }
}
