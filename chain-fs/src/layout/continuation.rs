use super::{ADDRESSES_PER_SECTOR, get_u32, put_u32};
use crate::{BlockId, SECTOR_SIZE};

/// 续接块可存放的块地址个数，最后一个位置留给下一个续接块的地址
pub const CONTINUATION_COUNT: usize = ADDRESSES_PER_SECTOR - 1;

const NEXT_OFFSET: usize = CONTINUATION_COUNT * 4;

/// 续接块：内联地址用尽后，文件的块地址存放在一串续接块中。
///
/// 续接块占用一整个块，但只使用首个扇区：
/// [`CONTINUATION_COUNT`] 个块地址，随后是下一个续接块的地址，0 表示链表结束。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub extents: [BlockId; CONTINUATION_COUNT],
    pub next: BlockId,
}

impl Default for Continuation {
    fn default() -> Self {
        Self {
            extents: [BlockId::NULL; CONTINUATION_COUNT],
            next: BlockId::NULL,
        }
    }
}

impl Continuation {
    pub fn decode(sector: &[u8; SECTOR_SIZE]) -> Self {
        let mut extents = [BlockId::NULL; CONTINUATION_COUNT];
        for (i, id) in extents.iter_mut().enumerate() {
            *id = get_u32(sector, i * 4).into();
        }

        Self {
            extents,
            next: get_u32(sector, NEXT_OFFSET).into(),
        }
    }

    pub fn encode(&self, sector: &mut [u8; SECTOR_SIZE]) {
        for (i, &id) in self.extents.iter().enumerate() {
            put_u32(sector, i * 4, id.into());
        }
        put_u32(sector, NEXT_OFFSET, self.next.into());
    }
}
