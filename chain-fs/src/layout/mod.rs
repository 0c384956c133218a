//! # 磁盘数据结构层
//!
//! chain-fs 的磁盘布局：
//! 目录表(128个扇区) | 块位图(每块一字节，按扇区对齐) | 数据块
//!
//! 目录表与块位图合称服务区，其大小只取决于设备容量，
//! 格式化与挂载时按同样的方式计算。
//! 所有整数均以小端序存放。

mod continuation;
mod record;

use core::ops::Range;

use vfs::Error;

pub use self::{
    continuation::{CONTINUATION_COUNT, Continuation},
    record::{DirSlot, FileName, FileRecord, INLINE_COUNT},
};
use crate::{
    DEVICE_SIZE_MAX, DEVICE_SIZE_MIN, DIR_ENTRIES_MAX, SECTOR_SIZE, SECTORS_PER_BLOCK,
};

/// 一个扇区能容纳多少个块地址
pub const ADDRESSES_PER_SECTOR: usize = SECTOR_SIZE / 4;

/// 服务区的尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    sectors: usize,
    blocks: usize,
    service_sectors: usize,
    service_blocks: usize,
}

impl Geometry {
    pub fn new(sectors: usize) -> Result<Self, Error> {
        let bytes = sectors.saturating_mul(SECTOR_SIZE);
        if !(DEVICE_SIZE_MIN..=DEVICE_SIZE_MAX).contains(&bytes) {
            log::error!("device of {bytes} bytes is out of range");
            return Err(Error::InvalidDevice);
        }

        let blocks = sectors / SECTORS_PER_BLOCK;
        let service_sectors = DIR_ENTRIES_MAX + blocks.div_ceil(SECTOR_SIZE);
        Ok(Self {
            sectors,
            blocks,
            service_sectors,
            service_blocks: service_sectors.div_ceil(SECTORS_PER_BLOCK),
        })
    }

    #[inline]
    pub fn sectors(&self) -> usize {
        self.sectors
    }

    /// 设备的总块数
    #[inline]
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    #[inline]
    pub fn service_sectors(&self) -> usize {
        self.service_sectors
    }

    /// 服务区所占的块数，这些块永远不会分配给文件
    #[inline]
    pub fn service_blocks(&self) -> usize {
        self.service_blocks
    }

    /// 服务区的字节数
    #[inline]
    pub fn service_bytes(&self) -> usize {
        self.service_sectors * SECTOR_SIZE
    }

    /// 目录表在服务区内的字节范围
    #[inline]
    pub fn directory_range(&self) -> Range<usize> {
        0..DIR_ENTRIES_MAX * SECTOR_SIZE
    }

    /// 块位图在服务区内的字节范围
    #[inline]
    pub fn bitmap_range(&self) -> Range<usize> {
        DIR_ENTRIES_MAX * SECTOR_SIZE..self.service_bytes()
    }
}

#[inline]
fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
