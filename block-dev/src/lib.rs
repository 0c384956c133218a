//! # 块设备接口层
//!
//! 块设备以**扇区**为单位存储数据，[`BlockDevice`] 是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 读写接口返回实际传输的扇区数，由上层决定如何对待不完整的传输。

#![no_std]

extern crate alloc;

mod ram;

use core::any::Any;
use core::fmt::Debug;

pub use self::ram::RamDisk;

/// 扇区大小，设备的最小传输单位
pub const SECTOR_SIZE: usize = 512;

/// 块设备驱动特质
pub trait BlockDevice: Debug + Send + Sync + Any {
    /// 设备的扇区总数，在设备生命周期内不变
    fn sectors(&self) -> usize;

    /// 从`start`号扇区起读出`count`个扇区至`buf`，返回实际读出的扇区数
    fn read_sectors(&self, start: usize, buf: &mut [u8], count: usize) -> usize;

    /// 将`buf`的前`count`个扇区写至`start`号扇区起，返回实际写入的扇区数
    fn write_sectors(&self, start: usize, buf: &[u8], count: usize) -> usize;
}
