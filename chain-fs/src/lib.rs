#![no_std]

extern crate alloc;

/* chain-fs 的整体架构，自上而下 */

// 控制层：挂载、文件描述符与对外接口
mod control;

// 打开文件层：按块缓冲的顺序读写
mod file;

// 块链表层：文件的块地址序列
mod extent;

// 目录表与块位图
mod bitmap;
mod directory;
mod index;

// 磁盘数据结构层：记录与续接块的编解码
pub mod layout;

// 块设备访问
mod block;

pub use block_dev::{BlockDevice, SECTOR_SIZE};
pub use vfs::{DirEntry, Error, Stat};

pub use self::{
    block::BlockId,
    control::{ChainFileSystem, Fd, Finder, OpenMode},
    extent::blocks_for,
    index::{IndexError, IndexManager},
    layout::Geometry,
};

/// 一个块包含的扇区数
pub const SECTORS_PER_BLOCK: usize = 8;
pub const BLOCK_SIZE: usize = SECTORS_PER_BLOCK * SECTOR_SIZE;

/// 目录表的记录数，即文件数上限
pub const DIR_ENTRIES_MAX: usize = 128;
/// 同时打开的文件数上限
pub const OPEN_FILES_MAX: usize = 8;
/// 文件名的最大字节数（不含结尾的`\0`）
pub const NAME_MAX_LEN: usize = 28;

pub const DEVICE_SIZE_MIN: usize = 8 * 1024 * 1024;
pub const DEVICE_SIZE_MAX: usize = 1024 * 1024 * 1024;
/// 文件大小须小于 1 GiB
pub const FILE_SIZE_MAX: usize = 1024 * 1024 * 1024 - 1;

type DataBlock = [u8; BLOCK_SIZE];
