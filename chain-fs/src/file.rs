//! # 打开文件层
//!
//! 每个文件描述符对应一个 [`OpenFile`]，持有一个块大小的缓冲区：
//! - 读：缓冲区耗尽时沿块链表取下一个块；
//! - 写：缓冲区恰好写满时追加一个新块写入，关闭时写出剩余部分。
//!
//! 打开文件只记录目录槽位，目录记录由控制层在每次调用时借出。

use alloc::boxed::Box;
use alloc::sync::Arc;

use block_dev::BlockDevice;
use vfs::Error;

use crate::bitmap::BlockBitmap;
use crate::block;
use crate::extent::{self, ExtentChain};
use crate::layout::FileRecord;
use crate::{BLOCK_SIZE, DataBlock, FILE_SIZE_MAX, SECTOR_SIZE, SECTORS_PER_BLOCK};

#[derive(Debug)]
pub enum OpenFile {
    Read(FileReader),
    Write(FileWriter),
}

impl OpenFile {
    /// 目标文件所在的目录槽位
    #[inline]
    pub fn slot(&self) -> usize {
        match self {
            Self::Read(reader) => reader.slot(),
            Self::Write(writer) => writer.slot(),
        }
    }

    #[inline]
    pub fn is_writer(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

#[derive(Debug)]
pub struct FileReader {
    slot: usize,
    buffer: Box<DataBlock>,
    /// 缓冲区内下一个未读字节的位置，等于 [`BLOCK_SIZE`] 时须读入新块
    cursor: usize,
    /// 文件剩余未读的字节数
    remaining: usize,
    chain: ExtentChain,
}

impl FileReader {
    pub fn new(slot: usize, record: &FileRecord) -> Self {
        Self {
            slot,
            buffer: Box::new([0; BLOCK_SIZE]),
            cursor: BLOCK_SIZE,
            remaining: record.size,
            chain: ExtentChain::new(),
        }
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// 读出至多`buf.len()`字节，超出文件剩余部分的请求会被截断
    pub fn read(
        &mut self,
        record: &FileRecord,
        bitmap: &BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let len = buf.len().min(self.remaining);

        let mut read_size = 0;
        while read_size < len {
            if self.cursor == BLOCK_SIZE {
                let Some(id) = self.chain.next(record, bitmap, dev)? else {
                    log::error!(
                        "{:?}: extent chain ends with {} bytes unread",
                        record.name,
                        self.remaining
                    );
                    return Err(Error::Corrupted);
                };
                block::read_block(dev, id, &mut self.buffer)?;
                self.cursor = 0;
            }

            let n = (len - read_size).min(BLOCK_SIZE - self.cursor);
            buf[read_size..read_size + n]
                .copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
            self.cursor += n;
            self.remaining -= n;
            read_size += n;
        }

        Ok(read_size)
    }
}

#[derive(Debug)]
pub struct FileWriter {
    slot: usize,
    buffer: Box<DataBlock>,
    /// 缓冲区内已写入的字节数
    cursor: usize,
    /// 自打开以来写入的字节数
    written: usize,
    /// 已确定写到磁盘上的字节数
    flushed: usize,
    /// 句柄持有、尚未分配的预留块数
    reserved: usize,
    /// 写出失败过，之后的写入一律拒绝
    failed: bool,
    chain: ExtentChain,
}

impl FileWriter {
    /// 写入总是从空文件开始
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            buffer: Box::new([0; BLOCK_SIZE]),
            cursor: 0,
            written: 0,
            flushed: 0,
            reserved: 0,
            failed: false,
            chain: ExtentChain::new(),
        }
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// 写入`buf`的全部内容。
    /// 所需的块（含关闭时写出的末块）在改动任何状态之前一次性预留，空间不足时什么也不做。
    pub fn write(
        &mut self,
        record: &mut FileRecord,
        bitmap: &mut BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
        buf: &[u8],
    ) -> Result<usize, Error> {
        if self.failed {
            return Err(Error::DeviceIo);
        }
        let total = self.written + buf.len();
        if total > FILE_SIZE_MAX {
            return Err(Error::FileTooLarge);
        }
        let needed = extent::blocks_for(total) - extent::blocks_for(self.written);
        bitmap.reserve(needed)?;
        self.reserved += needed;

        let mut written_size = 0;
        while written_size < buf.len() {
            let n = (buf.len() - written_size).min(BLOCK_SIZE - self.cursor);
            self.buffer[self.cursor..self.cursor + n]
                .copy_from_slice(&buf[written_size..written_size + n]);
            self.cursor += n;
            self.written += n;
            written_size += n;
            record.size = self.written;

            if self.cursor == BLOCK_SIZE {
                self.cursor = 0;
                self.flush(record, bitmap, dev, SECTORS_PER_BLOCK)?;
            }
        }

        Ok(written_size)
    }

    /// 写出未满的末块（按扇区向上取整），并写回驻留的续接块。
    ///
    /// 无论成败，句柄剩余的预留都会归还，驻留的续接块也会尝试写回，
    /// 使磁盘上的链表包含已分配的每一个块。
    /// 写出失败过的文件只保留确定落盘的部分。
    pub fn close(
        &mut self,
        record: &mut FileRecord,
        bitmap: &mut BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
    ) -> Result<(), Error> {
        if !self.failed && self.cursor > 0 {
            let sectors = self.cursor.div_ceil(SECTOR_SIZE);
            self.buffer[self.cursor..].fill(0);
            self.cursor = 0;
            // 失败时已记入`failed`
            let _ = self.flush(record, bitmap, dev, sectors);
        }
        let persisted = self.chain.persist(dev);
        let released = bitmap.unreserve(self.reserved);
        self.reserved = 0;

        let result = if self.failed {
            Err(Error::DeviceIo)
        } else {
            persisted
        };
        record.size = if result.is_ok() {
            self.written
        } else {
            log::warn!(
                "{:?}: truncated to {} bytes after a failed write",
                record.name,
                self.flushed
            );
            self.flushed
        };

        result.and(released)
    }

    fn flush(
        &mut self,
        record: &mut FileRecord,
        bitmap: &mut BlockBitmap,
        dev: &Arc<dyn BlockDevice>,
        sectors: usize,
    ) -> Result<(), Error> {
        let allocated = self.chain.allocated();
        let result = self
            .chain
            .append(record, bitmap, dev)
            .and_then(|id| block::write_block(dev, id, &self.buffer, sectors));
        self.reserved -= self.chain.allocated() - allocated;

        match &result {
            Ok(()) => self.flushed = self.written,
            Err(_) => {
                log::error!("{:?}: write failed at byte {}", record.name, self.flushed);
                self.failed = true;
            }
        }
        result
    }
}
