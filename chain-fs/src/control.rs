//! # 控制层
//!
//! [`ChainFileSystem`] 独占一个已挂载的块设备，
//! 目录表与块位图在挂载期间常驻内存，卸载时整体写回服务区。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::iter;

use block_dev::BlockDevice;
use derive_more::{From, Into};
use vfs::{DirEntry, Error, Stat};

use crate::bitmap::BlockBitmap;
use crate::block;
use crate::directory::DirectoryTable;
use crate::extent::blocks_for;
use crate::file::{FileReader, FileWriter, OpenFile};
use crate::index::IndexManager;
use crate::layout::{FileName, Geometry};
use crate::{BLOCK_SIZE, OPEN_FILES_MAX};

/// 文件描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct Fd(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// 总是从空文件开始写，已有的同名文件被替换
    Write,
}

/// 枚举目录的游标，目录在两次调用之间被修改时结果不确定
#[derive(Debug, Clone, Default)]
pub struct Finder {
    next: usize,
}

impl Finder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct ChainFileSystem {
    block_device: Arc<dyn BlockDevice>,
    geometry: Geometry,
    directory: DirectoryTable,
    bitmap: BlockBitmap,
    descriptors: IndexManager,
    files: Vec<Option<OpenFile>>,
}

impl ChainFileSystem {
    /// 在设备上建立空文件系统：目录表全空，服务区的块标记为已用
    pub fn format(dev: &Arc<dyn BlockDevice>) -> Result<(), Error> {
        let geometry = Geometry::new(dev.sectors())?;

        let mut image = vec![0; geometry.service_bytes()];
        DirectoryTable::format().encode(&mut image[geometry.directory_range()]);
        BlockBitmap::format(geometry.blocks(), geometry.service_blocks())
            .encode(&mut image[geometry.bitmap_range()]);
        block::write_sectors(dev, 0, &image, geometry.service_sectors())?;

        log::info!(
            "formatted {} blocks, {} reserved for metadata",
            geometry.blocks(),
            geometry.service_blocks()
        );
        Ok(())
    }

    pub fn mount(block_device: Arc<dyn BlockDevice>) -> Result<Self, Error> {
        let geometry = Geometry::new(block_device.sectors())?;

        let mut image = vec![0; geometry.service_bytes()];
        block::read_sectors(&block_device, 0, &mut image, geometry.service_sectors())?;
        let directory = DirectoryTable::decode(&image[geometry.directory_range()])?;
        let bitmap = BlockBitmap::decode(
            &image[geometry.bitmap_range()],
            geometry.blocks(),
            geometry.service_blocks(),
        )?;

        log::info!(
            "mounted: {} files, {}/{} blocks free",
            directory.len(),
            bitmap.available(),
            geometry.blocks()
        );
        Ok(Self {
            block_device,
            geometry,
            directory,
            bitmap,
            descriptors: IndexManager::new(OPEN_FILES_MAX),
            files: (0..OPEN_FILES_MAX).map(|_| None).collect(),
        })
    }

    /// 关闭仍打开的文件并写回服务区，返回遇到的第一个错误
    pub fn unmount(mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for fd in 0..OPEN_FILES_MAX {
            if self.files[fd].is_some() {
                log::warn!("fd {fd} still open at unmount");
                let closed = self.close(Fd(fd));
                result = result.and(closed);
            }
        }

        let mut image = vec![0; self.geometry.service_bytes()];
        self.directory
            .encode(&mut image[self.geometry.directory_range()]);
        self.bitmap.encode(&mut image[self.geometry.bitmap_range()]);
        let stored = block::write_sectors(
            &self.block_device,
            0,
            &image,
            self.geometry.service_sectors(),
        );

        log::info!("unmounted");
        result.and(stored)
    }

    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<Fd, Error> {
        let name = FileName::new(name)?;
        let existing = self.directory.lookup(name.as_str());

        let file = match mode {
            OpenMode::Read => {
                let slot = existing.ok_or(Error::NotFound)?;
                if self.is_open(slot, true) {
                    log::warn!("{name:?} is being written");
                    return Err(Error::AlreadyOpen);
                }
                OpenFile::Read(FileReader::new(slot, self.directory.record(slot)?))
            }
            OpenMode::Write => {
                // 先确认描述符够用，再删除旧文件
                if self.descriptors.free() == 0 {
                    return Err(Error::TooManyOpenFiles);
                }
                if let Some(slot) = existing {
                    if self.is_open(slot, false) {
                        log::warn!("{name:?} is open, cannot overwrite");
                        return Err(Error::AlreadyOpen);
                    }
                    self.directory
                        .remove(slot, &mut self.bitmap, &self.block_device)?;
                }
                OpenFile::Write(FileWriter::new(self.directory.create(name.clone())?))
            }
        };

        let fd = self
            .descriptors
            .acquire()
            .map_err(|_| Error::TooManyOpenFiles)?;
        log::debug!("open {name:?} as fd {fd} ({mode:?})");
        self.files[fd] = Some(file);

        Ok(Fd(fd))
    }

    pub fn close(&mut self, fd: Fd) -> Result<(), Error> {
        let file = self
            .files
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or_else(|| bad_descriptor(fd))?;
        self.descriptors
            .release(fd.0)
            .map_err(|_| Error::Corrupted)?;
        log::debug!("close fd {}", fd.0);

        match file {
            OpenFile::Read(_) => Ok(()),
            OpenFile::Write(mut writer) => {
                let record = self.directory.record_mut(writer.slot())?;
                writer.close(record, &mut self.bitmap, &self.block_device)
            }
        }
    }

    /// 从文件的当前位置读出至多`buf.len()`字节，到达文件末尾时返回0
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, Error> {
        let OpenFile::Read(reader) = handle(&mut self.files, fd)? else {
            log::warn!("fd {} is not open for reading", fd.0);
            return Err(Error::WrongMode);
        };
        let record = self.directory.record(reader.slot())?;
        reader.read(record, &self.bitmap, &self.block_device, buf)
    }

    /// 在文件末尾追加`buf`，要么全部写入，要么什么也不做
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, Error> {
        let OpenFile::Write(writer) = handle(&mut self.files, fd)? else {
            log::warn!("fd {} is not open for writing", fd.0);
            return Err(Error::WrongMode);
        };
        let record = self.directory.record_mut(writer.slot())?;
        writer.write(record, &mut self.bitmap, &self.block_device, buf)
    }

    /// 删除文件并回收它的全部块
    pub fn delete(&mut self, name: &str) -> Result<(), Error> {
        let name = FileName::new(name)?;
        let slot = self
            .directory
            .lookup(name.as_str())
            .ok_or(Error::NotFound)?;
        if self.is_open(slot, false) {
            log::warn!("{name:?} is open, cannot delete");
            return Err(Error::AlreadyOpen);
        }

        let freed = self
            .directory
            .remove(slot, &mut self.bitmap, &self.block_device)?;
        log::debug!("deleted {name:?}, {freed} blocks reclaimed");
        Ok(())
    }

    /// 文件的字节数，正在写入的文件返回已写入的部分
    pub fn file_size(&self, name: &str) -> Option<usize> {
        let slot = self.directory.lookup(name)?;
        self.directory.record(slot).ok().map(|record| record.size)
    }

    pub fn stat(&self, name: &str) -> Option<Stat> {
        let size = self.file_size(name)?;
        Some(Stat {
            block_size: BLOCK_SIZE as u64,
            blocks: blocks_for(size) as u64,
            size: size as u64,
        })
    }

    /// 从头开始枚举目录
    pub fn find_first(&self, finder: &mut Finder) -> Option<DirEntry> {
        finder.next = 0;
        self.find_next(finder)
    }

    pub fn find_next(&self, finder: &mut Finder) -> Option<DirEntry> {
        let (slot, record) = self.directory.next_occupied(finder.next)?;
        finder.next = slot + 1;
        Some(DirEntry {
            name: record.name.as_str().into(),
            size: record.size,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = DirEntry> + '_ {
        let mut finder = Finder::new();
        iter::from_fn(move || self.find_next(&mut finder))
    }

    /// 可分配给文件的块数，已被打开的写句柄预留的块不计在内
    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.bitmap.available()
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.geometry.blocks()
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// 槽位上的文件是否被打开，`writers_only`时只考虑写句柄
    fn is_open(&self, slot: usize, writers_only: bool) -> bool {
        self.files
            .iter()
            .flatten()
            .any(|file| file.slot() == slot && (!writers_only || file.is_writer()))
    }
}

fn handle(files: &mut [Option<OpenFile>], fd: Fd) -> Result<&mut OpenFile, Error> {
    files
        .get_mut(fd.0)
        .and_then(Option::as_mut)
        .ok_or_else(|| bad_descriptor(fd))
}

fn bad_descriptor(fd: Fd) -> Error {
    log::warn!("bad file descriptor {}", fd.0);
    Error::InvalidDescriptor
}
