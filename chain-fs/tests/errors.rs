mod common;

use std::sync::Arc;

use block_dev::{BlockDevice, RamDisk};
use chain_fs::layout::{CONTINUATION_COUNT, INLINE_COUNT};
use chain_fs::{BLOCK_SIZE, ChainFileSystem, Error, Fd, NAME_MAX_LEN, OpenMode};

use self::common::{
    DISK_SECTORS, FREE_BLOCKS, FaultyDisk, mounted, pattern, read_file, write_file,
};

fn faulty_mounted() -> (Arc<FaultyDisk>, ChainFileSystem) {
    let disk = Arc::new(FaultyDisk::new(DISK_SECTORS));
    let dev: Arc<dyn BlockDevice> = disk.clone();
    ChainFileSystem::format(&dev).unwrap();
    let fs = ChainFileSystem::mount(dev).unwrap();
    (disk, fs)
}

#[test]
fn device_size_is_checked() {
    let small: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(DISK_SECTORS - 1));
    assert_eq!(Err(Error::InvalidDevice), ChainFileSystem::format(&small));
    assert_eq!(
        Err(Error::InvalidDevice),
        ChainFileSystem::mount(small).map(|_| ())
    );
}

#[test]
fn unformatted_device_is_rejected() {
    let dev: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(DISK_SECTORS));
    assert_eq!(
        Err(Error::Corrupted),
        ChainFileSystem::mount(dev).map(|_| ())
    );
}

#[test]
fn short_transfers_fail_format_and_mount() {
    let disk = Arc::new(FaultyDisk::new(DISK_SECTORS));
    let dev: Arc<dyn BlockDevice> = disk.clone();

    disk.fail_writes(true);
    assert_eq!(Err(Error::DeviceIo), ChainFileSystem::format(&dev));
    disk.fail_writes(false);
    ChainFileSystem::format(&dev).unwrap();

    disk.fail_reads(true);
    assert_eq!(
        Err(Error::DeviceIo),
        ChainFileSystem::mount(dev.clone()).map(|_| ())
    );
    disk.fail_reads(false);
    assert!(ChainFileSystem::mount(dev).is_ok());
}

#[test]
fn short_transfers_surface_from_file_io() {
    let disk = Arc::new(FaultyDisk::new(DISK_SECTORS));
    let dev: Arc<dyn BlockDevice> = disk.clone();
    ChainFileSystem::format(&dev).unwrap();
    let mut fs = ChainFileSystem::mount(dev).unwrap();
    write_file(&mut fs, "f", &pattern(100));

    let fd = fs.open("f", OpenMode::Read).unwrap();
    disk.fail_reads(true);
    let mut buf = [0; 100];
    assert_eq!(Err(Error::DeviceIo), fs.read(fd, &mut buf));
    disk.fail_reads(false);
    fs.close(fd).unwrap();

    disk.fail_writes(true);
    assert_eq!(Err(Error::DeviceIo), fs.unmount());
}

#[test]
fn failed_continuation_link_loses_nothing() {
    let (disk, mut fs) = faulty_mounted();
    let len = (INLINE_COUNT + CONTINUATION_COUNT) * BLOCK_SIZE;
    let data = pattern(len);

    let fd = fs.open("chain", OpenMode::Write).unwrap();
    fs.write(fd, &data).unwrap();

    // 下一个块需要第二个续接块，写回第一个续接块时失败
    disk.fail_writes(true);
    assert_eq!(Err(Error::DeviceIo), fs.write(fd, &[0xAB; BLOCK_SIZE]));
    disk.fail_writes(false);

    assert_eq!(Err(Error::DeviceIo), fs.write(fd, b"more"));
    assert_eq!(Err(Error::DeviceIo), fs.close(fd));
    assert_eq!(Some(len), fs.file_size("chain"));
    assert_eq!(data, read_file(&mut fs, "chain", BLOCK_SIZE));

    fs.delete("chain").unwrap();
    assert_eq!(FREE_BLOCKS, fs.free_blocks());
}

#[test]
fn failed_data_block_write_is_not_committed() {
    let (disk, mut fs) = faulty_mounted();
    let fd = fs.open("half", OpenMode::Write).unwrap();
    fs.write(fd, &pattern(BLOCK_SIZE)).unwrap();

    disk.fail_writes(true);
    assert_eq!(Err(Error::DeviceIo), fs.write(fd, &pattern(BLOCK_SIZE * 3)));
    disk.fail_writes(false);

    assert_eq!(Err(Error::DeviceIo), fs.close(fd));
    assert_eq!(Some(BLOCK_SIZE), fs.file_size("half"));
    assert_eq!(pattern(BLOCK_SIZE), read_file(&mut fs, "half", 1000));

    // 失败的块已分配并挂在链表上，删除时一并回收
    fs.delete("half").unwrap();
    assert_eq!(FREE_BLOCKS, fs.free_blocks());

    // 其他写句柄的预留不受影响
    let fd = fs.open("after", OpenMode::Write).unwrap();
    fs.write(fd, &pattern(BLOCK_SIZE * 2 + 1)).unwrap();
    fs.close(fd).unwrap();
    assert_eq!(FREE_BLOCKS - 3, fs.free_blocks());
}

#[test]
fn failed_tail_flush_is_reported_by_close() {
    let (disk, mut fs) = faulty_mounted();
    let fd = fs.open("tail", OpenMode::Write).unwrap();
    fs.write(fd, &pattern(100)).unwrap();

    disk.fail_writes(true);
    assert_eq!(Err(Error::DeviceIo), fs.close(fd));
    disk.fail_writes(false);

    assert_eq!(Some(0), fs.file_size("tail"));
    fs.delete("tail").unwrap();
    assert_eq!(FREE_BLOCKS, fs.free_blocks());
}

#[test]
fn bad_descriptors() {
    let (_, mut fs) = mounted();
    let mut buf = [0; 8];

    assert_eq!(Err(Error::InvalidDescriptor), fs.close(Fd::from(0)));
    assert_eq!(Err(Error::InvalidDescriptor), fs.close(Fd::from(100)));
    assert_eq!(Err(Error::InvalidDescriptor), fs.read(Fd::from(8), &mut buf));
    assert_eq!(Err(Error::InvalidDescriptor), fs.write(Fd::from(3), b"x"));

    let fd = fs.open("once", OpenMode::Write).unwrap();
    fs.close(fd).unwrap();
    assert_eq!(Err(Error::InvalidDescriptor), fs.close(fd));
    assert_eq!(Err(Error::InvalidDescriptor), fs.write(fd, b"x"));
}

#[test]
fn wrong_mode() {
    let (_, mut fs) = mounted();
    let writer = fs.open("w", OpenMode::Write).unwrap();
    let mut buf = [0; 8];
    assert_eq!(Err(Error::WrongMode), fs.read(writer, &mut buf));
    fs.write(writer, b"abc").unwrap();
    fs.close(writer).unwrap();

    let reader = fs.open("w", OpenMode::Read).unwrap();
    assert_eq!(Err(Error::WrongMode), fs.write(reader, b"x"));
    assert_eq!(Ok(3), fs.read(reader, &mut buf));
    fs.close(reader).unwrap();
}

#[test]
fn invalid_names() {
    let (_, mut fs) = mounted();
    let too_long = "n".repeat(NAME_MAX_LEN + 1);
    for name in ["", too_long.as_str(), "nul\0byte"] {
        assert_eq!(Err(Error::InvalidName), fs.open(name, OpenMode::Write));
        assert_eq!(Err(Error::InvalidName), fs.open(name, OpenMode::Read));
        assert_eq!(Err(Error::InvalidName), fs.delete(name));
        assert_eq!(None, fs.file_size(name));
    }

    let longest = "n".repeat(NAME_MAX_LEN);
    write_file(&mut fs, &longest, b"ok");
    assert_eq!(Some(2), fs.file_size(&longest));
}

#[test]
fn missing_files() {
    let (_, mut fs) = mounted();
    assert_eq!(Err(Error::NotFound), fs.open("ghost", OpenMode::Read));
    assert_eq!(Err(Error::NotFound), fs.delete("ghost"));
    assert_eq!(None, fs.file_size("ghost"));
}

#[test]
fn busy_files() {
    let (_, mut fs) = mounted();
    let original = pattern(BLOCK_SIZE * 2);
    write_file(&mut fs, "busy", &original);

    let reader = fs.open("busy", OpenMode::Read).unwrap();
    assert_eq!(Err(Error::AlreadyOpen), fs.delete("busy"));
    assert_eq!(Err(Error::AlreadyOpen), fs.open("busy", OpenMode::Write));
    fs.close(reader).unwrap();
    assert_eq!(original, read_file(&mut fs, "busy", 1000));

    let writer = fs.open("busy", OpenMode::Write).unwrap();
    assert_eq!(Err(Error::AlreadyOpen), fs.open("busy", OpenMode::Read));
    assert_eq!(Err(Error::AlreadyOpen), fs.open("busy", OpenMode::Write));
    assert_eq!(Err(Error::AlreadyOpen), fs.delete("busy"));
    fs.close(writer).unwrap();

    fs.delete("busy").unwrap();
}

#[test]
fn overwrite_without_descriptor_keeps_old_file() {
    let (_, mut fs) = mounted();
    write_file(&mut fs, "keep", b"precious");
    write_file(&mut fs, "other", b"x");

    let fds: Vec<_> = (0..8)
        .map(|_| fs.open("other", OpenMode::Read).unwrap())
        .collect();
    assert_eq!(
        Err(Error::TooManyOpenFiles),
        fs.open("keep", OpenMode::Write)
    );
    for fd in fds {
        fs.close(fd).unwrap();
    }
    assert_eq!(b"precious".to_vec(), read_file(&mut fs, "keep", 4));
}
