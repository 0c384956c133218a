mod common;

use std::sync::Arc;

use block_dev::{BlockDevice, RamDisk};
use chain_fs::layout::INLINE_COUNT;
use chain_fs::{
    BLOCK_SIZE, ChainFileSystem, DIR_ENTRIES_MAX, DirEntry, OpenMode, SECTOR_SIZE, blocks_for,
};

use self::common::{DISK_SECTORS, FREE_BLOCKS, mounted, pattern, read_file, write_file};

#[test]
fn format_writes_service_region() {
    let disk = Arc::new(RamDisk::new(DISK_SECTORS));
    let dev: Arc<dyn BlockDevice> = disk.clone();
    ChainFileSystem::format(&dev).unwrap();

    let image = disk.snapshot();
    for sector in image.chunks(SECTOR_SIZE).take(DIR_ENTRIES_MAX) {
        assert_eq!(&[0xFFu8; 4], &sector[..4]);
    }
    let bitmap = &image[DIR_ENTRIES_MAX * SECTOR_SIZE..];
    assert!(bitmap[..17].iter().all(|&b| b == 1));
    assert!(bitmap[17..2048].iter().all(|&b| b == 0));
}

#[test]
fn files_survive_remount() {
    let (dev, mut fs) = mounted();
    let small = pattern(777);
    let large = pattern((INLINE_COUNT + 40) * BLOCK_SIZE + 5);
    write_file(&mut fs, "small", &small);
    write_file(&mut fs, "large", &large);
    write_file(&mut fs, "empty", &[]);
    let free = fs.free_blocks();
    fs.unmount().unwrap();

    let mut fs = ChainFileSystem::mount(dev).unwrap();
    assert_eq!(free, fs.free_blocks());
    assert_eq!(
        vec![
            DirEntry {
                name: "small".into(),
                size: small.len()
            },
            DirEntry {
                name: "large".into(),
                size: large.len()
            },
            DirEntry {
                name: "empty".into(),
                size: 0
            },
        ],
        fs.entries().collect::<Vec<_>>()
    );
    assert_eq!(small, read_file(&mut fs, "small", 100));
    assert_eq!(large, read_file(&mut fs, "large", 10_000));
    assert_eq!(Vec::<u8>::new(), read_file(&mut fs, "empty", 1));
}

#[test]
fn unmount_flushes_open_writers() {
    let (dev, mut fs) = mounted();
    let data = pattern(BLOCK_SIZE + 10);
    let fd = fs.open("pending", OpenMode::Write).unwrap();
    fs.write(fd, &data).unwrap();
    fs.unmount().unwrap();

    let mut fs = ChainFileSystem::mount(dev).unwrap();
    assert_eq!(Some(data.len()), fs.file_size("pending"));
    assert_eq!(data, read_file(&mut fs, "pending", 512));
    assert_eq!(FREE_BLOCKS - 2, fs.free_blocks());
}

#[test]
fn delete_survives_remount() {
    let (dev, mut fs) = mounted();
    write_file(&mut fs, "keep", &pattern(3000));
    write_file(&mut fs, "drop", &pattern(9000));
    fs.delete("drop").unwrap();
    fs.unmount().unwrap();

    let fs = ChainFileSystem::mount(dev).unwrap();
    assert_eq!(None, fs.file_size("drop"));
    assert_eq!(Some(3000), fs.file_size("keep"));
    assert_eq!(FREE_BLOCKS - blocks_for(3000), fs.free_blocks());
}

#[test]
fn changes_are_lost_without_unmount() {
    let (dev, mut fs) = mounted();
    write_file(&mut fs, "volatile", b"gone");
    drop(fs);

    let fs = ChainFileSystem::mount(dev).unwrap();
    assert_eq!(None, fs.file_size("volatile"));
    assert_eq!(FREE_BLOCKS, fs.free_blocks());
}

#[test]
fn format_erases_everything() {
    let (dev, mut fs) = mounted();
    write_file(&mut fs, "old", &pattern(BLOCK_SIZE * 4));
    fs.unmount().unwrap();

    ChainFileSystem::format(&dev).unwrap();
    let fs = ChainFileSystem::mount(dev).unwrap();
    assert_eq!(0, fs.entries().count());
    assert_eq!(FREE_BLOCKS, fs.free_blocks());
    assert_eq!(2048, fs.block_count());
}
