mod block_file;
mod cli;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use block_dev::BlockDevice;
use chain_fs::{BLOCK_SIZE, ChainFileSystem, Error, OpenMode};
use clap::Parser;
use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Command},
};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    log::info!("image={:?}", cli.image);

    match cli.command {
        Command::Format { size_mib } => format(&cli.image, size_mib),
        Command::Pack { source } => with_mounted(&cli.image, |fs| pack(fs, &source)),
        Command::Ls => with_mounted(&cli.image, ls),
        Command::Cat { name } => with_mounted(&cli.image, |fs| cat(fs, &name)),
        Command::Rm { name } => {
            with_mounted(&cli.image, |fs| fs.delete(&name).map_err(io::Error::other))
        }
    }
}

fn format(image: &Path, size_mib: u64) -> io::Result<()> {
    let disk_size = ByteSizeIec::mib(size_mib).0;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)?;
    fd.set_len(disk_size)?;

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd)?);
    ChainFileSystem::format(&block_dev).map_err(io::Error::other)
}

/// 挂载镜像执行`f`，无论成败都会卸载
fn with_mounted<F>(image: &Path, f: F) -> io::Result<()>
where
    F: FnOnce(&mut ChainFileSystem) -> io::Result<()>,
{
    let fd = OpenOptions::new().read(true).write(true).open(image)?;
    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd)?);
    let mut fs = ChainFileSystem::mount(block_dev).map_err(io::Error::other)?;

    let result = f(&mut fs);
    let unmounted = fs.unmount().map_err(io::Error::other);
    result.and(unmounted)
}

fn ls(fs: &mut ChainFileSystem) -> io::Result<()> {
    for entry in fs.entries() {
        println!("{:>10}  {}", entry.size, entry.name);
    }
    println!("{} of {} blocks free", fs.free_blocks(), fs.block_count());
    Ok(())
}

fn pack(fs: &mut ChainFileSystem, source: &Path) -> io::Result<()> {
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skipping non-UTF-8 name {:?}", entry.file_name());
            continue;
        };

        let fd = match fs.open(&name, OpenMode::Write) {
            Ok(fd) => fd,
            Err(Error::InvalidName) => {
                log::warn!("skipping {name:?}: name does not fit");
                continue;
            }
            Err(e) => return Err(io::Error::other(e)),
        };
        let data = fs::read(entry.path())?;
        log::info!("file={name:?} size={}", data.len());
        let written = fs.write(fd, &data);
        fs.close(fd).map_err(io::Error::other)?;
        written.map_err(io::Error::other)?;
    }

    Ok(())
}

fn cat(fs: &mut ChainFileSystem, name: &str) -> io::Result<()> {
    let fd = fs.open(name, OpenMode::Read).map_err(io::Error::other)?;
    let mut stdout = io::stdout().lock();
    let mut buf = vec![0; BLOCK_SIZE];
    loop {
        let n = fs.read(fd, &mut buf).map_err(io::Error::other)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n])?;
    }
    fs.close(fd).map_err(io::Error::other)
}
