use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 没有同名的文件
    NotFound,
    /// 文件仍被打开，无法删除或覆写
    AlreadyOpen,
    /// 文件名为空、过长或含有`\0`
    InvalidName,
    /// 目录表已满
    DirectoryFull,
    /// 文件描述符已用尽
    TooManyOpenFiles,
    /// 空闲块不足
    NoSpace,
    FileTooLarge,
    /// 文件描述符越界或未打开
    InvalidDescriptor,
    /// 对只读描述符写，或对只写描述符读
    WrongMode,
    /// 设备容量不在支持范围内
    InvalidDevice,
    /// 块设备传输不完整
    DeviceIo,
    /// 磁盘上的元数据不一致
    Corrupted,
}

impl Error {
    /// 资源耗尽类错误，可恢复
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::DirectoryFull | Self::TooManyOpenFiles | Self::NoSpace
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no such file",
            Self::AlreadyOpen => "file is open",
            Self::InvalidName => "invalid file name",
            Self::DirectoryFull => "directory is full",
            Self::TooManyOpenFiles => "too many open files",
            Self::NoSpace => "no space left on device",
            Self::FileTooLarge => "file too large",
            Self::InvalidDescriptor => "bad file descriptor",
            Self::WrongMode => "descriptor not opened in this mode",
            Self::InvalidDevice => "unsupported device size",
            Self::DeviceIo => "incomplete device transfer",
            Self::Corrupted => "filesystem metadata is corrupted",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}
