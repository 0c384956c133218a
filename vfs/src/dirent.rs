use alloc::string::String;

/// 枚举目录时交换的文件项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// 文件大小（字节）
    pub size: usize,
}
