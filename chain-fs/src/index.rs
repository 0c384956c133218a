use alloc::vec;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    /// 区间内没有空闲的编号
    Exhausted,
    /// 归还的编号越界或本就空闲
    InvalidRelease,
}

/// 区间`[0, count)`上的编号分配器，总是分配最小的空闲编号。
///
/// 目录槽位与文件描述符用一个全空闲的分配器；
/// 块位图则由磁盘上读出的占用表构造，并通过 [`IndexManager::as_slice`] 写回。
#[derive(Debug, Clone)]
pub struct IndexManager {
    used: Vec<bool>,
    /// 空闲编号个数
    free: usize,
}

impl IndexManager {
    pub fn new(count: usize) -> Self {
        Self {
            used: vec![false; count],
            free: count,
        }
    }

    pub fn from_used(used: Vec<bool>) -> Self {
        let free = used.iter().filter(|&&used| !used).count();
        Self { used, free }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    #[inline]
    pub fn free(&self) -> usize {
        self.free
    }

    #[inline]
    pub fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.used
    }

    pub fn acquire(&mut self) -> Result<usize, IndexError> {
        let index = self
            .used
            .iter()
            .position(|&used| !used)
            .ok_or(IndexError::Exhausted)?;
        self.used[index] = true;
        self.free -= 1;
        Ok(index)
    }

    pub fn release(&mut self, index: usize) -> Result<(), IndexError> {
        match self.used.get_mut(index) {
            Some(used) if *used => {
                *used = false;
                self.free += 1;
                Ok(())
            }
            _ => Err(IndexError::InvalidRelease),
        }
    }
}
