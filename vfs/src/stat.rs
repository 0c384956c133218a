#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Optimal I/O block size
    pub block_size: u64,
    /// Occupying blocks, including extent continuation blocks
    pub blocks: u64,
    /// File size
    pub size: u64,
}
