//! 根目录，整个文件系统唯一的目录，恰好占据一块。
//!
//! 目录项以槽位索引，首字节为`\0`的槽位即为空闲。

use alloc::boxed::Box;

use block_dev::{BLOCK_SIZE, BlockDevice};

use crate::volume::SuperBlock;
use crate::{BlockId, FsError, Result};

/// 根目录最多容纳的文件数
pub const FILE_MAX_COUNT: usize = 128;

/// 文件名字段的字节数，含结尾的`\0`
pub const FILENAME_LEN: usize = 16;

/// 目录项大小恒为32字节
pub const DIR_ENTRY_SIZE: usize = 32;

/// # 目录项
///
/// | 偏移 | 宽度 | 字段 |
/// |------|------|------|
/// | 0    | 16   | 文件名，`\0`填充 |
/// | 16   | 4    | 文件字节数 |
/// | 20   | 2    | 首个数据块编号，空文件为EOC |
/// | 22   | 10   | 填充 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; FILENAME_LEN],
    size: u32,
    first: BlockId,
}

impl DirEntry {
    /// 空闲槽位，编码后32字节全为0
    pub const EMPTY: Self = Self {
        name: [0; FILENAME_LEN],
        size: 0,
        first: BlockId::FREE,
    };

    /// 大小为0、尚未分配数据块的新文件。`name`须先经[`check_name`]检查。
    fn new(name: &str) -> Self {
        let mut entry = Self {
            first: BlockId::EOC,
            ..Self::EMPTY
        };
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(FILENAME_LEN);
        // 挂载时已检查过
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size as usize
    }

    pub fn resize(&mut self, size: usize) {
        self.size = size as u32;
    }

    #[inline]
    pub const fn first_block(&self) -> BlockId {
        self.first
    }

    pub fn set_first_block(&mut self, id: BlockId) {
        self.first = id;
    }

    fn decode(raw: &[u8]) -> Self {
        let mut name = [0; FILENAME_LEN];
        name.copy_from_slice(&raw[..FILENAME_LEN]);
        Self {
            name,
            size: u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]),
            first: BlockId::from_le_bytes([raw[20], raw[21]]),
        }
    }

    fn encode(&self, raw: &mut [u8]) {
        raw.fill(0);
        raw[..FILENAME_LEN].copy_from_slice(&self.name);
        raw[16..20].copy_from_slice(&self.size.to_le_bytes());
        raw[20..22].copy_from_slice(&self.first.to_le_bytes());
    }
}

/// 检查文件名：非空、不含`\0`、留得下结尾的`\0`。
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= FILENAME_LEN || name.contains('\0') {
        return Err(FsError::InvalidArgument);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RootDir {
    entries: [DirEntry; FILE_MAX_COUNT],
}

impl RootDir {
    pub const fn new() -> Self {
        Self {
            entries: [DirEntry::EMPTY; FILE_MAX_COUNT],
        }
    }

    /// 读入根目录，并拒绝无法解读的名字、重名与越界的首块号。
    pub fn load(dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<Self> {
        let mut block = Box::new([0u8; BLOCK_SIZE]);
        dev.read_block(sb.root_dir_block(), block.as_mut_slice())?;

        let mut root_dir = Self::new();
        for (entry, raw) in root_dir
            .entries
            .iter_mut()
            .zip(block.chunks_exact(DIR_ENTRY_SIZE))
        {
            *entry = DirEntry::decode(raw);
        }

        for (slot, entry) in root_dir.iter() {
            if entry.name().is_empty() {
                log::error!("unreadable file name in slot {slot}: {:?}", entry.name);
                return Err(FsError::InvalidFormat);
            }
            if root_dir.find(entry.name()) != Some(slot) {
                log::error!("file name {:?} appears twice", entry.name());
                return Err(FsError::InvalidFormat);
            }
            if entry.first != BlockId::EOC && entry.first.validate(sb.data_blocks()).is_err() {
                log::error!(
                    "{:?} starts outside the data area: {}",
                    entry.name(),
                    entry.first
                );
                return Err(FsError::InvalidFormat);
            }
        }

        Ok(root_dir)
    }

    /// 写回根目录，空闲槽位一律写0。
    pub fn store(&self, dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<()> {
        let mut block = Box::new([0u8; BLOCK_SIZE]);
        for (entry, raw) in self
            .entries
            .iter()
            .zip(block.chunks_exact_mut(DIR_ENTRY_SIZE))
            .filter(|(entry, _)| !entry.is_free())
        {
            entry.encode(raw);
        }
        dev.write_block(sb.root_dir_block(), block.as_slice())?;
        Ok(())
    }

    /// 按名称查找已占用的槽位
    pub fn find(&self, name: &str) -> Option<usize> {
        self.iter()
            .find_map(|(slot, entry)| (entry.name() == name).then_some(slot))
    }

    /// 在编号最小的空闲槽位中创建空文件
    pub fn insert(&mut self, name: &str) -> Result<usize> {
        check_name(name)?;
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        let slot = self
            .entries
            .iter()
            .position(DirEntry::is_free)
            .ok_or(FsError::DirectoryFull)?;
        self.entries[slot] = DirEntry::new(name);
        Ok(slot)
    }

    /// 清空槽位，返回原来的目录项。不负责释放数据块。
    pub fn remove(&mut self, slot: usize) -> DirEntry {
        core::mem::replace(&mut self.entries[slot], DirEntry::EMPTY)
    }

    #[inline]
    pub fn get(&self, slot: usize) -> &DirEntry {
        &self.entries[slot]
    }

    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> &mut DirEntry {
        &mut self.entries[slot]
    }

    /// 按槽位顺序遍历已占用的目录项
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter().enumerate(),
        }
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_free()).count()
    }
}

impl Default for RootDir {
    fn default() -> Self {
        Self::new()
    }
}

/// [`RootDir::iter`]返回的迭代器，可克隆以便从头再来
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: core::iter::Enumerate<core::slice::Iter<'a, DirEntry>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a DirEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.find(|(_, entry)| !entry.is_free())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn names() {
        assert_eq!(Err(FsError::InvalidArgument), check_name(""));
        assert_eq!(Err(FsError::InvalidArgument), check_name("0123456789abcdef"));
        assert_eq!(Err(FsError::InvalidArgument), check_name("a\0b"));
        assert_eq!(Ok(()), check_name("0123456789abcde"));
    }

    #[test]
    fn insert_remove() {
        let mut root_dir = RootDir::new();
        assert_eq!(Ok(0), root_dir.insert("a"));
        assert_eq!(Ok(1), root_dir.insert("b"));
        assert_eq!(Err(FsError::AlreadyExists), root_dir.insert("a"));
        assert_eq!(Some(1), root_dir.find("b"));
        assert_eq!(None, root_dir.find("c"));

        let removed = root_dir.remove(0);
        assert_eq!("a", removed.name());
        assert_eq!(BlockId::EOC, removed.first_block());
        assert_eq!(Ok(0), root_dir.insert("c"));

        let names: Vec<_> = root_dir.iter().map(|(_, entry)| entry.name()).collect();
        assert_eq!(["c", "b"], names.as_slice());
        assert_eq!(FILE_MAX_COUNT - 2, root_dir.free_count());
    }

    #[test]
    fn full() {
        let mut root_dir = RootDir::new();
        for i in 0..FILE_MAX_COUNT {
            let mut name = [b'f'; 4];
            name[1] = b'0' + (i / 100) as u8;
            name[2] = b'0' + (i / 10 % 10) as u8;
            name[3] = b'0' + (i % 10) as u8;
            root_dir.insert(core::str::from_utf8(&name).unwrap()).unwrap();
        }
        assert_eq!(0, root_dir.free_count());
        assert_eq!(Err(FsError::DirectoryFull), root_dir.insert("more"));
    }

    #[test]
    fn codec() {
        let mut entry = DirEntry::new("hello.txt");
        entry.resize(5000);
        entry.set_first_block(BlockId::new(0x0102));

        let mut raw = [0xFF; DIR_ENTRY_SIZE];
        entry.encode(&mut raw);
        assert_eq!(b"hello.txt\0\0\0\0\0\0\0", &raw[..16]);
        assert_eq!(5000u32.to_le_bytes(), raw[16..20]);
        assert_eq!([0x02u8, 0x01], raw[20..22]);
        assert!(raw[22..].iter().all(|&b| b == 0));
        assert_eq!(entry, DirEntry::decode(&raw));

        DirEntry::EMPTY.encode(&mut raw);
        assert_eq!([0u8; DIR_ENTRY_SIZE], raw);
        assert!(DirEntry::decode(&raw).is_free());
    }
}
