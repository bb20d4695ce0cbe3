use core::ops::Range;

use block_dev::BLOCK_SIZE;

use crate::volume::fat::FAT_ENTRIES_PER_BLOCK;
use crate::{BlockId, FsError, Result};

/// 文件系统签名
pub const SIGNATURE: [u8; 8] = *b"ECS150FS";

/// 超级块所在的块
pub const SUPER_BLOCK: usize = 0;

/// 16位FAT最多容纳的块数，同时也是超级块中块数字段的上限
const MAX_TOTAL_BLOCKS: usize = u16::MAX as usize;

/// # 超级块
///
/// 位于0号块，提供文件系统合法性校验，并定位其它区域：
///
/// | 偏移    | 宽度 | 字段 |
/// |---------|------|------|
/// | 0       | 8    | 签名 `ECS150FS` |
/// | 8       | 2    | 虚拟磁盘总块数 |
/// | 10      | 2    | 根目录块号 |
/// | 12      | 2    | 数据区起始块号 |
/// | 14      | 2    | 数据块数 |
/// | 16      | 1    | FAT占用块数 |
/// | 17      | 4079 | 填充 |
///
/// 所有整数均为小端序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    total_blocks: u16,
    root_dir_block: u16,
    data_start: u16,
    data_blocks: u16,
    fat_blocks: u8,
}

impl SuperBlock {
    /// 为总块数为`total_blocks`的磁盘规划布局，数据块数尽可能多。
    ///
    /// 布局须满足 `1 + ceil(data / 2048) + 1 + data == total`，
    /// 有些总块数无解（比如2052），此时报[`FsError::InvalidArgument`]。
    pub fn new(total_blocks: usize) -> Result<Self> {
        if !(4..=MAX_TOTAL_BLOCKS).contains(&total_blocks) {
            log::error!("cannot lay out {total_blocks} blocks");
            return Err(FsError::InvalidArgument);
        }

        let max_fat_blocks = (total_blocks - 2).div_ceil(FAT_ENTRIES_PER_BLOCK);
        let fat_blocks = (1..=max_fat_blocks)
            .find(|&fat| (total_blocks - 2 - fat).div_ceil(FAT_ENTRIES_PER_BLOCK) == fat)
            .ok_or(FsError::InvalidArgument)?;
        let data_blocks = total_blocks - 2 - fat_blocks;

        Ok(Self::with_data_blocks(data_blocks))
    }

    /// 以数据块数为准规划布局，总块数随之确定。
    pub fn with_data_blocks(data_blocks: usize) -> Self {
        let fat_blocks = data_blocks.div_ceil(FAT_ENTRIES_PER_BLOCK);
        let root_dir_block = fat_blocks + 1;
        let data_start = root_dir_block + 1;

        Self {
            total_blocks: (data_start + data_blocks) as u16,
            root_dir_block: root_dir_block as u16,
            data_start: data_start as u16,
            data_blocks: data_blocks as u16,
            fat_blocks: fat_blocks as u8,
        }
    }

    /// 容纳`data_blocks`个数据块所需的磁盘总块数。
    pub fn total_blocks_for(data_blocks: usize) -> Option<usize> {
        let total = 2 + data_blocks.div_ceil(FAT_ENTRIES_PER_BLOCK) + data_blocks;
        (data_blocks >= 1 && total <= MAX_TOTAL_BLOCKS).then_some(total)
    }

    /// 解析0号块。只检查签名，布局由[`SuperBlock::validate`]检查。
    pub fn decode(block: &[u8]) -> Result<Self> {
        debug_assert_eq!(BLOCK_SIZE, block.len());

        if block[..8] != SIGNATURE {
            log::error!("bad signature: {:?}", &block[..8]);
            return Err(FsError::InvalidFormat);
        }

        let u16_at = |offset: usize| u16::from_le_bytes([block[offset], block[offset + 1]]);
        Ok(Self {
            total_blocks: u16_at(8),
            root_dir_block: u16_at(10),
            data_start: u16_at(12),
            data_blocks: u16_at(14),
            fat_blocks: block[16],
        })
    }

    pub fn encode(&self, block: &mut [u8]) {
        debug_assert_eq!(BLOCK_SIZE, block.len());

        block.fill(0);
        block[..8].copy_from_slice(&SIGNATURE);
        block[8..10].copy_from_slice(&self.total_blocks.to_le_bytes());
        block[10..12].copy_from_slice(&self.root_dir_block.to_le_bytes());
        block[12..14].copy_from_slice(&self.data_start.to_le_bytes());
        block[14..16].copy_from_slice(&self.data_blocks.to_le_bytes());
        block[16] = self.fat_blocks;
    }

    /// 检查布局不变量，`device_blocks`为后备存储报告的块数。
    pub fn validate(&self, device_blocks: usize) -> Result<()> {
        let total = self.total_blocks as usize;
        let fat = self.fat_blocks as usize;
        let root = self.root_dir_block as usize;
        let start = self.data_start as usize;
        let data = self.data_blocks as usize;

        let violation = if total != device_blocks {
            Some("total block count differs from the device")
        } else if data == 0 || data >= usize::from(BlockId::EOC) {
            Some("data block count out of range")
        } else if fat != data.div_ceil(FAT_ENTRIES_PER_BLOCK) {
            Some("FAT block count doesn't cover the data blocks")
        } else if root != fat + 1 {
            Some("root directory doesn't follow the FAT")
        } else if start != root + 1 {
            Some("data area doesn't follow the root directory")
        } else if total != start + data {
            Some("data area doesn't end at the last block")
        } else {
            None
        };

        match violation {
            Some(why) => {
                log::error!("{why}: {self:?}, device has {device_blocks} blocks");
                Err(FsError::InvalidFormat)
            }
            None => Ok(()),
        }
    }

    pub const fn total_blocks(&self) -> usize {
        self.total_blocks as usize
    }

    pub const fn fat_blocks(&self) -> usize {
        self.fat_blocks as usize
    }

    /// FAT区占据的块，紧跟超级块
    pub const fn fat_area(&self) -> Range<usize> {
        1..1 + self.fat_blocks as usize
    }

    pub const fn root_dir_block(&self) -> usize {
        self.root_dir_block as usize
    }

    pub const fn data_start(&self) -> usize {
        self.data_start as usize
    }

    pub const fn data_blocks(&self) -> usize {
        self.data_blocks as usize
    }

    /// 数据块编号 → 磁盘块号
    #[inline]
    pub fn data_block(&self, id: BlockId) -> usize {
        self.data_start() + usize::from(id)
    }
}
