//! 卷的布局
//!
//! 超级块 | FAT区 | 根目录 | 数据区
//!
//! 超级块恒为0号块，根目录恰好一块，其余区域的大小由数据块数决定。

pub mod fat;
pub mod root_dir;
pub mod super_block;

pub use self::{
    fat::{Chain, FAT_ENTRIES_PER_BLOCK, Fat},
    root_dir::{DIR_ENTRY_SIZE, DirEntry, FILE_MAX_COUNT, FILENAME_LEN, RootDir},
    super_block::{SIGNATURE, SUPER_BLOCK, SuperBlock},
};
