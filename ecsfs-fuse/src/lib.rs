//! 宿主机一侧：把镜像文件当作块设备，在其上制作、挂载ECS150FS。

#[cfg(test)]
mod tests;

mod block_file;

use std::path::Path;
use std::sync::Arc;

use ecsfs::volume::SuperBlock;
use ecsfs::{FileSystem, FsError, Session};

pub use self::block_file::BlockFile;

/// 新建一个恰好容纳`data_blocks`个数据块的镜像并格式化
pub fn make(path: impl AsRef<Path>, data_blocks: usize) -> Result<(), FsError> {
    let total = SuperBlock::total_blocks_for(data_blocks).ok_or(FsError::InvalidArgument)?;
    let file = BlockFile::create(path.as_ref(), total).map_err(|e| {
        log::error!("cannot create {:?}: {e}", path.as_ref());
        FsError::InvalidArgument
    })?;
    FileSystem::format(&file)
}

/// 打开镜像并挂载。镜像打不开时报[`FsError::NotMounted`]。
pub fn open(path: impl AsRef<Path>) -> Result<FileSystem, FsError> {
    let file = BlockFile::open(path.as_ref()).map_err(|e| {
        log::error!("cannot open {:?}: {e}", path.as_ref());
        FsError::NotMounted
    })?;
    FileSystem::mount(Arc::new(file))
}

/// 按文件名把镜像挂载到`session`上
pub fn mount(session: &mut Session, path: impl AsRef<Path>) -> Result<(), FsError> {
    if session.is_mounted() {
        return Err(FsError::AlreadyMounted);
    }
    let file = BlockFile::open(path.as_ref()).map_err(|e| {
        log::error!("cannot open {:?}: {e}", path.as_ref());
        FsError::NotMounted
    })?;
    session.mount(Arc::new(file))
}
