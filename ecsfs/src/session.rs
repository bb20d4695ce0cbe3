use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::{FileSystem, FsError, Result};

/// 挂载槽位：同一时刻至多挂载一个文件系统。
///
/// 由调用者持有，不存在全局状态。
#[derive(Debug, Default)]
pub struct Session {
    fs: Option<FileSystem>,
}

impl Session {
    pub const fn new() -> Self {
        Self { fs: None }
    }

    /// 已经挂载时报[`FsError::AlreadyMounted`]，设备不会被读取。
    pub fn mount(&mut self, device: Arc<dyn BlockDevice>) -> Result<()> {
        if self.fs.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        self.fs = Some(FileSystem::mount(device)?);
        Ok(())
    }

    /// 卸载并交还设备。失败时文件系统仍保持挂载。
    pub fn unmount(&mut self) -> Result<Arc<dyn BlockDevice>> {
        let fs = self.fs.take().ok_or(FsError::NotMounted)?;
        fs.unmount().map_err(|(fs, e)| {
            self.fs = Some(fs);
            e
        })
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.fs.is_some()
    }

    pub fn fs(&self) -> Result<&FileSystem> {
        self.fs.as_ref().ok_or(FsError::NotMounted)
    }

    pub fn fs_mut(&mut self) -> Result<&mut FileSystem> {
        self.fs.as_mut().ok_or(FsError::NotMounted)
    }
}
