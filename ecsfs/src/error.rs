use block_dev::DeviceError;
use derive_more::Display;

use crate::BlockError;

/// 文件系统各项操作的错误
///
/// 除写操作把空间耗尽降级为“短写”之外，错误一律原样交还调用者。
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// 没有已挂载的文件系统，或后备存储无法打开
    #[display(fmt = "no file system is mounted")]
    NotMounted,
    #[display(fmt = "a file system is already mounted")]
    AlreadyMounted,
    /// 签名不符或布局不变量被破坏
    #[display(fmt = "disk is not a valid ECS150FS image")]
    InvalidFormat,
    /// 文件名为空、过长，或偏移量溢出
    #[display(fmt = "invalid argument")]
    InvalidArgument,
    #[display(fmt = "no such file")]
    NotFound,
    #[display(fmt = "file already exists")]
    AlreadyExists,
    #[display(fmt = "root directory is full")]
    DirectoryFull,
    #[display(fmt = "too many open files")]
    OpenTableFull,
    #[display(fmt = "bad file descriptor")]
    InvalidDescriptor,
    #[display(fmt = "offset is past the end of file")]
    OffsetOutOfRange,
    /// 文件仍被打开着
    #[display(fmt = "file is in use")]
    FileInUse,
    #[display(fmt = "no free data block left")]
    OutOfSpace,
    /// 运行时发现簇链与目录不一致
    #[display(fmt = "allocation chain is corrupted")]
    Corrupted,
    #[display(fmt = "device error: {}", _0)]
    Device(DeviceError),
}

impl core::error::Error for FsError {}

impl From<DeviceError> for FsError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<BlockError> for FsError {
    fn from(e: BlockError) -> Self {
        log::error!("broken chain link: {e:?}");
        Self::Corrupted
    }
}

pub type Result<T, E = FsError> = core::result::Result<T, E>;
