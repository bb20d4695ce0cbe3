//! # 块设备接口层
//!
//! 虚拟磁盘是一段连续的、大小一致的块，只能以**块**为单位按编号读写。
//! [`BlockDevice`] 就是对这种设备的抽象，实现了此特质的类型称为**块设备驱动**。
//!
//! 块的大小是全系统统一的常量 [`BLOCK_SIZE`]。

#![no_std]

use core::fmt::Debug;

use derive_more::Display;

/// 块的字节数
pub const BLOCK_SIZE: usize = 4096;

/// 块设备驱动报告的错误
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 块编号超出设备范围
    #[display(fmt = "block {} is out of range", _0)]
    OutOfRange(usize),
    /// 缓冲区长度不等于 [`BLOCK_SIZE`]
    #[display(fmt = "buffer of {} bytes is not one block", _0)]
    BadBuffer(usize),
    /// 底层介质读写失败
    #[display(fmt = "I/O failure on the backing store")]
    Io,
}

impl core::error::Error for DeviceError {}

/// 块设备驱动特质
///
/// 读写均为同步、原子的整块操作；`buf.len()` 必须等于 [`BLOCK_SIZE`]。
pub trait BlockDevice: Debug + Send + Sync {
    /// 设备的总块数
    fn num_blocks(&self) -> usize;

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;

    /// 将已写入的数据落盘，默认什么也不做
    fn flush(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// 检查一次读写请求是否落在设备范围内、缓冲区是否恰为一块。
///
/// 供驱动实现者在真正访问介质前调用。
pub fn check_request(dev: &dyn BlockDevice, block_id: usize, len: usize) -> Result<(), DeviceError> {
    if block_id >= dev.num_blocks() {
        return Err(DeviceError::OutOfRange(block_id));
    }
    if len != BLOCK_SIZE {
        return Err(DeviceError::BadBuffer(len));
    }
    Ok(())
}
