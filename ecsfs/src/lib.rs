//! # ECS150FS
//!
//! 建立在虚拟磁盘之上的简易FAT文件系统：只有一个根目录，
//! 文件由FAT表中的块链表串起来。
//!
//! 挂载得到 [`FileSystem`]，所有操作都在它身上进行；
//! 需要“全局只挂载一个”的语义时用 [`Session`]。

#![no_std]

extern crate alloc;

mod block;
mod control;
mod error;
mod fd;
mod file;
mod session;
pub mod volume;

pub use block_dev::{BLOCK_SIZE, BlockDevice, DeviceError};

pub use self::{
    block::{BlockError, BlockId},
    control::{FileInfo, FileSystem, Info, Ls},
    error::{FsError, Result},
    fd::{Fd, OPEN_MAX_COUNT},
    file::FILE_MAX_SIZE,
    session::Session,
    volume::{FILE_MAX_COUNT, FILENAME_LEN},
};
