#![allow(unused)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use block_dev::check_request;
use ecsfs::{BLOCK_SIZE, BlockDevice, DeviceError, FileSystem};
use spin::Mutex;

/// 内存中的虚拟磁盘
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    num_blocks: usize,
    /// 置位后所有写操作失败
    broken: AtomicBool,
}

impl RamDisk {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; num_blocks * BLOCK_SIZE]),
            num_blocks,
            broken: AtomicBool::new(false),
        }
    }

    pub fn break_writes(&self, broken: bool) {
        self.broken.store(broken, Ordering::Relaxed);
    }

    /// 直接窥视某一块的内容
    pub fn block(&self, block_id: usize) -> Vec<u8> {
        let start = block_id * BLOCK_SIZE;
        self.data.lock()[start..start + BLOCK_SIZE].to_vec()
    }

    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        self.data.lock()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        check_request(self, block_id, buf.len())?;
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&self.data.lock()[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        check_request(self, block_id, buf.len())?;
        let start = block_id * BLOCK_SIZE;
        if self.broken.load(Ordering::Relaxed) {
            return Err(DeviceError::Io);
        }
        self.data.lock()[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

/// 格式化一块总块数为`num_blocks`的内存磁盘并挂载
pub fn mounted(num_blocks: usize) -> (Arc<RamDisk>, FileSystem) {
    let disk = Arc::new(RamDisk::new(num_blocks));
    FileSystem::format(&*disk).unwrap();
    let fs = FileSystem::mount(disk.clone()).unwrap();
    (disk, fs)
}

/// 内容可辨认的测试数据
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
