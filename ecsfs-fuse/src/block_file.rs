use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{BLOCK_SIZE, BlockDevice, DeviceError, check_request};
use send_wrapper::SendWrapper;

/// 以宿主机上的镜像文件充当虚拟磁盘，文件长度须为块大小的整数倍。
///
/// 只能在创建它的线程上使用。
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    num_blocks: usize,
}

impl BlockFile {
    /// 打开已有的镜像
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        if len % BLOCK_SIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image size {len} is not a multiple of {BLOCK_SIZE}"),
            ));
        }
        Ok(Self::new(file, len / BLOCK_SIZE))
    }

    /// 新建（或清空）一个`num_blocks`块大小的镜像，内容全零
    pub fn create(path: impl AsRef<Path>, num_blocks: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((num_blocks * BLOCK_SIZE) as u64)?;
        Ok(Self::new(file, num_blocks))
    }

    fn new(file: File, num_blocks: usize) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(file)),
            num_blocks,
        }
    }
}

fn io_error(e: io::Error) -> DeviceError {
    log::error!("image file: {e}");
    DeviceError::Io
}

impl BlockDevice for BlockFile {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        check_request(self, block_id, buf.len())?;
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(io_error)?;
        file.read_exact(buf).map_err(io_error)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        check_request(self, block_id, buf.len())?;
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(io_error)?;
        file.write_all(buf).map_err(io_error)
    }

    fn flush(&self) -> Result<(), DeviceError> {
        self.inner.borrow_mut().sync_data().map_err(io_error)
    }
}
