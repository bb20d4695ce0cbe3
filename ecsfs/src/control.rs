use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use block_dev::{BLOCK_SIZE, BlockDevice};
use spin::Mutex;

use crate::fd::FdTable;
use crate::file;
use crate::volume::{FILE_MAX_COUNT, SUPER_BLOCK, Fat, RootDir, SuperBlock, root_dir};
use crate::{BlockId, Fd, FsError, Result};

/// 已挂载的文件系统
///
/// 超级块、FAT与根目录在挂载时整体读入内存，之后的目录与描述符操作
/// 都不碰设备，只有文件数据的读写直接落到数据块上。
/// 卸载（或[`FileSystem::sync`]）时元数据才写回。
#[derive(Debug)]
pub struct FileSystem {
    device: Arc<dyn BlockDevice>,
    sb: SuperBlock,
    fat: Fat,
    root_dir: RootDir,
    fd_table: FdTable,
}

impl FileSystem {
    /// 在设备上建立全新的空文件系统，数据块数取可能的最大值。
    pub fn format(dev: &dyn BlockDevice) -> Result<()> {
        let sb = SuperBlock::new(dev.num_blocks())?;

        let mut block = Box::new([0u8; BLOCK_SIZE]);
        sb.encode(block.as_mut_slice());
        dev.write_block(SUPER_BLOCK, block.as_slice())?;
        Fat::new(sb.data_blocks()).store(dev, &sb)?;
        RootDir::new().store(dev, &sb)?;
        dev.flush()?;

        log::debug!(
            "formatted {} blocks, {} for data",
            sb.total_blocks(),
            sb.data_blocks()
        );
        Ok(())
    }

    /// 校验并载入设备上的文件系统。任何一处不合法都报[`FsError::InvalidFormat`]。
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self> {
        let sb = {
            let mut block = Box::new([0u8; BLOCK_SIZE]);
            device.read_block(SUPER_BLOCK, block.as_mut_slice())?;
            SuperBlock::decode(block.as_slice())?
        };
        sb.validate(device.num_blocks())?;

        let fat = Fat::load(&*device, &sb)?;
        let root_dir = RootDir::load(&*device, &sb)?;

        log::debug!(
            "mounted: {} data blocks, {} free, {} files",
            sb.data_blocks(),
            fat.free_count(),
            FILE_MAX_COUNT - root_dir.free_count()
        );
        Ok(Self {
            device,
            sb,
            fat,
            root_dir,
            fd_table: FdTable::new(),
        })
    }

    /// 写回元数据并交还设备。
    ///
    /// 仍有打开的文件时报[`FsError::FileInUse`]，文件系统原样交还，可继续使用。
    pub fn unmount(self) -> Result<Arc<dyn BlockDevice>, (Self, FsError)> {
        let open = self.fd_table.open_count();
        if open > 0 {
            log::warn!("cannot unmount with {open} open files");
            return Err((self, FsError::FileInUse));
        }
        if let Err(e) = self.sync() {
            return Err((self, e));
        }

        log::debug!("unmounted");
        Ok(self.device)
    }

    /// 把FAT与根目录写回设备
    pub fn sync(&self) -> Result<()> {
        let dev = &*self.device;
        self.fat.store(dev, &self.sb)?;
        self.root_dir.store(dev, &self.sb)?;
        dev.flush()?;
        Ok(())
    }

    /// 交给多个线程共用，所有操作经由同一把锁串行执行。
    pub fn into_shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    pub fn info(&self) -> Info {
        Info {
            total_blocks: self.sb.total_blocks(),
            fat_blocks: self.sb.fat_blocks(),
            root_dir_block: self.sb.root_dir_block(),
            data_start: self.sb.data_start(),
            data_blocks: self.sb.data_blocks(),
            fat_free: self.fat.free_count(),
            root_dir_free: self.root_dir.free_count(),
        }
    }

    /// 创建空文件
    pub fn create(&mut self, name: &str) -> Result<()> {
        let slot = self.root_dir.insert(name)?;
        log::debug!("create {name:?} in slot {slot}");
        Ok(())
    }

    /// 删除文件并释放它的数据块。文件仍被打开时报[`FsError::FileInUse`]，
    /// 块链表损坏时报[`FsError::Corrupted`]且不改动任何状态。
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let slot = self.lookup(name)?;
        if self.fd_table.is_open(slot) {
            return Err(FsError::FileInUse);
        }

        // 链表有损坏时什么都不释放
        let entry = self.root_dir.get(slot);
        self.fat.check([(entry.first_block(), entry.size())])?;
        self.fat.release(entry.first_block())?;
        let entry = self.root_dir.remove(slot);
        log::debug!("delete {name:?}, {} bytes", entry.size());
        Ok(())
    }

    /// 按槽位顺序列出所有文件
    pub fn ls(&self) -> Ls<'_> {
        Ls {
            inner: self.root_dir.iter(),
        }
    }

    /// 打开文件，偏移量置0
    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let slot = self.lookup(name)?;
        let fd = self.fd_table.alloc(slot)?;
        log::trace!("open {name:?} as fd {fd}");
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.fd_table.dealloc(fd)?;
        Ok(())
    }

    /// 文件当前的字节数
    pub fn stat(&self, fd: Fd) -> Result<usize> {
        let file = self.fd_table.get(fd)?;
        Ok(self.root_dir.get(file.slot).size())
    }

    /// 移动偏移量，可以恰好停在文件末尾，但不能越过。
    pub fn lseek(&mut self, fd: Fd, offset: usize) -> Result<()> {
        let file = self.fd_table.get_mut(fd)?;
        if offset > self.root_dir.get(file.slot).size() {
            return Err(FsError::OffsetOutOfRange);
        }
        file.offset = offset;
        Ok(())
    }

    /// 从当前偏移量读取，返回读到的字节数，到达文件末尾时为0。
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let opened = self.fd_table.get_mut(fd)?;
        let read = file::read_at(
            &*self.device,
            &self.sb,
            &self.fat,
            self.root_dir.get(opened.slot),
            opened.offset,
            buf,
        )?;
        opened.offset += read;
        Ok(read)
    }

    /// 从当前偏移量写入，必要时延长文件。
    ///
    /// 数据区耗尽时只写入放得下的部分，返回值可能小于`buf.len()`。
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let opened = self.fd_table.get_mut(fd)?;
        let wrote = file::write_at(
            &*self.device,
            &self.sb,
            &mut self.fat,
            self.root_dir.get_mut(opened.slot),
            opened.offset,
            buf,
        )?;
        opened.offset += wrote;
        Ok(wrote)
    }

    /// 检查每个文件的块链表：以EOC结尾、长度与大小相符、互不相交。
    pub fn check(&self) -> Result<()> {
        self.fat.check(
            self.root_dir
                .iter()
                .map(|(_, entry)| (entry.first_block(), entry.size())),
        )
    }

    /// 文件占用的数据块，按链表顺序
    pub fn chain(&self, name: &str) -> Result<Vec<BlockId>> {
        let slot = self.lookup(name)?;
        Ok(self.fat.chain(self.root_dir.get(slot).first_block()).collect())
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        root_dir::check_name(name)?;
        self.root_dir.find(name).ok_or(FsError::NotFound)
    }
}

/// [`FileSystem::info`]的结果，[`Display`](fmt::Display)输出以`FS Info:`开头的多行报告。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    pub total_blocks: usize,
    pub fat_blocks: usize,
    pub root_dir_block: usize,
    pub data_start: usize,
    pub data_blocks: usize,
    /// 空闲数据块数
    pub fat_free: usize,
    /// 空闲目录项数
    pub root_dir_free: usize,
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FS Info:")?;
        writeln!(f, "total_blk_count={}", self.total_blocks)?;
        writeln!(f, "fat_blk_count={}", self.fat_blocks)?;
        writeln!(f, "rdir_blk={}", self.root_dir_block)?;
        writeln!(f, "data_blk={}", self.data_start)?;
        writeln!(f, "data_blk_count={}", self.data_blocks)?;
        writeln!(f, "fat_free_ratio={}/{}", self.fat_free, self.data_blocks)?;
        writeln!(f, "rdir_free_ratio={}/{}", self.root_dir_free, FILE_MAX_COUNT)
    }
}

/// 目录中的一个文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo<'a> {
    pub name: &'a str,
    pub size: usize,
    /// 空文件为[`BlockId::EOC`]
    pub first_block: BlockId,
}

/// [`FileSystem::ls`]返回的迭代器。
///
/// 克隆一份即可从头再遍历；[`Display`](fmt::Display)输出以`FS Ls:`开头的文件清单。
#[derive(Debug, Clone)]
pub struct Ls<'a> {
    inner: root_dir::Iter<'a>,
}

impl<'a> Iterator for Ls<'a> {
    type Item = FileInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, entry)| FileInfo {
            name: entry.name(),
            size: entry.size(),
            first_block: entry.first_block(),
        })
    }
}

impl fmt::Display for Ls<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FS Ls:")?;
        for file in self.clone() {
            writeln!(
                f,
                "file: {}, size: {}, data_blk: {}",
                file.name, file.size, file.first_block
            )?;
        }
        Ok(())
    }
}
