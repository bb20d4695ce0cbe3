use derive_more::{Display, From, Into};

use crate::{FsError, Result};

/// 同时打开的文件数上限
pub const OPEN_MAX_COUNT: usize = 32;

/// 文件描述符，即打开文件表中的下标
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Fd(usize);

/// 打开的文件：目录项槽位加上读写偏移量。
///
/// 同一个文件可被打开多次，各描述符的偏移量互不影响。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenFile {
    pub slot: usize,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FdTable {
    table: [Option<OpenFile>; OPEN_MAX_COUNT],
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            table: [None; OPEN_MAX_COUNT],
        }
    }

    /// 占用编号最小的空位，偏移量从0开始
    pub fn alloc(&mut self, slot: usize) -> Result<Fd> {
        let fd = self
            .table
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::OpenTableFull)?;
        self.table[fd] = Some(OpenFile { slot, offset: 0 });
        Ok(Fd(fd))
    }

    pub fn dealloc(&mut self, fd: Fd) -> Result<OpenFile> {
        self.table
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or(FsError::InvalidDescriptor)
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile> {
        self.table
            .get(fd.0)
            .and_then(Option::as_ref)
            .ok_or(FsError::InvalidDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.table
            .get_mut(fd.0)
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidDescriptor)
    }

    /// 目录项槽位`slot`是否还被某个描述符引用
    pub fn is_open(&self, slot: usize) -> bool {
        self.table.iter().flatten().any(|file| file.slot == slot)
    }

    pub fn open_count(&self) -> usize {
        self.table.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_first() {
        let mut fds = FdTable::new();
        assert_eq!(Ok(Fd(0)), fds.alloc(7));
        assert_eq!(Ok(Fd(1)), fds.alloc(7));
        assert_eq!(Ok(Fd(2)), fds.alloc(3));

        assert_eq!(Ok(OpenFile { slot: 7, offset: 0 }), fds.dealloc(Fd(1)));
        assert_eq!(Ok(Fd(1)), fds.alloc(5));
        assert_eq!(3, fds.open_count());
        assert!(fds.is_open(7));
        assert!(!fds.is_open(4));
    }

    #[test]
    fn full_and_invalid() {
        let mut fds = FdTable::new();
        for _ in 0..OPEN_MAX_COUNT {
            fds.alloc(0).unwrap();
        }
        assert_eq!(Err(FsError::OpenTableFull), fds.alloc(0));

        fds.dealloc(Fd(3)).unwrap();
        assert_eq!(Err(FsError::InvalidDescriptor), fds.dealloc(Fd(3)));
        assert_eq!(Err(FsError::InvalidDescriptor), fds.get(Fd(3)).copied());
        assert_eq!(
            Err(FsError::InvalidDescriptor),
            fds.get(Fd(OPEN_MAX_COUNT)).copied()
        );
    }

    #[test]
    fn independent_offsets() {
        let mut fds = FdTable::new();
        let a = fds.alloc(0).unwrap();
        let b = fds.alloc(0).unwrap();
        fds.get_mut(a).unwrap().offset = 100;
        assert_eq!(0, fds.get(b).unwrap().offset);
        assert_eq!(100, fds.get(a).unwrap().offset);
    }
}
