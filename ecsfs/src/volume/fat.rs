use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use block_dev::{BLOCK_SIZE, BlockDevice};

use crate::volume::SuperBlock;
use crate::{BlockError, BlockId, FsError, Result};

/// 一块能容纳多少条FAT表项
pub const FAT_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / mem::size_of::<u16>();

/// 文件分配表
///
/// 每个数据块对应一条表项，表项的值为[`BlockId::FREE`]、[`BlockId::EOC`]，
/// 或是同一文件中下一块的编号。挂载时整张表读入内存，卸载时写回。
#[derive(Debug, Clone)]
pub struct Fat {
    entries: Vec<BlockId>,
}

impl Fat {
    /// 全新的空表，0号项为[`BlockId::EOC`]
    pub fn new(data_blocks: usize) -> Self {
        let mut entries = vec![BlockId::FREE; data_blocks];
        entries[0] = BlockId::EOC;
        Self { entries }
    }

    /// 从FAT区读入整张表，并拒绝不可能出现的表项。
    pub fn load(dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<Self> {
        let data_blocks = sb.data_blocks();
        let mut entries = Vec::with_capacity(sb.fat_blocks() * FAT_ENTRIES_PER_BLOCK);
        let mut block = Box::new([0u8; BLOCK_SIZE]);

        for block_id in sb.fat_area() {
            dev.read_block(block_id, block.as_mut_slice())?;
            entries.extend(
                block
                    .chunks_exact(2)
                    .map(|raw| BlockId::from_le_bytes([raw[0], raw[1]])),
            );
        }
        entries.truncate(data_blocks);

        if entries[0] != BlockId::EOC {
            log::error!("FAT entry #0 should be EOC, found {}", entries[0]);
            return Err(FsError::InvalidFormat);
        }
        if let Some((i, id)) = entries.iter().enumerate().find(|&(_, &id)| {
            id != BlockId::FREE && id != BlockId::EOC && usize::from(id) >= data_blocks
        }) {
            log::error!("FAT entry #{i} points outside the data area: {id}");
            return Err(FsError::InvalidFormat);
        }

        Ok(Self { entries })
    }

    /// 把整张表写回FAT区，末块中多余的表项补零。
    pub fn store(&self, dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<()> {
        let mut block = Box::new([0u8; BLOCK_SIZE]);
        let mut chunks = self.entries.chunks(FAT_ENTRIES_PER_BLOCK);

        for block_id in sb.fat_area() {
            block.fill(0);
            if let Some(chunk) = chunks.next() {
                for (raw, id) in block.chunks_exact_mut(2).zip(chunk) {
                    raw.copy_from_slice(&id.to_le_bytes());
                }
            }
            dev.write_block(block_id, block.as_slice())?;
        }

        Ok(())
    }

    /// 数据块总数（含不可分配的0号块）
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn free_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|&&id| id == BlockId::FREE)
            .count()
    }

    /// 获取下一个块编号。
    /// 若`id`指向未分配块，则报错。
    /// `Ok(None)`表示`id`为链表上最后一个块。
    pub fn next(&self, id: BlockId) -> Result<Option<BlockId>, BlockError> {
        let id = id.validate(self.len())?;

        match self.entries[usize::from(id)] {
            BlockId::EOC => Ok(None),
            next => next.validate(self.len()).map(Some),
        }
    }

    /// 从`head`出发走`n`步所到达的块。链表不够长时报错。
    pub fn nth(&self, head: BlockId, n: usize) -> Result<BlockId> {
        let mut id = head.validate(self.len())?;
        for _ in 0..n {
            id = self.next(id)?.ok_or(FsError::Corrupted)?;
        }
        Ok(id)
    }

    /// 文件内字节偏移`offset`所在的块。
    #[inline]
    pub fn block_at(&self, head: BlockId, offset: usize) -> Result<BlockId> {
        self.nth(head, offset / BLOCK_SIZE)
    }

    /// 链表的最后一块
    pub fn last(&self, head: BlockId) -> Result<BlockId> {
        let mut id = head.validate(self.len())?;
        for _ in 0..self.len() {
            match self.next(id)? {
                Some(next) => id = next,
                None => return Ok(id),
            }
        }
        Err(FsError::Corrupted)
    }

    /// 顺着链表遍历。最多走表长那么多步，成环也能停下。
    pub fn chain(&self, head: BlockId) -> Chain<'_> {
        Chain {
            fat: self,
            cursor: head.validate(self.len()).ok(),
            budget: self.len(),
        }
    }

    /// 寻找编号最小的空闲块，标记为链表末尾。
    pub fn alloc(&mut self) -> Result<BlockId> {
        let index = self
            .entries
            .iter()
            .skip(BlockId::MIN.into())
            .position(|&id| id == BlockId::FREE)
            .map(|i| i + usize::from(BlockId::MIN))
            .ok_or(FsError::OutOfSpace)?;

        self.entries[index] = BlockId::EOC;
        log::trace!("alloc data block {index}");
        Ok(BlockId::new(index as u16))
    }

    /// 在链表末尾`tail`之后接上新块。空间不足时链表保持原样。
    pub fn extend(&mut self, tail: BlockId) -> Result<BlockId> {
        let tail = tail.validate(self.len())?;
        debug_assert_eq!(BlockId::EOC, self.entries[usize::from(tail)]);

        let new = self.alloc()?;
        self.entries[usize::from(tail)] = new;
        Ok(new)
    }

    /// 释放整个链表；`head`为[`BlockId::EOC`]（空文件）时什么也不做。
    pub fn release(&mut self, head: BlockId) -> Result<()> {
        if head == BlockId::EOC {
            return Ok(());
        }

        let mut id = head.validate(self.len())?;
        for _ in 0..self.len() {
            let next = mem::replace(&mut self.entries[usize::from(id)], BlockId::FREE);
            log::trace!("free data block {id}");
            match next {
                BlockId::EOC => return Ok(()),
                next => id = next.validate(self.len())?,
            }
        }

        Err(FsError::Corrupted)
    }

    /// 只保留链表的前`keep`块，释放其余部分，返回新的链表头。
    pub fn truncate(&mut self, head: BlockId, keep: usize) -> Result<BlockId> {
        if keep == 0 {
            self.release(head)?;
            return Ok(BlockId::EOC);
        }

        let tail = self.nth(head, keep - 1)?;
        let rest = mem::replace(&mut self.entries[usize::from(tail)], BlockId::EOC);
        self.release(rest)?;
        Ok(head)
    }

    /// 检查各链表：以EOC结尾、长度与文件大小相符、彼此不相交。
    ///
    /// `files`给出每个文件的首块号与字节数。
    pub fn check(&self, files: impl IntoIterator<Item = (BlockId, usize)>) -> Result<()> {
        let mut owned = vec![false; self.len()];

        for (head, size) in files {
            let expected = size.div_ceil(BLOCK_SIZE);
            if head == BlockId::EOC {
                if expected != 0 {
                    log::error!("file of {size} bytes has no block");
                    return Err(FsError::Corrupted);
                }
                continue;
            }

            let mut count = 0;
            let mut cursor = Some(head.validate(self.len())?);
            while let Some(id) = cursor {
                if mem::replace(&mut owned[usize::from(id)], true) {
                    log::error!("block {id} is shared or loops back");
                    return Err(FsError::Corrupted);
                }
                count += 1;
                cursor = self.next(id)?;
            }

            if count != expected {
                log::error!("chain at {head} has {count} blocks, {size} bytes need {expected}");
                return Err(FsError::Corrupted);
            }
        }

        Ok(())
    }
}

/// [`Fat::chain`]返回的迭代器
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    fat: &'a Fat,
    cursor: Option<BlockId>,
    budget: usize,
}

impl Iterator for Chain<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        self.budget = self.budget.checked_sub(1)?;
        self.cursor = self.fat.next(id).ok().flatten();
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    fn collect(fat: &Fat, head: BlockId) -> Vec<u16> {
        fat.chain(head).map(u16::from).collect()
    }

    #[test]
    fn alloc_lowest_first() {
        let mut fat = Fat::new(5);
        assert_eq!(4, fat.free_count());
        assert_eq!(BlockId::new(1), fat.alloc().unwrap());
        assert_eq!(BlockId::new(2), fat.alloc().unwrap());
        fat.release(BlockId::new(1)).unwrap();
        assert_eq!(BlockId::new(1), fat.alloc().unwrap());
        assert_eq!(BlockId::new(3), fat.alloc().unwrap());
        assert_eq!(BlockId::new(4), fat.alloc().unwrap());
        assert_eq!(Err(FsError::OutOfSpace), fat.alloc());
        assert_eq!(0, fat.free_count());
    }

    #[test]
    fn extend_and_walk() {
        let mut fat = Fat::new(8);
        let head = fat.alloc().unwrap();
        let other = fat.alloc().unwrap();
        let second = fat.extend(head).unwrap();
        let third = fat.extend(second).unwrap();

        assert_eq!([1u16, 3, 4], collect(&fat, head).as_slice());
        assert_eq!([2u16], collect(&fat, other).as_slice());
        assert_eq!(Ok(third), fat.last(head));
        assert_eq!(Ok(second), fat.nth(head, 1));
        assert_eq!(Ok(third), fat.block_at(head, 2 * BLOCK_SIZE + 7));
        assert_eq!(Err(FsError::Corrupted), fat.nth(head, 3));
        assert_eq!(Ok(None), fat.next(third));
        assert_eq!(Err(BlockError::Free), fat.next(BlockId::new(5)));
    }

    #[test]
    fn extend_without_space_keeps_chain() {
        let mut fat = Fat::new(3);
        let head = fat.alloc().unwrap();
        let tail = fat.extend(head).unwrap();
        assert_eq!(Err(FsError::OutOfSpace), fat.extend(tail));
        assert_eq!([1u16, 2], collect(&fat, head).as_slice());
        assert_eq!(Ok(None), fat.next(tail));
    }

    #[test]
    fn release_and_truncate() {
        let mut fat = Fat::new(10);
        let head = fat.alloc().unwrap();
        let mut tail = head;
        for _ in 0..4 {
            tail = fat.extend(tail).unwrap();
        }
        assert_eq!(4, fat.free_count());

        assert_eq!(Ok(head), fat.truncate(head, 2));
        assert_eq!([1u16, 2], collect(&fat, head).as_slice());
        assert_eq!(7, fat.free_count());

        assert_eq!(Ok(BlockId::EOC), fat.truncate(head, 0));
        assert_eq!(9, fat.free_count());

        // 空文件
        assert_eq!(Ok(()), fat.release(BlockId::EOC));
        assert_eq!(0, fat.chain(BlockId::EOC).count());
    }

    #[test]
    fn check_chains() {
        let mut fat = Fat::new(10);
        let a = fat.alloc().unwrap();
        fat.extend(a).unwrap();
        let b = fat.alloc().unwrap();

        assert_eq!(Ok(()), fat.check([(a, BLOCK_SIZE + 1), (b, 1), (BlockId::EOC, 0)]));
        assert_eq!(Err(FsError::Corrupted), fat.check([(a, 1)]));
        assert_eq!(Err(FsError::Corrupted), fat.check([(BlockId::EOC, 1)]));
        // 两个文件共用同一链表
        assert_eq!(Err(FsError::Corrupted), fat.check([(b, 1), (b, 1)]));

        // 成环
        fat.entries[usize::from(b)] = b;
        assert_eq!(Err(FsError::Corrupted), fat.check([(b, BLOCK_SIZE)]));
        assert_eq!(10, fat.chain(b).count());
        assert_eq!(Err(FsError::Corrupted), fat.last(b));
    }
}
