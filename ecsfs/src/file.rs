//! 按字节偏移读写文件
//!
//! 文件内偏移`offset`落在链表的第`offset / BLOCK_SIZE`块上。
//! 整块覆盖的部分直接与设备交换，首尾不满一块的部分经由暂存块中转。

use alloc::boxed::Box;

use block_dev::{BLOCK_SIZE, BlockDevice};

use crate::volume::{DirEntry, Fat, SuperBlock};
use crate::{BlockId, FsError, Result};

/// 单个文件的字节数上限，受目录项中`u32`大小字段限制
pub const FILE_MAX_SIZE: usize = u32::MAX as usize;

/// 从`offset`开始读取，遇到文件末尾即止，返回读到的字节数。
pub(crate) fn read_at(
    dev: &dyn BlockDevice,
    sb: &SuperBlock,
    fat: &Fat,
    entry: &DirEntry,
    offset: usize,
    buf: &mut [u8],
) -> Result<usize> {
    let end = offset
        .checked_add(buf.len())
        .ok_or(FsError::InvalidArgument)?
        .min(entry.size()); // exclusive

    if offset >= end {
        return Ok(0);
    }

    let mut scratch: Option<Box<[u8; BLOCK_SIZE]>> = None;
    let mut id = fat.block_at(entry.first_block(), offset)?;
    let mut pos = offset;

    loop {
        let in_block = pos % BLOCK_SIZE;
        let len = (BLOCK_SIZE - in_block).min(end - pos);
        let dst = &mut buf[pos - offset..pos - offset + len];

        log::trace!("read data block {id}: {len} bytes at {in_block}");
        if len == BLOCK_SIZE {
            dev.read_block(sb.data_block(id), dst)?;
        } else {
            let block = scratch.get_or_insert_with(|| Box::new([0; BLOCK_SIZE]));
            dev.read_block(sb.data_block(id), block.as_mut_slice())?;
            dst.copy_from_slice(&block[in_block..in_block + len]);
        }

        pos += len;
        if pos == end {
            break;
        }
        id = fat.next(id)?.ok_or(FsError::Corrupted)?;
    }

    Ok(end - offset)
}

/// 从`offset`开始写入，按需逐块延长链表，返回写入的字节数。
///
/// 数据区耗尽时能写多少写多少，返回的字节数可能少于`buf.len()`，甚至为0。
/// 设备出错时新接上的块会被归还，文件大小保持不变。
pub(crate) fn write_at(
    dev: &dyn BlockDevice,
    sb: &SuperBlock,
    fat: &mut Fat,
    entry: &mut DirEntry,
    offset: usize,
    buf: &[u8],
) -> Result<usize> {
    debug_assert!(offset <= entry.size());

    if buf.is_empty() {
        return Ok(0);
    }

    let end = offset
        .checked_add(buf.len())
        .filter(|&end| end <= FILE_MAX_SIZE)
        .ok_or(FsError::InvalidArgument)?;

    let old_blocks = entry.size().div_ceil(BLOCK_SIZE);
    let blocks = grow(fat, entry, old_blocks, end.div_ceil(BLOCK_SIZE))?;

    let end = end.min(blocks * BLOCK_SIZE);
    if offset >= end {
        log::warn!("no space left for {:?}", entry.name());
        return Ok(0);
    }
    if end < offset + buf.len() {
        log::warn!(
            "short write to {:?}: {} of {} bytes",
            entry.name(),
            end - offset,
            buf.len()
        );
    }

    let data = &buf[..end - offset];
    if let Err(e) = write_blocks(dev, sb, fat, entry.first_block(), old_blocks, offset, data) {
        log::error!("write to {:?} failed: {e}", entry.name());
        let first = fat.truncate(entry.first_block(), old_blocks)?;
        entry.set_first_block(first);
        return Err(e);
    }

    entry.resize(entry.size().max(end));
    Ok(end - offset)
}

/// 把链表从`have`块延长到`want`块，空间不足时提前停下，返回最终的块数。
fn grow(fat: &mut Fat, entry: &mut DirEntry, mut have: usize, want: usize) -> Result<usize> {
    if have >= want {
        return Ok(have);
    }

    let mut tail = if entry.first_block() == BlockId::EOC {
        match fat.alloc() {
            Ok(first) => {
                entry.set_first_block(first);
                have = 1;
                first
            }
            Err(FsError::OutOfSpace) => return Ok(0),
            Err(e) => return Err(e),
        }
    } else {
        fat.last(entry.first_block())?
    };

    while have < want {
        match fat.extend(tail) {
            Ok(next) => {
                tail = next;
                have += 1;
            }
            Err(FsError::OutOfSpace) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(have)
}

/// 把`data`写到链表中文件偏移`offset`处，链表已足够长。
///
/// 第`fresh`块及其后的块是刚分配的，其中不属于`data`的部分一律补零，不必先读。
fn write_blocks(
    dev: &dyn BlockDevice,
    sb: &SuperBlock,
    fat: &Fat,
    first: BlockId,
    fresh: usize,
    offset: usize,
    data: &[u8],
) -> Result<()> {
    let end = offset + data.len();
    let mut scratch: Option<Box<[u8; BLOCK_SIZE]>> = None;
    let mut id = fat.block_at(first, offset)?;
    let mut pos = offset;

    loop {
        let in_block = pos % BLOCK_SIZE;
        let len = (BLOCK_SIZE - in_block).min(end - pos);
        let src = &data[pos - offset..pos - offset + len];

        log::trace!("write data block {id}: {len} bytes at {in_block}");
        if len == BLOCK_SIZE {
            dev.write_block(sb.data_block(id), src)?;
        } else {
            let block = scratch.get_or_insert_with(|| Box::new([0; BLOCK_SIZE]));
            if pos / BLOCK_SIZE < fresh {
                dev.read_block(sb.data_block(id), block.as_mut_slice())?;
            } else {
                block.fill(0);
            }
            block[in_block..in_block + len].copy_from_slice(src);
            dev.write_block(sb.data_block(id), block.as_slice())?;
        }

        pos += len;
        if pos == end {
            break;
        }
        id = fat.next(id)?.ok_or(FsError::Corrupted)?;
    }

    Ok(())
}
