use derive_more::{Display, From, Into};

/// 数据块编号，即FAT表项的值。
///
/// 编号是数据区内的相对索引，`0`号项恒为[`BlockId::EOC`]，不参与分配，
/// 因此表项值`0`可以无歧义地表示“空闲”。
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct BlockId(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    Free,
    Eoc,
    /// 超出数据区的编号
    OutOfRange,
}

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.0 as usize
    }
}

impl BlockId {
    pub const FREE: Self = Self(0);

    /// 最小的可用块号
    pub const MIN: Self = Self(1);

    /// 链表末尾；空文件的首块号也是它
    pub const EOC: Self = Self(0xFFFF);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// 校验此编号能否作为链表中的一个节点，`data_blocks`为数据区块数。
    pub fn validate(self, data_blocks: usize) -> Result<Self, BlockError> {
        match self {
            BlockId::FREE => Err(BlockError::Free),
            BlockId::EOC => Err(BlockError::Eoc),
            id if usize::from(id) >= data_blocks => Err(BlockError::OutOfRange),
            id => Ok(id),
        }
    }

    pub(crate) fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}
