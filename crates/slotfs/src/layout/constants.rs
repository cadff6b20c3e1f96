//! Fixed parameters of the on-disk format.

/// MAGIC marks a device that already carries a layout ("SLFS").
pub const MAGIC: u32 = 0x534C_4653;
/// SUPER_OFFSET is the byte offset of the super block.
pub const SUPER_OFFSET: u64 = 0;
/// ROOT_INO is the index number of the root directory.
pub const ROOT_INO: u32 = 0;
/// NAME_LEN is the fixed width of entry names and link targets.
pub const NAME_LEN: usize = 128;
/// IO_UNITS_PER_BLOCK sizes a logical block in device I/O units.
pub const IO_UNITS_PER_BLOCK: usize = 2;
/// DEFAULT_IO_SIZE is the I/O unit assumed for image files.
pub const DEFAULT_IO_SIZE: usize = 512;

pub const SUPER_BLOCKS: u32 = 1;
pub const INODE_MAP_BLOCKS: u32 = 1;
pub const DATA_MAP_BLOCKS: u32 = 1;

/// INDEX_BLOCKS_PER_OBJECT is the slot space holding one index record.
pub const INDEX_BLOCKS_PER_OBJECT: u64 = 1;
/// DATA_BLOCKS_PER_OBJECT is the fixed data area following each record.
pub const DATA_BLOCKS_PER_OBJECT: u64 = 6;
/// BLOCKS_PER_OBJECT is the full footprint of one slot.
pub const BLOCKS_PER_OBJECT: u64 = INDEX_BLOCKS_PER_OBJECT + DATA_BLOCKS_PER_OBJECT;
/// DATA_UNITS_PER_OBJECT is how many data-bitmap units each object accounts for.
pub const DATA_UNITS_PER_OBJECT: u32 = 6;
