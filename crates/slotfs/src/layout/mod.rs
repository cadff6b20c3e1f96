//! Disk layout: region table and slot arithmetic.
//!
//! ```text
//! | super | index map | data map | slot 0 | slot 1 | ... | slot max_ino-1 |
//!                                 \ record (1 block) + data area (6 blocks) /
//! ```
//!
//! Every region is a whole number of logical blocks, a logical block being
//! `IO_UNITS_PER_BLOCK` device I/O units. Object `i` keeps its index record at
//! `inode_offset + i * BLOCKS_PER_OBJECT` blocks and its data area one block
//! later, so both addresses derive from the index number alone.

pub mod bits;
pub mod constants;

use constants::{
    BLOCKS_PER_OBJECT, DATA_BLOCKS_PER_OBJECT, DATA_MAP_BLOCKS, DATA_UNITS_PER_OBJECT,
    INDEX_BLOCKS_PER_OBJECT, INODE_MAP_BLOCKS, IO_UNITS_PER_BLOCK, MAGIC, SUPER_BLOCKS,
    SUPER_OFFSET,
};

use crate::error::{FsError, FsResult};
use crate::record::DiskInode;

/// Persisted super block. Runtime-only state (device handle, mount flag,
/// bitmap buffers, root entry) is not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSuper {
    pub magic: u32,
    pub usage: u32,
    pub max_ino: u32,
    pub max_data: u32,
    pub inode_map_blocks: u32,
    pub inode_map_offset: u64,
    pub data_map_blocks: u32,
    pub data_map_offset: u64,
    pub inode_offset: u64,
    pub data_offset: u64,
}

impl DiskSuper {
    pub const SIZE: usize = 56;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.usage.to_le_bytes());
        buf[8..12].copy_from_slice(&self.max_ino.to_le_bytes());
        buf[12..16].copy_from_slice(&self.max_data.to_le_bytes());
        buf[16..20].copy_from_slice(&self.inode_map_blocks.to_le_bytes());
        buf[20..28].copy_from_slice(&self.inode_map_offset.to_le_bytes());
        buf[28..32].copy_from_slice(&self.data_map_blocks.to_le_bytes());
        buf[32..40].copy_from_slice(&self.data_map_offset.to_le_bytes());
        buf[40..48].copy_from_slice(&self.inode_offset.to_le_bytes());
        buf[48..56].copy_from_slice(&self.data_offset.to_le_bytes());
        buf
    }

    /// Decodes a super block, or `None` when the magic marker is absent.
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().ok()?);
        if magic != MAGIC {
            return None;
        }
        Some(Self {
            magic,
            usage: u32::from_le_bytes(buf[4..8].try_into().ok()?),
            max_ino: u32::from_le_bytes(buf[8..12].try_into().ok()?),
            max_data: u32::from_le_bytes(buf[12..16].try_into().ok()?),
            inode_map_blocks: u32::from_le_bytes(buf[16..20].try_into().ok()?),
            inode_map_offset: u64::from_le_bytes(buf[20..28].try_into().ok()?),
            data_map_blocks: u32::from_le_bytes(buf[28..32].try_into().ok()?),
            data_map_offset: u64::from_le_bytes(buf[32..40].try_into().ok()?),
            inode_offset: u64::from_le_bytes(buf[40..48].try_into().ok()?),
            data_offset: u64::from_le_bytes(buf[48..56].try_into().ok()?),
        })
    }
}

/// In-memory super block: the persisted fields plus device geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub device_size: u64,
    pub io_size: usize,
    pub block_size: usize,
    pub usage: u32,
    pub max_ino: u32,
    pub max_data: u32,
    pub inode_map_blocks: u32,
    pub inode_map_offset: u64,
    pub data_map_blocks: u32,
    pub data_map_offset: u64,
    pub inode_offset: u64,
    pub data_offset: u64,
    pub mounted: bool,
}

impl SuperBlock {
    /// Computes a fresh layout for a device that carries none.
    ///
    /// # Errors
    /// Returns [`FsError::InvalidGeometry`] if a logical block cannot hold the
    /// on-disk records or the device cannot fit a single object slot.
    pub fn format(device_size: u64, io_size: usize) -> FsResult<Self> {
        let block_size = block_size_for(io_size)?;
        let blk = block_size as u64;
        let total_blocks = device_size / blk;
        let reserved = u64::from(SUPER_BLOCKS + INODE_MAP_BLOCKS + DATA_MAP_BLOCKS);
        let by_capacity = total_blocks.saturating_sub(reserved) / BLOCKS_PER_OBJECT;

        // Each bitmap owns exactly one block.
        let map_bits = blk * 8;
        let by_inode_map = map_bits * u64::from(INODE_MAP_BLOCKS);
        let by_data_map = map_bits * u64::from(DATA_MAP_BLOCKS) / u64::from(DATA_UNITS_PER_OBJECT);
        let max_ino = by_capacity.min(by_inode_map).min(by_data_map);
        if max_ino == 0 {
            return Err(FsError::InvalidGeometry(format!(
                "device of {device_size} bytes cannot hold one {}-block object slot",
                BLOCKS_PER_OBJECT
            )));
        }
        let max_ino = u32::try_from(max_ino)
            .map_err(|_| FsError::InvalidGeometry(format!("{max_ino} objects overflow u32")))?;

        let inode_map_offset = SUPER_OFFSET + u64::from(SUPER_BLOCKS) * blk;
        let data_map_offset = inode_map_offset + u64::from(INODE_MAP_BLOCKS) * blk;
        let inode_offset = data_map_offset + u64::from(DATA_MAP_BLOCKS) * blk;
        let data_offset = inode_offset + INDEX_BLOCKS_PER_OBJECT * blk;

        Ok(Self {
            device_size,
            io_size,
            block_size,
            usage: 0,
            max_ino,
            max_data: max_ino * DATA_UNITS_PER_OBJECT,
            inode_map_blocks: INODE_MAP_BLOCKS,
            inode_map_offset,
            data_map_blocks: DATA_MAP_BLOCKS,
            data_map_offset,
            inode_offset,
            data_offset,
            mounted: false,
        })
    }

    /// Adopts a persisted layout verbatim, then checks it against the device.
    ///
    /// # Errors
    /// Returns [`FsError::InvalidGeometry`] for an unusable I/O unit and
    /// [`FsError::Corrupt`] if the regions overlap or overrun the device.
    pub fn load(disk: &DiskSuper, device_size: u64, io_size: usize) -> FsResult<Self> {
        let sb = Self {
            device_size,
            io_size,
            block_size: block_size_for(io_size)?,
            usage: disk.usage,
            max_ino: disk.max_ino,
            max_data: disk.max_data,
            inode_map_blocks: disk.inode_map_blocks,
            inode_map_offset: disk.inode_map_offset,
            data_map_blocks: disk.data_map_blocks,
            data_map_offset: disk.data_map_offset,
            inode_offset: disk.inode_offset,
            data_offset: disk.data_offset,
            mounted: false,
        };
        sb.validate()?;
        Ok(sb)
    }

    #[must_use]
    pub const fn to_disk(&self) -> DiskSuper {
        DiskSuper {
            magic: MAGIC,
            usage: self.usage,
            max_ino: self.max_ino,
            max_data: self.max_data,
            inode_map_blocks: self.inode_map_blocks,
            inode_map_offset: self.inode_map_offset,
            data_map_blocks: self.data_map_blocks,
            data_map_offset: self.data_map_offset,
            inode_offset: self.inode_offset,
            data_offset: self.data_offset,
        }
    }

    /// Byte length of `n` logical blocks.
    #[must_use]
    pub const fn blocks(&self, n: u64) -> u64 {
        n * self.block_size as u64
    }

    #[must_use]
    pub const fn slot_size(&self) -> u64 {
        self.blocks(BLOCKS_PER_OBJECT)
    }

    /// Byte offset of the index record for `ino`.
    #[must_use]
    pub const fn inode_offset_of(&self, ino: u32) -> u64 {
        self.inode_offset + ino as u64 * self.slot_size()
    }

    /// Byte offset of the data area for `ino`.
    #[must_use]
    pub const fn data_offset_of(&self, ino: u32) -> u64 {
        self.data_offset + ino as u64 * self.slot_size()
    }

    /// Size of every object's data area.
    #[must_use]
    pub const fn data_area_size(&self) -> usize {
        self.blocks(DATA_BLOCKS_PER_OBJECT) as usize
    }

    #[must_use]
    pub const fn inode_map_len(&self) -> usize {
        self.blocks(self.inode_map_blocks as u64) as usize
    }

    #[must_use]
    pub const fn data_map_len(&self) -> usize {
        self.blocks(self.data_map_blocks as u64) as usize
    }

    /// First byte past the last object slot.
    #[must_use]
    pub const fn end_offset(&self) -> u64 {
        self.inode_offset + self.max_ino as u64 * self.slot_size()
    }

    fn validate(&self) -> FsResult<()> {
        let corrupt = |what: &str| -> FsResult<()> {
            Err(FsError::Corrupt(format!("super block: {what}")))
        };
        if self.max_ino == 0 {
            return corrupt("no object slots");
        }
        if self.inode_map_offset < SUPER_OFFSET + self.blocks(u64::from(SUPER_BLOCKS)) {
            return corrupt("index bitmap overlaps super block");
        }
        if self.data_map_offset < self.inode_map_offset + self.inode_map_len() as u64 {
            return corrupt("data bitmap overlaps index bitmap");
        }
        if self.inode_offset < self.data_map_offset + self.data_map_len() as u64 {
            return corrupt("index region overlaps data bitmap");
        }
        if self.data_offset != self.inode_offset + self.blocks(INDEX_BLOCKS_PER_OBJECT) {
            return corrupt("data offset does not follow the first index record");
        }
        if self.end_offset() > self.device_size {
            return corrupt("object slots run past the device end");
        }
        if u64::from(self.max_ino) > self.inode_map_len() as u64 * 8
            || u64::from(self.max_data) > self.data_map_len() as u64 * 8
        {
            return corrupt("bitmaps too small for declared capacity");
        }
        Ok(())
    }
}

fn block_size_for(io_size: usize) -> FsResult<usize> {
    let block_size = io_size
        .checked_mul(IO_UNITS_PER_BLOCK)
        .ok_or_else(|| FsError::InvalidGeometry(format!("io size {io_size} overflows")))?;
    if block_size < DiskInode::SIZE || block_size < DiskSuper::SIZE {
        return Err(FsError::InvalidGeometry(format!(
            "logical block of {block_size} bytes cannot hold an index record"
        )));
    }
    Ok(block_size)
}
