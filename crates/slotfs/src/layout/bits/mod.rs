//! Allocation bitmaps for index numbers and data units.

use crate::error::{FsError, FsResult};


/// Bit `i` set means unit `i` is allocated; bit 0 is the least significant
/// bit of byte 0.
///
/// The byte buffer spans whole blocks and may hold more bits than the
/// bitmap's `capacity`; bits at or above `capacity` are never handed out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    bytes: Vec<u8>,
    capacity: u32,
}

impl Bitmap {
    #[must_use]
    /// `zeroed` returns an empty bitmap of `len` bytes.
    pub fn zeroed(len: usize, capacity: u32) -> Self {
        Self::from_bytes(vec![0u8; len], capacity)
    }

    #[must_use]
    /// `from_bytes` wraps a persisted bitmap region.
    ///
    /// # Arguments
    /// * `bytes` - The region as read from disk.
    /// * `capacity` - The number of allocatable units, clamped to the buffer.
    pub fn from_bytes(bytes: Vec<u8>, capacity: u32) -> Self {
        let bits = u32::try_from(bytes.len().saturating_mul(8)).unwrap_or(u32::MAX);
        Self {
            bytes,
            capacity: capacity.min(bits),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    #[must_use]
    /// `get` returns the bit value at the provided index.
    pub fn get(&self, i: u32) -> bool {
        let (byte, bit) = ((i >> 3) as usize, i & 7);
        self.bytes.get(byte).is_some_and(|b| (b >> bit) & 1 == 1)
    }

    #[inline]
    /// `set` updates the bit at the provided index; indices outside the buffer
    /// are ignored.
    pub fn set(&mut self, i: u32, val: bool) {
        let (byte, bit) = ((i >> 3) as usize, i & 7);
        let m = 1u8 << bit;
        if let Some(b) = self.bytes.get_mut(byte) {
            if val {
                *b |= m;
            } else {
                *b &= !m;
            }
        }
    }

    /// Claims the lowest clear bit below `capacity`.
    ///
    /// # Errors
    /// Returns [`FsError::NoSpace`] when every unit below `capacity` is taken.
    pub fn allocate(&mut self) -> FsResult<u32> {
        for (byte_cursor, byte) in self.bytes.iter_mut().enumerate() {
            if *byte == u8::MAX {
                continue;
            }
            let bit_cursor = byte.trailing_ones();
            let index = u32::try_from(byte_cursor * 8).map_err(|_| FsError::NoSpace)? + bit_cursor;
            if index >= self.capacity {
                return Err(FsError::NoSpace);
            }
            *byte |= 1u8 << bit_cursor;
            return Ok(index);
        }
        Err(FsError::NoSpace)
    }

    #[must_use]
    /// `count_set` returns how many units below `capacity` are allocated.
    pub fn count_set(&self) -> u32 {
        (0..self.capacity).filter(|&i| self.get(i)).count() as u32
    }
}
