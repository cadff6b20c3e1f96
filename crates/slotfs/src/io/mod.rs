//! Byte-granular access on top of a unit-granular block device.
//!
//! Any `(offset, size)` request is widened to the enclosing run of I/O units.
//! Reads copy the requested slice out of that run; writes read the run, patch
//! the slice and write the whole run back.


use tracing::warn;

use crate::device::BlockDevice;
use crate::error::FsResult;

/// Owns the device handle for the lifetime of a mount and releases it once.
pub struct BlockIo {
    dev: Box<dyn BlockDevice>,
    released: bool,
}

/// A request widened to unit boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedSpan {
    pub offset: u64,
    pub bias: usize,
    pub size: usize,
}

#[must_use]
pub const fn round_down(value: u64, unit: u64) -> u64 {
    value - value % unit
}

#[must_use]
pub const fn round_up(value: u64, unit: u64) -> u64 {
    if value % unit == 0 {
        value
    } else {
        (value / unit + 1) * unit
    }
}

/// Widens `[offset, offset + size)` to whole `unit`s.
#[must_use]
pub const fn aligned_span(offset: u64, size: usize, unit: usize) -> AlignedSpan {
    let aligned = round_down(offset, unit as u64);
    let bias = (offset - aligned) as usize;
    let total = round_up((size + bias) as u64, unit as u64) as usize;
    AlignedSpan {
        offset: aligned,
        bias,
        size: total,
    }
}

impl BlockIo {
    #[must_use]
    pub fn new(dev: Box<dyn BlockDevice>) -> Self {
        Self {
            dev,
            released: false,
        }
    }

    #[must_use]
    pub fn io_size(&self) -> usize {
        self.dev.io_size()
    }

    #[must_use]
    pub fn device_size(&self) -> u64 {
        self.dev.size()
    }

    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Reads `size` bytes starting at any byte `offset`.
    ///
    /// # Errors
    /// Returns [`FsError::Io`](crate::FsError::Io) if any unit read fails.
    pub fn read(&mut self, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let span = aligned_span(offset, size, self.io_size());
        let scratch = self.read_units(span)?;
        Ok(scratch[span.bias..span.bias + size].to_vec())
    }

    /// Writes `data` starting at any byte `offset`, preserving the bytes that
    /// share its first and last units.
    ///
    /// # Errors
    /// Returns [`FsError::Io`](crate::FsError::Io) if any unit read or write
    /// fails; units already written stay written.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> FsResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let unit = self.io_size();
        let span = aligned_span(offset, data.len(), unit);
        let mut scratch = if span.bias == 0 && data.len() % unit == 0 {
            vec![0u8; span.size]
        } else {
            self.read_units(span)?
        };
        scratch[span.bias..span.bias + data.len()].copy_from_slice(data);

        self.dev.seek(span.offset)?;
        for chunk in scratch.chunks(unit) {
            self.dev.write(chunk)?;
        }
        Ok(())
    }

    fn read_units(&mut self, span: AlignedSpan) -> FsResult<Vec<u8>> {
        let unit = self.io_size();
        let mut scratch = vec![0u8; span.size];
        self.dev.seek(span.offset)?;
        for chunk in scratch.chunks_mut(unit) {
            self.dev.read(chunk)?;
        }
        Ok(scratch)
    }

    /// Releases the device. Later calls do nothing.
    ///
    /// # Errors
    /// Returns [`FsError::Io`](crate::FsError::Io) if the device fails to
    /// flush; the handle counts as released either way.
    pub fn close(&mut self) -> FsResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.dev.close()?;
        Ok(())
    }
}

impl Drop for BlockIo {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(err) = self.dev.close() {
                warn!("device release on drop failed: {err}");
            }
        }
    }
}
