//! Block device capability consumed by the engine.
//!
//! A device only moves whole I/O units: every `read`/`write` transfers exactly
//! `io_size()` bytes at the current seek position and advances it.

#[cfg(test)]
mod device_tests;
mod image;
mod mem;

use std::io;

pub use image::ImageDevice;
pub use mem::MemDevice;

pub trait BlockDevice: Send {
    /// Moves the cursor to an absolute byte offset.
    ///
    /// # Errors
    /// Returns an error if the offset lies past the end of the device.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Reads one I/O unit into `buf`, which must be exactly `io_size()` long.
    ///
    /// # Errors
    /// Returns an error if the unit cannot be read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one I/O unit from `buf`, which must be exactly `io_size()` long.
    ///
    /// # Errors
    /// Returns an error if the unit cannot be written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Total device size in bytes.
    fn size(&self) -> u64;

    /// Raw I/O unit in bytes.
    fn io_size(&self) -> usize;

    /// Releases the device. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns an error if pending writes cannot be flushed.
    fn close(&mut self) -> io::Result<()>;
}

/// Validates a unit transfer at `cursor` against the device bounds.
fn check_unit(cursor: u64, len: usize, io_size: usize, size: u64) -> io::Result<()> {
    if len != io_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("transfer of {len} bytes, device unit is {io_size}"),
        ));
    }
    if cursor.saturating_add(len as u64) > size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("unit at {cursor} runs past device end {size}"),
        ));
    }
    Ok(())
}

fn check_io_size(io_size: usize) -> io::Result<()> {
    if io_size == 0 || !io_size.is_power_of_two() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("io size {io_size} is not a power of two"),
        ));
    }
    Ok(())
}
