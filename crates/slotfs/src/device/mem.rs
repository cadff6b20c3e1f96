use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BlockDevice, check_io_size, check_unit};

#[derive(Debug, Default)]
struct MemDisk {
    bytes: Vec<u8>,
    reads: usize,
    writes: usize,
    closes: usize,
    fail_reads_after: Option<usize>,
    fail_writes_after: Option<usize>,
}

/// RAM-backed device.
///
/// Clones share the same storage and counters, so a caller can keep a handle
/// after handing a clone to the filesystem and inspect or remount it later.
#[derive(Debug, Clone)]
pub struct MemDevice {
    disk: Arc<Mutex<MemDisk>>,
    io_size: usize,
    size: u64,
    cursor: u64,
    closed: bool,
}

impl MemDevice {
    /// # Errors
    /// Returns an error if `io_size` is not a power of two or `len` is not a
    /// whole number of units.
    pub fn new(len: usize, io_size: usize) -> io::Result<Self> {
        check_io_size(io_size)?;
        if len % io_size != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("device length {len} is not a multiple of io size {io_size}"),
            ));
        }
        Ok(Self {
            disk: Arc::new(Mutex::new(MemDisk {
                bytes: vec![0u8; len],
                ..MemDisk::default()
            })),
            io_size,
            size: len as u64,
            cursor: 0,
            closed: false,
        })
    }

    /// A fresh, open handle onto the same storage.
    #[must_use]
    pub fn reopen(&self) -> Self {
        Self {
            disk: Arc::clone(&self.disk),
            io_size: self.io_size,
            size: self.size,
            cursor: 0,
            closed: false,
        }
    }

    fn disk(&self) -> io::Result<MutexGuard<'_, MemDisk>> {
        self.disk
            .lock()
            .map_err(|_| io::Error::other("memory device lock poisoned"))
    }

    /// Unit reads left before every further read fails.
    pub fn fail_reads_after(&self, n: usize) {
        if let Ok(mut disk) = self.disk() {
            disk.fail_reads_after = Some(n);
        }
    }

    /// Unit writes left before every further write fails.
    pub fn fail_writes_after(&self, n: usize) {
        if let Ok(mut disk) = self.disk() {
            disk.fail_writes_after = Some(n);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut disk) = self.disk() {
            disk.fail_reads_after = None;
            disk.fail_writes_after = None;
        }
    }

    #[must_use]
    pub fn reads(&self) -> usize {
        self.disk().map(|d| d.reads).unwrap_or(0)
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.disk().map(|d| d.writes).unwrap_or(0)
    }

    /// How many handles onto this storage have been released.
    #[must_use]
    pub fn closes(&self) -> usize {
        self.disk().map(|d| d.closes).unwrap_or(0)
    }

    /// Copy of `len` raw bytes at `offset`, bypassing unit granularity.
    #[must_use]
    pub fn snapshot(&self, offset: usize, len: usize) -> Vec<u8> {
        self.disk()
            .ok()
            .and_then(|d| d.bytes.get(offset..offset + len).map(<[u8]>::to_vec))
            .unwrap_or_default()
    }

    /// Overwrites raw bytes at `offset`, bypassing unit granularity.
    pub fn poke(&self, offset: usize, data: &[u8]) {
        if let Ok(mut disk) = self.disk() {
            if let Some(dst) = disk.bytes.get_mut(offset..offset + data.len()) {
                dst.copy_from_slice(data);
            }
        }
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "memory device is closed")
    }
}

impl BlockDevice for MemDevice {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if self.closed {
            return Err(Self::closed_error());
        }
        if offset > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {offset} past device end {}", self.size),
            ));
        }
        self.cursor = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(Self::closed_error());
        }
        check_unit(self.cursor, buf.len(), self.io_size, self.size)?;
        let off = usize::try_from(self.cursor).map_err(io::Error::other)?;
        let mut disk = self.disk()?;
        if let Some(left) = disk.fail_reads_after.as_mut() {
            if *left == 0 {
                return Err(io::Error::other("injected read failure"));
            }
            *left -= 1;
        }
        buf.copy_from_slice(&disk.bytes[off..off + buf.len()]);
        disk.reads += 1;
        drop(disk);
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(Self::closed_error());
        }
        check_unit(self.cursor, buf.len(), self.io_size, self.size)?;
        let off = usize::try_from(self.cursor).map_err(io::Error::other)?;
        let mut disk = self.disk()?;
        if let Some(left) = disk.fail_writes_after.as_mut() {
            if *left == 0 {
                return Err(io::Error::other("injected write failure"));
            }
            *left -= 1;
        }
        disk.bytes[off..off + buf.len()].copy_from_slice(buf);
        disk.writes += 1;
        drop(disk);
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn io_size(&self) -> usize {
        self.io_size
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.disk()?.closes += 1;
        Ok(())
    }
}
