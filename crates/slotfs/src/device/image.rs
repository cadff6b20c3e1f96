use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use memmap2::{MmapMut, MmapOptions};

use super::{BlockDevice, check_io_size, check_unit};

/// Disk image file mapped into memory and addressed in I/O units.
pub struct ImageDevice {
    path: PathBuf,
    file: Option<File>,
    map: Option<MmapMut>,
    len: u64,
    io_size: usize,
    cursor: u64,
}

impl ImageDevice {
    /// Creates (or resizes) an image of `len` bytes and maps it.
    ///
    /// # Errors
    /// Returns an error if the image cannot be created, sized or mapped, or if
    /// `len` is not a whole number of I/O units.
    pub fn create(path: impl AsRef<Path>, len: u64, io_size: usize) -> anyhow::Result<Self> {
        check_io_size(io_size)?;
        if len == 0 || len % io_size as u64 != 0 {
            anyhow::bail!("image length {len} is not a multiple of io size {io_size}");
        }
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to create image {}", path.display()))?;
        file.set_len(len)?;
        Self::map(path, file, len, io_size)
    }

    /// Opens an existing image without changing its size.
    ///
    /// # Errors
    /// Returns an error if the image is missing, empty or cannot be mapped.
    pub fn open(path: impl AsRef<Path>, io_size: usize) -> anyhow::Result<Self> {
        check_io_size(io_size)?;
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open image {}", path.display()))?;
        let len = file.metadata()?.len();
        if len == 0 {
            anyhow::bail!("image {} is empty", path.display());
        }
        Self::map(path, file, len, io_size)
    }

    fn map(path: PathBuf, file: File, len: u64, io_size: usize) -> anyhow::Result<Self> {
        let map_len = usize::try_from(len)
            .map_err(|_| anyhow::anyhow!("image length {len} exceeds addressable size"))?;
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(&file)? };
        Ok(Self {
            path,
            file: Some(file),
            map: Some(map),
            len,
            io_size,
            cursor: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.file.is_some() && self.map.is_some()
    }

    fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "image device is closed")
    }
}

impl BlockDevice for ImageDevice {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {offset} past image end {}", self.len),
            ));
        }
        self.cursor = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let map = self.map.as_ref().ok_or_else(Self::closed)?;
        check_unit(self.cursor, buf.len(), self.io_size, self.len)?;
        let off = usize::try_from(self.cursor).map_err(io::Error::other)?;
        buf.copy_from_slice(&map[off..off + buf.len()]);
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let map = self.map.as_mut().ok_or_else(Self::closed)?;
        check_unit(self.cursor, buf.len(), self.io_size, self.len)?;
        let off = usize::try_from(self.cursor).map_err(io::Error::other)?;
        map[off..off + buf.len()].copy_from_slice(buf);
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn io_size(&self) -> usize {
        self.io_size
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(map) = self.map.take() else {
            return Ok(());
        };
        let flushed = map.flush();
        drop(map);
        self.file.take();
        flushed
    }
}
