//! The mounted filesystem: layout, bitmaps and tree behind one owner.
//!
//! [`FileSystem::mount`] returns the context every later call borrows
//! exclusively; nothing is global. Mutations stay in memory until
//! [`FileSystem::unmount`] writes the tree back from the root.

mod mount;
mod nodes;
mod records;
#[cfg(test)]
mod fs_tests;

use std::path::PathBuf;

use crate::error::{FsError, FsResult};
use crate::io::BlockIo;
use crate::layout::SuperBlock;
use crate::layout::bits::Bitmap;
use crate::layout::constants::DEFAULT_IO_SIZE;
use crate::path::{Lookup, RecordLoader, resolve};
use crate::record::DiskDentry;
use crate::tree::{Dentry, EntryId, Ino, Inode, Tree};

/// Where to find the device and how it is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    pub device: PathBuf,
    pub io_size: usize,
}

impl MountOptions {
    #[must_use]
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            io_size: DEFAULT_IO_SIZE,
        }
    }

    #[must_use]
    pub const fn with_io_size(mut self, io_size: usize) -> Self {
        self.io_size = io_size;
        self
    }
}

pub struct FileSystem {
    io: Option<BlockIo>,
    sb: SuperBlock,
    inode_map: Bitmap,
    data_map: Bitmap,
    tree: Tree,
    root: EntryId,
}

impl FileSystem {
    #[must_use]
    pub const fn super_block(&self) -> &SuperBlock {
        &self.sb
    }

    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.sb.mounted
    }

    #[must_use]
    pub const fn root(&self) -> EntryId {
        self.root
    }

    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    #[must_use]
    pub const fn inode_map(&self) -> &Bitmap {
        &self.inode_map
    }

    #[must_use]
    pub const fn data_map(&self) -> &Bitmap {
        &self.data_map
    }

    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Dentry {
        self.tree.entry(id)
    }

    #[must_use]
    pub fn record(&self, ino: Ino) -> Option<&Inode> {
        self.tree.record(ino)
    }

    /// The `n`-th child of directory `ino`, in list order.
    #[must_use]
    pub fn child_at(&self, ino: Ino, n: usize) -> Option<EntryId> {
        self.tree.child_at(ino, n)
    }

    /// How many entries a directory's data area can hold.
    #[must_use]
    pub const fn dir_capacity(&self) -> usize {
        self.sb.data_area_size() / DiskDentry::SIZE
    }

    /// Resolves `path` from the root, loading records along the way.
    ///
    /// # Errors
    /// Returns [`FsError::NotMounted`] after unmount and propagates record
    /// load failures.
    pub fn lookup(&mut self, path: &str) -> FsResult<Lookup> {
        self.check_mounted()?;
        resolve(self, path)
    }

    /// Returns the record bound to `entry`, reading it on first use.
    ///
    /// # Errors
    /// Returns [`FsError::NotFound`] for an entry with no index number yet and
    /// propagates read failures.
    pub fn ensure_loaded(&mut self, entry: EntryId) -> FsResult<Ino> {
        let dentry = self.tree.entry(entry);
        if let Some(ino) = dentry.record {
            return Ok(ino);
        }
        let ino = dentry
            .ino
            .ok_or_else(|| FsError::NotFound(format!("{} has no index record", dentry.name)))?;
        self.read_index_record(entry, ino)
    }

    fn check_mounted(&self) -> FsResult<()> {
        if self.sb.mounted && self.io.is_some() {
            Ok(())
        } else {
            Err(FsError::NotMounted)
        }
    }

    fn device(io: &mut Option<BlockIo>) -> FsResult<&mut BlockIo> {
        io.as_mut().ok_or(FsError::NotMounted)
    }
}

impl RecordLoader for FileSystem {
    fn root(&self) -> EntryId {
        self.root
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn ensure_loaded(&mut self, entry: EntryId) -> FsResult<Ino> {
        Self::ensure_loaded(self, entry)
    }
}
