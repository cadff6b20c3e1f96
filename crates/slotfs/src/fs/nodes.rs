use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::record::{FileType, check_name};
use crate::tree::{EntryId, Ino, Inode};

use super::FileSystem;

impl FileSystem {
    /// Creates `name` of type `kind` inside the directory at `parent_path`.
    ///
    /// # Errors
    /// Returns [`FsError::NotFound`] if the parent does not resolve,
    /// [`FsError::NotDirectory`] if it is not a directory,
    /// [`FsError::Exists`] for a taken name, [`FsError::InvalidName`],
    /// [`FsError::NameTooLong`] and
    /// [`FsError::NoSpace`] when the bitmaps or the parent's entry area are
    /// full.
    pub fn create_node(&mut self, parent_path: &str, name: &str, kind: FileType) -> FsResult<Ino> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(FsError::InvalidName(format!("{name:?}")));
        }
        check_name(name)?;

        let hit = self.lookup(parent_path)?;
        if !hit.found {
            return Err(FsError::NotFound(parent_path.to_string()));
        }
        if !self.tree.entry(hit.entry).kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let parent = self.ensure_loaded(hit.entry)?;
        if let Some(taken) = self.tree.find_child(parent, name) {
            return Err(FsError::Exists(self.tree.path_of(taken)));
        }
        let count = self.tree.record(parent).map_or(0, |r| r.child_count as usize);
        if count >= self.dir_capacity() {
            return Err(FsError::NoSpace);
        }

        let entry = self.tree.new_entry(name, kind, None);
        let ino = self.allocate_index_record(entry)?;
        self.add_child_entry(parent, entry)?;
        trace!(parent, ino, name, "created node");
        Ok(ino)
    }

    /// Entries of the directory at `path`, in list order.
    ///
    /// # Errors
    /// Returns [`FsError::NotFound`] or [`FsError::NotDirectory`] when `path`
    /// does not name a directory.
    pub fn read_dir(&mut self, path: &str) -> FsResult<Vec<EntryId>> {
        let hit = self.lookup(path)?;
        if !hit.found {
            return Err(FsError::NotFound(path.to_string()));
        }
        if !self.tree.entry(hit.entry).kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let ino = self.ensure_loaded(hit.entry)?;
        let mut out = Vec::new();
        while let Some(child) = self.child_at(ino, out.len()) {
            out.push(child);
        }
        Ok(out)
    }

    /// The data buffer of regular file `ino`; only the first `size` bytes are
    /// meaningful.
    ///
    /// # Errors
    /// Returns [`FsError::NotFound`] for an unloaded record and
    /// [`FsError::Unsupported`] for other file types.
    pub fn file_data(&self, ino: Ino) -> FsResult<&[u8]> {
        Ok(&self.regular(ino)?.data)
    }

    /// # Errors
    /// See [`FileSystem::file_data`].
    pub fn file_data_mut(&mut self, ino: Ino) -> FsResult<&mut [u8]> {
        self.regular(ino)?;
        self.tree
            .record_mut(ino)
            .map(|r| r.data.as_mut_slice())
            .ok_or_else(|| FsError::NotFound(format!("index record {ino} is not loaded")))
    }

    /// Sets the byte size of regular file `ino`.
    ///
    /// # Errors
    /// Returns [`FsError::NoSpace`] past the fixed data area, otherwise as
    /// [`FileSystem::file_data`].
    pub fn set_size(&mut self, ino: Ino, size: u32) -> FsResult<()> {
        if size as usize > self.sb.data_area_size() {
            return Err(FsError::NoSpace);
        }
        self.regular(ino)?;
        if let Some(record) = self.tree.record_mut(ino) {
            record.size = size;
        }
        Ok(())
    }

    /// Stores the target path of symbolic link `ino`. The target is never
    /// followed.
    ///
    /// # Errors
    /// Returns [`FsError::NameTooLong`] for an oversized target,
    /// [`FsError::InvalidName`] for one containing NUL and
    /// [`FsError::Unsupported`] if `ino` is not a link.
    pub fn set_link_target(&mut self, ino: Ino, target: &str) -> FsResult<()> {
        check_name(target)?;
        let kind = self.kind_of(ino)?;
        if kind != FileType::Symlink {
            return Err(FsError::Unsupported(format!("link target on {kind:?} {ino}")));
        }
        if let Some(record) = self.tree.record_mut(ino) {
            record.link_target = target.to_string();
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`FsError::NotFound`] for an unloaded record.
    pub fn link_target(&self, ino: Ino) -> FsResult<&str> {
        self.loaded(ino).map(|r| r.link_target.as_str())
    }

    fn loaded(&self, ino: Ino) -> FsResult<&Inode> {
        self.tree
            .record(ino)
            .ok_or_else(|| FsError::NotFound(format!("index record {ino} is not loaded")))
    }

    fn kind_of(&self, ino: Ino) -> FsResult<FileType> {
        let record = self.loaded(ino)?;
        Ok(self.tree.entry(record.owner).kind)
    }

    fn regular(&self, ino: Ino) -> FsResult<&Inode> {
        let record = self.loaded(ino)?;
        let kind = self.tree.entry(record.owner).kind;
        if kind.is_regular() {
            Ok(record)
        } else {
            Err(FsError::Unsupported(format!("{kind:?} {ino} has no data buffer")))
        }
    }
}
