use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::layout::constants::{BLOCKS_PER_OBJECT, DATA_UNITS_PER_OBJECT};
use crate::record::{DiskDentry, DiskInode, FileType};
use crate::tree::{EntryId, Ino, Inode};

use super::FileSystem;

impl FileSystem {
    /// Allocates a fresh index record for `owner` and binds the two together.
    /// Regular files get their zeroed data buffer immediately.
    ///
    /// # Errors
    /// Returns [`FsError::NoSpace`] when either bitmap is exhausted; nothing
    /// stays allocated in that case.
    pub fn allocate_index_record(&mut self, owner: EntryId) -> FsResult<Ino> {
        let ino = self.inode_map.allocate()?;
        let kind = self.tree.entry(owner).kind;
        let mut inode = Inode::new(ino, owner);
        if kind.is_regular() {
            inode.data = vec![0u8; self.sb.data_area_size()];
        }
        if let Err(err) = self.reserve_data_units(&inode) {
            self.inode_map.set(ino, false);
            return Err(err);
        }
        self.sb.usage += BLOCKS_PER_OBJECT as u32;
        trace!(ino, ?kind, usage = self.sb.usage, "allocated index record");
        Ok(self.tree.bind(inode))
    }

    /// Accounts the data units of an already-allocated record in the data
    /// bitmap. The data area itself is always addressed by index number.
    ///
    /// # Errors
    /// Returns [`FsError::NoSpace`] after releasing any units it took.
    pub fn reserve_data_units(&mut self, record: &Inode) -> FsResult<()> {
        let mut taken = Vec::with_capacity(DATA_UNITS_PER_OBJECT as usize);
        for _ in 0..DATA_UNITS_PER_OBJECT {
            match self.data_map.allocate() {
                Ok(unit) => taken.push(unit),
                Err(err) => {
                    for unit in taken {
                        self.data_map.set(unit, false);
                    }
                    return Err(err);
                }
            }
        }
        trace!(ino = record.ino, ?taken, "reserved data units");
        Ok(())
    }

    /// Reads the record for `ino` from disk and binds it to `owner`. For a
    /// directory its entries become children in reverse on-disk order; for a
    /// regular file the whole data area is read.
    ///
    /// # Errors
    /// Returns [`FsError::Io`] or [`FsError::Corrupt`]; the tree is untouched
    /// on failure.
    pub fn read_index_record(&mut self, owner: EntryId, ino: Ino) -> FsResult<Ino> {
        if ino >= self.sb.max_ino {
            return Err(FsError::Corrupt(format!(
                "index number {ino} beyond {}",
                self.sb.max_ino
            )));
        }
        let record_at = self.sb.inode_offset_of(ino);
        let data_at = self.sb.data_offset_of(ino);
        let area = self.sb.data_area_size();
        let capacity = self.dir_capacity();
        let io = Self::device(&mut self.io)?;

        let disk = DiskInode::from_bytes(&io.read(record_at, DiskInode::SIZE)?)?;
        if disk.ino != ino {
            return Err(FsError::Corrupt(format!(
                "slot {ino} holds record {}",
                disk.ino
            )));
        }
        let expected = self.tree.entry(owner).kind;
        if disk.kind != expected {
            return Err(FsError::Corrupt(format!(
                "record {ino} is {:?}, entry says {expected:?}",
                disk.kind
            )));
        }

        let mut entries = Vec::new();
        let mut data = Vec::new();
        match disk.kind {
            FileType::Directory => {
                let count = disk.child_count as usize;
                if count > capacity {
                    return Err(FsError::Corrupt(format!(
                        "directory {ino} claims {count} entries, room for {capacity}"
                    )));
                }
                let raw = io.read(data_at, count * DiskDentry::SIZE)?;
                for chunk in raw.chunks_exact(DiskDentry::SIZE) {
                    entries.push(DiskDentry::from_bytes(chunk)?);
                }
            }
            FileType::Regular => data = io.read(data_at, area)?,
            FileType::Symlink => {}
        }

        let mut inode = Inode::new(ino, owner);
        inode.size = disk.size;
        inode.link_target = disk.link_target;
        inode.data = data;
        self.tree.bind(inode);
        for dentry in entries {
            let child = self.tree.new_entry(dentry.name, dentry.kind, dentry.ino);
            self.tree.add_child(ino, child);
        }
        trace!(ino, kind = ?disk.kind, children = disk.child_count, "read index record");
        Ok(ino)
    }

    /// Head-inserts `entry` into directory `parent` and returns its new
    /// child count. Names are not checked for duplicates here.
    ///
    /// # Errors
    /// Returns [`FsError::NotFound`] if `parent` has no loaded record.
    pub fn add_child_entry(&mut self, parent: Ino, entry: EntryId) -> FsResult<u32> {
        self.tree
            .add_child(parent, entry)
            .ok_or_else(|| FsError::NotFound(format!("index record {parent} is not loaded")))
    }

    /// Writes `ino` and everything loaded beneath it. The first failure
    /// aborts the walk; records written before it stay written.
    ///
    /// # Errors
    /// Returns [`FsError::NoSpace`] for a directory whose entries overflow its
    /// data area, [`FsError::NotFound`] for an unloaded record and
    /// [`FsError::Io`] for device failures.
    pub fn sync_index_record(&mut self, ino: Ino) -> FsResult<()> {
        let capacity = self.dir_capacity();
        let record_at = self.sb.inode_offset_of(ino);
        let data_at = self.sb.data_offset_of(ino);
        let inode = self
            .tree
            .record(ino)
            .ok_or_else(|| FsError::NotFound(format!("index record {ino} is not loaded")))?;
        let kind = self.tree.entry(inode.owner).kind;
        let disk = DiskInode {
            ino,
            size: inode.size,
            link_target: inode.link_target.clone(),
            child_count: inode.child_count,
            kind,
        };

        let children: Vec<EntryId> = self.tree.children(ino).collect();
        if kind.is_dir() && children.len() > capacity {
            return Err(FsError::NoSpace);
        }
        let payload = match kind {
            FileType::Directory => {
                let mut buf = Vec::with_capacity(children.len() * DiskDentry::SIZE);
                for &child in &children {
                    let entry = self.tree.entry(child);
                    let dentry = DiskDentry {
                        name: entry.name.clone(),
                        kind: entry.kind,
                        ino: entry.ino,
                    };
                    buf.extend_from_slice(&dentry.to_bytes());
                }
                buf
            }
            FileType::Regular => inode.data.clone(),
            FileType::Symlink => Vec::new(),
        };

        let io = Self::device(&mut self.io)?;
        io.write(record_at, &disk.to_bytes())?;
        io.write(data_at, &payload)?;
        trace!(ino, ?kind, bytes = payload.len(), "synced index record");

        if kind.is_dir() {
            for child in children {
                if let Some(child_ino) = self.tree.entry(child).record {
                    self.sync_index_record(child_ino)?;
                }
            }
        }
        Ok(())
    }
}
