use anyhow::Context;
use tracing::{debug, info, warn};

use crate::device::{BlockDevice, ImageDevice};
use crate::error::{FsError, FsResult};
use crate::io::BlockIo;
use crate::layout::bits::Bitmap;
use crate::layout::constants::{ROOT_INO, SUPER_OFFSET};
use crate::layout::{DiskSuper, SuperBlock};
use crate::record::FileType;
use crate::tree::Tree;

use super::{FileSystem, MountOptions};

impl FileSystem {
    /// Opens the image named by `opts` and mounts it.
    ///
    /// # Errors
    /// Fails if the image cannot be opened or [`FileSystem::mount_device`]
    /// fails.
    pub fn mount(opts: &MountOptions) -> anyhow::Result<Self> {
        let dev = ImageDevice::open(&opts.device, opts.io_size)?;
        Self::mount_device(Box::new(dev))
            .with_context(|| format!("mount {}", opts.device.display()))
    }

    /// Mounts `dev`, laying out a fresh filesystem if it carries none.
    ///
    /// On first use the super block and empty bitmaps are written, the root
    /// directory is allocated and synced, and the metadata is flushed. The
    /// root record is then always read back from disk. On any failure the
    /// device is released before returning.
    ///
    /// # Errors
    /// Returns [`FsError::InvalidGeometry`] for an unusable device,
    /// [`FsError::Corrupt`] for an inconsistent persisted layout and
    /// [`FsError::Io`] for device failures.
    pub fn mount_device(dev: Box<dyn BlockDevice>) -> FsResult<Self> {
        let mut io = BlockIo::new(dev);
        let device_size = io.device_size();
        let io_size = io.io_size();

        let raw = io.read(SUPER_OFFSET, DiskSuper::SIZE)?;
        let (sb, fresh) = match DiskSuper::from_bytes(&raw) {
            Some(disk) => (SuperBlock::load(&disk, device_size, io_size)?, false),
            None => {
                let sb = SuperBlock::format(device_size, io_size)?;
                io.write(SUPER_OFFSET, &sb.to_disk().to_bytes())?;
                io.write(sb.inode_map_offset, &vec![0u8; sb.inode_map_len()])?;
                io.write(sb.data_map_offset, &vec![0u8; sb.data_map_len()])?;
                info!(
                    device_size,
                    io_size,
                    max_ino = sb.max_ino,
                    max_data = sb.max_data,
                    "laid out new filesystem"
                );
                (sb, true)
            }
        };

        let inode_map = Bitmap::from_bytes(io.read(sb.inode_map_offset, sb.inode_map_len())?, sb.max_ino);
        let data_map = Bitmap::from_bytes(io.read(sb.data_map_offset, sb.data_map_len())?, sb.max_data);

        let mut tree = Tree::new();
        let root = tree.new_entry("/", FileType::Directory, Some(ROOT_INO));
        let mut fs = Self {
            io: Some(io),
            sb,
            inode_map,
            data_map,
            tree,
            root,
        };

        if fresh {
            let ino = fs.allocate_index_record(root)?;
            if ino != ROOT_INO {
                return Err(FsError::Corrupt(format!(
                    "root allocated as {ino} on an empty bitmap"
                )));
            }
            fs.sync_index_record(ino)?;
            fs.write_meta()?;
        }
        fs.read_index_record(root, ROOT_INO)?;
        fs.sb.mounted = true;

        info!(
            fresh,
            usage = fs.sb.usage,
            objects = fs.inode_map.count_set(),
            "mounted"
        );
        fs.dump_maps();
        Ok(fs)
    }

    /// Writes the whole tree, the super block and both bitmaps back, then
    /// releases the device. Does nothing if not mounted.
    ///
    /// # Errors
    /// Returns the first sync or write failure; the device is released
    /// regardless.
    pub fn unmount(&mut self) -> FsResult<()> {
        if !self.sb.mounted {
            return Ok(());
        }
        self.sb.mounted = false;

        let synced = self
            .sync_index_record(ROOT_INO)
            .and_then(|()| self.write_meta());
        let released = self.io.take().map_or(Ok(()), |mut io| io.close());
        if let Err(err) = &released {
            warn!("device release failed: {err}");
        }
        synced?;
        released?;
        info!(usage = self.sb.usage, "unmounted");
        Ok(())
    }

    /// Logs occupancy and the raw bytes of both bitmaps.
    pub fn dump_maps(&self) {
        for (name, map) in [("index", &self.inode_map), ("data", &self.data_map)] {
            let used = map.count_set();
            let shown = map.capacity().div_ceil(8) as usize;
            let hex: Vec<String> = map.as_bytes()[..shown.min(map.as_bytes().len())]
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect();
            debug!(
                map = name,
                used,
                capacity = map.capacity(),
                bits = %hex.join(" "),
                "bitmap"
            );
        }
        debug!(usage = self.sb.usage, "usage in blocks");
    }

    fn write_meta(&mut self) -> FsResult<()> {
        let io = Self::device(&mut self.io)?;
        io.write(SUPER_OFFSET, &self.sb.to_disk().to_bytes())?;
        io.write(self.sb.inode_map_offset, self.inode_map.as_bytes())?;
        io.write(self.sb.data_map_offset, self.data_map.as_bytes())?;
        Ok(())
    }
}
