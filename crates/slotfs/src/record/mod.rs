//! Fixed-size on-disk forms of index records and directory entries.


use crate::error::{FsError, FsResult};
use crate::layout::constants::NAME_LEN;

/// Stored in place of an index number for an entry not yet bound to one.
pub const UNBOUND_INO: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
}

impl FileType {
    /// # Errors
    /// Returns [`FsError::Corrupt`] for an unknown tag.
    pub fn from_tag(tag: u32) -> FsResult<Self> {
        match tag {
            0 => Ok(Self::Regular),
            1 => Ok(Self::Directory),
            2 => Ok(Self::Symlink),
            _ => Err(FsError::Corrupt(format!("unknown file type tag {tag}"))),
        }
    }

    #[must_use]
    pub const fn tag(self) -> u32 {
        match self {
            Self::Regular => 0,
            Self::Directory => 1,
            Self::Symlink => 2,
        }
    }

    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }

    #[must_use]
    pub const fn is_regular(self) -> bool {
        matches!(self, Self::Regular)
    }
}

/// Index record as stored at the head of its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInode {
    pub ino: u32,
    pub size: u32,
    pub link_target: String,
    pub child_count: u32,
    pub kind: FileType,
}

impl DiskInode {
    pub const SIZE: usize = 4 + 4 + NAME_LEN + 4 + 4;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.ino.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        put_name(&mut buf[8..8 + NAME_LEN], &self.link_target);
        let tail = 8 + NAME_LEN;
        buf[tail..tail + 4].copy_from_slice(&self.child_count.to_le_bytes());
        buf[tail + 4..tail + 8].copy_from_slice(&self.kind.tag().to_le_bytes());
        buf
    }

    /// # Errors
    /// Returns [`FsError::Corrupt`] for a short buffer or unknown type tag.
    pub fn from_bytes(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(short("index record", buf.len()));
        }
        let tail = 8 + NAME_LEN;
        Ok(Self {
            ino: le_u32(&buf[0..4]),
            size: le_u32(&buf[4..8]),
            link_target: get_name(&buf[8..tail]),
            child_count: le_u32(&buf[tail..tail + 4]),
            kind: FileType::from_tag(le_u32(&buf[tail + 4..tail + 8]))?,
        })
    }
}

/// Directory entry as stored in its parent's data area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDentry {
    pub name: String,
    pub kind: FileType,
    pub ino: Option<u32>,
}

impl DiskDentry {
    pub const SIZE: usize = NAME_LEN + 4 + 4;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_name(&mut buf[..NAME_LEN], &self.name);
        buf[NAME_LEN..NAME_LEN + 4].copy_from_slice(&self.kind.tag().to_le_bytes());
        let ino = self.ino.unwrap_or(UNBOUND_INO);
        buf[NAME_LEN + 4..NAME_LEN + 8].copy_from_slice(&ino.to_le_bytes());
        buf
    }

    /// # Errors
    /// Returns [`FsError::Corrupt`] for a short buffer or unknown type tag.
    pub fn from_bytes(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(short("directory entry", buf.len()));
        }
        let ino = le_u32(&buf[NAME_LEN + 4..NAME_LEN + 8]);
        Ok(Self {
            name: get_name(&buf[..NAME_LEN]),
            kind: FileType::from_tag(le_u32(&buf[NAME_LEN..NAME_LEN + 4]))?,
            ino: (ino != UNBOUND_INO).then_some(ino),
        })
    }
}

/// Checks that `name` fits a fixed-width, NUL-padded name field.
///
/// # Errors
/// Returns [`FsError::NameTooLong`] past `NAME_LEN` bytes and
/// [`FsError::InvalidName`] for an interior NUL, which decoding would treat
/// as the end of the name.
pub fn check_name(name: &str) -> FsResult<()> {
    if name.len() > NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    if name.contains('\0') {
        return Err(FsError::InvalidName(name.escape_debug().to_string()));
    }
    Ok(())
}

fn put_name(dst: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
}

fn get_name(src: &[u8]) -> String {
    let end = src.iter().position(|b| *b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

fn short(what: &str, len: usize) -> FsError {
    FsError::Corrupt(format!("{what} truncated to {len} bytes"))
}
