//! Error type shared by every layer of the engine.

use thiserror::Error;

/// Failures surfaced by device I/O, allocation, tree maintenance and lookup.
#[derive(Debug, Error)]
pub enum FsError {
    /// The block device rejected a read, write or seek.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bitmap reached its declared capacity.
    #[error("no space left on device")]
    NoSpace,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    /// Reserved for operations the engine does not implement, such as
    /// following symbolic links.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("filesystem is not mounted")]
    NotMounted,

    #[error("not a directory")]
    NotDirectory,

    #[error("name too long")]
    NameTooLong,

    /// A name the on-disk format cannot hold or a directory cannot bind.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// On-disk bytes that cannot be decoded into a record.
    #[error("corrupt metadata: {0}")]
    Corrupt(String),

    /// Device geometry the layout cannot be computed for.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Maps the error onto the errno a protocol layer replies with.
    #[must_use]
    pub const fn to_errno(&self) -> i32 {
        match self {
            Self::Io(_) | Self::Corrupt(_) => libc::EIO,
            Self::NoSpace => libc::ENOSPC,
            Self::NotFound(_) => libc::ENOENT,
            Self::Exists(_) => libc::EEXIST,
            Self::Unsupported(_) => libc::ENXIO,
            Self::NotMounted => libc::ENODEV,
            Self::NotDirectory => libc::ENOTDIR,
            Self::NameTooLong => libc::ENAMETOOLONG,
            Self::InvalidName(_) | Self::InvalidGeometry(_) => libc::EINVAL,
        }
    }
}
