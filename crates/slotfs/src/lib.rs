//! Slot-addressed block-device filesystem engine.
//!
//! The crate owns the on-disk layout (super block, two bitmaps and one fixed
//! slot per object), the in-memory tree of directory entries and index
//! records mirrored from it, and path resolution over that tree. Operation
//! dispatch (create/read/write through a user-space filesystem protocol) is
//! left to callers, which drive the primitives exposed by [`fs::FileSystem`].
#![allow(clippy::cargo_common_metadata)]

pub mod device;
pub mod error;
pub mod fs;
pub mod io;
pub mod layout;
pub mod path;
pub mod record;
pub mod tree;

pub use error::{FsError, FsResult};
pub use fs::{FileSystem, MountOptions};
pub use path::Lookup;
pub use record::FileType;
pub use tree::{EntryId, Ino};
