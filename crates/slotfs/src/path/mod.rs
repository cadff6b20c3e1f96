//! Path splitting and component-by-component resolution over the tree.


use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::record::FileType;
use crate::tree::{EntryId, Ino, Tree};

/// Answer to a path query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// The matched entry, or the deepest entry reached on a miss.
    pub entry: EntryId,
    pub found: bool,
    /// The query named the root itself.
    pub is_root: bool,
    /// Resolution stopped at a regular file with components left over.
    pub not_dir: bool,
}

/// Supplies the tree and loads records on demand while a path is walked.
pub trait RecordLoader {
    fn root(&self) -> EntryId;

    fn tree(&self) -> &Tree;

    /// Returns the index number of the record bound to `entry`, reading it
    /// from disk first if it is not cached.
    ///
    /// # Errors
    /// Propagates any failure to read the record.
    fn ensure_loaded(&mut self, entry: EntryId) -> FsResult<Ino>;
}

/// Non-empty `/`-separated components of `path`.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Number of components in `path`; the root path has none.
#[must_use]
pub fn path_levels(path: &str) -> usize {
    components(path).count()
}

/// Last component of `path`, `None` for the root.
#[must_use]
pub fn file_name(path: &str) -> Option<&str> {
    components(path).last()
}

/// Resolves `path` starting at the loader's root.
///
/// A miss reports the directory that was searched last with `found` unset.
/// A regular file reached with components left over ends the walk with
/// `not_dir` set.
///
/// # Errors
/// Returns [`FsError::Unsupported`] when the walk would pass through a
/// symbolic link, and propagates record load failures.
pub fn resolve<L: RecordLoader + ?Sized>(loader: &mut L, path: &str) -> FsResult<Lookup> {
    let parts: Vec<&str> = components(path).collect();
    let root = loader.root();
    if parts.is_empty() {
        loader.ensure_loaded(root)?;
        return Ok(Lookup {
            entry: root,
            found: true,
            is_root: true,
            not_dir: false,
        });
    }

    let miss = |entry, not_dir| Lookup {
        entry,
        found: false,
        is_root: false,
        not_dir,
    };

    let mut current = root;
    for (level, name) in parts.iter().enumerate() {
        let ino = loader.ensure_loaded(current)?;
        match loader.tree().entry(current).kind {
            FileType::Directory => {}
            FileType::Regular => {
                debug!(path, level, "lookup stopped at a regular file");
                return Ok(miss(current, true));
            }
            FileType::Symlink => {
                return Err(FsError::Unsupported(format!(
                    "symbolic link traversal in {path}"
                )));
            }
        }

        let Some(child) = loader.tree().find_child(ino, name) else {
            debug!(path, level, name, "lookup found no such entry");
            return Ok(miss(current, false));
        };
        if level + 1 == parts.len() {
            loader.ensure_loaded(child)?;
            return Ok(Lookup {
                entry: child,
                found: true,
                is_root: false,
                not_dir: false,
            });
        }
        current = child;
    }
    Ok(miss(current, false))
}
