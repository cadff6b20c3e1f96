//! In-memory mirror of the directory hierarchy.
//!
//! Directory entries live in an arena addressed by [`EntryId`]; index records
//! are keyed by their index number. Parent, sibling and child links are plain
//! keys, so a record and the entry naming it can refer to each other without
//! shared ownership.


use std::collections::HashMap;

use crate::record::FileType;

/// Index number of an object; also the key of its record in the [`Tree`].
pub type Ino = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

/// A name bound inside a parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dentry {
    pub name: String,
    pub kind: FileType,
    /// Index number the name is bound to, once allocated or read from disk.
    pub ino: Option<Ino>,
    pub parent: Option<EntryId>,
    /// Next entry in the parent's child list.
    pub sibling: Option<EntryId>,
    /// Loaded record, `None` until first traversal.
    pub record: Option<Ino>,
}

/// One filesystem object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub ino: Ino,
    pub size: u32,
    pub link_target: String,
    pub child_count: u32,
    /// The entry naming this record.
    pub owner: EntryId,
    /// Head of the child list, most recently added first.
    pub children: Option<EntryId>,
    /// Regular files only; empty otherwise.
    pub data: Vec<u8>,
}

impl Inode {
    #[must_use]
    pub const fn new(ino: Ino, owner: EntryId) -> Self {
        Self {
            ino,
            size: 0,
            link_target: String::new(),
            child_count: 0,
            owner,
            children: None,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Tree {
    entries: Vec<Dentry>,
    records: HashMap<Ino, Inode>,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached entry; link it with [`Tree::add_child`].
    pub fn new_entry(&mut self, name: impl Into<String>, kind: FileType, ino: Option<Ino>) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(Dentry {
            name: name.into(),
            kind,
            ino,
            parent: None,
            sibling: None,
            record: None,
        });
        id
    }

    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Dentry {
        &self.entries[id.0]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut Dentry {
        &mut self.entries[id.0]
    }

    #[must_use]
    pub fn record(&self, ino: Ino) -> Option<&Inode> {
        self.records.get(&ino)
    }

    pub fn record_mut(&mut self, ino: Ino) -> Option<&mut Inode> {
        self.records.get_mut(&ino)
    }

    /// Binds `inode` and its owner entry to each other, replacing any record
    /// previously held under the same index number.
    pub fn bind(&mut self, inode: Inode) -> Ino {
        let ino = inode.ino;
        let owner = self.entry_mut(inode.owner);
        owner.ino = Some(ino);
        owner.record = Some(ino);
        self.records.insert(ino, inode);
        ino
    }

    /// Head-inserts `child` into the list of `parent` and returns the new
    /// child count, or `None` if `parent` is not loaded.
    pub fn add_child(&mut self, parent: Ino, child: EntryId) -> Option<u32> {
        let record = self.records.get_mut(&parent)?;
        let head = record.children.replace(child);
        record.child_count += 1;
        let count = record.child_count;
        let owner = record.owner;

        let entry = self.entry_mut(child);
        entry.sibling = head;
        entry.parent = Some(owner);
        Some(count)
    }

    /// Iterates the child list of `ino` in list order.
    #[must_use]
    pub fn children(&self, ino: Ino) -> Children<'_> {
        Children {
            tree: self,
            next: self.record(ino).and_then(|r| r.children),
        }
    }

    /// The `n`-th child of `ino` in list order.
    #[must_use]
    pub fn child_at(&self, ino: Ino, n: usize) -> Option<EntryId> {
        self.children(ino).nth(n)
    }

    /// First child of `ino` whose name equals `name` exactly.
    #[must_use]
    pub fn find_child(&self, ino: Ino, name: &str) -> Option<EntryId> {
        self.children(ino).find(|&id| self.entry(id).name == name)
    }

    /// Absolute path of `id`, built from parent links.
    #[must_use]
    pub fn path_of(&self, id: EntryId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let entry = self.entry(current);
            if entry.parent.is_none() {
                break;
            }
            parts.push(entry.name.as_str());
            cursor = entry.parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }
}

pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<EntryId>,
}

impl Iterator for Children<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.entry(current).sibling;
        Some(current)
    }
}
